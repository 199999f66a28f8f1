use crate::models::Profile;
use anyhow::Result;
use pantry_core::{Item, ItemChanges, ItemQuery, NewItem};
use sqlx::PgPool;
use uuid::Uuid;

/// Channel the `items` trigger publishes owner ids on.
pub const ITEM_CHANNEL: &str = "pantry_items";

// Item functions
pub async fn create_item(pool: &PgPool, item: &NewItem) -> Result<Item> {
    let item = sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (user_id, name, category, expiry_date, image_uri)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, name, category, expiry_date, image_uri, created_at
        "#
    )
    .bind(&item.user_id)
    .bind(&item.name)
    .bind(&item.category)
    .bind(&item.expiry_date)
    .bind(&item.image_uri)
    .fetch_one(pool)
    .await?;

    Ok(item)
}

pub async fn get_item(pool: &PgPool, user_id: &str, item_id: Uuid) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, user_id, name, category, expiry_date, image_uri, created_at
        FROM items
        WHERE id = $1 AND user_id = $2
        "#
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

pub async fn update_item(
    pool: &PgPool,
    user_id: &str,
    item_id: Uuid,
    changes: &ItemChanges,
) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        r#"
        UPDATE items
        SET name = $3, category = $4, expiry_date = $5, image_uri = $6
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, name, category, expiry_date, image_uri, created_at
        "#
    )
    .bind(item_id)
    .bind(user_id)
    .bind(&changes.name)
    .bind(&changes.category)
    .bind(&changes.expiry_date)
    .bind(&changes.image_uri)
    .fetch_optional(pool)
    .await?;

    Ok(item)
}

pub async fn delete_item(pool: &PgPool, user_id: &str, item_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM items
        WHERE id = $1 AND user_id = $2
        "#
    )
    .bind(item_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_items(pool: &PgPool, query: &ItemQuery) -> Result<Vec<Item>> {
    let items = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, user_id, name, category, expiry_date, image_uri, created_at
        FROM items
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR category = $2)
        ORDER BY created_at, id
        "#
    )
    .bind(&query.user_id)
    .bind(query.category.as_deref())
    .fetch_all(pool)
    .await?;

    Ok(items)
}

// Profile functions
pub async fn get_profile(pool: &PgPool, user_id: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT user_id, display_name, profile_image_uri, created_at, updated_at
        FROM profiles
        WHERE user_id = $1
        "#
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

pub async fn upsert_profile(
    pool: &PgPool,
    user_id: &str,
    display_name: Option<&str>,
    profile_image_uri: Option<&str>,
) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (user_id, display_name, profile_image_uri)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            display_name = COALESCE(EXCLUDED.display_name, profiles.display_name),
            profile_image_uri = COALESCE(EXCLUDED.profile_image_uri, profiles.profile_image_uri),
            updated_at = NOW()
        RETURNING user_id, display_name, profile_image_uri, created_at, updated_at
        "#
    )
    .bind(user_id)
    .bind(display_name)
    .bind(profile_image_uri)
    .fetch_one(pool)
    .await?;

    Ok(profile)
}
