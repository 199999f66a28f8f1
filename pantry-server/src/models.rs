use pantry_core::{parse_expiry, Category, ItemChanges};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub profile_image_uri: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Add and edit form for a pantry item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemForm {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub expiry_date: String,
    #[serde(default)]
    pub image_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please enter the item name and select an expiry date.")]
    MissingField,
    #[error("Expiry date is not a valid date: {0}")]
    InvalidExpiry(String),
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

impl ItemForm {
    pub fn validate(&self) -> Result<ItemChanges, FormError> {
        let name = self.name.trim();
        let expiry_date = self.expiry_date.trim();
        if name.is_empty() || expiry_date.is_empty() {
            return Err(FormError::MissingField);
        }
        if parse_expiry(expiry_date).is_none() {
            return Err(FormError::InvalidExpiry(expiry_date.to_string()));
        }

        let category = match self.category.trim() {
            "" => Category::Food,
            other => other
                .parse::<Category>()
                .map_err(|_| FormError::UnknownCategory(other.to_string()))?,
        };

        let image_uri = Some(self.image_uri.trim())
            .filter(|uri| !uri.is_empty())
            .map(str::to_string);

        Ok(ItemChanges {
            name: name.to_string(),
            category: category.to_string(),
            expiry_date: expiry_date.to_string(),
            image_uri,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_image_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, category: &str, expiry_date: &str) -> ItemForm {
        ItemForm {
            name: name.to_string(),
            category: category.to_string(),
            expiry_date: expiry_date.to_string(),
            image_uri: String::new(),
        }
    }

    #[test]
    fn valid_form_is_trimmed_and_defaults_category() {
        let changes = form("  Milk ", "", "2024-06-12").validate().unwrap();
        assert_eq!(changes.name, "Milk");
        assert_eq!(changes.category, "Food");
        assert_eq!(changes.expiry_date, "2024-06-12");
        assert_eq!(changes.image_uri, None);
    }

    #[test]
    fn name_and_expiry_are_required() {
        assert_eq!(form(" ", "Dairy", "2024-06-12").validate(), Err(FormError::MissingField));
        assert_eq!(form("Milk", "Dairy", "").validate(), Err(FormError::MissingField));
    }

    #[test]
    fn rejects_bad_dates_and_categories() {
        assert_eq!(
            form("Milk", "Dairy", "soon").validate(),
            Err(FormError::InvalidExpiry("soon".to_string()))
        );
        assert_eq!(
            form("Milk", "Snacks", "2024-06-12").validate(),
            Err(FormError::UnknownCategory("Snacks".to_string()))
        );
    }
}
