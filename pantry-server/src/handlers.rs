use crate::{auth::require_user, db, models::*, templates, theme, AppState};
use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use futures_util::StreamExt;
use maud::Markup;
use pantry_core::{classify_within, CategoryFilter, ItemQuery, ItemStore, NewItem, StoreError};
use std::convert::Infallible;
use uuid::Uuid;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(dashboard)))
        .service(web::resource("/inventory").route(web::get().to(inventory)))
        .service(web::resource("/items").route(web::post().to(create_item)))
        .service(web::resource("/items/new").route(web::get().to(new_item_page)))
        .service(web::resource("/items/{id}").route(web::post().to(update_item)))
        .service(web::resource("/items/{id}/edit").route(web::get().to(edit_item_page)))
        .service(web::resource("/items/{id}/delete").route(web::post().to(delete_item)))
        .service(web::resource("/notifications").route(web::get().to(notifications)))
        .service(web::resource("/profile").route(web::get().to(profile)).route(web::post().to(update_profile)))
        .service(web::resource("/theme/toggle").route(web::post().to(toggle_theme)))
        .service(web::resource("/api/pantry").route(web::get().to(pantry_view)))
        .service(web::resource("/api/pantry/events").route(web::get().to(pantry_events)));
}

fn html_response(html: Markup) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html").body(html.into_string())
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location))
        .finish()
}

fn store_error(action: &str, err: StoreError) -> actix_web::Error {
    match err {
        StoreError::NotFound { .. } => actix_web::error::ErrorNotFound("Item not found"),
        err => {
            log::error!("Failed to {}: {}", action, err);
            actix_web::error::ErrorInternalServerError(format!("Failed to {}", action))
        }
    }
}

async fn dashboard(req: HttpRequest, session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);

    let view = state
        .aggregator
        .snapshot(&ItemQuery::for_user(&user))
        .await
        .map_err(|e| {
            log::error!("Failed to load pantry: {}", e);
            actix_web::error::ErrorServiceUnavailable("Could not load pantry")
        })?;

    let profile = db::get_profile(&state.db_pool, &user)
        .await
        .unwrap_or_else(|e| {
            log::warn!("Failed to get profile for {}: {}", user, e);
            None
        });
    let display_name = profile
        .as_ref()
        .and_then(|p| p.display_name.as_deref())
        .unwrap_or(&user);

    Ok(html_response(templates::dashboard_page(theme, display_name, &view)))
}

async fn inventory(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
    query: web::Query<InventoryQuery>,
) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);
    let filter = CategoryFilter::parse(query.category.as_deref().unwrap_or(CategoryFilter::ALL_LABEL));

    let items = state
        .items
        .list_items(&ItemQuery::for_user(&user).with_category(&filter))
        .await
        .map_err(|e| store_error("get items", e))?;

    let now = state.aggregator.now();
    let horizon = state.aggregator.horizon_days();
    let rows: Vec<_> = items
        .into_iter()
        .map(|item| {
            let classification = classify_within(&item, now, horizon);
            (item, classification)
        })
        .collect();

    Ok(html_response(templates::inventory_page(theme, &filter, &rows)))
}

async fn new_item_page(req: HttpRequest, session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);

    Ok(html_response(templates::item_form_page(
        theme,
        "Add New Item",
        "/items",
        &ItemForm::default(),
        None,
    )))
}

async fn create_item(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ItemForm>,
) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;

    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(e) => {
            let theme = theme::current(&session, state.config.default_theme);
            let html = templates::item_form_page(theme, "Add New Item", "/items", &form, Some(&e.to_string()));
            return Ok(HttpResponse::BadRequest().content_type("text/html").body(html.into_string()));
        }
    };

    let item = state
        .items
        .create_item(NewItem {
            user_id: user,
            name: changes.name,
            category: changes.category,
            expiry_date: changes.expiry_date,
            image_uri: changes.image_uri,
        })
        .await
        .map_err(|e| store_error("add item", e))?;
    log::info!("Added item {} for {}", item.id, item.user_id);

    Ok(redirect("/inventory"))
}

async fn edit_item_page(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);
    let item_id = path.into_inner();

    let item = state
        .items
        .get_item(&user, item_id)
        .await
        .map_err(|e| store_error("get item", e))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Item not found"))?;

    let form = ItemForm {
        name: item.name,
        category: item.category,
        expiry_date: item.expiry_date,
        image_uri: item.image_uri.unwrap_or_default(),
    };
    let action = format!("/items/{}", item_id);

    Ok(html_response(templates::item_form_page(theme, "Edit Item", &action, &form, None)))
}

async fn update_item(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    form: web::Form<ItemForm>,
) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let item_id = path.into_inner();

    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(e) => {
            let theme = theme::current(&session, state.config.default_theme);
            let action = format!("/items/{}", item_id);
            let html = templates::item_form_page(theme, "Edit Item", &action, &form, Some(&e.to_string()));
            return Ok(HttpResponse::BadRequest().content_type("text/html").body(html.into_string()));
        }
    };

    state
        .items
        .update_item(&user, item_id, changes)
        .await
        .map_err(|e| store_error("update item", e))?;

    Ok(redirect("/inventory"))
}

async fn delete_item(req: HttpRequest, state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let item_id = path.into_inner();

    state
        .items
        .delete_item(&user, item_id)
        .await
        .map_err(|e| store_error("delete item", e))?;
    log::info!("Deleted item {} for {}", item_id, user);

    Ok(redirect("/inventory"))
}

async fn notifications(req: HttpRequest, session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);

    let view = state
        .aggregator
        .snapshot(&ItemQuery::for_user(&user))
        .await
        .map_err(|e| {
            log::error!("Failed to load pantry: {}", e);
            actix_web::error::ErrorServiceUnavailable("Could not load pantry")
        })?;

    Ok(html_response(templates::notifications_page(theme, &view)))
}

async fn profile(req: HttpRequest, session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    let theme = theme::current(&session, state.config.default_theme);

    let profile = db::get_profile(&state.db_pool, &user)
        .await
        .map_err(|e| {
            log::error!("Failed to get profile: {}", e);
            actix_web::error::ErrorInternalServerError("Failed to get profile")
        })?;

    let item_count = state
        .items
        .list_items(&ItemQuery::for_user(&user))
        .await
        .map_err(|e| store_error("count items", e))?
        .len();

    Ok(html_response(templates::profile_page(theme, &user, profile.as_ref(), item_count)))
}

async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;

    let display_name = Some(form.display_name.trim()).filter(|name| !name.is_empty());
    let image_uri = Some(form.profile_image_uri.trim()).filter(|uri| !uri.is_empty());
    if display_name.is_none() && image_uri.is_none() {
        return Ok(HttpResponse::BadRequest().body("Please enter a name or picture to update."));
    }

    db::upsert_profile(&state.db_pool, &user, display_name, image_uri)
        .await
        .map_err(|e| {
            log::error!("Failed to update profile: {}", e);
            actix_web::error::ErrorInternalServerError("Failed to update profile")
        })?;

    Ok(redirect("/profile"))
}

async fn toggle_theme(req: HttpRequest, session: Session, state: web::Data<AppState>) -> Result<HttpResponse> {
    let theme = theme::toggle(&session, state.config.default_theme)?;
    log::debug!("Switched theme to {:?}", theme);

    let back = req
        .headers()
        .get("Referer")
        .and_then(|value| value.to_str().ok())
        .and_then(referer_path)
        .unwrap_or("/");

    Ok(redirect(back))
}

/// Path part of a `Referer` value. Only same-site paths are ever redirected to.
fn referer_path(referer: &str) -> Option<&str> {
    if referer.starts_with('/') && !referer.starts_with("//") {
        return Some(referer);
    }
    let (_, rest) = referer.split_once("://")?;
    rest.find('/').map(|start| &rest[start..])
}

async fn pantry_view(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;

    match state.aggregator.snapshot(&ItemQuery::for_user(&user)).await {
        Ok(view) => Ok(HttpResponse::Ok().json(view)),
        Err(e) => {
            log::error!("Failed to load pantry: {}", e);
            Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": "Could not load pantry"
            })))
        }
    }
}

fn sse_frame(event: &str, data: &str) -> web::Bytes {
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

/// Live `AggregateView`s as Server-Sent Events. The subscription is
/// cancelled when the client disconnects and the body is dropped.
async fn pantry_events(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user = require_user(&req, &state)?;
    log::info!("Live pantry stream opened for {}", user);

    let events = state.aggregator.subscribe(user).map(|update| {
        let frame = match update {
            Ok(view) => match serde_json::to_string(&view) {
                Ok(json) => sse_frame("view", &json),
                Err(e) => {
                    log::warn!("Failed to serialize pantry view: {}", e);
                    sse_frame("error", r#"{"error":"Could not encode pantry"}"#)
                }
            },
            Err(e) => {
                let body = serde_json::json!({ "error": e.to_string() });
                sse_frame("error", &body.to_string())
            }
        };
        Ok::<_, Infallible>(frame)
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}
