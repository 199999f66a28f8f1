use crate::config::Config;
use crate::AppState;
use actix_web::{HttpRequest, Result};

/// User id placed on the request by the upstream auth provider.
pub fn current_user(req: &HttpRequest, config: &Config) -> Option<String> {
    let user_id = req
        .headers()
        .get(config.auth_header.as_str())?
        .to_str()
        .ok()?
        .trim();

    if user_id.is_empty() {
        None
    } else {
        Some(user_id.to_string())
    }
}

pub fn require_user(req: &HttpRequest, state: &AppState) -> Result<String> {
    current_user(req, &state.config).ok_or_else(|| {
        log::debug!("Rejected request to {} without {}", req.path(), state.config.auth_header);
        actix_web::error::ErrorUnauthorized("Not signed in")
    })
}
