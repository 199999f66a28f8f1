use actix_session::{Session, SessionInsertError};
use serde::{Deserialize, Serialize};

const SESSION_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Theme::Light => "theme-light",
            Theme::Dark => "theme-dark",
        }
    }
}

/// The session's theme, or the configured default when it never toggled.
pub fn current(session: &Session, default: Theme) -> Theme {
    session
        .get::<Theme>(SESSION_KEY)
        .ok()
        .flatten()
        .unwrap_or(default)
}

pub fn toggle(session: &Session, default: Theme) -> Result<Theme, SessionInsertError> {
    let next = current(session, default).toggled();
    session.insert(SESSION_KEY, next)?;
    Ok(next)
}
