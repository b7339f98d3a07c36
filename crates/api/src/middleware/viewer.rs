//! Per-request [`Viewer`]: optional user plus `Accept-Language`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::request::Parts;
use partvault_core::ini_file::short_language;
use partvault_core::viewer::Viewer;

use crate::error::AppError;
use crate::middleware::auth::OptionalUser;
use crate::state::AppState;

/// The viewer a request browses as. Reading the users files touches the
/// disk, so it runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct RequestViewer(pub Arc<Viewer>);

/// Primary language of the first `Accept-Language` entry, e.g. `de` for
/// `de-AT,de;q=0.9,en;q=0.5`. Anything but a two or three letter code is
/// ignored.
pub fn preferred_language(header: Option<&str>) -> Option<String> {
    let first = header?.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        return None;
    }
    let language = short_language(tag);
    let valid = (2..=3).contains(&language.len())
        && language.bytes().all(|b| b.is_ascii_lowercase());
    valid.then_some(language)
}

impl FromRequestParts<AppState> for RequestViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = OptionalUser::from_request_parts(parts, state).await?;
        let language = preferred_language(
            parts
                .headers
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok()),
        )
        .unwrap_or_else(|| state.settings.default_language.clone());

        let settings = Arc::clone(&state.settings);
        let username = user.0.map(|u| u.username);
        let viewer = tokio::task::spawn_blocking(move || Viewer::load(&settings, username, language))
            .await
            .map_err(|e| AppError::InternalError(format!("Viewer task failed: {e}")))?;

        Ok(RequestViewer(Arc::new(viewer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_language() {
        assert_eq!(
            preferred_language(Some("de-AT,de;q=0.9,en;q=0.5")).as_deref(),
            Some("de")
        );
        assert_eq!(preferred_language(Some("fr;q=0.8")).as_deref(), Some("fr"));
    }

    #[test]
    fn ignores_missing_or_wildcard() {
        assert_eq!(preferred_language(None), None);
        assert_eq!(preferred_language(Some("*")), None);
        assert_eq!(preferred_language(Some("")), None);
    }

    #[test]
    fn ignores_malformed_tags() {
        assert_eq!(preferred_language(Some("x-garbage-123")), None);
        assert_eq!(preferred_language(Some("abcdefgh")), None);
        assert_eq!(preferred_language(Some("e1")), None);
        assert_eq!(preferred_language(Some("EN-us")).as_deref(), Some("en"));
        assert_eq!(preferred_language(Some("fil-PH")).as_deref(), Some("fil"));
    }
}
