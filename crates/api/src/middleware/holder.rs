//! Holder identity extractor for lock handlers.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use slotlock_core::error::CoreError;
use slotlock_core::slot_lock::HolderToken;

use crate::error::AppError;

/// Header carrying the holder token for programmatic clients.
pub const HOLDER_HEADER: &str = "x-holder-token";

/// Cookie carrying the holder token for browsers (and unload beacons, which
/// cannot set custom headers).
pub const HOLDER_COOKIE: &str = "slotlock_holder";

/// The session that owns (or wants to own) slot locks.
///
/// Resolved from the `X-Holder-Token` header, falling back to the
/// `slotlock_holder` cookie:
///
/// ```ignore
/// async fn my_handler(holder: Holder) -> AppResult<Json<()>> {
///     tracing::info!(holder = %holder.token, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Holder {
    pub token: HolderToken,
}

impl<S: Send + Sync> FromRequestParts<S> for Holder {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = holder_from_headers(&parts.headers).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing holder token. Call POST /api/v1/session first".into(),
            ))
        })?;

        let token = HolderToken::parse(raw).map_err(|e| {
            AppError::Core(CoreError::Unauthorized(format!("Invalid holder token: {e}")))
        })?;

        Ok(Holder { token })
    }
}

fn holder_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(HOLDER_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.trim().to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == HOLDER_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

/// Build the `Set-Cookie` value that pins a holder token to the browser.
pub fn holder_cookie(token: &HolderToken) -> String {
    format!("{HOLDER_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}
