//! Holder session issuance.

use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use slotlock_core::slot_lock::HolderToken;

use crate::middleware::holder::holder_cookie;
use crate::response::DataResponse;

/// Payload of `POST /session`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub holder_token: HolderToken,
}

/// POST /api/v1/session
///
/// Issue a fresh holder token. Browsers keep it in the `slotlock_holder`
/// cookie; other clients send it back in the `X-Holder-Token` header.
pub async fn open_session() -> impl IntoResponse {
    let holder_token = HolderToken::generate();
    tracing::debug!(holder = %holder_token, "Holder session issued");

    (
        StatusCode::CREATED,
        [(SET_COOKIE, holder_cookie(&holder_token))],
        Json(DataResponse {
            data: SessionResponse { holder_token },
        }),
    )
}
