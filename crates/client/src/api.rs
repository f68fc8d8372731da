//! HTTP transport for the slot lock endpoints.
//!
//! [`LockApi`] is the seam the state machine talks through; [`HttpLockApi`]
//! implements it with [`reqwest`] against the server's `/api/v1` routes.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use slotlock_core::slot_lock::{AcquireOutcome, AcquireResponse, HolderToken, SlotLockStatus};
use slotlock_core::types::SlotId;

/// Header carrying the holder token.
pub const HOLDER_HEADER: &str = "x-holder-token";

/// Errors from the lock HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum LockApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned an unexpected status code.
    #[error("Lock API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Operations the client needs from the lock service.
#[async_trait]
pub trait LockApi: Send + Sync {
    /// Try to acquire (or renew) the hold on `slot_id`.
    async fn acquire(&self, slot_id: SlotId) -> Result<AcquireOutcome, LockApiError>;

    /// Release the hold on `slot_id`.
    async fn release(&self, slot_id: SlotId) -> Result<(), LockApiError>;

    /// Fire-and-forget release for page unload.
    ///
    /// Must return immediately. Delivery is not guaranteed and nothing may
    /// depend on it; the server TTL reclaims the slot either way.
    fn release_beacon(&self, slot_id: SlotId);

    /// Lock status of each slot in `slot_ids`.
    async fn status(
        &self,
        slot_ids: &[SlotId],
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, LockApiError>;
}

/// The identity a client presents to the server.
///
/// Passed explicitly into the transport so nothing depends on ambient
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub holder_token: HolderToken,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    data: SessionData,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    holder_token: HolderToken,
}

/// HTTP client for one lock server.
#[derive(Clone)]
pub struct HttpLockApi {
    client: reqwest::Client,
    base_url: String,
    session: ClientSession,
}

impl HttpLockApi {
    /// Create an API client for the server at `base_url`
    /// (e.g. `http://host:3000/api/v1`).
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, session: ClientSession) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Build a `reqwest::Client` with the given per-request timeout.
    pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, LockApiError> {
        Ok(reqwest::Client::builder().timeout(timeout).build()?)
    }

    /// Ask the server for a fresh holder token.
    pub async fn open_session(
        client: &reqwest::Client,
        base_url: &str,
    ) -> Result<ClientSession, LockApiError> {
        let response = client
            .post(format!("{}/session", base_url.trim_end_matches('/')))
            .send()
            .await?;
        let envelope: SessionEnvelope = Self::parse_response(response).await?;
        Ok(ClientSession {
            holder_token: envelope.data.holder_token,
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    fn lock_url(&self, slot_id: SlotId) -> String {
        format!("{}/slots/{slot_id}/lock", self.base_url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`LockApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LockApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LockApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, LockApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl LockApi for HttpLockApi {
    async fn acquire(&self, slot_id: SlotId) -> Result<AcquireOutcome, LockApiError> {
        let response = self
            .client
            .post(self.lock_url(slot_id))
            .header(HOLDER_HEADER, self.session.holder_token.as_str())
            .send()
            .await?;

        // 409 carries the same body shape as a grant.
        if response.status() == reqwest::StatusCode::CONFLICT {
            let body: AcquireResponse = response.json().await?;
            return Ok(body.into());
        }

        let body: AcquireResponse = Self::parse_response(response).await?;
        Ok(body.into())
    }

    async fn release(&self, slot_id: SlotId) -> Result<(), LockApiError> {
        let response = self
            .client
            .delete(self.lock_url(slot_id))
            .header(HOLDER_HEADER, self.session.holder_token.as_str())
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    fn release_beacon(&self, slot_id: SlotId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(slot_id, "No runtime for unload release, dropping it");
            return;
        };

        let request = self
            .client
            .post(format!("{}/release", self.lock_url(slot_id)))
            .header(HOLDER_HEADER, self.session.holder_token.as_str());

        runtime.spawn(async move {
            if let Err(e) = request.send().await {
                tracing::debug!(slot_id, error = %e, "Unload release dropped");
            }
        });
    }

    async fn status(
        &self,
        slot_ids: &[SlotId],
    ) -> Result<BTreeMap<SlotId, SlotLockStatus>, LockApiError> {
        let ids = slot_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(format!("{}/locks", self.base_url))
            .query(&[("slot_ids", ids)])
            .header(HOLDER_HEADER, self.session.holder_token.as_str())
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
