//! `slotlock-client` -- demo driver for the lock client.
//!
//! Opens a session against a running `slotlock-api`, polls a handful of
//! slots, tries to hold one, and logs every lock event until Ctrl-C, when it
//! sends an unload release and exits.
//!
//! # Environment variables
//!
//! | Variable            | Required | Default   | Description                         |
//! |---------------------|----------|-----------|-------------------------------------|
//! | `SLOT_ID`           | yes      | --        | Slot to hold                        |
//! | `VISIBLE_SLOT_IDS`  | no       | `SLOT_ID` | Comma-separated slots to poll       |
//!
//! Plus the client settings read by [`ClientConfig::from_env`].

use std::sync::Arc;
use std::time::Duration;

use slotlock_client::api::HttpLockApi;
use slotlock_client::client::LockClient;
use slotlock_client::config::ClientConfig;
use slotlock_core::slot_lock::{parse_slot_ids, validate_slot_id};
use slotlock_core::types::SlotId;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotlock_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid client configuration");
        std::process::exit(1);
    });

    let slot_id: SlotId = std::env::var("SLOT_ID")
        .unwrap_or_else(|_| {
            tracing::error!("SLOT_ID environment variable is required");
            std::process::exit(1);
        })
        .trim()
        .parse()
        .unwrap_or_else(|_| {
            tracing::error!("SLOT_ID must be a valid integer");
            std::process::exit(1);
        });
    if let Err(reason) = validate_slot_id(slot_id) {
        tracing::error!(slot_id, %reason, "Invalid SLOT_ID");
        std::process::exit(1);
    }

    let mut visible = std::env::var("VISIBLE_SLOT_IDS")
        .ok()
        .map(|raw| {
            parse_slot_ids(&raw).unwrap_or_else(|reason| {
                tracing::error!(%reason, "Invalid VISIBLE_SLOT_IDS");
                std::process::exit(1);
            })
        })
        .unwrap_or_default();
    if !visible.contains(&slot_id) {
        visible.push(slot_id);
    }

    tracing::info!(base_url = %config.base_url, slot_id, "Starting slotlock-client");

    let http = HttpLockApi::build_http_client(config.request_timeout).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build HTTP client");
        std::process::exit(1);
    });
    let session = HttpLockApi::open_session(&http, &config.base_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to open a lock session");
            std::process::exit(1);
        });
    tracing::info!(holder = %session.holder_token, "Lock session opened");

    let api = HttpLockApi::new(http, config.base_url.clone(), session);
    let client = LockClient::new(Arc::new(api), config);

    let mut events = client.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.notice() {
                    Some(notice) => tracing::info!(?event, %notice, "Lock event"),
                    None => tracing::info!(?event, "Lock event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    client.start_polling(visible);
    let outcome = client.select_slot(slot_id).await;
    tracing::info!(?outcome, "Initial selection finished");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
    }

    tracing::info!("Shutting down, sending unload release");
    client.unload();

    // Give the beacon a moment to leave before the runtime goes away.
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(client);
    logger.abort();
}
