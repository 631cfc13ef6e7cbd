use crate::client::{Fetch, ProbeOutcome};
use crate::error::{DinoError, Result};
use crate::liveness::base_url;
use crate::peers::{LeaveOutcome, PeerRequest};
use crate::store::Registrar;
use async_trait::async_trait;
use hyper::StatusCode;
use std::sync::Arc;

pub fn peers_url(base: &str) -> String {
    format!("http://{}/peers", base)
}

pub fn leave_url(base: &str) -> String {
    format!("http://{}/leave", base)
}

fn peer_body(address: &str) -> String {
    serde_json::json!(PeerRequest {
        address: address.to_string(),
    })
    .to_string()
}

/// Addresses the discovery service at `base` reports as connected.
pub async fn fetch_listing(fetch: &dyn Fetch, base: &str) -> Result<Vec<String>> {
    match fetch.get(&base_url(base)).await {
        ProbeOutcome::Response { body, status } if status == StatusCode::OK.as_u16() => {
            Ok(serde_json::from_str(&body)?)
        }
        outcome => Err(DinoError::Service {
            status: outcome.status(),
            payload: outcome.payload(),
        }),
    }
}

/// Registers peers through the running discovery service, which owns the store.
pub struct ServiceRegistrar {
    fetch: Arc<dyn Fetch>,
    base: String,
}

impl ServiceRegistrar {
    pub fn new(fetch: Arc<dyn Fetch>, base: impl Into<String>) -> Self {
        Self {
            fetch,
            base: base.into(),
        }
    }
}

#[async_trait]
impl Registrar for ServiceRegistrar {
    async fn register(&self, address: &str) -> Result<bool> {
        let outcome = self
            .fetch
            .post(&peers_url(&self.base), peer_body(address))
            .await;
        match outcome.status() {
            201 => Ok(true),
            200 => Ok(false),
            status => Err(DinoError::Service {
                status,
                payload: outcome.payload(),
            }),
        }
    }
}

/// Ask the service at `base` to drop `address`. Fails only when the service
/// cannot be reached.
pub async fn leave(fetch: &dyn Fetch, base: &str, address: &str) -> Result<LeaveOutcome> {
    let listing = fetch_listing(fetch, base).await?;
    if !listing.iter().any(|a| a == address) {
        return Ok(LeaveOutcome::NotConnected(address.to_string()));
    }

    let outcome = fetch.post(&leave_url(base), peer_body(address)).await;
    Ok(match outcome.status() {
        200 => LeaveOutcome::Left(address.to_string()),
        404 => LeaveOutcome::NotConnected(address.to_string()),
        _ => LeaveOutcome::ErrorDeleting {
            address: address.to_string(),
            detail: error_detail(&outcome.payload()),
        },
    })
}

/// The `error` field of a JSON error body, or the raw payload.
fn error_detail(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| payload.to_string())
}
