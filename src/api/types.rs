//! Shared types for the API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;
use crate::reminders::DispatchSummary;

/// Shared context for every route and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    /// SHA-256 of the trigger secret; `None` leaves the trigger open.
    pub trigger_secret_hash: Option<[u8; 32]>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        let trigger_secret_hash = core
            .config()
            .trigger_secret
            .as_deref()
            .map(hash_secret);
        Self {
            core,
            trigger_secret_hash,
        }
    }
}

/// SHA-256 a secret so comparisons run over fixed-length digests.
pub fn hash_secret(secret: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scan_running: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastScanResponse {
    pub running: bool,
    pub summary: Option<DispatchSummary>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPushTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterPushTokenResponse {
    /// False when the token was already registered.
    pub registered: bool,
}
