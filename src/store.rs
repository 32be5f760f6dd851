//! Last-report cache
//!
//! Holds each user's most recently generated report so a client can show it
//! again without regenerating. Entries are keyed by a SHA-256 digest of the
//! caller's bearer token; requests without a token are never cached. In-memory
//! only; lost on restart.

use crate::synthesizer::ReportOutcome;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct ReportStore {
    latest: Arc<RwLock<HashMap<String, ReportOutcome>>>,
}

fn owner_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the owner's cached report. Fallback reports are not cached so
    /// a transient failure does not hide the last good report.
    pub async fn record(&self, token: &str, outcome: &ReportOutcome) {
        if outcome.source.is_fallback() {
            return;
        }

        let mut latest = self.latest.write().await;
        latest.insert(owner_key(token), outcome.clone());
    }

    pub async fn latest(&self, token: &str) -> Option<ReportOutcome> {
        self.latest.read().await.get(&owner_key(token)).cloned()
    }
}
