use serde::Deserialize;

use super::alert::Alert;

/// Envelope delivered on the push topic for every new or changed alert.
/// Duplicate and out-of-order delivery are expected; the sync engine's merge
/// absorbs both.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub alert: Alert,
}

impl PushEnvelope {
    /// Parses a raw payload. Malformed payloads are a `None`, not an error:
    /// the consumer loop logs and skips them.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}
