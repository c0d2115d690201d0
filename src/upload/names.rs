//! Opaque document names

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of a generated opaque name, in hex characters
pub const OPAQUE_NAME_LEN: usize = 32;

/// Source of storage identifiers for new documents.
pub trait NameGenerator: Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Hashes the current time in nanoseconds together with a random UUID.
///
/// Names never depend on content, so identical uploads get distinct names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNameGenerator;

impl NameGenerator for TimestampNameGenerator {
    fn generate(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(Uuid::new_v4().as_bytes());
        let mut name = hex::encode(hasher.finalize());
        name.truncate(OPAQUE_NAME_LEN);
        name
    }
}
