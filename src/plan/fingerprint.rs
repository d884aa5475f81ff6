//! Plan fingerprinting.
//!
//! A fingerprint is a SHA-256 digest over the pruned resource changes of a
//! plan. Two uploads with the same changes produce the same fingerprint
//! regardless of the order Terraform listed them in.

use sha2::{Digest, Sha256};

use super::types::ResourceChange;

/// Hasher for computing plan fingerprints.
#[derive(Debug, Default)]
pub struct PlanHasher;

impl PlanHasher {
    /// Creates a new plan hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a set of resource changes.
    #[must_use]
    pub fn hash_changes(&self, changes: &[ResourceChange]) -> String {
        let mut hasher = Sha256::new();

        let mut sorted: Vec<_> = changes.iter().collect();
        sorted.sort_by(|a, b| a.address.cmp(&b.address));

        for change in sorted {
            hasher.update(self.hash_change(change).as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes the hash of a single resource change.
    #[must_use]
    pub fn hash_change(&self, change: &ResourceChange) -> String {
        let mut hasher = Sha256::new();

        // Length prefixes keep adjacent fields from running together
        for field in [
            change.address.as_str(),
            change.resource_type.as_str(),
            change.name.as_deref().unwrap_or_default(),
            change.resolved_resource_group().unwrap_or_default(),
        ] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }

        // Action order is significant in Terraform output
        for action in &change.change.actions {
            hasher.update((action.len() as u64).to_be_bytes());
            hasher.update(action.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two fingerprints.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        hash1.len() == hash2.len()
            && hash1
                .bytes()
                .zip(hash2.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
