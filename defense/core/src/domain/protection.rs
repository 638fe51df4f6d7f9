// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fragmented Payload Protections
//!
//! A [`Protection`] is one encrypted payload split into checksummed
//! [`Fragment`]s with a bounded lifetime. The classification policy table
//! fixes the TTL, fragment count, and encryption rounds per level; higher
//! classifications trade shorter lifetimes for more fragments and rounds.
//!
//! Fragment checksums are computed exactly once at creation over the
//! ciphertext and are the sole basis for later tamper detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtectionId(pub Uuid);

impl ProtectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ProtectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProtectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Low,
    Medium,
    High,
    Critical,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Low,
        Classification::Medium,
        Classification::High,
        Classification::Critical,
    ];

    /// Default policy table. TTL strictly decreases and fragment count
    /// strictly increases as the classification rises; that shape is a
    /// contract, the concrete values are tunable policy.
    pub fn policy(self) -> ClassificationPolicy {
        match self {
            Classification::Low => ClassificationPolicy {
                ttl: Duration::from_secs(300),
                fragment_count: 3,
                encryption_rounds: 1,
            },
            Classification::Medium => ClassificationPolicy {
                ttl: Duration::from_secs(60),
                fragment_count: 5,
                encryption_rounds: 2,
            },
            Classification::High => ClassificationPolicy {
                ttl: Duration::from_secs(15),
                fragment_count: 7,
                encryption_rounds: 3,
            },
            Classification::Critical => ClassificationPolicy {
                ttl: Duration::from_secs(5),
                fragment_count: 9,
                encryption_rounds: 4,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationPolicy {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    pub fragment_count: usize,
    pub encryption_rounds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionStatus {
    Active,
    Compromised,
    Expired,
}

/// One encrypted, checksummed piece of a protection. Owned exclusively by
/// its protection; never shared, never re-signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub index: usize,
    pub bytes: Vec<u8>,
    /// SHA-256 over `bytes`, fixed at creation.
    pub checksum: [u8; 32],
}

impl Fragment {
    pub fn new(index: usize, bytes: Vec<u8>) -> Self {
        let checksum = Self::digest(&bytes);
        Self {
            index,
            bytes,
            checksum,
        }
    }

    fn digest(bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finalize().into()
    }

    /// Recompute the checksum over the current bytes and compare against
    /// the one recorded at creation.
    pub fn matches_checksum(&self) -> bool {
        Self::digest(&self.bytes) == self.checksum
    }

    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protection {
    pub id: ProtectionId,
    pub classification: Classification,
    pub fragments: Vec<Fragment>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ProtectionStatus,
}

impl Protection {
    /// Assemble a protection from already-encrypted bytes. Fragments are
    /// near-equal sized; the last fragment absorbs the remainder.
    pub fn from_ciphertext(
        classification: Classification,
        policy: &ClassificationPolicy,
        ciphertext: &[u8],
    ) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(policy.ttl).unwrap_or(chrono::Duration::zero());
        Self {
            id: ProtectionId::new(),
            classification,
            fragments: split_fragments(ciphertext, policy.fragment_count),
            created_at: now,
            expires_at: now + ttl,
            status: ProtectionStatus::Active,
        }
    }

    pub fn mark_compromised(&mut self) {
        if self.status == ProtectionStatus::Active {
            self.status = ProtectionStatus::Compromised;
        }
    }

    pub fn mark_expired(&mut self) {
        self.status = ProtectionStatus::Expired;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status != ProtectionStatus::Expired && now >= self.expires_at
    }
}

/// Split ciphertext into `count` near-equal fragments. The last fragment
/// absorbs remainder bytes.
pub fn split_fragments(ciphertext: &[u8], count: usize) -> Vec<Fragment> {
    let count = count.max(1);
    let base = ciphertext.len() / count;
    let mut fragments = Vec::with_capacity(count);
    let mut offset = 0;
    for index in 0..count {
        let end = if index == count - 1 {
            ciphertext.len()
        } else {
            offset + base
        };
        fragments.push(Fragment::new(index, ciphertext[offset..end].to_vec()));
        offset = end;
    }
    fragments
}
