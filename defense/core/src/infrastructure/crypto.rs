// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cryptographic Collaborators
//!
//! The coordination core treats encryption as an opaque, round-trippable
//! external primitive and randomness as an unpredictable byte source.
//! Both are capability traits so deployments can plug in their own
//! implementations; the bundled [`KeystreamCipher`] is a stand-in that
//! satisfies the round-trip contract without claiming a vetted scheme.

use async_trait::async_trait;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("cipher rejected input: {0}")]
    Rejected(String),

    #[error("cipher backend unavailable: {0}")]
    Unavailable(String),
}

/// Symmetric encryption primitive: `decrypt(key, encrypt(key, p)) == p`.
#[async_trait]
pub trait CipherPrimitive: Send + Sync {
    async fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;
    async fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Unpredictable byte source for key generation and secure overwrite.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, buf: &mut [u8]);
}

/// OS-backed randomness via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecureRandom;

impl SecureRandom for OsSecureRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// SHA-256 counter-mode keystream XOR cipher.
///
/// Symmetric (encrypt and decrypt are the same transform) and
/// round-trippable, which is all the engine's contract requires of the
/// primitive. Deployments supply their own vetted scheme through
/// [`CipherPrimitive`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeystreamCipher;

impl KeystreamCipher {
    fn apply(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for (block_index, block) in data.chunks(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(key);
            hasher.update((block_index as u64).to_be_bytes());
            let keystream = hasher.finalize();
            for (byte, ks) in block.iter().zip(keystream.iter()) {
                out.push(byte ^ ks);
            }
        }
        out
    }
}

#[async_trait]
impl CipherPrimitive for KeystreamCipher {
    async fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if key.is_empty() {
            return Err(CipherError::Rejected("empty key".to_string()));
        }
        Ok(Self::apply(key, plaintext))
    }

    async fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if key.is_empty() {
            return Err(CipherError::Rejected("empty key".to_string()));
        }
        Ok(Self::apply(key, ciphertext))
    }
}
