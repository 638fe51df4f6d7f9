// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fragmentation Engine
//!
//! Splits payloads into encrypted, checksummed fragments with a bounded
//! lifetime, verifies integrity on a recurring schedule, and guarantees
//! secure deletion at expiry. Integrity failures are reported to the
//! incident ledger exactly once per compromise.
//!
//! ## Locking
//!
//! Each protection sits behind its own mutex inside a `DashMap`, so
//! verifying or expiring one protection never blocks another. `protect()`
//! builds the full protection before inserting it; a failure or cancelled
//! call leaves no partial state visible to anyone.

use crate::domain::incident::{IncidentType, ResourceRef};
use crate::domain::protection::{
    Classification, ClassificationPolicy, Fragment, Protection, ProtectionId, ProtectionStatus,
};
use crate::infrastructure::crypto::{CipherPrimitive, SecureRandom};
use crate::infrastructure::ledger::{IncidentLedger, IncidentReport};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ProtectionError {
    /// The external primitive failed or timed out; no protection was created.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    #[error("unknown protection: {0}")]
    NotFound(ProtectionId),

    #[error("protection already expired: {0}")]
    AlreadyExpired(ProtectionId),
}

/// Result of one integrity verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Secure,
    /// Indices of fragments whose recomputed checksum no longer matches.
    Compromised(Vec<usize>),
}

pub struct FragmentationEngine {
    cipher: Arc<dyn CipherPrimitive>,
    random: Arc<dyn SecureRandom>,
    ledger: Arc<IncidentLedger>,
    protections: DashMap<ProtectionId, Arc<Mutex<Protection>>>,
    policies: HashMap<Classification, ClassificationPolicy>,
    protect_timeout: Duration,
    late_tolerance: Duration,
}

impl FragmentationEngine {
    pub fn new(
        cipher: Arc<dyn CipherPrimitive>,
        random: Arc<dyn SecureRandom>,
        ledger: Arc<IncidentLedger>,
    ) -> Self {
        let policies = Classification::ALL
            .into_iter()
            .map(|c| (c, c.policy()))
            .collect();
        Self {
            cipher,
            random,
            ledger,
            protections: DashMap::new(),
            policies,
            protect_timeout: Duration::from_millis(100),
            late_tolerance: Duration::from_secs(2),
        }
    }

    /// Override the default policy table. Operators may tune values, but
    /// the shape (shorter TTL, more fragments as classification rises) is
    /// contractual.
    pub fn with_policies(mut self, policies: HashMap<Classification, ClassificationPolicy>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn with_protect_timeout(mut self, timeout: Duration) -> Self {
        self.protect_timeout = timeout;
        self
    }

    pub fn with_late_tolerance(mut self, tolerance: Duration) -> Self {
        self.late_tolerance = tolerance;
        self
    }

    pub fn policy(&self, classification: Classification) -> ClassificationPolicy {
        self.policies
            .get(&classification)
            .copied()
            .unwrap_or_else(|| classification.policy())
    }

    /// Protect a payload under a classification's policy.
    ///
    /// Generates a fresh key, applies the external cipher the configured
    /// number of rounds, splits into checksummed fragments, and schedules
    /// expiry at `now + ttl`. All-or-nothing: nothing is visible until the
    /// protection is fully built. Uses the engine's default cipher timeout.
    pub async fn protect(
        &self,
        payload: &[u8],
        classification: Classification,
    ) -> Result<ProtectionId, ProtectionError> {
        self.protect_with_timeout(payload, classification, self.protect_timeout)
            .await
    }

    /// `protect` honoring a caller-supplied timeout around the cipher
    /// rounds. A timeout or cipher failure creates no partial state.
    pub async fn protect_with_timeout(
        &self,
        payload: &[u8],
        classification: Classification,
        timeout: Duration,
    ) -> Result<ProtectionId, ProtectionError> {
        let policy = self.policy(classification);
        let started = std::time::Instant::now();

        let mut key = vec![0u8; 32];
        self.random.fill(&mut key);

        let cipher = self.cipher.clone();
        let encrypt_rounds = async {
            let mut ciphertext = payload.to_vec();
            for _ in 0..policy.encryption_rounds {
                ciphertext = cipher.encrypt(&key, &ciphertext).await?;
            }
            Ok::<Vec<u8>, crate::infrastructure::crypto::CipherError>(ciphertext)
        };

        let ciphertext = match tokio::time::timeout(timeout, encrypt_rounds).await {
            Ok(Ok(ciphertext)) => ciphertext,
            Ok(Err(e)) => return Err(ProtectionError::EncryptionFailure(e.to_string())),
            Err(_) => {
                return Err(ProtectionError::EncryptionFailure(format!(
                    "cipher primitive exceeded {timeout:?}"
                )))
            }
        };

        // Key material is single-use: overwrite before dropping. The
        // engine keeps no decryption path, so the plaintext is
        // unrecoverable once the fragments expire.
        self.random.fill(&mut key);
        drop(key);

        let protection = Protection::from_ciphertext(classification, &policy, &ciphertext);
        let id = protection.id;
        let expires_at = protection.expires_at;
        self.protections.insert(id, Arc::new(Mutex::new(protection)));

        metrics::counter!("defense_protections_created_total").increment(1);
        metrics::histogram!("defense_protect_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            protection_id = %id,
            classification = ?classification,
            fragments = policy.fragment_count,
            %expires_at,
            "protection created"
        );
        Ok(id)
    }

    /// Recompute every fragment checksum for one protection.
    ///
    /// Any mismatch transitions the protection to Compromised and reports
    /// exactly one High-severity incident naming the protection and the
    /// mismatched indices; later calls re-report the indices without
    /// emitting another incident.
    pub fn verify_integrity(&self, id: ProtectionId) -> Result<VerifyOutcome, ProtectionError> {
        let slot = self.slot(id)?;
        let mut protection = slot.lock();
        if protection.status == ProtectionStatus::Expired {
            return Err(ProtectionError::AlreadyExpired(id));
        }

        let mismatched: Vec<usize> = protection
            .fragments
            .iter()
            .filter(|f| !f.matches_checksum())
            .map(|f| f.index)
            .collect();

        if mismatched.is_empty() {
            debug!(protection_id = %id, "integrity verified");
            return Ok(VerifyOutcome::Secure);
        }

        let first_detection = protection.status != ProtectionStatus::Compromised;
        protection.mark_compromised();
        drop(protection);

        warn!(
            protection_id = %id,
            indices = ?mismatched,
            "fragment checksum mismatch"
        );
        if first_detection {
            metrics::counter!("defense_protections_compromised_total").increment(1);
            self.ledger.report(
                IncidentReport::new(
                    IncidentType::FragmentCompromise,
                    format!("protection {id} fragments {mismatched:?} failed checksum verification"),
                )
                .on_resource(ResourceRef::new(id.to_string()).with_kind("protection"))
                .with_attachment(serde_json::json!({
                    "protection_id": id,
                    "compromised_indices": mismatched,
                })),
            );
        }
        Ok(VerifyOutcome::Compromised(mismatched))
    }

    /// Scheduled secure deletion at TTL. Idempotent: a second call on the
    /// same id succeeds without re-emitting the audit incident.
    pub fn expire(&self, id: ProtectionId) -> Result<(), ProtectionError> {
        self.secure_delete(id, DeletionCause::TtlExpiry)
    }

    /// Operator-triggered early destruction. Routes through the same
    /// secure-deletion procedure as scheduled expiry.
    pub fn destroy(&self, id: ProtectionId) -> Result<(), ProtectionError> {
        self.secure_delete(id, DeletionCause::EarlyDestruction)
    }

    fn secure_delete(&self, id: ProtectionId, cause: DeletionCause) -> Result<(), ProtectionError> {
        let Some(slot) = self.slot_opt(id) else {
            // Unknown or already swept: deletion is idempotent.
            return Ok(());
        };
        let mut protection = slot.lock();
        if protection.status == ProtectionStatus::Expired {
            return Ok(());
        }

        let now = Utc::now();
        if cause == DeletionCause::TtlExpiry {
            let lateness = now.signed_duration_since(protection.expires_at);
            let tolerance =
                chrono::Duration::from_std(self.late_tolerance).unwrap_or(chrono::Duration::zero());
            if lateness > tolerance {
                // Late expiry is tolerated (TTL is a lower bound) but
                // surfaced for audit.
                warn!(protection_id = %id, lateness_ms = lateness.num_milliseconds(), "late expiry");
                self.ledger.report(
                    IncidentReport::new(
                        IncidentType::SchedulerDelay,
                        format!(
                            "protection {id} expired {}ms past its deadline",
                            lateness.num_milliseconds()
                        ),
                    )
                    .on_resource(ResourceRef::new(id.to_string()).with_kind("protection")),
                );
            }
        }

        // Overwrite every fragment before releasing the protection.
        for fragment in &mut protection.fragments {
            self.random.fill(&mut fragment.bytes);
        }
        protection.mark_expired();
        drop(protection);

        let description = match cause {
            DeletionCause::TtlExpiry => format!("protection {id} expired normally at TTL"),
            DeletionCause::EarlyDestruction => {
                format!("protection {id} destroyed early by operator request")
            }
        };
        metrics::counter!("defense_protections_expired_total").increment(1);
        self.ledger.report(
            IncidentReport::new(IncidentType::NormalExpiration, description)
                .on_resource(ResourceRef::new(id.to_string()).with_kind("protection")),
        );
        info!(protection_id = %id, ?cause, "protection securely deleted");
        Ok(())
    }

    /// Expire every protection whose deadline has passed. Never expires
    /// early. Returns the expired ids.
    pub fn expire_due(&self) -> Vec<ProtectionId> {
        let now = Utc::now();
        let due: Vec<ProtectionId> = self
            .protections
            .iter()
            .filter(|entry| entry.value().lock().is_due(now))
            .map(|entry| *entry.key())
            .collect();
        for id in &due {
            if let Err(e) = self.expire(*id) {
                warn!(protection_id = %id, error = %e, "scheduled expiry failed");
            }
        }
        due
    }

    /// Verify every active protection. Returns the ids found compromised
    /// in this pass.
    pub fn verify_due(&self) -> Vec<ProtectionId> {
        let ids: Vec<ProtectionId> = self.protections.iter().map(|entry| *entry.key()).collect();
        let mut compromised = Vec::new();
        for id in ids {
            match self.verify_integrity(id) {
                Ok(VerifyOutcome::Compromised(_)) => compromised.push(id),
                Ok(VerifyOutcome::Secure) => {}
                // Expired or concurrently swept entries are skipped.
                Err(_) => {}
            }
        }
        compromised
    }

    pub fn status(&self, id: ProtectionId) -> Option<ProtectionStatus> {
        self.slot_opt(id).map(|slot| slot.lock().status)
    }

    /// Cloned fragment view for replication and audit tooling.
    pub fn fragments(&self, id: ProtectionId) -> Option<Vec<Fragment>> {
        self.slot_opt(id).map(|slot| slot.lock().fragments.clone())
    }

    pub fn active_count(&self) -> usize {
        self.protections
            .iter()
            .filter(|entry| entry.value().lock().status == ProtectionStatus::Active)
            .count()
    }

    /// Fault-injection hook for integrity drills: flips one byte of one
    /// fragment in place.
    #[doc(hidden)]
    pub fn corrupt_fragment(&self, id: ProtectionId, index: usize) -> Result<(), ProtectionError> {
        let slot = self.slot(id)?;
        let mut protection = slot.lock();
        let fragment = protection
            .fragments
            .get_mut(index)
            .ok_or(ProtectionError::NotFound(id))?;
        if fragment.bytes.is_empty() {
            fragment.bytes.push(0xFF);
        } else {
            fragment.bytes[0] ^= 0xFF;
        }
        Ok(())
    }

    fn slot(&self, id: ProtectionId) -> Result<Arc<Mutex<Protection>>, ProtectionError> {
        self.slot_opt(id).ok_or(ProtectionError::NotFound(id))
    }

    fn slot_opt(&self, id: ProtectionId) -> Option<Arc<Mutex<Protection>>> {
        // Clone the Arc out of the map entry so per-protection work never
        // holds a map shard lock.
        self.protections.get(&id).map(|entry| entry.value().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeletionCause {
    TtlExpiry,
    EarlyDestruction,
}

/// Background driver that sweeps due protections on a fixed interval.
pub struct ExpiryDriver {
    engine: Arc<FragmentationEngine>,
    period: Duration,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl ExpiryDriver {
    pub fn new(engine: Arc<FragmentationEngine>, period: Duration) -> Self {
        Self {
            engine,
            period,
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(period = ?self.period, "starting expiry driver");
        let mut tick = interval(self.period);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let expired = self.engine.expire_due();
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "expired due protections");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received, stopping expiry driver");
                    break;
                }
            }
        }
    }
}

/// Background driver that re-verifies all active protections on a fixed
/// interval.
pub struct VerificationDriver {
    engine: Arc<FragmentationEngine>,
    period: Duration,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl VerificationDriver {
    pub fn new(engine: Arc<FragmentationEngine>, period: Duration) -> Self {
        Self {
            engine,
            period,
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Build from configuration. `None` when verification is disabled;
    /// nothing should be spawned in that case.
    pub fn from_config(
        engine: Arc<FragmentationEngine>,
        config: &crate::config::VerificationConfig,
    ) -> Option<Self> {
        config.enabled.then(|| Self::new(engine, config.interval))
    }

    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(period = ?self.period, "starting verification driver");
        let mut tick = interval(self.period);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let compromised = self.engine.verify_due();
                    if !compromised.is_empty() {
                        warn!(count = compromised.len(), "verification pass found compromised protections");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received, stopping verification driver");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::incident::Severity;
    use crate::infrastructure::crypto::{CipherError, KeystreamCipher, OsSecureRandom};
    use crate::infrastructure::ledger::IncidentFilter;
    use async_trait::async_trait;

    fn engine() -> (Arc<FragmentationEngine>, Arc<IncidentLedger>) {
        let ledger = Arc::new(IncidentLedger::new());
        let engine = Arc::new(FragmentationEngine::new(
            Arc::new(KeystreamCipher),
            Arc::new(OsSecureRandom),
            ledger.clone(),
        ));
        (engine, ledger)
    }

    fn short_policies(ttl: Duration) -> HashMap<Classification, ClassificationPolicy> {
        Classification::ALL
            .into_iter()
            .map(|c| {
                let mut policy = c.policy();
                policy.ttl = ttl;
                (c, policy)
            })
            .collect()
    }

    struct FailingCipher;

    #[async_trait]
    impl CipherPrimitive for FailingCipher {
        async fn encrypt(&self, _key: &[u8], _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
            Err(CipherError::Unavailable("hsm offline".to_string()))
        }

        async fn decrypt(&self, _key: &[u8], _ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
            Err(CipherError::Unavailable("hsm offline".to_string()))
        }
    }

    struct StallingCipher;

    #[async_trait]
    impl CipherPrimitive for StallingCipher {
        async fn encrypt(&self, _key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(plaintext.to_vec())
        }

        async fn decrypt(&self, _key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
            Ok(ciphertext.to_vec())
        }
    }

    #[tokio::test]
    async fn protect_then_verify_is_secure() {
        let (engine, _ledger) = engine();
        let id = engine
            .protect(b"secret-payload", Classification::High)
            .await
            .unwrap();

        assert_eq!(engine.fragments(id).unwrap().len(), 7);
        assert_eq!(engine.verify_integrity(id).unwrap(), VerifyOutcome::Secure);
        assert_eq!(engine.status(id), Some(ProtectionStatus::Active));
    }

    #[tokio::test]
    async fn tamper_reports_exact_index_and_exactly_one_incident() {
        let (engine, ledger) = engine();
        let id = engine
            .protect(b"secret-payload-that-is-long-enough-to-split", Classification::High)
            .await
            .unwrap();

        engine.corrupt_fragment(id, 3).unwrap();

        let outcome = engine.verify_integrity(id).unwrap();
        assert_eq!(outcome, VerifyOutcome::Compromised(vec![3]));
        assert_eq!(engine.status(id), Some(ProtectionStatus::Compromised));

        let incidents = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::FragmentCompromise),
            ..Default::default()
        });
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].severity, Severity::High);
        assert!(incidents[0].description.contains(&id.to_string()));
        assert!(incidents[0].description.contains("[3]"));

        // Re-verification re-reports indices but emits no second incident.
        let again = engine.verify_integrity(id).unwrap();
        assert_eq!(again, VerifyOutcome::Compromised(vec![3]));
        assert_eq!(
            ledger
                .query(&IncidentFilter {
                    incident_type: Some(IncidentType::FragmentCompromise),
                    ..Default::default()
                })
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn expiry_overwrites_bytes_and_is_idempotent() {
        let (engine, ledger) = engine();
        let id = engine
            .protect(b"ephemeral-data-to-be-shredded", Classification::Medium)
            .await
            .unwrap();
        let before = engine.fragments(id).unwrap();

        engine.expire(id).unwrap();
        let after = engine.fragments(id).unwrap();
        assert_eq!(engine.status(id), Some(ProtectionStatus::Expired));
        for (original, shredded) in before.iter().zip(after.iter()) {
            if !original.bytes.is_empty() {
                assert_ne!(original.bytes, shredded.bytes, "bytes must be overwritten");
            }
        }

        // Second call: no error, no second audit incident.
        engine.expire(id).unwrap();
        let expiries = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::NormalExpiration),
            ..Default::default()
        });
        assert_eq!(expiries.len(), 1);
        assert_eq!(expiries[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn destroy_routes_through_the_same_deletion_path() {
        let (engine, ledger) = engine();
        let id = engine.protect(b"burn-me", Classification::Low).await.unwrap();
        let before = engine.fragments(id).unwrap();

        engine.destroy(id).unwrap();
        assert_eq!(engine.status(id), Some(ProtectionStatus::Expired));
        let after = engine.fragments(id).unwrap();
        assert_ne!(before[0].bytes, after[0].bytes);

        let audit = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::NormalExpiration),
            ..Default::default()
        });
        assert_eq!(audit.len(), 1);
        assert!(audit[0].description.contains("destroyed early"));

        // Destroying again, or destroying an unknown id, is a no-op.
        engine.destroy(id).unwrap();
        engine.destroy(ProtectionId::new()).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn ttl_is_a_lower_bound() {
        let engine = Arc::new(
            FragmentationEngine::new(
                Arc::new(KeystreamCipher),
                Arc::new(OsSecureRandom),
                Arc::new(IncidentLedger::new()),
            )
            .with_policies(short_policies(Duration::from_millis(200))),
        );

        let id = engine.protect(b"short-lived", Classification::High).await.unwrap();

        // Strictly before TTL: nothing is due, verification passes.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.expire_due().is_empty());
        assert_eq!(engine.verify_integrity(id).unwrap(), VerifyOutcome::Secure);

        // At/after TTL: the sweep expires it and bytes are gone.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let expired = engine.expire_due();
        assert_eq!(expired, vec![id]);
        assert_eq!(engine.status(id), Some(ProtectionStatus::Expired));
        assert!(matches!(
            engine.verify_integrity(id),
            Err(ProtectionError::AlreadyExpired(_))
        ));
    }

    #[tokio::test]
    async fn late_expiry_past_tolerance_is_surfaced() {
        let ledger = Arc::new(IncidentLedger::new());
        let engine = Arc::new(
            FragmentationEngine::new(
                Arc::new(KeystreamCipher),
                Arc::new(OsSecureRandom),
                ledger.clone(),
            )
            .with_policies(short_policies(Duration::from_millis(10)))
            .with_late_tolerance(Duration::from_millis(50)),
        );

        let overdue = engine.protect(b"overdue", Classification::Medium).await.unwrap();
        let destroyed = engine.protect(b"destroyed-late", Classification::Medium).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        engine.expire(overdue).unwrap();
        // Operator destruction has no deadline, however late it happens.
        engine.destroy(destroyed).unwrap();

        let delays = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::SchedulerDelay),
            ..Default::default()
        });
        assert_eq!(delays.len(), 1);
        assert_eq!(delays[0].severity, Severity::Medium);
        assert!(delays[0].description.contains(&overdue.to_string()));

        // The late expiry is still a normal deletion: bytes gone, audit
        // record present.
        assert_eq!(engine.status(overdue), Some(ProtectionStatus::Expired));
        let expiries = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::NormalExpiration),
            ..Default::default()
        });
        assert_eq!(expiries.len(), 2);
    }

    #[tokio::test]
    async fn cipher_failure_creates_no_partial_state() {
        let ledger = Arc::new(IncidentLedger::new());
        let engine = FragmentationEngine::new(
            Arc::new(FailingCipher),
            Arc::new(OsSecureRandom),
            ledger.clone(),
        );

        let result = engine.protect(b"doomed", Classification::High).await;
        assert!(matches!(result, Err(ProtectionError::EncryptionFailure(_))));
        assert_eq!(engine.active_count(), 0);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn stalling_cipher_times_out_cleanly() {
        let ledger = Arc::new(IncidentLedger::new());
        let engine = FragmentationEngine::new(
            Arc::new(StallingCipher),
            Arc::new(OsSecureRandom),
            ledger,
        );

        let result = engine
            .protect_with_timeout(b"slow", Classification::Low, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ProtectionError::EncryptionFailure(_))));
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test]
    async fn distinct_protections_verify_concurrently() {
        let (engine, _ledger) = engine();
        let mut ids = Vec::new();
        for i in 0..8 {
            ids.push(
                engine
                    .protect(format!("payload-{i}").as_bytes(), Classification::Medium)
                    .await
                    .unwrap(),
            );
        }

        let mut handles = Vec::new();
        for id in ids {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.verify_integrity(id) }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), VerifyOutcome::Secure);
        }
    }

    #[tokio::test]
    async fn disabled_verification_config_builds_no_driver() {
        let (engine, _ledger) = engine();
        let mut config = crate::config::VerificationConfig::default();
        assert!(VerificationDriver::from_config(engine.clone(), &config).is_some());

        config.enabled = false;
        assert!(VerificationDriver::from_config(engine, &config).is_none());
    }

    #[tokio::test]
    async fn expiry_driver_sweeps_on_schedule() {
        let ledger = Arc::new(IncidentLedger::new());
        let engine = Arc::new(
            FragmentationEngine::new(
                Arc::new(KeystreamCipher),
                Arc::new(OsSecureRandom),
                ledger.clone(),
            )
            .with_policies(short_policies(Duration::from_millis(50))),
        );
        let id = engine.protect(b"sweep-me", Classification::Low).await.unwrap();

        let driver = Arc::new(ExpiryDriver::new(engine.clone(), Duration::from_millis(20)));
        let token = driver.shutdown_token();
        let handle = driver.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(engine.status(id), Some(ProtectionStatus::Expired));
    }
}
