// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decoy Manager Role
//!
//! Maintains a rotating set of decoy protections: plausible-looking
//! payloads protected at Low classification so probes against them burn
//! attacker time and surface in integrity verification. Rotation destroys
//! the previous generation through the engine's secure-deletion path and
//! protects a fresh one.

use crate::contract::{AgentError, HealthCounters, SpecializedAgent};
use async_trait::async_trait;
use defense_coordination_core::application::FragmentationEngine;
use defense_coordination_core::domain::{
    AgentId, AgentRole, Classification, Message, MessageType, Priority, ProtectionId,
};
use defense_coordination_core::infrastructure::SecureRandom;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct DecoyManagerAgent {
    id: AgentId,
    engine: Arc<FragmentationEngine>,
    random: Arc<dyn SecureRandom>,
    active_decoys: Mutex<Vec<ProtectionId>>,
    counters: HealthCounters,
}

impl DecoyManagerAgent {
    pub fn new(engine: Arc<FragmentationEngine>, random: Arc<dyn SecureRandom>) -> Self {
        Self {
            id: AgentId::new(),
            engine,
            random,
            active_decoys: Mutex::new(Vec::new()),
            counters: HealthCounters::new(),
        }
    }

    pub fn active_decoys(&self) -> Vec<ProtectionId> {
        self.active_decoys.lock().clone()
    }

    async fn rotate(&self, count: usize) -> Result<usize, AgentError> {
        let previous: Vec<ProtectionId> = std::mem::take(&mut *self.active_decoys.lock());
        for id in previous {
            if let Err(e) = self.engine.destroy(id) {
                warn!(protection_id = %id, error = %e, "failed to retire decoy");
            }
        }

        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            let mut bait = vec![0u8; 64];
            self.random.fill(&mut bait);
            let id = self
                .engine
                .protect(&bait, Classification::Low)
                .await
                .map_err(|e| AgentError::Handler(e.to_string()))?;
            fresh.push(id);
        }
        let deployed = fresh.len();
        *self.active_decoys.lock() = fresh;
        debug!(deployed, "decoy generation rotated");
        Ok(deployed)
    }
}

#[async_trait]
impl SpecializedAgent for DecoyManagerAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::DecoyManager
    }

    fn counters(&self) -> &HealthCounters {
        &self.counters
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        if message.message_type != MessageType::TaskAssignment
            || message.payload["action"] != "rotate-decoys"
        {
            return Ok(vec![]);
        }

        let count = message.payload["count"].as_u64().unwrap_or(3) as usize;
        let deployed = self.rotate(count).await?;

        Ok(vec![Message::broadcast(
            self.id,
            MessageType::StatusUpdate,
            serde_json::json!({
                "decoys_active": deployed,
            }),
            Priority::Low,
        )])
    }
}
