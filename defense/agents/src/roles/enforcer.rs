// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Enforcer Role
//!
//! Gates access to protected plaintext behind a pluggable
//! behavioral/authentication collaborator and triggers early destruction
//! of protections named in confirmed-compromise alerts. The gate's
//! algorithm is external; the enforcer only consumes its boolean verdict
//! and confidence.

use crate::contract::{AgentError, HealthCounters, SpecializedAgent};
use async_trait::async_trait;
use defense_coordination_core::application::FragmentationEngine;
use defense_coordination_core::domain::incident::{IncidentType, ResourceRef};
use defense_coordination_core::domain::{
    AgentId, AgentRole, Message, MessageType, Priority, ProtectionId,
};
use defense_coordination_core::infrastructure::{IncidentLedger, IncidentReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Verdict from the external behavioral/authentication gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    pub allowed: bool,
    pub confidence: f64,
}

/// Pluggable access gate consulted before plaintext access is approved.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn evaluate(&self, subject: &str) -> GateDecision;
}

/// Fixed-verdict gate for deployments without behavioral auth, and for
/// tests.
pub struct StaticGate {
    pub decision: GateDecision,
}

#[async_trait]
impl AccessGate for StaticGate {
    async fn evaluate(&self, _subject: &str) -> GateDecision {
        self.decision
    }
}

pub struct EnforcerAgent {
    id: AgentId,
    engine: Arc<FragmentationEngine>,
    ledger: Arc<IncidentLedger>,
    gate: Arc<dyn AccessGate>,
    min_confidence: f64,
    counters: HealthCounters,
}

impl EnforcerAgent {
    pub fn new(
        engine: Arc<FragmentationEngine>,
        ledger: Arc<IncidentLedger>,
        gate: Arc<dyn AccessGate>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            engine,
            ledger,
            gate,
            min_confidence: 0.75,
            counters: HealthCounters::new(),
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    async fn handle_access_request(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        let subject = message.payload["subject"]
            .as_str()
            .ok_or_else(|| AgentError::MalformedPayload("access request without subject".into()))?;
        let protection = message.payload["protection_id"].as_str().unwrap_or("");

        let decision = self.gate.evaluate(subject).await;
        let granted = decision.allowed && decision.confidence >= self.min_confidence;
        if !granted {
            warn!(subject, confidence = decision.confidence, "access denied by gate");
            self.ledger.report(
                IncidentReport::new(
                    IncidentType::UnauthorizedAccess,
                    format!("gate denied plaintext access for subject {subject}"),
                )
                .on_resource(ResourceRef::new(protection.to_string()).with_kind("protection"))
                .with_attachment(serde_json::json!({
                    "subject": subject,
                    "confidence": decision.confidence,
                })),
            );
        }

        Ok(vec![Message::direct(
            self.id,
            message.sender,
            MessageType::Coordination,
            serde_json::json!({
                "subject": subject,
                "granted": granted,
                "confidence": decision.confidence,
            }),
            Priority::High,
        )])
    }

    fn handle_confirmed_compromise(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        let raw_id = message.payload["protection_id"]
            .as_str()
            .ok_or_else(|| AgentError::MalformedPayload("alert without protection_id".into()))?;
        let protection_id = ProtectionId::from_string(raw_id)
            .map_err(|e| AgentError::MalformedPayload(format!("bad protection id: {e}")))?;

        // Early destruction routes through the engine's secure-deletion
        // path; idempotent if another enforcer got there first.
        self.engine
            .destroy(protection_id)
            .map_err(|e| AgentError::Handler(e.to_string()))?;
        info!(protection_id = %protection_id, "confirmed compromise: protection destroyed");

        Ok(vec![Message::broadcast(
            self.id,
            MessageType::StatusUpdate,
            serde_json::json!({
                "action": "protection-destroyed",
                "protection_id": protection_id,
            }),
            Priority::High,
        )])
    }
}

#[async_trait]
impl SpecializedAgent for EnforcerAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Enforcer
    }

    fn counters(&self) -> &HealthCounters {
        &self.counters
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        match message.message_type {
            MessageType::Coordination if message.payload["access_request"].as_bool() == Some(true) => {
                self.handle_access_request(message).await
            }
            MessageType::ThreatAlert if message.payload["confirmed"].as_bool() == Some(true) => {
                self.handle_confirmed_compromise(message)
            }
            _ => Ok(vec![]),
        }
    }
}
