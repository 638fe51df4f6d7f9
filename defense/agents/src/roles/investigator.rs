// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Investigator Role
//!
//! Consumes `ThreatAlert`s, correlates them against the incident ledger's
//! history for the named resource, and answers with an `Intelligence`
//! summary. Replies directly to the alert's sender when a response is
//! required; otherwise shares findings as a broadcast.

use crate::contract::{AgentError, HealthCounters, SpecializedAgent};
use async_trait::async_trait;
use defense_coordination_core::domain::incident::Severity;
use defense_coordination_core::domain::{AgentId, AgentRole, Message, MessageType, Priority};
use defense_coordination_core::infrastructure::{IncidentFilter, IncidentLedger};
use std::sync::Arc;

pub struct InvestigatorAgent {
    id: AgentId,
    ledger: Arc<IncidentLedger>,
    counters: HealthCounters,
}

impl InvestigatorAgent {
    pub fn new(ledger: Arc<IncidentLedger>) -> Self {
        Self {
            id: AgentId::new(),
            ledger,
            counters: HealthCounters::new(),
        }
    }
}

#[async_trait]
impl SpecializedAgent for InvestigatorAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Investigator
    }

    fn counters(&self) -> &HealthCounters {
        &self.counters
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        if message.message_type != MessageType::ThreatAlert {
            return Ok(vec![]);
        }

        let resource_id = message.payload["resource"]
            .as_str()
            .ok_or_else(|| AgentError::MalformedPayload("threat alert without resource".into()))?
            .to_string();

        let history = self.ledger.query(&IncidentFilter {
            resource_id: Some(resource_id.clone()),
            ..Default::default()
        });
        let high_or_worse = history
            .iter()
            .filter(|incident| incident.severity >= Severity::High)
            .count();
        let assessment = if high_or_worse > 1 {
            "repeat-offender"
        } else if history.is_empty() {
            "first-contact"
        } else {
            "known-resource"
        };

        let findings = serde_json::json!({
            "resource": resource_id,
            "prior_incidents": history.len(),
            "high_or_worse": high_or_worse,
            "assessment": assessment,
        });

        let reply = if message.response_required {
            Message::direct(
                self.id,
                message.sender,
                MessageType::Intelligence,
                findings,
                Priority::High,
            )
        } else {
            Message::broadcast(self.id, MessageType::Intelligence, findings, Priority::Normal)
        };
        Ok(vec![reply])
    }
}
