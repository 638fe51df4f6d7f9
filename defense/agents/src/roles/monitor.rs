// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Role
//!
//! Watches telemetry carried in `StatusUpdate` and `Intelligence`
//! messages. Signals marked unauthorized become `UnauthorizedAccess`
//! incident reports plus a `ThreatAlert` broadcast for the rest of the
//! mesh.

use crate::contract::{AgentError, HealthCounters, SpecializedAgent};
use async_trait::async_trait;
use defense_coordination_core::domain::incident::{IncidentType, ResourceRef};
use defense_coordination_core::domain::{AgentId, AgentRole, Message, MessageType, Priority};
use defense_coordination_core::infrastructure::{IncidentLedger, IncidentReport};
use std::sync::Arc;
use tracing::debug;

pub struct MonitorAgent {
    id: AgentId,
    ledger: Arc<IncidentLedger>,
    counters: HealthCounters,
}

impl MonitorAgent {
    pub fn new(ledger: Arc<IncidentLedger>) -> Self {
        Self {
            id: AgentId::new(),
            ledger,
            counters: HealthCounters::new(),
        }
    }
}

#[async_trait]
impl SpecializedAgent for MonitorAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Monitor
    }

    fn counters(&self) -> &HealthCounters {
        &self.counters
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        if !matches!(
            message.message_type,
            MessageType::StatusUpdate | MessageType::Intelligence
        ) {
            return Ok(vec![]);
        }

        let unauthorized = message.payload["unauthorized"].as_bool().unwrap_or(false);
        if !unauthorized {
            debug!(message_id = %message.id.0, "telemetry clean");
            return Ok(vec![]);
        }

        let resource_id = message.payload["resource"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let critical = message.payload["critical"].as_bool().unwrap_or(false);
        let resource = if critical {
            ResourceRef::critical(resource_id.clone())
        } else {
            ResourceRef::new(resource_id.clone())
        };

        self.ledger.report(
            IncidentReport::new(
                IncidentType::UnauthorizedAccess,
                format!("monitor observed unauthorized access on {resource_id}"),
            )
            .on_resource(resource)
            .with_attachment(message.payload.clone()),
        );

        Ok(vec![Message::broadcast(
            self.id,
            MessageType::ThreatAlert,
            serde_json::json!({
                "resource": resource_id,
                "critical": critical,
                "origin": message.sender,
            }),
            Priority::Urgent,
        )])
    }
}
