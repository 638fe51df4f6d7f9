// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordinator Role
//!
//! Watches the mesh's `StatusUpdate` traffic and hands out follow-up work
//! as `TaskAssignment` messages. When the orchestrator announces a removed
//! agent, the coordinator asks a surviving peer with the same role to
//! compensate; on fresh `ThreatAlert`s it assigns an investigator.

use crate::contract::{AgentError, HealthCounters, SpecializedAgent};
use async_trait::async_trait;
use defense_coordination_core::application::AgentOrchestrator;
use defense_coordination_core::domain::agent::AgentStatus;
use defense_coordination_core::domain::{AgentId, AgentRole, Message, MessageType, Priority};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CoordinatorAgent {
    id: AgentId,
    orchestrator: Arc<AgentOrchestrator>,
    counters: HealthCounters,
}

impl CoordinatorAgent {
    pub fn new(orchestrator: Arc<AgentOrchestrator>) -> Self {
        Self {
            id: AgentId::new(),
            orchestrator,
            counters: HealthCounters::new(),
        }
    }

    fn compensate_for_removal(&self, message: &Message) -> Vec<Message> {
        let Ok(status) =
            serde_json::from_value::<AgentStatus>(message.payload["status"].clone())
        else {
            return vec![];
        };
        if status != AgentStatus::Removed {
            return vec![];
        }
        let Some(lost_id) = message.payload["agent_id"]
            .as_str()
            .and_then(|s| AgentId::from_string(s).ok())
        else {
            return vec![];
        };

        // Prefer a survivor sharing the lost agent's role.
        let role = self
            .orchestrator
            .agent(lost_id)
            .map(|record| record.role);
        let successor = role
            .map(|role| self.orchestrator.agents_with_role(role))
            .unwrap_or_default()
            .into_iter()
            .find(|candidate| *candidate != self.id)
            .or_else(|| {
                self.orchestrator
                    .active_agents()
                    .into_iter()
                    .find(|candidate| *candidate != self.id)
            });

        let Some(successor) = successor else {
            debug!(lost = %lost_id, "no surviving agent available to compensate");
            return vec![];
        };
        info!(lost = %lost_id, successor = %successor, "assigning compensation task");
        vec![Message::direct(
            self.id,
            successor,
            MessageType::TaskAssignment,
            serde_json::json!({
                "action": "compensate",
                "lost_agent": lost_id,
            }),
            Priority::High,
        )]
    }

    fn assign_investigation(&self, message: &Message) -> Vec<Message> {
        let Some(investigator) = self
            .orchestrator
            .agents_with_role(AgentRole::Investigator)
            .into_iter()
            .next()
        else {
            return vec![];
        };
        vec![Message::direct(
            self.id,
            investigator,
            MessageType::TaskAssignment,
            serde_json::json!({
                "action": "investigate",
                "alert": message.payload,
            }),
            Priority::High,
        )]
    }
}

#[async_trait]
impl SpecializedAgent for CoordinatorAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        AgentRole::Coordinator
    }

    fn counters(&self) -> &HealthCounters {
        &self.counters
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError> {
        let replies = match message.message_type {
            MessageType::StatusUpdate => self.compensate_for_removal(message),
            MessageType::ThreatAlert => self.assign_investigation(message),
            _ => vec![],
        };
        Ok(replies)
    }
}
