// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Bus Message Vocabulary
//!
//! Immutable value objects carried by the event bus. A [`Message`] is fixed
//! at construction; the bus and orchestrator only read and forward it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ThreatAlert,
    Intelligence,
    Coordination,
    StatusUpdate,
    TaskAssignment,
}

/// Scheduling hint under load. Does not affect delivery guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Immutable bus message. `recipient = None` means broadcast to every
/// registered agent except the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub response_required: bool,
}

impl Message {
    pub fn direct(
        sender: AgentId,
        recipient: AgentId,
        message_type: MessageType,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            recipient: Some(recipient),
            message_type,
            payload,
            priority,
            timestamp: Utc::now(),
            response_required: false,
        }
    }

    pub fn broadcast(
        sender: AgentId,
        message_type: MessageType,
        payload: serde_json::Value,
        priority: Priority,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            recipient: None,
            message_type,
            payload,
            priority,
            timestamp: Utc::now(),
            response_required: false,
        }
    }

    /// Same message value, with the response-required flag raised. Consumes
    /// and re-creates rather than mutating in place.
    pub fn expecting_response(mut self) -> Self {
        self.response_required = true;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}
