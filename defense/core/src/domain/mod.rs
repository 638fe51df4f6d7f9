// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod incident;
pub mod message;
pub mod protection;

pub use agent::{AgentHealth, AgentId, AgentRecord, AgentRole, AgentStatus, HealthReport};
pub use incident::{Incident, IncidentId, IncidentType, ResourceRef, Severity};
pub use message::{Message, MessageId, MessageType, Priority};
pub use protection::{
    Classification, ClassificationPolicy, Fragment, Protection, ProtectionId, ProtectionStatus,
};
