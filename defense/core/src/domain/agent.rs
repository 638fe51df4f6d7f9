// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Fixed role set. A role is immutable after registration; changing an
/// agent's capability requires revocation and re-registration under a new
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    Monitor,
    Investigator,
    Enforcer,
    DecoyManager,
    Coordinator,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentRole::Monitor => "monitor",
            AgentRole::Investigator => "investigator",
            AgentRole::Enforcer => "enforcer",
            AgentRole::DecoyManager => "decoy-manager",
            AgentRole::Coordinator => "coordinator",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Active,
    Degraded,
    Removed,
}

/// Mutable health and performance counters for a registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub messages_processed: u64,
    /// Running mean of handler latency in milliseconds.
    pub mean_response_ms: f64,
    pub last_activity: DateTime<Utc>,
    /// Consecutive health-monitor ticks without a report from the agent.
    pub missed_reports: u32,
}

impl AgentHealth {
    pub fn new() -> Self {
        Self {
            messages_processed: 0,
            mean_response_ms: 0.0,
            last_activity: Utc::now(),
            missed_reports: 0,
        }
    }

    /// Fold one handled message into the running counters.
    pub fn record_message(&mut self, latency_ms: f64) {
        self.messages_processed += 1;
        let n = self.messages_processed as f64;
        self.mean_response_ms += (latency_ms - self.mean_response_ms) / n;
        self.last_activity = Utc::now();
    }

    /// Merge a self-reported snapshot from the agent's run loop.
    pub fn merge_report(&mut self, report: &HealthReport) {
        self.messages_processed = self.messages_processed.max(report.messages_processed);
        if report.messages_processed > 0 {
            self.mean_response_ms = report.mean_response_ms;
        }
        self.last_activity = Utc::now();
        self.missed_reports = 0;
    }
}

impl Default for AgentHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot an agent sends with `report_health`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub messages_processed: u64,
    pub mean_response_ms: f64,
}

/// Orchestrator-owned record of a registered agent.
///
/// Lifecycle transitions (`degrade`, `remove`, `reactivate`) are only ever
/// invoked by the orchestrator; no agent mutates another agent's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub role: AgentRole,
    pub status: AgentStatus,
    pub health: AgentHealth,
    pub registered_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn new(id: AgentId, role: AgentRole) -> Self {
        Self {
            id,
            role,
            status: AgentStatus::Active,
            health: AgentHealth::new(),
            registered_at: Utc::now(),
        }
    }

    pub fn degrade(&mut self) {
        if self.status == AgentStatus::Active {
            self.status = AgentStatus::Degraded;
        }
    }

    pub fn remove(&mut self) {
        self.status = AgentStatus::Removed;
    }

    /// A fresh health report brings a degraded agent back to active.
    pub fn reactivate(&mut self) {
        if self.status == AgentStatus::Degraded {
            self.status = AgentStatus::Active;
        }
    }

    /// Removed agents never receive traffic; Degraded agents still do.
    pub fn deliverable(&self) -> bool {
        self.status != AgentStatus::Removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_message_updates_running_mean() {
        let mut health = AgentHealth::new();
        health.record_message(10.0);
        health.record_message(20.0);
        assert_eq!(health.messages_processed, 2);
        assert!((health.mean_response_ms - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lifecycle_transitions_are_one_directional_for_removed() {
        let mut record = AgentRecord::new(AgentId::new(), AgentRole::Monitor);
        assert_eq!(record.status, AgentStatus::Active);
        record.degrade();
        assert_eq!(record.status, AgentStatus::Degraded);
        record.reactivate();
        assert_eq!(record.status, AgentStatus::Active);
        record.remove();
        record.reactivate();
        assert_eq!(record.status, AgentStatus::Removed);
        assert!(!record.deliverable());
    }
}
