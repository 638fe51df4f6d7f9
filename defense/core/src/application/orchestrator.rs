// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Orchestrator
//!
//! Owns the agent roster and every lifecycle transition. Routes direct and
//! broadcast messages through the event bus, tracks per-agent health, and
//! removes agents that stop reporting. No agent ever mutates another
//! agent's record; all transitions go through here.
//!
//! In-flight state (protections, incidents) lives in the fragmentation
//! engine and the incident ledger, never in agent memory, so losing up to
//! `floor((n-1)/3)` agents loses no incidents and corrupts no protections.

use crate::domain::agent::{AgentId, AgentRecord, AgentRole, AgentStatus, HealthReport};
use crate::domain::incident::{IncidentType, ResourceRef};
use crate::domain::message::{Message, MessageType, Priority};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::ledger::{IncidentLedger, IncidentReport};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("duplicate agent identity: {0}")]
    DuplicateIdentity(AgentId),

    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),
}

/// Consecutive missed health reports before the orchestrator degrades,
/// then removes, an agent.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub missed_for_degraded: u32,
    pub missed_for_removed: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            missed_for_degraded: 3,
            missed_for_removed: 5,
        }
    }
}

pub struct AgentOrchestrator {
    /// Identity used as the sender of orchestrator broadcasts.
    id: AgentId,
    bus: EventBus,
    ledger: Arc<IncidentLedger>,
    roster: DashMap<AgentId, AgentRecord>,
    health_policy: HealthPolicy,
}

impl AgentOrchestrator {
    pub fn new(bus: EventBus, ledger: Arc<IncidentLedger>, health_policy: HealthPolicy) -> Self {
        Self {
            id: AgentId::new(),
            bus,
            ledger,
            roster: DashMap::new(),
            health_policy,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register an agent under a fixed role. Fails on identity reuse; a
    /// capability change requires revocation and a new identity.
    pub fn register(&self, id: AgentId, role: AgentRole) -> Result<(), OrchestratorError> {
        match self.roster.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(OrchestratorError::DuplicateIdentity(id))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(AgentRecord::new(id, role));
                metrics::counter!("defense_agents_registered_total").increment(1);
                info!(agent_id = %id, %role, "agent registered");
                Ok(())
            }
        }
    }

    /// Route a message. Direct messages to unknown or removed recipients
    /// fail silently: a structured warn plus a DeliveryMiss record, never
    /// an error back to the sender.
    pub fn route_message(&self, message: Message) {
        if let Some(mut sender) = self.roster.get_mut(&message.sender) {
            sender.health.last_activity = chrono::Utc::now();
        }

        match message.recipient {
            Some(recipient) => {
                let deliverable = self
                    .roster
                    .get(&recipient)
                    .map(|record| record.deliverable())
                    .unwrap_or(false);
                if deliverable {
                    self.bus.publish(message);
                } else {
                    warn!(
                        recipient = %recipient,
                        message_id = %message.id.0,
                        "delivery miss: recipient unknown or removed"
                    );
                    self.ledger.report(
                        IncidentReport::new(
                            IncidentType::DeliveryMiss,
                            format!("message {} addressed to unknown or removed agent {recipient}", message.id.0),
                        )
                        .on_resource(ResourceRef::new(recipient.to_string()).with_kind("agent")),
                    );
                }
            }
            None => {
                self.bus.publish(message);
            }
        }
    }

    /// Merge an agent's self-reported counters and clear its missed-report
    /// count. A degraded agent that reports again becomes active.
    pub fn report_health(&self, id: AgentId, report: HealthReport) -> Result<(), OrchestratorError> {
        let mut record = self
            .roster
            .get_mut(&id)
            .ok_or(OrchestratorError::UnknownAgent(id))?;
        if record.status == AgentStatus::Removed {
            return Err(OrchestratorError::UnknownAgent(id));
        }
        record.health.merge_report(&report);
        if record.status == AgentStatus::Degraded {
            record.reactivate();
            info!(agent_id = %id, "agent reactivated after health report");
        }
        debug!(agent_id = %id, processed = report.messages_processed, "health report merged");
        Ok(())
    }

    /// One health-monitor tick: bump every live agent's missed-report
    /// counter and apply Active → Degraded → Removed transitions. Returns
    /// the agents removed this tick.
    pub fn run_health_sweep(&self) -> Vec<AgentId> {
        let mut removed = Vec::new();
        let mut degraded = Vec::new();

        for mut entry in self.roster.iter_mut() {
            if entry.status == AgentStatus::Removed {
                continue;
            }
            entry.health.missed_reports += 1;
            let missed = entry.health.missed_reports;
            match entry.status {
                AgentStatus::Active if missed >= self.health_policy.missed_for_degraded => {
                    entry.degrade();
                    degraded.push(*entry.key());
                }
                AgentStatus::Degraded if missed >= self.health_policy.missed_for_removed => {
                    entry.remove();
                    removed.push(*entry.key());
                }
                _ => {}
            }
        }

        for id in &degraded {
            warn!(agent_id = %id, "agent degraded: missed health reports");
            self.broadcast_status(*id, AgentStatus::Degraded);
        }
        for id in &removed {
            warn!(agent_id = %id, "agent removed: health-check failure");
            metrics::counter!("defense_agents_removed_total").increment(1);
            self.broadcast_status(*id, AgentStatus::Removed);
            self.ledger.report(
                IncidentReport::new(
                    IncidentType::AgentFailure,
                    format!("agent {id} removed after consecutive missed health reports"),
                )
                .on_resource(ResourceRef::new(id.to_string()).with_kind("agent")),
            );
        }
        removed
    }

    /// Explicit revocation. Same removal path and status broadcast as a
    /// health-check failure.
    pub fn revoke(&self, id: AgentId) -> Result<(), OrchestratorError> {
        {
            let mut record = self
                .roster
                .get_mut(&id)
                .ok_or(OrchestratorError::UnknownAgent(id))?;
            if record.status == AgentStatus::Removed {
                return Ok(());
            }
            record.remove();
        }
        info!(agent_id = %id, "agent revoked");
        metrics::counter!("defense_agents_removed_total").increment(1);
        self.broadcast_status(id, AgentStatus::Removed);
        Ok(())
    }

    fn broadcast_status(&self, subject: AgentId, status: AgentStatus) {
        // Peers compensate for removed agents off this broadcast.
        self.bus.publish(Message::broadcast(
            self.id,
            MessageType::StatusUpdate,
            serde_json::json!({
                "agent_id": subject,
                "status": status,
            }),
            Priority::High,
        ));
    }

    pub fn agent(&self, id: AgentId) -> Option<AgentRecord> {
        self.roster.get(&id).map(|record| record.clone())
    }

    pub fn active_agents(&self) -> Vec<AgentId> {
        self.roster
            .iter()
            .filter(|entry| entry.status == AgentStatus::Active)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn agents_with_role(&self, role: AgentRole) -> Vec<AgentId> {
        self.roster
            .iter()
            .filter(|entry| entry.role == role && entry.status == AgentStatus::Active)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn registered_count(&self) -> usize {
        self.roster.len()
    }

    /// Number of simultaneous agent losses the system tolerates:
    /// `floor((n-1)/3)` of the registered population.
    pub fn fault_tolerance_budget(&self) -> usize {
        let n = self.roster.len();
        if n == 0 {
            0
        } else {
            (n - 1) / 3
        }
    }
}

/// Periodic driver for [`AgentOrchestrator::run_health_sweep`].
pub struct HealthMonitor {
    orchestrator: Arc<AgentOrchestrator>,
    period: Duration,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl HealthMonitor {
    pub fn new(orchestrator: Arc<AgentOrchestrator>, period: Duration) -> Self {
        Self {
            orchestrator,
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
        info!(period = ?self.period, "starting health monitor");
        let mut tick = interval(self.period);
        // The first tick of tokio's interval fires immediately; skip it so
        // agents get one full period before misses are counted.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let removed = self.orchestrator.run_health_sweep();
                    if !removed.is_empty() {
                        warn!(count = removed.len(), "health sweep removed agents");
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received, stopping health monitor");
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
    use crate::infrastructure::ledger::IncidentFilter;

    fn orchestrator() -> (Arc<AgentOrchestrator>, Arc<IncidentLedger>) {
        let ledger = Arc::new(IncidentLedger::new());
        let orchestrator = Arc::new(AgentOrchestrator::new(
            EventBus::new(64),
            ledger.clone(),
            HealthPolicy::default(),
        ));
        (orchestrator, ledger)
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected() {
        let (orchestrator, _) = orchestrator();
        let id = AgentId::new();
        orchestrator.register(id, AgentRole::Monitor).unwrap();
        assert!(matches!(
            orchestrator.register(id, AgentRole::Enforcer),
            Err(OrchestratorError::DuplicateIdentity(_))
        ));
        // Role is fixed at registration.
        assert_eq!(orchestrator.agent(id).unwrap().role, AgentRole::Monitor);
    }

    #[tokio::test]
    async fn direct_route_to_known_agent_is_delivered() {
        let (orchestrator, _) = orchestrator();
        let sender = AgentId::new();
        let recipient = AgentId::new();
        orchestrator.register(sender, AgentRole::Monitor).unwrap();
        orchestrator.register(recipient, AgentRole::Investigator).unwrap();
        let mut rx = orchestrator.bus().subscribe(recipient);

        orchestrator.route_message(Message::direct(
            sender,
            recipient,
            MessageType::ThreatAlert,
            serde_json::json!({"threat": "probe"}),
            Priority::High,
        ));

        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn delivery_miss_is_logged_not_fatal() {
        let (orchestrator, ledger) = orchestrator();
        let sender = AgentId::new();
        orchestrator.register(sender, AgentRole::Monitor).unwrap();

        orchestrator.route_message(Message::direct(
            sender,
            AgentId::new(),
            MessageType::Coordination,
            serde_json::json!({}),
            Priority::Normal,
        ));

        let misses = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::DeliveryMiss),
            ..Default::default()
        });
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn missed_reports_degrade_then_remove() {
        let (orchestrator, ledger) = orchestrator();
        let healthy = AgentId::new();
        let silent = AgentId::new();
        orchestrator.register(healthy, AgentRole::Monitor).unwrap();
        orchestrator.register(silent, AgentRole::Investigator).unwrap();

        let observer = AgentId::new();
        orchestrator.register(observer, AgentRole::Coordinator).unwrap();
        let mut observer_rx = orchestrator.bus().subscribe(observer);

        for tick in 0..5 {
            // Only the healthy agent keeps reporting.
            orchestrator
                .report_health(
                    healthy,
                    HealthReport {
                        messages_processed: tick,
                        mean_response_ms: 1.0,
                    },
                )
                .unwrap();
            let _ = orchestrator
                .report_health(
                    observer,
                    HealthReport {
                        messages_processed: 0,
                        mean_response_ms: 0.0,
                    },
                )
                .unwrap();
            orchestrator.run_health_sweep();
        }

        assert_eq!(orchestrator.agent(healthy).unwrap().status, AgentStatus::Active);
        assert_eq!(orchestrator.agent(silent).unwrap().status, AgentStatus::Removed);

        // Peers saw StatusUpdate broadcasts about the silent agent.
        let mut saw_removed = false;
        while let Ok(msg) = observer_rx.try_recv() {
            if msg.message_type == MessageType::StatusUpdate
                && msg.payload["agent_id"] == serde_json::json!(silent)
                && msg.payload["status"] == serde_json::json!(AgentStatus::Removed)
            {
                saw_removed = true;
            }
        }
        assert!(saw_removed);

        let failures = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::AgentFailure),
            ..Default::default()
        });
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn degraded_agent_reactivates_on_report() {
        let (orchestrator, _) = orchestrator();
        let id = AgentId::new();
        orchestrator.register(id, AgentRole::Enforcer).unwrap();

        for _ in 0..3 {
            orchestrator.run_health_sweep();
        }
        assert_eq!(orchestrator.agent(id).unwrap().status, AgentStatus::Degraded);

        orchestrator
            .report_health(
                id,
                HealthReport {
                    messages_processed: 1,
                    mean_response_ms: 2.0,
                },
            )
            .unwrap();
        assert_eq!(orchestrator.agent(id).unwrap().status, AgentStatus::Active);
    }

    #[tokio::test]
    async fn revoked_agent_stops_receiving_traffic() {
        let (orchestrator, ledger) = orchestrator();
        let sender = AgentId::new();
        let target = AgentId::new();
        orchestrator.register(sender, AgentRole::Monitor).unwrap();
        orchestrator.register(target, AgentRole::DecoyManager).unwrap();

        orchestrator.revoke(target).unwrap();
        assert_eq!(orchestrator.agent(target).unwrap().status, AgentStatus::Removed);
        // Idempotent revocation.
        orchestrator.revoke(target).unwrap();
        assert!(orchestrator.revoke(AgentId::new()).is_err());

        orchestrator.route_message(Message::direct(
            sender,
            target,
            MessageType::TaskAssignment,
            serde_json::json!({}),
            Priority::Normal,
        ));
        assert_eq!(
            ledger
                .query(&IncidentFilter {
                    incident_type: Some(IncidentType::DeliveryMiss),
                    ..Default::default()
                })
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn health_monitor_sweeps_on_schedule() {
        let (orchestrator, ledger) = orchestrator();
        let silent = AgentId::new();
        orchestrator.register(silent, AgentRole::Monitor).unwrap();

        let monitor = Arc::new(HealthMonitor::new(
            orchestrator.clone(),
            Duration::from_millis(10),
        ));
        let token = monitor.shutdown_token();
        let handle = monitor.start();

        // Enough periods for Active -> Degraded -> Removed with defaults.
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(orchestrator.agent(silent).unwrap().status, AgentStatus::Removed);
        let failures = ledger.query(&IncidentFilter {
            incident_type: Some(IncidentType::AgentFailure),
            ..Default::default()
        });
        assert_eq!(failures.len(), 1);
    }

    #[tokio::test]
    async fn fault_tolerance_budget_is_floor_n_minus_one_over_three() {
        let (orchestrator, _) = orchestrator();
        assert_eq!(orchestrator.fault_tolerance_budget(), 0);
        for _ in 0..10 {
            orchestrator.register(AgentId::new(), AgentRole::Monitor).unwrap();
        }
        assert_eq!(orchestrator.registered_count(), 10);
        assert_eq!(orchestrator.fault_tolerance_budget(), 3);
    }
}
