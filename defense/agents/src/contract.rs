// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Common Agent Contract
//!
//! Every specialized agent implements [`SpecializedAgent`]: a fixed role,
//! a message handler, and a health snapshot. Role selection happens at
//! construction; there is no inheritance hierarchy. Agents communicate
//! only through the bus and the shared services in [`AgentContext`] —
//! never through each other's state.
//!
//! [`run_agent`] is the shared run loop: it consumes the agent's bus
//! subscription, times each handled message, routes replies through the
//! orchestrator, and pushes periodic health reports. Handler failures are
//! logged and contained; a single agent's failure never escalates beyond
//! its own loop. [`spawn_agent`] subscribes before spawning, so an agent
//! that is routable is already receiving.

use async_trait::async_trait;
use defense_coordination_core::application::{AgentOrchestrator, FragmentationEngine};
use defense_coordination_core::domain::{AgentId, AgentRole, HealthReport, Message};
use defense_coordination_core::infrastructure::{
    AgentReceiver, EventBus, EventBusError, IncidentLedger,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("handler failure: {0}")]
    Handler(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Shared services handed to every agent at construction. Agents hold no
/// in-flight state of their own: protections live in the engine and
/// incidents in the ledger, so an agent loss loses nothing.
#[derive(Clone)]
pub struct AgentContext {
    pub bus: EventBus,
    pub engine: Arc<FragmentationEngine>,
    pub ledger: Arc<IncidentLedger>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub health_interval: Duration,
}

impl AgentContext {
    pub fn new(
        engine: Arc<FragmentationEngine>,
        ledger: Arc<IncidentLedger>,
        orchestrator: Arc<AgentOrchestrator>,
        health_interval: Duration,
    ) -> Self {
        Self {
            bus: orchestrator.bus().clone(),
            engine,
            ledger,
            orchestrator,
            health_interval,
        }
    }
}

/// Lock-free health counters shared between an agent and its run loop.
#[derive(Debug, Default)]
pub struct HealthCounters {
    messages_processed: AtomicU64,
    latency_total_micros: AtomicU64,
}

impl HealthCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.latency_total_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthReport {
        let processed = self.messages_processed.load(Ordering::Relaxed);
        let total_micros = self.latency_total_micros.load(Ordering::Relaxed);
        let mean_response_ms = if processed == 0 {
            0.0
        } else {
            total_micros as f64 / processed as f64 / 1000.0
        };
        HealthReport {
            messages_processed: processed,
            mean_response_ms,
        }
    }
}

/// The capability every role implements. `handle` returns the messages to
/// route in response; an empty vec means no reply.
#[async_trait]
pub trait SpecializedAgent: Send + Sync {
    fn id(&self) -> AgentId;
    fn role(&self) -> AgentRole;
    fn counters(&self) -> &HealthCounters;

    async fn handle(&self, message: &Message) -> Result<Vec<Message>, AgentError>;

    fn health_snapshot(&self) -> HealthReport {
        self.counters().snapshot()
    }
}

/// Subscribe the agent to the bus and spawn its run loop.
///
/// The subscription is created before the task is spawned, so a message
/// routed immediately after this returns is already buffered for the
/// agent rather than dropped by a receiverless bus.
pub fn spawn_agent(
    ctx: AgentContext,
    agent: Arc<dyn SpecializedAgent>,
    shutdown_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let receiver = ctx.bus.subscribe(agent.id());
    tokio::spawn(run_agent(ctx, agent, receiver, shutdown_token))
}

/// Drive one agent until cancellation or bus closure.
///
/// The agent must already be registered with the orchestrator, and
/// `receiver` must be its own subscription; this loop only consumes,
/// handles, and reports. Prefer [`spawn_agent`], which pairs the
/// subscription with the spawn.
pub async fn run_agent(
    ctx: AgentContext,
    agent: Arc<dyn SpecializedAgent>,
    mut receiver: AgentReceiver,
    shutdown_token: CancellationToken,
) {
    let agent_id = agent.id();
    let mut health_tick = interval(ctx.health_interval);
    info!(agent_id = %agent_id, role = %agent.role(), "agent loop started");

    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                info!(agent_id = %agent_id, "shutdown signal received, stopping agent loop");
                break;
            }
            _ = health_tick.tick() => {
                if let Err(e) = ctx.orchestrator.report_health(agent_id, agent.health_snapshot()) {
                    // Removed from the roster: stop consuming.
                    warn!(agent_id = %agent_id, error = %e, "health report rejected; stopping");
                    break;
                }
            }
            received = receiver.recv() => {
                match received {
                    Ok(message) => {
                        let started = std::time::Instant::now();
                        match agent.handle(&message).await {
                            Ok(replies) => {
                                for reply in replies {
                                    ctx.orchestrator.route_message(reply);
                                }
                            }
                            Err(e) => {
                                // Contained: one bad message never kills the agent.
                                warn!(
                                    agent_id = %agent_id,
                                    message_id = %message.id.0,
                                    error = %e,
                                    "handler failed on message"
                                );
                            }
                        }
                        agent.counters().record(started.elapsed());
                        debug!(agent_id = %agent_id, message_id = %message.id.0, "message handled");
                    }
                    Err(EventBusError::Lagged(n)) => {
                        warn!(agent_id = %agent_id, lagged = n, "agent lagged behind the bus");
                    }
                    Err(EventBusError::Closed) => {
                        warn!(agent_id = %agent_id, "event bus closed; stopping agent loop");
                        break;
                    }
                    Err(EventBusError::Empty) => {}
                }
            }
        }
    }
}
