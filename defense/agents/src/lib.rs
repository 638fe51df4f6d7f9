// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Defense Coordination Agents
//!
//! Specialized agent roles for the 100monkeys.ai defense mesh, built on
//! the common [`contract::SpecializedAgent`] capability: Monitor,
//! Investigator, Enforcer, DecoyManager, and Coordinator. Roles are
//! selected at construction; agents share no mutable state and talk only
//! through the coordination core's event bus and services.

pub mod contract;
pub mod roles;

pub use contract::{
    run_agent, spawn_agent, AgentContext, AgentError, HealthCounters, SpecializedAgent,
};
pub use roles::{
    AccessGate, CoordinatorAgent, DecoyManagerAgent, EnforcerAgent, GateDecision,
    InvestigatorAgent, MonitorAgent, StaticGate,
};
