// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Defense Coordination Core
//!
//! Coordination layer for the 100monkeys.ai defense mesh: a typed,
//! prioritized event bus; an append-only incident ledger with severity
//! classification and notification fan-out; a temporal fragmentation
//! engine with guaranteed secure deletion; and an agent orchestrator that
//! owns agent lifecycle and routing.
//!
//! # Architecture
//!
//! - **domain** — value objects and rule tables (agents, messages,
//!   incidents, protections).
//! - **application** — services: [`application::FragmentationEngine`],
//!   [`application::AgentOrchestrator`], and their periodic drivers.
//! - **infrastructure** — the event bus, the incident ledger, and the
//!   cryptographic collaborator traits.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
