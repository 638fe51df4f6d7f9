// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod coordinator;
pub mod decoy;
pub mod enforcer;
pub mod investigator;
pub mod monitor;

pub use coordinator::CoordinatorAgent;
pub use decoy::DecoyManagerAgent;
pub use enforcer::{AccessGate, EnforcerAgent, GateDecision, StaticGate};
pub use investigator::InvestigatorAgent;
pub use monitor::MonitorAgent;
