// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod fragmentation;
pub mod orchestrator;

pub use fragmentation::{
    ExpiryDriver, FragmentationEngine, ProtectionError, VerificationDriver, VerifyOutcome,
};
pub use orchestrator::{AgentOrchestrator, HealthMonitor, HealthPolicy, OrchestratorError};
