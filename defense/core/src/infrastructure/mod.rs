// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod crypto;
pub mod event_bus;
pub mod ledger;

pub use crypto::{CipherError, CipherPrimitive, KeystreamCipher, OsSecureRandom, SecureRandom};
pub use event_bus::{AgentReceiver, EventBus, EventBusError};
pub use ledger::{
    ChannelError, ConsoleChannel, IncidentFilter, IncidentLedger, IncidentReport, LedgerError,
    NotificationChannel, WebhookChannel,
};
