// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus - Typed, prioritized, addressable message transport
//
// In-memory pub/sub over tokio broadcast channels. The bus carries no
// business logic: it reads, forwards, and counts. Direct messages reach
// only their recipient; broadcasts reach every subscriber except the
// sender. Per-sender/per-recipient ordering follows the channel's FIFO
// order. Priority reorders locally buffered messages under load; it never
// changes delivery guarantees.

use crate::domain::agent::AgentId;
use crate::domain::message::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Message>>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Capacity bounds how many in-flight messages a slow subscriber may
    /// lag behind before the channel reports `Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    /// Publish a message to all subscribers. Returns the bus-wide sequence
    /// number assigned to this publish (diagnostics only).
    pub fn publish(&self, message: Message) -> u64 {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            message_id = %message.id.0,
            sender = %message.sender,
            broadcast = message.is_broadcast(),
            seq,
            "publishing message"
        );
        metrics::counter!("defense_bus_published_total").increment(1);

        // send() returns Err only when there are no receivers; that is not
        // a failure for an at-least-once-per-live-subscriber bus.
        let receivers = self.sender.send(message).unwrap_or(0);
        if receivers == 0 {
            debug!(seq, "no subscribers listening");
        }
        seq
    }

    /// Subscribe on behalf of an agent. The receiver yields messages
    /// addressed directly to `agent_id` plus broadcasts from other senders.
    pub fn subscribe(&self, agent_id: AgentId) -> AgentReceiver {
        AgentReceiver {
            receiver: self.sender.subscribe(),
            agent_id,
            ready: Vec::new(),
        }
    }

    /// Bus-wide publish count since construction.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Per-agent filtered receiver.
///
/// Under load, all ready messages are drained into a local buffer and
/// yielded highest-priority first; within one priority the channel's FIFO
/// order is preserved.
pub struct AgentReceiver {
    receiver: broadcast::Receiver<Message>,
    agent_id: AgentId,
    ready: Vec<Message>,
}

impl AgentReceiver {
    /// Receive the next message for this agent (blocks until available).
    pub async fn recv(&mut self) -> Result<Message, EventBusError> {
        loop {
            self.drain_ready();
            if let Some(message) = self.pop_highest_priority() {
                return Ok(message);
            }

            let message = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!(agent_id = %self.agent_id, lagged = n, "receiver lagged; messages dropped");
                    EventBusError::Lagged(n)
                }
            })?;
            if self.addressed_to_me(&message) {
                self.ready.push(message);
            }
        }
    }

    /// Try to receive without blocking.
    pub fn try_recv(&mut self) -> Result<Message, EventBusError> {
        self.drain_ready();
        self.pop_highest_priority().ok_or(EventBusError::Empty)
    }

    fn addressed_to_me(&self, message: &Message) -> bool {
        match message.recipient {
            Some(recipient) => recipient == self.agent_id,
            None => message.sender != self.agent_id,
        }
    }

    fn drain_ready(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    if self.addressed_to_me(&message) {
                        self.ready.push(message);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(agent_id = %self.agent_id, lagged = n, "receiver lagged while draining");
                }
                Err(_) => break,
            }
        }
    }

    fn pop_highest_priority(&mut self) -> Option<Message> {
        if self.ready.is_empty() {
            return None;
        }
        // Highest priority wins; ties resolve to the earliest-buffered
        // message so per-sender FIFO order survives.
        let best = self
            .ready
            .iter()
            .enumerate()
            .max_by_key(|(i, m)| (m.priority, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)?;
        Some(self.ready.remove(best))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event bus is closed")]
    Closed,

    #[error("no messages available")]
    Empty,

    #[error("receiver lagged by {0} messages (messages were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{MessageType, Priority};

    #[tokio::test]
    async fn direct_message_reaches_only_recipient() {
        let bus = EventBus::new(16);
        let alice = AgentId::new();
        let bob = AgentId::new();
        let carol = AgentId::new();
        let mut bob_rx = bus.subscribe(bob);
        let mut carol_rx = bus.subscribe(carol);

        bus.publish(Message::direct(
            alice,
            bob,
            MessageType::TaskAssignment,
            serde_json::json!({"task": "sweep"}),
            Priority::Normal,
        ));

        let received = bob_rx.recv().await.unwrap();
        assert_eq!(received.recipient, Some(bob));
        assert!(matches!(carol_rx.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let bus = EventBus::new(16);
        let alice = AgentId::new();
        let bob = AgentId::new();
        let mut alice_rx = bus.subscribe(alice);
        let mut bob_rx = bus.subscribe(bob);

        bus.publish(Message::broadcast(
            alice,
            MessageType::StatusUpdate,
            serde_json::json!({"status": "degraded"}),
            Priority::Normal,
        ));

        assert!(bob_rx.recv().await.is_ok());
        assert!(matches!(alice_rx.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn per_sender_order_is_preserved_within_priority() {
        let bus = EventBus::new(16);
        let sender = AgentId::new();
        let recipient = AgentId::new();
        let mut rx = bus.subscribe(recipient);

        for i in 0..5 {
            bus.publish(Message::direct(
                sender,
                recipient,
                MessageType::Intelligence,
                serde_json::json!({"n": i}),
                Priority::Normal,
            ));
        }

        for i in 0..5 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.payload["n"], i);
        }
    }

    #[tokio::test]
    async fn buffered_messages_yield_highest_priority_first() {
        let bus = EventBus::new(16);
        let sender = AgentId::new();
        let recipient = AgentId::new();
        let mut rx = bus.subscribe(recipient);

        bus.publish(Message::direct(
            sender,
            recipient,
            MessageType::StatusUpdate,
            serde_json::json!({"n": "low"}),
            Priority::Low,
        ));
        bus.publish(Message::direct(
            sender,
            recipient,
            MessageType::ThreatAlert,
            serde_json::json!({"n": "urgent"}),
            Priority::Urgent,
        ));
        bus.publish(Message::direct(
            sender,
            recipient,
            MessageType::Coordination,
            serde_json::json!({"n": "normal"}),
            Priority::Normal,
        ));

        assert_eq!(rx.recv().await.unwrap().payload["n"], "urgent");
        assert_eq!(rx.recv().await.unwrap().payload["n"], "normal");
        assert_eq!(rx.recv().await.unwrap().payload["n"], "low");
    }

    #[tokio::test]
    async fn publish_increments_sequence_counter() {
        let bus = EventBus::new(16);
        let sender = AgentId::new();
        assert_eq!(bus.sequence(), 0);
        let seq = bus.publish(Message::broadcast(
            sender,
            MessageType::StatusUpdate,
            serde_json::json!({}),
            Priority::Normal,
        ));
        assert_eq!(seq, 1);
        assert_eq!(bus.sequence(), 1);
    }
}
