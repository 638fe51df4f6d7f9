// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Incident Ledger
//!
//! Durable, append-only store of security incidents with severity
//! classification and multi-channel notification fan-out.
//!
//! The write path is the system's primary serialization point: one narrow
//! mutex held only for the insert itself. Reads take a snapshot under the
//! same lock and filter outside it, so queries never serialize behind
//! notification fan-out. Channel failures are logged and contained; they
//! are never escalated into new incidents (that would loop).

use crate::domain::incident::{Incident, IncidentId, IncidentType, ResourceRef, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unknown incident: {0}")]
    UnknownIncident(IncidentId),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Pluggable notification capability. Console, email, webhook, SMS all
/// satisfy the same contract.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, incident_id: IncidentId, summary: &str) -> Result<(), ChannelError>;
}

/// Parameters for one `report()` call. Severity is absent on purpose: the
/// ledger derives it, callers never supply it.
#[derive(Debug, Clone)]
pub struct IncidentReport {
    pub incident_type: IncidentType,
    pub description: String,
    pub resource: Option<ResourceRef>,
    pub attachments: Vec<serde_json::Value>,
}

impl IncidentReport {
    pub fn new(incident_type: IncidentType, description: impl Into<String>) -> Self {
        Self {
            incident_type,
            description: description.into(),
            resource: None,
            attachments: Vec::new(),
        }
    }

    pub fn on_resource(mut self, resource: ResourceRef) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_attachment(mut self, attachment: serde_json::Value) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Query filters for the read path. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub incident_type: Option<IncidentType>,
    pub min_severity: Option<Severity>,
    pub resource_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl IncidentFilter {
    fn matches(&self, incident: &Incident) -> bool {
        if let Some(ty) = self.incident_type {
            if incident.incident_type != ty {
                return false;
            }
        }
        if let Some(min) = self.min_severity {
            if incident.severity < min {
                return false;
            }
        }
        if let Some(resource_id) = &self.resource_id {
            match &incident.resource {
                Some(r) if &r.resource_id == resource_id => {}
                _ => return false,
            }
        }
        if let Some(since) = self.since {
            if incident.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if incident.created_at > until {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct LedgerInner {
    /// Append-only, insertion order == creation order.
    incidents: Vec<Arc<Incident>>,
    by_id: HashMap<IncidentId, usize>,
}

pub struct IncidentLedger {
    inner: Mutex<LedgerInner>,
    channels: RwLock<Vec<Arc<dyn NotificationChannel>>>,
}

impl IncidentLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Ingest one incident. Safe under arbitrary concurrent invocation;
    /// every call appends exactly one record and returns its unique id.
    pub fn report(&self, report: IncidentReport) -> IncidentId {
        let incident = Arc::new(Incident::new(
            report.incident_type,
            report.description,
            report.resource,
            report.attachments,
        ));
        let id = incident.id;
        let severity = incident.severity;

        // The one lock correctness depends on; held only for the insert.
        {
            let mut inner = self.inner.lock();
            let index = inner.incidents.len();
            inner.by_id.insert(id, index);
            inner.incidents.push(incident);
        }

        metrics::counter!("defense_incidents_reported_total").increment(1);
        debug!(incident_id = %id, severity = %severity, "incident recorded");
        id
    }

    /// Record a correction as a new incident linked to the original. The
    /// original record is never edited.
    pub fn amend(&self, original: IncidentId, report: IncidentReport) -> Result<IncidentId, LedgerError> {
        if self.get(original).is_none() {
            return Err(LedgerError::UnknownIncident(original));
        }
        let incident = Arc::new(
            Incident::new(
                report.incident_type,
                report.description,
                report.resource,
                report.attachments,
            )
            .superseding(original),
        );
        let id = incident.id;
        {
            let mut inner = self.inner.lock();
            let index = inner.incidents.len();
            inner.by_id.insert(id, index);
            inner.incidents.push(incident);
        }
        info!(incident_id = %id, supersedes = %original, "correction recorded");
        Ok(id)
    }

    pub fn get(&self, id: IncidentId) -> Option<Arc<Incident>> {
        let inner = self.inner.lock();
        inner.by_id.get(&id).map(|&index| inner.incidents[index].clone())
    }

    /// Incidents matching `filter`, in creation order. The store is
    /// append-only, so returned results are stable.
    pub fn query(&self, filter: &IncidentFilter) -> Vec<Arc<Incident>> {
        let snapshot: Vec<Arc<Incident>> = self.inner.lock().incidents.clone();
        snapshot
            .into_iter()
            .filter(|incident| filter.matches(incident))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register_channel(&self, channel: Arc<dyn NotificationChannel>) {
        self.channels.write().push(channel);
    }

    /// Fan an incident out to every registered channel. One channel's
    /// failure never blocks the others; each failure is logged, not
    /// escalated. Returns the number of successful deliveries.
    pub async fn notify(&self, id: IncidentId) -> Result<usize, LedgerError> {
        let incident = self.get(id).ok_or(LedgerError::UnknownIncident(id))?;
        let summary = format!(
            "[{}] {:?}: {}",
            incident.severity, incident.incident_type, incident.description
        );

        let channels: Vec<Arc<dyn NotificationChannel>> = self.channels.read().clone();
        let mut delivered = 0;
        for channel in channels {
            match channel.deliver(id, &summary).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    metrics::counter!("defense_channel_failures_total").increment(1);
                    warn!(
                        channel = channel.name(),
                        incident_id = %id,
                        error = %e,
                        "notification channel failed; continuing fan-out"
                    );
                }
            }
        }
        Ok(delivered)
    }
}

impl Default for IncidentLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracing-backed channel; always succeeds.
pub struct ConsoleChannel;

#[async_trait]
impl NotificationChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, incident_id: IncidentId, summary: &str) -> Result<(), ChannelError> {
        info!(incident_id = %incident_id, summary, "incident notification");
        Ok(())
    }
}

/// POSTs `{incident_id, summary}` as JSON to a fixed URL.
pub struct WebhookChannel {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, incident_id: IncidentId, summary: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "incident_id": incident_id,
            "summary": summary,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| ChannelError::DeliveryFailed(e.to_string()))?;
        Ok(())
    }
}
