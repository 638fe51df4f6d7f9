// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Incident Records
//!
//! Immutable, severity-classified records of security-relevant events.
//! Severity is always derived from the rule table in [`Severity::classify`];
//! callers never supply it, and it is never rewritten after creation.
//! Corrections are new incidents linked via `supersedes`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentId(pub Uuid);

impl IncidentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IncidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    FragmentCompromise,
    UnauthorizedAccess,
    NormalExpiration,
    DeliveryMiss,
    AgentFailure,
    SchedulerDelay,
    AnomalousTraffic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Deterministic base severity per incident type. Unmapped types fall
    /// through to Medium.
    pub fn for_type(incident_type: IncidentType) -> Self {
        match incident_type {
            IncidentType::FragmentCompromise | IncidentType::UnauthorizedAccess => Severity::High,
            IncidentType::NormalExpiration => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// One step up, saturating at Critical.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    /// Full classification rule: base severity by type, escalated one step
    /// when the affected resource is flagged critical.
    pub fn classify(incident_type: IncidentType, critical_resource: bool) -> Self {
        let base = Self::for_type(incident_type);
        if critical_resource {
            base.escalate()
        } else {
            base
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Reference to the resource an incident affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_id: String,
    /// Flagged-critical resources escalate incident severity one step.
    #[serde(default)]
    pub critical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ResourceRef {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            critical: false,
            kind: None,
        }
    }

    pub fn critical(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            critical: true,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Append-only incident record. Created exclusively by the incident
/// ledger's ingestion path and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    pub created_at: DateTime<Utc>,
    /// Raw-event attachments captured with the report.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<serde_json::Value>,
    /// Set on correction records; the original is never edited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<IncidentId>,
}

impl Incident {
    pub fn new(
        incident_type: IncidentType,
        description: impl Into<String>,
        resource: Option<ResourceRef>,
        attachments: Vec<serde_json::Value>,
    ) -> Self {
        let critical = resource.as_ref().map(|r| r.critical).unwrap_or(false);
        Self {
            id: IncidentId::new(),
            incident_type,
            severity: Severity::classify(incident_type, critical),
            description: description.into(),
            resource,
            created_at: Utc::now(),
            attachments,
            supersedes: None,
        }
    }

    pub fn superseding(mut self, original: IncidentId) -> Self {
        self.supersedes = Some(original);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_rule_table_is_deterministic() {
        assert_eq!(Severity::for_type(IncidentType::FragmentCompromise), Severity::High);
        assert_eq!(Severity::for_type(IncidentType::UnauthorizedAccess), Severity::High);
        assert_eq!(Severity::for_type(IncidentType::NormalExpiration), Severity::Low);
        // Unmapped types default to Medium.
        assert_eq!(Severity::for_type(IncidentType::DeliveryMiss), Severity::Medium);
        assert_eq!(Severity::for_type(IncidentType::AgentFailure), Severity::Medium);
        assert_eq!(Severity::for_type(IncidentType::AnomalousTraffic), Severity::Medium);
    }

    #[test]
    fn critical_resource_escalates_one_step() {
        assert_eq!(
            Severity::classify(IncidentType::NormalExpiration, true),
            Severity::Medium
        );
        assert_eq!(
            Severity::classify(IncidentType::FragmentCompromise, true),
            Severity::Critical
        );
        // Saturates at Critical.
        assert_eq!(Severity::Critical.escalate(), Severity::Critical);
    }

    #[test]
    fn incident_derives_severity_from_resource_flag() {
        let plain = Incident::new(
            IncidentType::UnauthorizedAccess,
            "probe on volume",
            Some(ResourceRef::new("vol-1")),
            vec![],
        );
        assert_eq!(plain.severity, Severity::High);

        let escalated = Incident::new(
            IncidentType::UnauthorizedAccess,
            "probe on key store",
            Some(ResourceRef::critical("keystore")),
            vec![],
        );
        assert_eq!(escalated.severity, Severity::Critical);
    }
}
