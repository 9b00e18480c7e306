// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Narrow trait boundaries for the two collaborating subsystems named in
//! §6.4 (ATNA audit, DSUB notification). The real emitter/pull-point store
//! are out of scope (§1 Non-goals); these traits are the seam the
//! orchestrator calls through, with a no-op and a `tracing`-backed
//! implementation provided.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Kind of ATNA audit event emitted at external call boundaries (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtnaEventType {
    PixRequest,
    PixIdentityFeed,
    XdsRegister,
}

impl AtnaEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PixRequest => "PIX_REQUEST",
            Self::PixIdentityFeed => "PIX_IDENTITY_FEED",
            Self::XdsRegister => "XDS_REGISTER",
        }
    }
}

/// Outcome recorded on an audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure(String),
}

/// `ATNAAudit{type, patientIds, correlationId, outcome}` (§6.4).
#[derive(Debug, Clone)]
pub struct AtnaAuditEvent {
    pub event_type: AtnaEventType,
    pub patient_ids: Vec<String>,
    pub correlation_id: Uuid,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Collaborator boundary for the ATNA audit emitter (out of scope to
/// implement in full — see §1 Non-goals).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AtnaAuditEvent);
}

/// Default no-op sink, for orchestration runs that don't care about audit.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: AtnaAuditEvent) {}
}

/// Logs each audit event via `tracing` instead of forwarding it to a real
/// ATNA emitter — useful for local runs and as the reference adapter a
/// real ATNA sink would replace.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AtnaAuditEvent) {
        match &event.outcome {
            AuditOutcome::Success => tracing::info!(
                correlation_id = %event.correlation_id,
                event_type = event.event_type.as_str(),
                patient_ids = ?event.patient_ids,
                "ATNA audit: success"
            ),
            AuditOutcome::Failure(reason) => tracing::warn!(
                correlation_id = %event.correlation_id,
                event_type = event.event_type.as_str(),
                patient_ids = ?event.patient_ids,
                reason,
                "ATNA audit: failure"
            ),
        }
    }
}

/// `NewDocumentRegistered{docId, facilityId}` (§6.4), published to DSUB on
/// `Completed`.
#[derive(Debug, Clone)]
pub struct NewDocumentRegistered {
    pub doc_id: String,
    pub facility_id: Option<String>,
}

/// Collaborator boundary for the DSUB pull-point store (out of scope to
/// implement in full — see §1 Non-goals).
#[async_trait]
pub trait SubscriptionPublisher: Send + Sync {
    async fn publish(&self, event: NewDocumentRegistered);
}

pub struct NullSubscriptionPublisher;

#[async_trait]
impl SubscriptionPublisher for NullSubscriptionPublisher {
    async fn publish(&self, _event: NewDocumentRegistered) {}
}

pub struct TracingPublisher;

#[async_trait]
impl SubscriptionPublisher for TracingPublisher {
    async fn publish(&self, event: NewDocumentRegistered) {
        tracing::info!(
            doc_id = %event.doc_id,
            facility_id = ?event.facility_id,
            "DSUB: new document registered"
        );
    }
}
