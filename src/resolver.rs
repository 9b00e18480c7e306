// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C3 — Resolver Client.
//!
//! One narrow trait, three backends. The orchestrator holds an
//! `Arc<dyn ResolverClient>` shared across every transaction's fan-out —
//! the same sharing shape `hdds-router::Router` uses for its
//! `participants: HashMap<u32, Arc<Participant>>` table (§5).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::collaborators::{AtnaAuditEvent, AtnaEventType, AuditOutcome, AuditSink};
use crate::config::{FhirConfig, PixConfig};
use crate::model::{AssigningAuthority, Identifier};

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("resolver call timed out")]
    Timeout,

    #[error("malformed resolver response: {0}")]
    Protocol(String),
}

/// Outcome of a single resolve call, distinct from the envelope-level
/// `ResolutionState` (which also tracks `InFlight`/`Error`) — a resolver
/// implementation only ever reports success or absence; the orchestrator
/// is the one that turns transport failures into `ResolutionState::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Found(Identifier),
    NotFound,
}

#[async_trait]
pub trait ResolverClient: Send + Sync {
    async fn resolve(
        &self,
        identifier: &Identifier,
        target_authority: &AssigningAuthority,
    ) -> Result<ResolveOutcome, ResolverError>;
}

/// Wraps any `ResolverClient` with the per-call timeout and `PIX_REQUEST`
/// audit emission every backend needs (§4.3 [AMBIENT]), so individual
/// backends stay focused on their wire protocol. Holds the inner client as
/// a trait object so `Orchestrator::new` can wrap whichever concrete
/// backend it was handed without a generic parameter leaking into
/// `Orchestrator`'s own type.
pub struct AuditedResolver {
    inner: std::sync::Arc<dyn ResolverClient>,
    audit: std::sync::Arc<dyn AuditSink>,
    timeout: Duration,
}

impl AuditedResolver {
    pub fn new(
        inner: std::sync::Arc<dyn ResolverClient>,
        audit: std::sync::Arc<dyn AuditSink>,
        timeout: Duration,
    ) -> Self {
        Self { inner, audit, timeout }
    }
}

#[async_trait]
impl ResolverClient for AuditedResolver {
    async fn resolve(
        &self,
        identifier: &Identifier,
        target_authority: &AssigningAuthority,
    ) -> Result<ResolveOutcome, ResolverError> {
        let correlation_id = Uuid::new_v4();
        let result = tokio::time::timeout(self.timeout, self.inner.resolve(identifier, target_authority)).await;

        let (outcome, audit_outcome) = match result {
            Ok(Ok(found @ ResolveOutcome::Found(_))) => (Ok(found), AuditOutcome::Success),
            Ok(Ok(ResolveOutcome::NotFound)) => (Ok(ResolveOutcome::NotFound), AuditOutcome::Success),
            Ok(Err(err)) => {
                let msg = err.to_string();
                (Err(err), AuditOutcome::Failure(msg))
            }
            Err(_) => (Err(ResolverError::Timeout), AuditOutcome::Failure("timed out".to_string())),
        };

        self.audit
            .record(AtnaAuditEvent {
                event_type: AtnaEventType::PixRequest,
                patient_ids: vec![identifier.value.clone()],
                correlation_id,
                outcome: audit_outcome,
                timestamp: Utc::now(),
            })
            .await;

        outcome
    }
}

/// HL7v2 PIX resolver: `QBP^Q21^QBP_Q21` over MLLP, expecting `RSP^K23`.
pub struct Hl7PixResolver {
    config: PixConfig,
}

impl Hl7PixResolver {
    pub fn new(config: PixConfig) -> Self {
        Self { config }
    }

    fn build_qbp(&self, identifier: &Identifier, target_authority: &AssigningAuthority) -> String {
        let msh = format!(
            "MSH|^~\\&|PNR_MEDIATOR|{}|PIX_MANAGER|{}|{}||QBP^Q21^QBP_Q21|{}|P|2.5",
            self.config.manager_host,
            self.config.manager_host,
            Utc::now().format("%Y%m%d%H%M%S"),
            Uuid::new_v4()
        );
        let qpd = format!(
            "QPD|IHE PIX Query|{}|{}^^^{}&{}&{}~{}^^^{}",
            Uuid::new_v4(),
            identifier.value,
            identifier.authority.namespace_id,
            identifier.authority.universal_id,
            identifier.authority.universal_id_type,
            "",
            target_authority.universal_id,
        );
        let rcp = "RCP|I";
        format!("{}\r{}\r{}\r", msh, qpd, rcp)
    }

    fn parse_rsp(&self, message: &str, target_authority: &AssigningAuthority) -> Result<ResolveOutcome, ResolverError> {
        let msa = message
            .split('\r')
            .find(|seg| seg.starts_with("MSA|"))
            .ok_or_else(|| ResolverError::Protocol("missing MSA segment".to_string()))?;
        let ack_code = msa.split('|').nth(1).unwrap_or("");
        if ack_code != "AA" {
            return Ok(ResolveOutcome::NotFound);
        }

        let pid = message.split('\r').find(|seg| seg.starts_with("PID|"));
        let Some(pid) = pid else {
            return Ok(ResolveOutcome::NotFound);
        };
        let identifiers_field = pid.split('|').nth(3).unwrap_or("");
        for repetition in identifiers_field.split('~') {
            let comps = crate::hl7::composite::split_components(repetition, '^');
            let value = comps.first().copied().unwrap_or("");
            let authority_field = comps.get(3).copied().unwrap_or("");
            let sub = crate::hl7::composite::split_components(authority_field, '&');
            let universal_id = sub.get(1).copied().unwrap_or("");
            if universal_id == target_authority.universal_id {
                return Ok(ResolveOutcome::Found(Identifier::new(
                    value,
                    target_authority.clone(),
                )));
            }
        }
        Ok(ResolveOutcome::NotFound)
    }
}

const MLLP_START: u8 = 0x0b;
const MLLP_END: [u8; 2] = [0x1c, b'\r'];

#[async_trait]
impl ResolverClient for Hl7PixResolver {
    async fn resolve(
        &self,
        identifier: &Identifier,
        target_authority: &AssigningAuthority,
    ) -> Result<ResolveOutcome, ResolverError> {
        let addr = format!("{}:{}", self.config.manager_host, self.config.manager_port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        let qbp = self.build_qbp(identifier, target_authority);
        let mut framed = Vec::with_capacity(qbp.len() + 3);
        framed.push(MLLP_START);
        framed.extend_from_slice(qbp.as_bytes());
        framed.extend_from_slice(&MLLP_END);

        stream
            .write_all(&framed)
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| ResolverError::Transport(e.to_string()))?;
            if n == 0 {
                return Err(ResolverError::Transport("connection closed before MLLP trailer".to_string()));
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.ends_with(&MLLP_END) {
                break;
            }
        }

        let payload = buf
            .strip_prefix(&[MLLP_START])
            .unwrap_or(&buf)
            .strip_suffix(&MLLP_END)
            .unwrap_or(&buf);
        let message = std::str::from_utf8(payload)
            .map_err(|e| ResolverError::Protocol(e.to_string()))?;

        self.parse_rsp(message, target_authority)
    }
}

/// FHIR R4 resolver: `GET {base}/Patient?identifier={system}|{value}`.
pub struct FhirResolver {
    client: reqwest::Client,
    config: FhirConfig,
}

impl FhirResolver {
    pub fn new(config: FhirConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ResolverClient for FhirResolver {
    async fn resolve(
        &self,
        identifier: &Identifier,
        target_authority: &AssigningAuthority,
    ) -> Result<ResolveOutcome, ResolverError> {
        let url = format!(
            "{}/Patient?identifier={}|{}",
            self.config.mpi_url.trim_end_matches('/'),
            identifier.authority.universal_id,
            identifier.value
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.mpi_client_name, Some(&self.config.mpi_password))
            .send()
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResolverError::Transport(format!(
                "FHIR server returned {}",
                response.status()
            )));
        }

        let bundle: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResolverError::Protocol(e.to_string()))?;

        let total = bundle.get("total").and_then(|v| v.as_i64()).unwrap_or(0);
        if total == 0 {
            return Ok(ResolveOutcome::NotFound);
        }

        let entries = bundle
            .get("entry")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for entry in entries {
            let identifiers = entry
                .get("resource")
                .and_then(|r| r.get("identifier"))
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            for id in identifiers {
                let system = id.get("system").and_then(|v| v.as_str()).unwrap_or("");
                if system == self.config.enterprise_identifier_system {
                    if let Some(value) = id.get("value").and_then(|v| v.as_str()) {
                        return Ok(ResolveOutcome::Found(Identifier::new(
                            value,
                            target_authority.clone(),
                        )));
                    }
                }
            }
        }

        Ok(ResolveOutcome::NotFound)
    }
}

/// Deterministic in-memory resolver for tests and for categories with no
/// live backend configured.
#[derive(Debug, Clone, Default)]
pub struct InternalResolver {
    table: HashMap<Identifier, Identifier>,
}

impl InternalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, from: Identifier, to: Identifier) -> Self {
        self.table.insert(from, to);
        self
    }
}

#[async_trait]
impl ResolverClient for InternalResolver {
    async fn resolve(
        &self,
        identifier: &Identifier,
        _target_authority: &AssigningAuthority,
    ) -> Result<ResolveOutcome, ResolverError> {
        match self.table.get(identifier) {
            Some(resolved) => Ok(ResolveOutcome::Found(resolved.clone())),
            None => Ok(ResolveOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullAuditSink;
    use std::sync::Arc;

    #[tokio::test]
    async fn internal_resolver_finds_mapped_identifier() {
        let from = Identifier::new("123", AssigningAuthority::new("", "1.2.3", "ISO"));
        let to = Identifier::new("ECID1", AssigningAuthority::ecid());
        let resolver = InternalResolver::new().with_mapping(from.clone(), to.clone());

        let outcome = resolver.resolve(&from, &AssigningAuthority::ecid()).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::Found(to));
    }

    #[tokio::test]
    async fn internal_resolver_reports_not_found_for_unmapped_identifier() {
        let resolver = InternalResolver::new();
        let id = Identifier::new("999", AssigningAuthority::new("", "1.2.3", "ISO"));
        let outcome = resolver.resolve(&id, &AssigningAuthority::ecid()).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::NotFound);
    }

    #[tokio::test]
    async fn audited_resolver_emits_audit_event_and_passes_through_result() {
        let from = Identifier::new("123", AssigningAuthority::new("", "1.2.3", "ISO"));
        let to = Identifier::new("ECID1", AssigningAuthority::ecid());
        let inner = InternalResolver::new().with_mapping(from.clone(), to.clone());
        let audited = AuditedResolver::new(Arc::new(inner), Arc::new(NullAuditSink), Duration::from_secs(5));

        let outcome = audited.resolve(&from, &AssigningAuthority::ecid()).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::Found(to));
    }

    #[test]
    fn build_qbp_embeds_requested_universal_id() {
        let resolver = Hl7PixResolver::new(PixConfig {
            manager_host: "pix.example.org".to_string(),
            manager_port: 2575,
        });
        let id = Identifier::new("123", AssigningAuthority::new("", "1.2.3", "ISO"));
        let qbp = resolver.build_qbp(&id, &AssigningAuthority::ecid());
        assert!(qbp.contains("QBP^Q21^QBP_Q21"));
        assert!(qbp.contains("123^^^"));
    }

    #[test]
    fn parse_rsp_extracts_matching_universal_id() {
        let resolver = Hl7PixResolver::new(PixConfig::default());
        let message = "MSH|^~\\&|PIX|X|PNR|Y|20260101000000||RSP^K23^RSP_K23|1|P|2.5\rMSA|AA|1\rPID|1||ECID1^^^ECID&ECID&ECID~123^^^&1.2.3&ISO||Doe^Jane\r";
        let target = AssigningAuthority::ecid();
        let outcome = resolver.parse_rsp(message, &target).unwrap();
        assert_eq!(outcome, ResolveOutcome::Found(Identifier::new("ECID1", target)));
    }

    #[test]
    fn parse_rsp_reports_not_found_on_query_rejected() {
        let resolver = Hl7PixResolver::new(PixConfig::default());
        let message = "MSH|^~\\&|PIX|X|PNR|Y|20260101000000||RSP^K23^RSP_K23|1|P|2.5\rMSA|AE|1\r";
        let outcome = resolver.parse_rsp(message, &AssigningAuthority::ecid()).unwrap();
        assert_eq!(outcome, ResolveOutcome::NotFound);
    }
}
