// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C4 — Identity Feed Client.
//!
//! Invoked by the orchestrator at most once per transaction when
//! `autoRegister` is on and at least one patient identifier missed (§4.4,
//! §8 property 6). Demographics are derived — in priority order — from an
//! embedded FHIR `Patient` resource, then a CDA Level-2 header, then
//! nothing at all; the registration is sent either way, since a bare
//! identifiers-only feed is still valid per spec.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use roxmltree::Document;
use uuid::Uuid;

use crate::collaborators::{AtnaAuditEvent, AtnaEventType, AuditOutcome, AuditSink};
use crate::config::PixConfig;
use crate::model::{AttachmentMap, Identifier};
use crate::parser::ParsedEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum IdentityFeedError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed identity feed response: {0}")]
    Protocol(String),
}

/// `{givenName, familyName, gender, birthDate, telecom, languageCommunicationCode}` (§4.4).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demographics {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub telecom: Option<String>,
    pub language_communication_code: Option<String>,
}

/// The demographics source chosen for a registration call.
#[derive(Debug, Clone)]
pub enum DemographicsSource {
    FhirPatient(serde_json::Value),
    Cda(Demographics),
    None,
}

/// Apply the extraction policy (§4.4): embedded FHIR Patient verbatim,
/// else the CDA L2 header of the first document, else nothing.
pub fn derive_demographics(envelope: &ParsedEnvelope, attachments: &AttachmentMap) -> DemographicsSource {
    let Some(first) = envelope.document_entries.first() else {
        return DemographicsSource::None;
    };
    let Some(content_id) = &first.content_id else {
        return DemographicsSource::None;
    };
    let Some(bytes) = attachments.get(content_id) else {
        return DemographicsSource::None;
    };

    let is_fhir = matches!(
        first.mime_type.as_deref(),
        Some("application/fhir+json") | Some("application/fhir+xml")
    );
    if is_fhir && first.mime_type.as_deref() == Some("application/fhir+json") {
        if let Ok(patient) = serde_json::from_slice::<serde_json::Value>(bytes) {
            return DemographicsSource::FhirPatient(patient);
        }
    }

    match parse_cda_demographics(bytes) {
        Some(demographics) => DemographicsSource::Cda(demographics),
        None => DemographicsSource::None,
    }
}

/// Extract `{givenName, familyName, gender, birthDate, telecom,
/// languageCommunicationCode}` from a CDA document's
/// `recordTarget/patientRole/patient` header.
fn parse_cda_demographics(bytes: &Bytes) -> Option<Demographics> {
    let text = std::str::from_utf8(bytes).ok()?;
    let doc = Document::parse(text).ok()?;

    let patient_role = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "patientRole")?;

    let find_text = |local_name: &str| -> Option<String> {
        patient_role
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == local_name)
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let find_attr = |local_name: &str, attr: &str| -> Option<String> {
        patient_role
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == local_name)
            .and_then(|n| n.attribute(attr))
            .map(|s| s.to_string())
    };

    Some(Demographics {
        given_name: find_text("given"),
        family_name: find_text("family"),
        gender: find_attr("administrativeGenderCode", "code"),
        birth_date: find_attr("birthTime", "value"),
        telecom: find_attr("telecom", "value"),
        language_communication_code: find_attr("languageCode", "code"),
    })
}

#[async_trait]
pub trait IdentityFeedClient: Send + Sync {
    async fn register(
        &self,
        identifiers: &[Identifier],
        demographics: &DemographicsSource,
    ) -> Result<(), IdentityFeedError>;
}

/// Wraps any `IdentityFeedClient` with the `PIX_IDENTITY_FEED` audit
/// emission every backend needs (§4.4, §6.4). Trait-object-backed for the
/// same reason as `AuditedResolver`: `Orchestrator::new` wraps whichever
/// concrete backend it receives without growing a generic parameter.
pub struct AuditedIdentityFeed {
    inner: std::sync::Arc<dyn IdentityFeedClient>,
    audit: std::sync::Arc<dyn AuditSink>,
}

impl AuditedIdentityFeed {
    pub fn new(inner: std::sync::Arc<dyn IdentityFeedClient>, audit: std::sync::Arc<dyn AuditSink>) -> Self {
        Self { inner, audit }
    }
}

#[async_trait]
impl IdentityFeedClient for AuditedIdentityFeed {
    async fn register(
        &self,
        identifiers: &[Identifier],
        demographics: &DemographicsSource,
    ) -> Result<(), IdentityFeedError> {
        let result = self.inner.register(identifiers, demographics).await;
        let outcome = match &result {
            Ok(()) => AuditOutcome::Success,
            Err(e) => AuditOutcome::Failure(e.to_string()),
        };
        self.audit
            .record(AtnaAuditEvent {
                event_type: AtnaEventType::PixIdentityFeed,
                patient_ids: identifiers.iter().map(|id| id.value.clone()).collect(),
                correlation_id: Uuid::new_v4(),
                outcome,
                timestamp: Utc::now(),
            })
            .await;
        result
    }
}

/// HL7v2 identity feed: `ADT^A04^ADT_A01` over MLLP.
pub struct Hl7IdentityFeed {
    config: PixConfig,
}

impl Hl7IdentityFeed {
    pub fn new(config: PixConfig) -> Self {
        Self { config }
    }

    fn build_adt(&self, identifiers: &[Identifier], demographics: &DemographicsSource) -> String {
        let msh = format!(
            "MSH|^~\\&|PNR_MEDIATOR|{}|PIX_MANAGER|{}|{}||ADT^A04^ADT_A01|{}|P|2.5",
            self.config.manager_host,
            self.config.manager_host,
            Utc::now().format("%Y%m%d%H%M%S"),
            Uuid::new_v4()
        );

        let id_field = identifiers
            .iter()
            .map(|id| {
                format!(
                    "{}^^^{}&{}&{}",
                    id.value, id.authority.namespace_id, id.authority.universal_id, id.authority.universal_id_type
                )
            })
            .collect::<Vec<_>>()
            .join("~");

        let (given, family, gender, birth) = match demographics {
            DemographicsSource::Cda(d) => (
                d.given_name.clone().unwrap_or_default(),
                d.family_name.clone().unwrap_or_default(),
                d.gender.clone().unwrap_or_default(),
                d.birth_date.clone().unwrap_or_default(),
            ),
            _ => Default::default(),
        };

        let pid = format!("PID|1||{}||{}^{}||{}|{}", id_field, family, given, birth, gender);
        let evn = format!("EVN|A04|{}", Utc::now().format("%Y%m%d%H%M%S"));
        format!("{}\r{}\r{}\r", msh, evn, pid)
    }
}

#[async_trait]
impl IdentityFeedClient for Hl7IdentityFeed {
    async fn register(
        &self,
        identifiers: &[Identifier],
        demographics: &DemographicsSource,
    ) -> Result<(), IdentityFeedError> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        let addr = format!("{}:{}", self.config.manager_host, self.config.manager_port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| IdentityFeedError::Transport(e.to_string()))?;

        let adt = self.build_adt(identifiers, demographics);
        let mut framed = Vec::with_capacity(adt.len() + 3);
        framed.push(0x0b);
        framed.extend_from_slice(adt.as_bytes());
        framed.extend_from_slice(&[0x1c, b'\r']);

        stream
            .write_all(&framed)
            .await
            .map_err(|e| IdentityFeedError::Transport(e.to_string()))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| IdentityFeedError::Transport(e.to_string()))?;
            if n == 0 {
                return Err(IdentityFeedError::Transport("connection closed before MLLP trailer".to_string()));
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.ends_with(&[0x1c, b'\r']) {
                break;
            }
        }

        let message = std::str::from_utf8(&buf).map_err(|e| IdentityFeedError::Protocol(e.to_string()))?;
        let msa = message
            .split('\r')
            .find(|seg| seg.starts_with("MSA|"))
            .ok_or_else(|| IdentityFeedError::Protocol("missing MSA segment".to_string()))?;
        match msa.split('|').nth(1) {
            Some("AA") => Ok(()),
            other => Err(IdentityFeedError::Protocol(format!(
                "identity feed rejected: {:?}",
                other
            ))),
        }
    }
}

/// FHIR identity feed: `POST {base}/Patient`.
pub struct FhirIdentityFeed {
    client: reqwest::Client,
    base_url: String,
    client_name: String,
    password: String,
}

impl FhirIdentityFeed {
    pub fn new(base_url: String, client_name: String, password: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            client_name,
            password,
        }
    }

    fn build_patient_resource(&self, identifiers: &[Identifier], demographics: &DemographicsSource) -> serde_json::Value {
        if let DemographicsSource::FhirPatient(patient) = demographics {
            return patient.clone();
        }

        let identifier_entries: Vec<_> = identifiers
            .iter()
            .map(|id| {
                serde_json::json!({
                    "system": id.authority.universal_id,
                    "value": id.value,
                })
            })
            .collect();

        let mut resource = serde_json::json!({
            "resourceType": "Patient",
            "identifier": identifier_entries,
        });

        if let DemographicsSource::Cda(d) = demographics {
            if d.given_name.is_some() || d.family_name.is_some() {
                resource["name"] = serde_json::json!([{
                    "given": d.given_name.clone().map(|g| vec![g]).unwrap_or_default(),
                    "family": d.family_name.clone().unwrap_or_default(),
                }]);
            }
            if let Some(gender) = &d.gender {
                resource["gender"] = serde_json::json!(map_gender(gender));
            }
            if let Some(birth_date) = &d.birth_date {
                resource["birthDate"] = serde_json::json!(format_hl7_date(birth_date));
            }
            if let Some(telecom) = &d.telecom {
                resource["telecom"] = serde_json::json!([{ "value": telecom }]);
            }
        }

        resource
    }
}

fn map_gender(hl7_code: &str) -> &'static str {
    match hl7_code {
        "M" => "male",
        "F" => "female",
        "O" => "other",
        _ => "unknown",
    }
}

fn format_hl7_date(yyyymmdd: &str) -> String {
    if yyyymmdd.len() >= 8 {
        format!("{}-{}-{}", &yyyymmdd[0..4], &yyyymmdd[4..6], &yyyymmdd[6..8])
    } else {
        yyyymmdd.to_string()
    }
}

#[async_trait]
impl IdentityFeedClient for FhirIdentityFeed {
    async fn register(
        &self,
        identifiers: &[Identifier],
        demographics: &DemographicsSource,
    ) -> Result<(), IdentityFeedError> {
        let resource = self.build_patient_resource(identifiers, demographics);
        let url = format!("{}/Patient", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_name, Some(&self.password))
            .json(&resource)
            .send()
            .await
            .map_err(|e| IdentityFeedError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(IdentityFeedError::Transport(format!(
                "FHIR Patient create returned {}",
                response.status()
            )))
        }
    }
}

/// No-op identity feed for tests and for deployments without a configured
/// registration backend.
#[derive(Default)]
pub struct InternalIdentityFeed;

#[async_trait]
impl IdentityFeedClient for InternalIdentityFeed {
    async fn register(
        &self,
        _identifiers: &[Identifier],
        _demographics: &DemographicsSource,
    ) -> Result<(), IdentityFeedError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssigningAuthority;

    fn cda_fixture() -> Bytes {
        Bytes::from(
            r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
  <recordTarget>
    <patientRole>
      <telecom value="tel:+27832222222"/>
      <patient>
        <name>
          <given>Jane</given>
          <family>Doe</family>
        </name>
        <administrativeGenderCode code="F"/>
        <birthTime value="19860101"/>
        <languageCommunication>
          <languageCode code="eng"/>
        </languageCommunication>
      </patient>
    </patientRole>
  </recordTarget>
</ClinicalDocument>"#
                .as_bytes()
                .to_vec(),
        )
    }

    #[test]
    fn parses_cda_demographics_matching_s6() {
        let demographics = parse_cda_demographics(&cda_fixture()).expect("demographics");
        assert_eq!(demographics.given_name.as_deref(), Some("Jane"));
        assert_eq!(demographics.family_name.as_deref(), Some("Doe"));
        assert_eq!(demographics.gender.as_deref(), Some("F"));
        assert_eq!(demographics.birth_date.as_deref(), Some("19860101"));
        assert_eq!(demographics.telecom.as_deref(), Some("tel:+27832222222"));
        assert_eq!(demographics.language_communication_code.as_deref(), Some("eng"));
    }

    #[test]
    fn format_hl7_date_converts_to_iso() {
        assert_eq!(format_hl7_date("19860101"), "1986-01-01");
    }

    #[tokio::test]
    async fn internal_identity_feed_always_succeeds() {
        let feed = InternalIdentityFeed;
        let id = Identifier::new("123", AssigningAuthority::new("", "1.2.3", "ISO"));
        assert!(feed.register(&[id], &DemographicsSource::None).await.is_ok());
    }

    #[tokio::test]
    async fn audited_identity_feed_emits_event_and_passes_through_result() {
        use crate::collaborators::NullAuditSink;
        use std::sync::Arc;

        let audited = AuditedIdentityFeed::new(Arc::new(InternalIdentityFeed), Arc::new(NullAuditSink));
        let id = Identifier::new("123", AssigningAuthority::new("", "1.2.3", "ISO"));
        assert!(audited.register(&[id], &DemographicsSource::None).await.is_ok());
    }
}
