// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C6 — Orchestrator.
//!
//! One `tokio::spawn`ed task per in-flight transaction drives this state
//! machine end to end (§4.6, §5) — "one logical task per in-flight PnR
//! transaction" maps directly onto a tokio task, the same shape
//! `hdds-router::Router::run` uses when it spawns one task per route.
//! Fan-out within `Resolving`/`ReResolving` uses `futures::future::join_all`
//! over one future per unique `ResolutionMap` key; same-key coalescing is
//! structural, since `ResolutionMap::track` only ever inserts a key once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use uuid::Uuid;

use crate::collaborators::{AuditSink, NewDocumentRegistered, SubscriptionPublisher};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, RegistryError};
use crate::extractor;
use crate::hl7::composite::render_cx_enterprise;
use crate::identity_feed::{self, AuditedIdentityFeed, DemographicsSource, IdentityFeedClient};
use crate::model::{
    AssigningAuthority, AttachmentMap, Identifier, IdentifierCategory, PnRTransaction, ResolutionKey,
    ResolutionMap, ResolutionState,
};
use crate::parser::{self, ParsedEnvelope};
use crate::registry_response::{self, escape_xml_attr};
use crate::resolver::{AuditedResolver, ResolveOutcome, ResolverClient};
use crate::rewriter::{self, Edit};

/// Drives §4.6's table. Kept as a plain enum — no behavior lives on it —
/// so every transition is visible in `Orchestrator::run`'s single loop
/// rather than scattered across impls.
#[derive(Debug)]
enum OrchestratorState {
    Received,
    Resolving,
    Triage,
    IdentityFeeding,
    ReResolving,
    Enriching,
    Completed,
    Failed(Vec<RegistryError>),
}

/// `Orchestrator::orchestrate`'s result (§6.1).
#[derive(Debug, Clone)]
pub enum OrchestrateOutcome {
    Completed { envelope: Bytes },
    Failed { registry_response: Bytes },
}

/// What `Received` has to do to produce a `ParsedEnvelope`: run C1 over raw
/// bytes, or skip straight to the structured form a caller already parsed
/// upstream (`pnr.sendParseOrchestration`, §6.3/§4.1).
enum Input {
    Raw(Bytes),
    PreParsed(ParsedEnvelope),
}

/// Audit emission for resolver/identity-feed calls lives on the
/// `AuditedResolver`/`AuditedIdentityFeed` wrappers (§4.3, §4.4
/// [AMBIENT]) — `new` wraps whatever backend it's handed with them, using
/// the given `AuditSink` and the configured per-call timeout, so every
/// resolver/identity-feed backend gets audit + timeout coverage uniformly
/// without each `main.rs` call site having to remember to wrap it.
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    resolver: Arc<dyn ResolverClient>,
    identity_feed: Arc<dyn IdentityFeedClient>,
    publisher: Arc<dyn SubscriptionPublisher>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        resolver: Arc<dyn ResolverClient>,
        identity_feed: Arc<dyn IdentityFeedClient>,
        publisher: Arc<dyn SubscriptionPublisher>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let timeout = Duration::from_secs(config.resolver_timeout_secs);
        let resolver: Arc<dyn ResolverClient> =
            Arc::new(AuditedResolver::new(resolver, Arc::clone(&audit), timeout));
        let identity_feed: Arc<dyn IdentityFeedClient> =
            Arc::new(AuditedIdentityFeed::new(identity_feed, audit));
        Self {
            config,
            resolver,
            identity_feed,
            publisher,
        }
    }

    /// Public entry point (§6.1). Wraps the whole run in the
    /// transaction-level deadline; on expiry, any not-yet-completed
    /// resolve futures are dropped by `tokio::time::timeout` itself —
    /// that drop is what makes "late responses are discarded" (§5) true
    /// without extra bookkeeping.
    pub async fn orchestrate(&self, envelope: Bytes, attachments: AttachmentMap) -> OrchestrateOutcome {
        self.orchestrate_input(Input::Raw(envelope), attachments).await
    }

    /// Entry point for `pnr.sendParseOrchestration` (§6.3): the caller has
    /// already run C1 upstream and hands the structured form directly,
    /// skipping this orchestrator's own `parser::parse_envelope` call.
    pub async fn orchestrate_preparsed(
        &self,
        parsed: ParsedEnvelope,
        attachments: AttachmentMap,
    ) -> OrchestrateOutcome {
        self.orchestrate_input(Input::PreParsed(parsed), attachments).await
    }

    async fn orchestrate_input(&self, input: Input, attachments: AttachmentMap) -> OrchestrateOutcome {
        let correlation_id = Uuid::new_v4();
        let deadline = Duration::from_secs(self.config.transaction_timeout_secs);

        match tokio::time::timeout(deadline, self.run(input, attachments, correlation_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(%correlation_id, "orchestration timed out");
                OrchestrateOutcome::Failed {
                    registry_response: registry_response::failure_response(&[
                        OrchestratorError::Timeout.to_registry_error(),
                    ]),
                }
            }
        }
    }

    async fn run(&self, input: Input, attachments: AttachmentMap, correlation_id: Uuid) -> OrchestrateOutcome {
        let mut state = OrchestratorState::Received;
        let mut input = Some(input);
        let mut parsed: Option<ParsedEnvelope> = None;
        let mut txn = PnRTransaction::new(correlation_id, Bytes::new());
        let mut facility_names = std::collections::HashMap::new();

        loop {
            tracing::debug!(%correlation_id, state = ?state, "orchestrator state transition");
            state = match state {
                OrchestratorState::Received => {
                    let outcome = match input.take().expect("Received visited only once") {
                        Input::Raw(bytes) => parser::parse_envelope(bytes),
                        Input::PreParsed(p) => Ok(p),
                    };
                    match outcome {
                        Ok(p) => {
                            let occurrences = extractor::extract_occurrences(&p);
                            facility_names = extractor::facility_names(&p);
                            for occ in &occurrences {
                                if self.category_enabled(occ.category) {
                                    txn.pending.track((occ.category, occ.identifier.clone()));
                                }
                            }
                            txn.original_envelope = p.source.clone();
                            txn.occurrences = occurrences;
                            parsed = Some(p);
                            if txn.pending.is_empty() {
                                OrchestratorState::Enriching
                            } else {
                                OrchestratorState::Resolving
                            }
                        }
                        Err(e) => OrchestratorState::Failed(vec![
                            OrchestratorError::MalformedRequest(e.to_string()).to_registry_error(),
                        ]),
                    }
                }

                OrchestratorState::Resolving => {
                    self.resolve_in_flight(&mut txn.pending).await;
                    debug_assert!(txn.pending.all_settled(), "resolve_in_flight must settle every in-flight key");
                    OrchestratorState::Triage
                }

                OrchestratorState::Triage => self.triage(&txn.pending, &facility_names),

                OrchestratorState::IdentityFeeding => {
                    let envelope_ref = parsed.as_ref().expect("parsed before IdentityFeeding");
                    self.identity_feeding(envelope_ref, &attachments, &mut txn.pending).await
                }

                OrchestratorState::ReResolving => {
                    self.resolve_in_flight(&mut txn.pending).await;
                    debug_assert!(txn.pending.all_settled(), "resolve_in_flight must settle every in-flight key");
                    self.after_reresolve(&txn.pending, &facility_names)
                }

                OrchestratorState::Enriching => {
                    let envelope_ref = parsed.as_ref().expect("parsed before Enriching");
                    let enriched = self.enriching(envelope_ref, &txn.pending);
                    self.publish_new_documents(envelope_ref, &txn.pending).await;
                    return OrchestrateOutcome::Completed { envelope: enriched };
                }

                OrchestratorState::Completed => unreachable!("Completed returns directly from Enriching"),

                OrchestratorState::Failed(errors) => {
                    txn.errors = errors;
                    return OrchestrateOutcome::Failed {
                        registry_response: registry_response::failure_response(&txn.errors),
                    };
                }
            };
        }
    }

    fn category_enabled(&self, category: IdentifierCategory) -> bool {
        match category {
            IdentifierCategory::Patient => true,
            IdentifierCategory::Provider => self.config.providers_enrich,
            IdentifierCategory::Facility => self.config.facilities_enrich,
        }
    }

    fn target_authority(&self, category: IdentifierCategory) -> AssigningAuthority {
        match category {
            IdentifierCategory::Patient => self.config.requested_authorities.patient.clone(),
            IdentifierCategory::Provider => self.config.requested_authorities.provider.clone(),
            IdentifierCategory::Facility => self.config.requested_authorities.facility.clone(),
        }
    }

    /// Fan out one resolve call per currently-`InFlight` key (§4.6,
    /// property 1: one call per unique key, never per site).
    async fn resolve_in_flight(&self, pending: &mut ResolutionMap) {
        let keys: Vec<ResolutionKey> = pending
            .iter()
            .filter(|(_, state)| state.is_in_flight())
            .map(|(key, _)| key.clone())
            .collect();

        let futures = keys.iter().map(|key| {
            let resolver = Arc::clone(&self.resolver);
            let target_authority = self.target_authority(key.0);
            let identifier = key.1.clone();
            async move {
                let result = resolver.resolve(&identifier, &target_authority).await;
                (key.clone(), result)
            }
        });

        for (key, result) in join_all(futures).await {
            let state = match result {
                Ok(ResolveOutcome::Found(resolved)) => ResolutionState::Resolved(resolved),
                Ok(ResolveOutcome::NotFound) => ResolutionState::NotFound,
                Err(e) => ResolutionState::Error(e.to_string()),
            };
            pending.set(&key, state);
        }
    }

    fn triage(
        &self,
        pending: &ResolutionMap,
        facility_names: &std::collections::HashMap<Identifier, String>,
    ) -> OrchestratorState {
        let patient_missing = pending.unresolved_in_category(IdentifierCategory::Patient);

        if !patient_missing.is_empty() {
            return if self.config.patients_auto_register {
                OrchestratorState::IdentityFeeding
            } else {
                let errors = patient_missing
                    .iter()
                    .map(|key| OrchestratorError::UnknownPatient(key.1.clone()).to_registry_error())
                    .collect();
                OrchestratorState::Failed(errors)
            };
        }

        self.triage_non_patient(pending, facility_names)
    }

    /// Single-patient invariant (§3, §9 open question 4) plus provider/
    /// facility misses, assuming every patient key is already resolved.
    fn triage_non_patient(
        &self,
        pending: &ResolutionMap,
        facility_names: &std::collections::HashMap<Identifier, String>,
    ) -> OrchestratorState {
        let resolved_patients: HashSet<&Identifier> = pending
            .keys_in_category(IdentifierCategory::Patient)
            .filter_map(|key| match pending.get(key) {
                Some(ResolutionState::Resolved(id)) => Some(id),
                _ => None,
            })
            .collect();
        if resolved_patients.len() > 1 {
            return OrchestratorState::Failed(vec![OrchestratorError::AmbiguousPatient.to_registry_error()]);
        }

        let mut errors = Vec::new();
        for key in pending.unresolved_in_category(IdentifierCategory::Provider) {
            errors.push(OrchestratorError::UnresolvedProvider(key.1.clone()).to_registry_error());
        }
        for key in pending.unresolved_in_category(IdentifierCategory::Facility) {
            let name = facility_names.get(&key.1).cloned().unwrap_or_default();
            errors.push(
                OrchestratorError::UnresolvedFacility {
                    name,
                    identifier: key.1.clone(),
                }
                .to_registry_error(),
            );
        }

        if errors.is_empty() {
            OrchestratorState::Enriching
        } else {
            OrchestratorState::Failed(errors)
        }
    }

    /// Registers every currently-missing patient identifier in one call
    /// (§8 property 6: at most once per transaction regardless of miss
    /// count), then re-arms those keys as `InFlight` for `ReResolving`.
    async fn identity_feeding(
        &self,
        envelope: &ParsedEnvelope,
        attachments: &AttachmentMap,
        pending: &mut ResolutionMap,
    ) -> OrchestratorState {
        let missing_keys: Vec<ResolutionKey> = pending
            .unresolved_in_category(IdentifierCategory::Patient)
            .into_iter()
            .cloned()
            .collect();
        let identifiers: Vec<Identifier> = missing_keys.iter().map(|key| key.1.clone()).collect();

        let demographics = identity_feed::derive_demographics(envelope, attachments);

        match self.identity_feed.register(&identifiers, &demographics).await {
            Ok(()) => {
                for key in &missing_keys {
                    pending.set(key, ResolutionState::InFlight);
                }
                OrchestratorState::ReResolving
            }
            Err(e) => OrchestratorState::Failed(vec![
                OrchestratorError::ExternalTransportError(e.to_string()).to_registry_error(),
            ]),
        }
    }

    fn after_reresolve(
        &self,
        pending: &ResolutionMap,
        facility_names: &std::collections::HashMap<Identifier, String>,
    ) -> OrchestratorState {
        let still_missing: Vec<ResolutionKey> = pending
            .unresolved_in_category(IdentifierCategory::Patient)
            .into_iter()
            .cloned()
            .collect();

        if !still_missing.is_empty() {
            let errors = still_missing
                .iter()
                .map(|key| OrchestratorError::UnknownPatient(key.1.clone()).to_registry_error())
                .collect();
            return OrchestratorState::Failed(errors);
        }

        self.triage_non_patient(pending, facility_names)
    }

    /// Build the byte-range edits for every occurrence that ended up
    /// `Resolved` and splice them into the original envelope (§4.5).
    ///
    /// Every replacement is XML-escaped before it is spliced in: a CX/XCN
    /// value carries its own `&`-separated components (`ECID1^^^ECID&ECID&ECID`),
    /// and the splice target is always a `value="..."` attribute, so the raw
    /// value would otherwise leave the output not well-formed.
    fn enriching(&self, envelope: &ParsedEnvelope, pending: &ResolutionMap) -> Bytes {
        let mut edits = Vec::new();

        if let Some(ResolutionState::Resolved(resolved)) =
            pending.get(&(IdentifierCategory::Patient, envelope.submission_set.patient.value.clone()))
        {
            edits.push(Edit {
                location: envelope.submission_set.patient.site.clone(),
                replacement: escape_xml_attr(&render_cx_enterprise(resolved)),
            });
        }

        for entry in &envelope.document_entries {
            if let Some(ResolutionState::Resolved(resolved)) =
                pending.get(&(IdentifierCategory::Patient, entry.patient.value.clone()))
            {
                edits.push(Edit {
                    location: entry.patient.site.clone(),
                    replacement: escape_xml_attr(&render_cx_enterprise(resolved)),
                });
            }

            for author in &entry.authors {
                if let Some(ResolutionState::Resolved(resolved)) =
                    pending.get(&(IdentifierCategory::Provider, author.value.id.clone()))
                {
                    edits.push(Edit {
                        location: author.site.clone(),
                        replacement: escape_xml_attr(&resolved.value),
                    });
                }
            }

            if let Some(facility) = &entry.facility {
                if let Some(ResolutionState::Resolved(resolved)) =
                    pending.get(&(IdentifierCategory::Facility, facility.value.id.clone()))
                {
                    edits.push(Edit {
                        location: facility.site.clone(),
                        replacement: escape_xml_attr(&resolved.value),
                    });
                }
            }
        }

        rewriter::apply_edits(&envelope.source, edits)
    }

    async fn publish_new_documents(&self, envelope: &ParsedEnvelope, pending: &ResolutionMap) {
        for entry in &envelope.document_entries {
            let facility_id = entry.facility.as_ref().and_then(|facility| {
                match pending.get(&(IdentifierCategory::Facility, facility.value.id.clone())) {
                    Some(ResolutionState::Resolved(resolved)) => Some(resolved.value.clone()),
                    _ => None,
                }
            });
            self.publisher
                .publish(NewDocumentRegistered {
                    doc_id: entry.entry_id.clone(),
                    facility_id,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NullAuditSink, NullSubscriptionPublisher};
    use crate::identity_feed::InternalIdentityFeed;
    use crate::parser::fixtures;
    use crate::resolver::InternalResolver;

    fn orchestrator_with(
        config: OrchestratorConfig,
        resolver: InternalResolver,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(config),
            Arc::new(resolver),
            Arc::new(InternalIdentityFeed),
            Arc::new(NullSubscriptionPublisher),
            Arc::new(NullAuditSink),
        )
    }

    #[tokio::test]
    async fn s2_s3_enrichment_rewrites_submission_set_and_document_entry() {
        let patient_source = Identifier::new("1111111111", AssigningAuthority::new("", "1.2.3", "ISO"));
        let patient_ecid = Identifier::new("ECID1", AssigningAuthority::ecid());
        let provider_source = Identifier::new("12345", AssigningAuthority::new("", "", ""));
        let provider_epid = Identifier::new("EPID1", AssigningAuthority::epid());
        let facility1 = Identifier::new("45", AssigningAuthority::new("", "1.2.3.4.5.6.7.8.9.1789", ""));
        let facility1_elid = Identifier::new("ELID1", AssigningAuthority::elid());
        let facility2 = Identifier::new("53", AssigningAuthority::new("", "1.2.3.4.5.6.7.8.9.1789", ""));
        let facility2_elid = Identifier::new("ELID2", AssigningAuthority::elid());

        let resolver = InternalResolver::new()
            .with_mapping(patient_source, patient_ecid.clone())
            .with_mapping(provider_source, provider_epid)
            .with_mapping(facility1, facility1_elid)
            .with_mapping(facility2, facility2_elid);

        let orchestrator = orchestrator_with(OrchestratorConfig::default(), resolver);
        let envelope = Bytes::from(fixtures::pnr_two_documents_shared_patient());
        let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;

        match outcome {
            OrchestrateOutcome::Completed { envelope } => {
                // Re-parsing (rather than matching the raw, still-escaped
                // bytes) both proves §8 property 3 ("the output envelope
                // parses") and compares the *decoded* attribute value, which
                // is what S2/S3 actually specify.
                let reparsed = parser::parse_envelope(envelope).expect("enriched envelope must parse");
                assert_eq!(reparsed.submission_set.patient.value, patient_ecid);
                assert_eq!(reparsed.document_entries.len(), 2);
                for entry in &reparsed.document_entries {
                    assert_eq!(entry.patient.value, patient_ecid);
                }
            }
            OrchestrateOutcome::Failed { registry_response } => {
                panic!("expected success, got {:?}", std::str::from_utf8(&registry_response));
            }
        }
    }

    #[tokio::test]
    async fn s4_patient_miss_without_auto_register_surfaces_unknown_patient_per_id() {
        let resolver = InternalResolver::new();
        let config = OrchestratorConfig {
            patients_auto_register: false,
            ..Default::default()
        };
        let orchestrator = orchestrator_with(config, resolver);
        let envelope = Bytes::from(fixtures::pnr_two_unresolved_patients());
        let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;

        match outcome {
            OrchestrateOutcome::Failed { registry_response } => {
                let xml = std::str::from_utf8(&registry_response).unwrap();
                assert!(xml.contains("XDSUnknownPatientId"));
                assert!(xml.contains("76cc765a442f410^^^&amp;1.3.6.1.4.1.21367.2005.3.7&amp;ISO"));
                assert!(xml.contains("1111111111^^^&amp;1.2.3&amp;ISO"));
            }
            OrchestrateOutcome::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn s5_facility_miss_surfaces_repository_error_with_facility_name() {
        let patient_source = Identifier::new("1111111111", AssigningAuthority::new("", "1.2.3", "ISO"));
        let patient_ecid = Identifier::new("ECID1", AssigningAuthority::ecid());
        let provider_source = Identifier::new("12345", AssigningAuthority::new("", "", ""));
        let provider_epid = Identifier::new("EPID1", AssigningAuthority::epid());

        let resolver = InternalResolver::new()
            .with_mapping(patient_source, patient_ecid)
            .with_mapping(provider_source, provider_epid);

        let orchestrator = orchestrator_with(OrchestratorConfig::default(), resolver);
        let envelope = Bytes::from(fixtures::pnr_two_documents_shared_patient());
        let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;

        match outcome {
            OrchestrateOutcome::Failed { registry_response } => {
                let xml = std::str::from_utf8(&registry_response).unwrap();
                assert!(xml.contains("Some Hospital^^^^^&amp;1.2.3.4.5.6.7.8.9.1789^^^^45"));
                assert!(xml.contains("Some Hospital^^^^^&amp;1.2.3.4.5.6.7.8.9.1789^^^^53"));
            }
            OrchestrateOutcome::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn provider_resolution_is_skipped_when_disabled() {
        let resolver = InternalResolver::new();
        let config = OrchestratorConfig {
            providers_enrich: false,
            facilities_enrich: false,
            patients_auto_register: false,
            ..Default::default()
        };
        // patient still needs to resolve for this to complete; map it.
        let patient_source = Identifier::new("1111111111", AssigningAuthority::new("", "1.2.3", "ISO"));
        let resolver = resolver.with_mapping(patient_source, Identifier::new("ECID1", AssigningAuthority::ecid()));
        let orchestrator = orchestrator_with(config, resolver);
        let envelope = Bytes::from(fixtures::pnr_two_documents_shared_patient());
        let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;

        assert!(matches!(outcome, OrchestrateOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn preparsed_bypass_skips_c1_and_still_enriches() {
        let patient_source = Identifier::new("1111111111", AssigningAuthority::new("", "1.2.3", "ISO"));
        let patient_ecid = Identifier::new("ECID1", AssigningAuthority::ecid());
        let provider_source = Identifier::new("12345", AssigningAuthority::new("", "", ""));
        let provider_epid = Identifier::new("EPID1", AssigningAuthority::epid());
        let facility1 = Identifier::new("45", AssigningAuthority::new("", "1.2.3.4.5.6.7.8.9.1789", ""));
        let facility1_elid = Identifier::new("ELID1", AssigningAuthority::elid());
        let facility2 = Identifier::new("53", AssigningAuthority::new("", "1.2.3.4.5.6.7.8.9.1789", ""));
        let facility2_elid = Identifier::new("ELID2", AssigningAuthority::elid());

        let resolver = InternalResolver::new()
            .with_mapping(patient_source, patient_ecid)
            .with_mapping(provider_source, provider_epid)
            .with_mapping(facility1, facility1_elid)
            .with_mapping(facility2, facility2_elid);

        let orchestrator = orchestrator_with(OrchestratorConfig::default(), resolver);
        let bytes = Bytes::from(fixtures::pnr_two_documents_shared_patient());
        let parsed = parser::parse_envelope(bytes).expect("pre-parse upstream");

        let outcome = orchestrator.orchestrate_preparsed(parsed, AttachmentMap::new()).await;
        match outcome {
            OrchestrateOutcome::Completed { envelope } => {
                let reparsed = parser::parse_envelope(envelope).expect("enriched envelope must parse");
                let expected = Identifier::new("ECID1", AssigningAuthority::ecid());
                assert_eq!(reparsed.submission_set.patient.value, expected);
                for entry in &reparsed.document_entries {
                    assert_eq!(entry.patient.value, expected);
                }
            }
            OrchestrateOutcome::Failed { registry_response } => {
                panic!("expected success, got {:?}", std::str::from_utf8(&registry_response));
            }
        }
    }

    #[tokio::test]
    async fn malformed_envelope_surfaces_registry_error() {
        let orchestrator = orchestrator_with(OrchestratorConfig::default(), InternalResolver::new());
        let envelope = Bytes::from_static(b"<not-xml");
        let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;
        match outcome {
            OrchestrateOutcome::Failed { registry_response } => {
                let xml = std::str::from_utf8(&registry_response).unwrap();
                assert!(xml.contains("XDSRegistryError"));
            }
            OrchestrateOutcome::Completed { .. } => panic!("expected failure"),
        }
    }
}
