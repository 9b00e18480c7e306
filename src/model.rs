// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core data model: identifiers, occurrences, and per-transaction state.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

/// A PIX/HL7 assigning authority triple. At least one component is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssigningAuthority {
    pub namespace_id: String,
    pub universal_id: String,
    pub universal_id_type: String,
}

impl AssigningAuthority {
    pub fn new(
        namespace_id: impl Into<String>,
        universal_id: impl Into<String>,
        universal_id_type: impl Into<String>,
    ) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            universal_id: universal_id.into(),
            universal_id_type: universal_id_type.into(),
        }
    }

    /// Named defaults, per OrchestratorConfig's per-category targets.
    pub fn ecid() -> Self {
        Self::new("ECID", "ECID", "ECID")
    }

    pub fn epid() -> Self {
        Self::new("EPID", "EPID", "EPID")
    }

    pub fn elid() -> Self {
        Self::new("ELID", "ELID", "ELID")
    }

    pub fn is_empty(&self) -> bool {
        self.namespace_id.is_empty()
            && self.universal_id.is_empty()
            && self.universal_id_type.is_empty()
    }
}

/// An identifier value plus the authority that assigned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub value: String,
    pub authority: AssigningAuthority,
}

impl Identifier {
    pub fn new(value: impl Into<String>, authority: AssigningAuthority) -> Self {
        Self {
            value: value.into(),
            authority,
        }
    }
}

/// The category an identifier occurrence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierCategory {
    Patient,
    Provider,
    Facility,
}

impl IdentifierCategory {
    pub fn default_target_authority(&self) -> AssigningAuthority {
        match self {
            Self::Patient => AssigningAuthority::ecid(),
            Self::Provider => AssigningAuthority::epid(),
            Self::Facility => AssigningAuthority::elid(),
        }
    }
}

/// A byte range into the original envelope buffer that must be overwritten
/// when the identifier it names is resolved. This is the "opaque handle
/// into the parsed DOM" required by the spec: the extractor records it once,
/// the rewriter splices it later without re-walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomLocation {
    pub value_range: Range<usize>,
}

/// A single sighting of an identifier somewhere in the envelope. Multiple
/// sightings of the same (category, identifier) collapse into one
/// occurrence carrying every site that must be rewritten together.
#[derive(Debug, Clone)]
pub struct IdentifierOccurrence {
    pub category: IdentifierCategory,
    pub identifier: Identifier,
    pub sites: Vec<DomLocation>,
}

/// Key used to dedup occurrences and to key the resolution map.
pub type ResolutionKey = (IdentifierCategory, Identifier);

/// Outcome of resolving one key against the MPI / Client Registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    InFlight,
    Resolved(Identifier),
    NotFound,
    Error(String),
}

impl ResolutionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Mapping from (category, identifier) to its resolution state. Insertion
/// establishes the at-most-one-outstanding-call-per-key invariant: a key is
/// only ever inserted once, before fan-out begins.
#[derive(Debug, Default, Clone)]
pub struct ResolutionMap {
    entries: HashMap<ResolutionKey, ResolutionState>,
}

impl ResolutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key as `InFlight` if not already present. Returns `true` if
    /// this call established the entry (i.e. a resolve call should be
    /// issued), `false` if the key was already tracked (dedup hit).
    pub fn track(&mut self, key: ResolutionKey) -> bool {
        if self.entries.contains_key(&key) {
            false
        } else {
            self.entries.insert(key, ResolutionState::InFlight);
            true
        }
    }

    pub fn set(&mut self, key: &ResolutionKey, state: ResolutionState) {
        self.entries.insert(key.clone(), state);
    }

    pub fn get(&self, key: &ResolutionKey) -> Option<&ResolutionState> {
        self.entries.get(key)
    }

    pub fn all_settled(&self) -> bool {
        self.entries.values().all(|s| !s.is_in_flight())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResolutionKey, &ResolutionState)> {
        self.entries.iter()
    }

    pub fn keys_in_category(
        &self,
        category: IdentifierCategory,
    ) -> impl Iterator<Item = &ResolutionKey> {
        self.entries
            .keys()
            .filter(move |(cat, _)| *cat == category)
    }

    pub fn unresolved_in_category(&self, category: IdentifierCategory) -> Vec<&ResolutionKey> {
        self.entries
            .iter()
            .filter(|((cat, _), state)| *cat == category && !state.is_resolved())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// MTOM attachment bytes keyed by content id (the `cid:` reference a
/// `Document`/`xop:Include` element in the PnR envelope points at). Kept
/// separate from `PnRTransaction` since attachments are read-only input,
/// never rewritten by C5.
pub type AttachmentMap = HashMap<String, bytes::Bytes>;

/// One in-flight Provide-and-Register transaction. Owned exclusively by its
/// orchestrator task; never shared across transactions.
pub struct PnRTransaction {
    pub correlation_id: Uuid,
    pub original_envelope: bytes::Bytes,
    pub occurrences: Vec<IdentifierOccurrence>,
    pub pending: ResolutionMap,
    pub errors: Vec<RegistryError>,
}

impl PnRTransaction {
    pub fn new(correlation_id: Uuid, original_envelope: bytes::Bytes) -> Self {
        Self {
            correlation_id,
            original_envelope,
            occurrences: Vec::new(),
            pending: ResolutionMap::new(),
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigning_authority_defaults_are_named() {
        assert_eq!(AssigningAuthority::ecid().namespace_id, "ECID");
        assert_eq!(AssigningAuthority::epid().universal_id_type, "EPID");
        assert_eq!(AssigningAuthority::elid().universal_id, "ELID");
    }

    #[test]
    fn resolution_map_dedups_same_key() {
        let mut map = ResolutionMap::new();
        let key = (
            IdentifierCategory::Patient,
            Identifier::new("1111111111", AssigningAuthority::new("", "1.2.3", "ISO")),
        );
        assert!(map.track(key.clone()));
        assert!(!map.track(key.clone()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn resolution_map_all_settled_requires_no_in_flight() {
        let mut map = ResolutionMap::new();
        let key = (
            IdentifierCategory::Patient,
            Identifier::new("123", AssigningAuthority::ecid()),
        );
        map.track(key.clone());
        assert!(!map.all_settled());
        map.set(&key, ResolutionState::NotFound);
        assert!(map.all_settled());
    }

    #[test]
    fn unresolved_in_category_filters_by_category_and_state() {
        let mut map = ResolutionMap::new();
        let patient_key = (
            IdentifierCategory::Patient,
            Identifier::new("123", AssigningAuthority::ecid()),
        );
        let facility_key = (
            IdentifierCategory::Facility,
            Identifier::new("456", AssigningAuthority::elid()),
        );
        map.track(patient_key.clone());
        map.track(facility_key.clone());
        map.set(&patient_key, ResolutionState::NotFound);
        map.set(&facility_key, ResolutionState::Resolved(Identifier::new(
            "ELID1",
            AssigningAuthority::elid(),
        )));

        let unresolved = map.unresolved_in_category(IdentifierCategory::Patient);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0], &patient_key);
    }
}
