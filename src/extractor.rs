// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C2 — Identifier Extractor.
//!
//! Walks a `ParsedEnvelope` and collapses every sighting of a patient,
//! provider, or facility identifier into one `IdentifierOccurrence` per
//! distinct `(category, identifier)` key, carrying every `DomLocation` that
//! must be rewritten together once the key resolves (§4.2).

use std::collections::HashMap;

use crate::model::{IdentifierCategory, IdentifierOccurrence, ResolutionKey};
use crate::parser::ParsedEnvelope;

/// Extract and dedup every identifier occurrence in `envelope`.
///
/// The SubmissionSet patient identifier and every DocumentEntry patient
/// identifier are expected to agree (§4.2 "single patient" invariant); this
/// function does not enforce that — it just records every site under
/// whatever keys it observes, so the orchestrator can detect and reject
/// disagreement (`AmbiguousPatient`) as a triage step instead of losing the
/// evidence here.
pub fn extract_occurrences(envelope: &ParsedEnvelope) -> Vec<IdentifierOccurrence> {
    let mut by_key: HashMap<ResolutionKey, IdentifierOccurrence> = HashMap::new();

    push_site(
        &mut by_key,
        IdentifierCategory::Patient,
        envelope.submission_set.patient.value.clone(),
        envelope.submission_set.patient.site.clone(),
    );

    for entry in &envelope.document_entries {
        push_site(
            &mut by_key,
            IdentifierCategory::Patient,
            entry.patient.value.clone(),
            entry.patient.site.clone(),
        );

        for author in &entry.authors {
            push_site(
                &mut by_key,
                IdentifierCategory::Provider,
                author.value.id.clone(),
                author.site.clone(),
            );
        }

        if let Some(facility) = &entry.facility {
            push_site(
                &mut by_key,
                IdentifierCategory::Facility,
                facility.value.id.clone(),
                facility.site.clone(),
            );
        }
    }

    by_key.into_values().collect()
}

fn push_site(
    by_key: &mut HashMap<ResolutionKey, IdentifierOccurrence>,
    category: IdentifierCategory,
    identifier: crate::model::Identifier,
    site: crate::model::DomLocation,
) {
    let key: ResolutionKey = (category, identifier.clone());
    by_key
        .entry(key)
        .or_insert_with(|| IdentifierOccurrence {
            category,
            identifier,
            sites: Vec::new(),
        })
        .sites
        .push(site);
}

/// Distinct facility display names keyed by facility identifier, read
/// straight off the parsed envelope — the extractor's occurrences drop the
/// display name (only the identifier matters for resolution), but the
/// facility-error `codeContext` (§8 S5) needs it back. Kept as a side table
/// instead of folding `name` into `IdentifierOccurrence` itself, since no
/// other category carries a display name.
pub fn facility_names(envelope: &ParsedEnvelope) -> HashMap<crate::model::Identifier, String> {
    let mut names = HashMap::new();
    for entry in &envelope.document_entries {
        if let Some(facility) = &entry.facility {
            names
                .entry(facility.value.id.clone())
                .or_insert_with(|| facility.value.name.clone());
        }
    }
    names
}
