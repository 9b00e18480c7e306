// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C5 — Enrichment Rewriter.
//!
//! Splices resolved identifier values directly into the original envelope
//! bytes at the `DomLocation` ranges C1/C2 recorded, instead of
//! re-serializing a mutated `roxmltree::Document`. Applying edits in
//! descending byte-offset order keeps every not-yet-applied range valid,
//! since only bytes strictly after it have moved (§4.5).

use bytes::Bytes;

use crate::model::DomLocation;

/// One identifier rewrite: the original byte range and its replacement
/// text.
#[derive(Debug, Clone)]
pub struct Edit {
    pub location: DomLocation,
    pub replacement: String,
}

/// Splice `edits` into `source`, returning the enriched envelope. Ranges
/// must not overlap; this is upheld by construction since every
/// `DomLocation` names a distinct identifier value span.
pub fn apply_edits(source: &Bytes, mut edits: Vec<Edit>) -> Bytes {
    edits.sort_by(|a, b| b.location.value_range.start.cmp(&a.location.value_range.start));

    let mut buf = source.to_vec();
    for edit in edits {
        let range = edit.location.value_range.clone();
        buf.splice(range, edit.replacement.into_bytes());
    }
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splices_non_overlapping_edits_regardless_of_input_order() {
        let source = Bytes::from_static(b"AAAA-BBBB-CCCC");
        let edits = vec![
            Edit {
                location: DomLocation { value_range: 0..4 },
                replacement: "11".to_string(),
            },
            Edit {
                location: DomLocation { value_range: 10..14 },
                replacement: "2222222".to_string(),
            },
        ];
        let result = apply_edits(&source, edits);
        assert_eq!(result.as_ref(), b"11-BBBB-2222222");
    }

    #[test]
    fn shrinking_edit_does_not_corrupt_earlier_untouched_bytes() {
        let source = Bytes::from_static(b"patient=1111111111 facility=45");
        let edits = vec![Edit {
            location: DomLocation { value_range: 8..18 },
            replacement: "ECID1".to_string(),
        }];
        let result = apply_edits(&source, edits);
        assert_eq!(result.as_ref(), b"patient=ECID1 facility=45");
    }

    #[test]
    fn no_edits_returns_source_unchanged() {
        let source = Bytes::from_static(b"unchanged");
        let result = apply_edits(&source, Vec::new());
        assert_eq!(result, source);
    }
}
