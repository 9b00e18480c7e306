// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CX / XCN / XON composite parsing and the `codeContext` renderers whose
//! exact shapes are wire-contract (see §8 S4/S5 of SPEC_FULL.md).
//!
//! `str::split` preserves empty trailing components in Rust (unlike some
//! other languages' string-split primitives), so `split_components` below
//! is a thin, explicitly-documented wrapper rather than a workaround.

use std::ops::Range;

use crate::model::{AssigningAuthority, Identifier};

/// Split a composite field on `sep`, preserving empty components —
/// including empty trailing ones, which HL7 composite fields rely on to
/// mark absent optional components.
pub fn split_components(field: &str, sep: char) -> Vec<&str> {
    field.split(sep).collect()
}

/// Byte range of the nth `sep`-delimited component within `field`, relative
/// to the start of `field` itself (callers add their own absolute offset).
pub fn component_range(field: &str, index: usize, sep: char) -> Option<Range<usize>> {
    let mut start = 0usize;
    for (i, part) in field.split(sep).enumerate() {
        let end = start + part.len();
        if i == index {
            return Some(start..end);
        }
        start = end + sep.len_utf8();
    }
    None
}

/// Parse a CX-form identifier: `value^^^namespace&universalId&universalIdType`.
pub fn parse_cx(field: &str) -> Identifier {
    let comps = split_components(field, '^');
    let value = comps.first().copied().unwrap_or("").to_string();
    let authority_field = comps.get(3).copied().unwrap_or("");
    let sub = split_components(authority_field, '&');
    let namespace_id = sub.first().copied().unwrap_or("").to_string();
    let universal_id = sub.get(1).copied().unwrap_or("").to_string();
    let universal_id_type = sub.get(2).copied().unwrap_or("").to_string();
    Identifier::new(value, AssigningAuthority::new(namespace_id, universal_id, universal_id_type))
}

/// Render the enterprise CX form used to overwrite a patient identifier in
/// place (§4.5): `{value}^^^{namespace}&{universalId}&{universalIdType}`.
pub fn render_cx_enterprise(identifier: &Identifier) -> String {
    format!(
        "{}^^^{}&{}&{}",
        identifier.value,
        identifier.authority.namespace_id,
        identifier.authority.universal_id,
        identifier.authority.universal_id_type
    )
}

/// An extended composite name (XCN) — author/provider identifier plus name
/// components. Only the id-number component is ever rewritten; name and
/// qualification components are preserved untouched (§4.5).
#[derive(Debug, Clone)]
pub struct Xcn {
    pub id: Identifier,
    pub family_name: String,
    pub given_name: String,
    pub middle_name: String,
    pub suffix: String,
    pub prefix: String,
    pub degree: String,
}

/// Parse an XCN: `idNumber^familyName^givenName^middleName^suffix^prefix^degree^...^namespace&universalId&type`.
pub fn parse_xcn(field: &str) -> Xcn {
    let comps = split_components(field, '^');
    let get = |i: usize| comps.get(i).copied().unwrap_or("").to_string();
    let authority_field = comps.get(8).copied().unwrap_or("");
    let sub = split_components(authority_field, '&');
    let namespace_id = sub.first().copied().unwrap_or("").to_string();
    let universal_id = sub.get(1).copied().unwrap_or("").to_string();
    let universal_id_type = sub.get(2).copied().unwrap_or("").to_string();
    Xcn {
        id: Identifier::new(get(0), AssigningAuthority::new(namespace_id, universal_id, universal_id_type)),
        family_name: get(1),
        given_name: get(2),
        middle_name: get(3),
        suffix: get(4),
        prefix: get(5),
        degree: get(6),
    }
}

/// An organization name (XON) — facility identifier plus the facility's
/// display name, decoded from the wire shape the source's
/// `healthcareFacility` slot value uses: `name^^^^^&universalId^^^^idNumber`.
#[derive(Debug, Clone)]
pub struct Xon {
    pub name: String,
    pub id: Identifier,
}

pub fn parse_xon(field: &str) -> Xon {
    let comps = split_components(field, '^');
    let name = comps.first().copied().unwrap_or("").to_string();
    let authority_field = comps.get(5).copied().unwrap_or("");
    let sub = split_components(authority_field, '&');
    let namespace_id = sub.first().copied().unwrap_or("").to_string();
    let universal_id = sub.get(1).copied().unwrap_or("").to_string();
    let id_number = comps.get(9).copied().unwrap_or("").to_string();
    Xon {
        name,
        id: Identifier::new(id_number, AssigningAuthority::new(namespace_id, universal_id, "")),
    }
}

/// `codeContext` rendering for an unresolved patient identifier:
/// `value^^^&universalId&universalIdType` (namespace omitted — §9).
pub fn render_patient_error_cx(identifier: &Identifier) -> String {
    format!(
        "{}^^^&{}&{}",
        identifier.value, identifier.authority.universal_id, identifier.authority.universal_id_type
    )
}

/// `codeContext` rendering for an unresolved provider (XCN) identifier:
/// `value^^^^^^^^&universalId`.
pub fn render_provider_error_cx(identifier: &Identifier) -> String {
    format!("{}^^^^^^^^&{}", identifier.value, identifier.authority.universal_id)
}

/// `codeContext` rendering for an unresolved facility (XON) identifier:
/// `name^^^^^&universalId^^^^idNumber`.
pub fn render_facility_error_cx(name: &str, identifier: &Identifier) -> String {
    format!(
        "{}^^^^^&{}^^^^{}",
        name, identifier.authority.universal_id, identifier.value
    )
}
