// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C1 — PnR Parser.
//!
//! Decodes a PnR SOAP envelope into a `roxmltree::Document`, then locates
//! the well-known registry objects (SubmissionSet, DocumentEntries, their
//! external identifiers and author/facility slots) and records the byte
//! range of each identifier's value within the *original* buffer.
//!
//! We deliberately never build a second, mutable tree. `roxmltree::Document`
//! is read-only by design; the byte ranges recorded here are handed to the
//! rewriter (C5), which splices the original buffer directly. That is what
//! keeps untouched bytes — element order, attribute shape, whitespace —
//! wire-identical to the input (§4.5).

use std::ops::Range;

use bytes::Bytes;
use roxmltree::{Document, Node};

use crate::hl7::composite::{component_range, parse_cx, parse_xcn, parse_xon, Xcn, Xon};
use crate::model::{DomLocation, Identifier};

/// Well-known classification/identification scheme UUIDs (§4.1).
pub const SUBMISSION_SET_PATIENT_ID_SCHEME: &str =
    "urn:uuid:6b5aea1a-874d-4603-a4bc-96a0a7b38446";
pub const DOCUMENT_ENTRY_PATIENT_ID_SCHEME: &str =
    "urn:uuid:58a6f841-87b3-4a3e-92fd-a8ffeff98427";
pub const AUTHOR_PERSON_CLASSIFICATION_SCHEME: &str =
    "urn:uuid:93606bcf-9494-43ec-9b4e-a7748d1a838d";

/// Facility slot name this implementation reads (§4.2: "each
/// `healthcareFacility` slot value").
const HEALTHCARE_FACILITY_SLOT: &str = "healthcareFacility";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to parse envelope XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("envelope does not contain a SubmissionSet (RegistryPackage)")]
    MissingSubmissionSet,

    #[error("SubmissionSet is missing its patient identifier")]
    MissingSubmissionSetPatientId,

    #[error("DocumentEntry {0} is missing its patient identifier")]
    MissingDocumentEntryPatientId(String),

    #[error("invalid UTF-8 in envelope: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// One sighting of an identifier/composite field plus the byte range that
/// must be overwritten when it is resolved.
#[derive(Debug, Clone)]
pub struct FieldRef<T> {
    pub value: T,
    pub site: DomLocation,
}

#[derive(Debug, Clone)]
pub struct SubmissionSetRef {
    pub patient: FieldRef<Identifier>,
}

#[derive(Debug, Clone)]
pub struct DocumentEntryRef {
    pub entry_id: String,
    pub patient: FieldRef<Identifier>,
    pub authors: Vec<FieldRef<Xcn>>,
    pub facility: Option<FieldRef<Xon>>,
    pub mime_type: Option<String>,
    pub content_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    pub source: Bytes,
    pub submission_set: SubmissionSetRef,
    pub document_entries: Vec<DocumentEntryRef>,
}

/// Parse PnR envelope bytes into located registry objects.
pub fn parse_envelope(source: Bytes) -> Result<ParsedEnvelope, ParseError> {
    let text = std::str::from_utf8(&source)?;
    let doc = Document::parse(text)?;

    let submission_set_node = doc
        .descendants()
        .find(|n| n.is_element() && local_name(n) == "RegistryPackage")
        .ok_or(ParseError::MissingSubmissionSet)?;

    let ss_patient_field = external_identifier_value(text, &submission_set_node, SUBMISSION_SET_PATIENT_ID_SCHEME)
        .ok_or(ParseError::MissingSubmissionSetPatientId)?;

    let mut document_entries = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && local_name(n) == "ExtrinsicObject")
    {
        let entry_id = node.attribute("id").unwrap_or_default().to_string();

        let patient_field = external_identifier_value(text, &node, DOCUMENT_ENTRY_PATIENT_ID_SCHEME)
            .ok_or_else(|| ParseError::MissingDocumentEntryPatientId(entry_id.clone()))?;
        let patient = FieldRef {
            value: parse_cx(&patient_field.0),
            site: patient_field.1,
        };

        let authors = author_xcn_fields(text, &node);
        let facility = facility_xon_field(text, &node);
        let mime_type = node.attribute("mimeType").map(|s| s.to_string());
        let content_id = slot_value_text(&node, "URI").map(|(v, _)| strip_cid_prefix(&v));

        document_entries.push(DocumentEntryRef {
            entry_id,
            patient,
            authors,
            facility,
            mime_type,
            content_id,
        });
    }

    Ok(ParsedEnvelope {
        source,
        submission_set: SubmissionSetRef {
            patient: FieldRef {
                value: parse_cx(&ss_patient_field.0),
                site: ss_patient_field.1,
            },
        },
        document_entries,
    })
}

fn local_name(node: &Node) -> &str {
    node.tag_name().name()
}

/// Find an `ExternalIdentifier` child of `node` with the given
/// `identificationScheme`, returning its raw `value` attribute text plus
/// the byte range of that attribute's value in the original source.
fn external_identifier_value(
    source: &str,
    node: &Node,
    scheme: &str,
) -> Option<(String, DomLocation)> {
    let ext_id = node.children().find(|n| {
        n.is_element()
            && local_name(n) == "ExternalIdentifier"
            && n.attribute("identificationScheme") == Some(scheme)
    })?;
    // `node.attribute()` returns the entity-decoded value (required for
    // correct CX parsing — the raw source bytes still carry `&amp;`);
    // `attribute_value_range` separately locates the raw, un-decoded byte
    // span for the rewriter to splice into later.
    let value = ext_id.attribute("value")?.to_string();
    let range = attribute_value_range(source, &ext_id, "value")?;
    Some((value, DomLocation { value_range: range }))
}

fn author_xcn_fields(source: &str, doc_entry: &Node) -> Vec<FieldRef<Xcn>> {
    doc_entry
        .descendants()
        .filter(|n| {
            n.is_element()
                && local_name(n) == "Classification"
                && n.attribute("classificationScheme") == Some(AUTHOR_PERSON_CLASSIFICATION_SCHEME)
        })
        .filter_map(|classification| {
            let (text, text_range) = slot_value_text(&classification, "authorPerson")?;
            let xcn = parse_xcn(&text);
            // Only the id-number component (component 0) is ever rewritten;
            // name/qualification components are preserved untouched. The
            // range is computed over the *raw* (still entity-escaped)
            // source slice, not the decoded `text` — `text_range` is a raw
            // byte range, and an entity earlier in the field would shift a
            // decoded-text offset out from under it.
            let raw = source.get(text_range.clone())?;
            let id_range = component_range(raw, 0, '^')?;
            let site = DomLocation {
                value_range: (text_range.start + id_range.start)..(text_range.start + id_range.end),
            };
            Some(FieldRef { value: xcn, site })
        })
        .collect()
}

fn facility_xon_field(source: &str, doc_entry: &Node) -> Option<FieldRef<Xon>> {
    let (text, text_range) = slot_value_text(doc_entry, HEALTHCARE_FACILITY_SLOT)?;
    let xon = parse_xon(&text);
    // idNumber is component index 9 in our XON shape (§ hl7::composite).
    // Computed over the raw source slice, not the decoded `text` — an
    // `&amp;` in an earlier component (the assigning authority OID, XON
    // component 6) shifts decoded-text offsets out from under the raw
    // byte range the rewriter needs.
    let raw = source.get(text_range.clone())?;
    let id_range = component_range(raw, 9, '^')?;
    let site = DomLocation {
        value_range: (text_range.start + id_range.start)..(text_range.start + id_range.end),
    };
    Some(FieldRef { value: xon, site })
}

/// Find a descendant `Slot` with the given `name` and return the text
/// content of its single `Value` plus that text node's byte range.
fn slot_value_text(node: &Node, slot_name: &str) -> Option<(String, Range<usize>)> {
    let slot = node
        .descendants()
        .find(|n| n.is_element() && local_name(n) == "Slot" && n.attribute("name") == Some(slot_name))?;
    let value_node = slot
        .descendants()
        .find(|n| n.is_element() && local_name(n) == "Value")?;
    let text_node = value_node.children().find(|n| n.is_text())?;
    let range = text_node.range();
    Some((text_node.text().unwrap_or("").to_string(), range))
}

fn strip_cid_prefix(s: &str) -> String {
    s.strip_prefix("cid:").unwrap_or(s).to_string()
}

/// Locate the byte range of an attribute's *value* (excluding quotes)
/// within `node`'s opening tag, searched in the original source text.
/// `roxmltree::Document` doesn't expose per-attribute-value byte ranges
/// publicly, so this does the same bounded text search an editor's
/// "go to attribute" feature would.
fn attribute_value_range(source: &str, node: &Node, attr: &str) -> Option<Range<usize>> {
    let node_range = node.range();
    let slice = source.get(node_range.clone())?;
    let tag_end = opening_tag_end(slice);
    let head = &slice[..tag_end];
    let needle = format!("{}=\"", attr);
    let rel_start = head.find(&needle)? + needle.len();
    let rest = &head[rel_start..];
    let rel_end = rest.find('"')?;
    let abs_start = node_range.start + rel_start;
    let abs_end = abs_start + rel_end;
    Some(abs_start..abs_end)
}

/// Byte offset just past the end of the opening tag (`<Elem attr="...">`),
/// tolerant of `>` characters inside quoted attribute values.
fn opening_tag_end(s: &str) -> usize {
    let mut in_quotes = false;
    let mut quote_char = '"';
    for (i, c) in s.char_indices() {
        if in_quotes {
            if c == quote_char {
                in_quotes = false;
            }
        } else {
            match c {
                '"' | '\'' => {
                    in_quotes = true;
                    quote_char = c;
                }
                '>' => return i + 1,
                _ => {}
            }
        }
    }
    s.len()
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A minimal PnR envelope with two DocumentEntries sharing one patient
    /// identifier (§8 S1), one author, and one facility.
    pub fn pnr_two_documents_shared_patient() -> String {
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <lcm:SubmitObjectsRequest xmlns:lcm="urn:oasis:names:tc:ebxml-regrep:xsd:lcm:3.0">
      <rim:RegistryObjectList xmlns:rim="urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0">
        <rim:RegistryPackage id="SubmissionSet01">
          <rim:ExternalIdentifier identificationScheme="urn:uuid:6b5aea1a-874d-4603-a4bc-96a0a7b38446" value="1111111111^^^&amp;1.2.3&amp;ISO" registryObject="SubmissionSet01"/>
        </rim:RegistryPackage>
        <rim:ExtrinsicObject id="Document01" mimeType="text/xml">
          <rim:ExternalIdentifier identificationScheme="urn:uuid:58a6f841-87b3-4a3e-92fd-a8ffeff98427" value="1111111111^^^&amp;1.2.3&amp;ISO" registryObject="Document01"/>
          <rim:Classification classificationScheme="urn:uuid:93606bcf-9494-43ec-9b4e-a7748d1a838d" classifiedObject="Document01">
            <rim:Slot name="authorPerson">
              <rim:ValueList>
                <rim:Value>12345^Welby^Marcus^^^Dr</rim:Value>
              </rim:ValueList>
            </rim:Slot>
          </rim:Classification>
          <rim:Slot name="healthcareFacility">
            <rim:ValueList>
              <rim:Value>Some Hospital^^^^^&amp;1.2.3.4.5.6.7.8.9.1789^^^^45</rim:Value>
            </rim:ValueList>
          </rim:Slot>
        </rim:ExtrinsicObject>
        <rim:ExtrinsicObject id="Document02" mimeType="text/xml">
          <rim:ExternalIdentifier identificationScheme="urn:uuid:58a6f841-87b3-4a3e-92fd-a8ffeff98427" value="1111111111^^^&amp;1.2.3&amp;ISO" registryObject="Document02"/>
          <rim:Classification classificationScheme="urn:uuid:93606bcf-9494-43ec-9b4e-a7748d1a838d" classifiedObject="Document02">
            <rim:Slot name="authorPerson">
              <rim:ValueList>
                <rim:Value>12345^Welby^Marcus^^^Dr</rim:Value>
              </rim:ValueList>
            </rim:Slot>
          </rim:Classification>
          <rim:Slot name="healthcareFacility">
            <rim:ValueList>
              <rim:Value>Some Hospital^^^^^&amp;1.2.3.4.5.6.7.8.9.1789^^^^53</rim:Value>
            </rim:ValueList>
          </rim:Slot>
        </rim:ExtrinsicObject>
      </rim:RegistryObjectList>
    </lcm:SubmitObjectsRequest>
  </soap:Body>
</soap:Envelope>"#
            .to_string()
    }

    /// Two distinct patient identifiers, both unresolved (§8 S4).
    pub fn pnr_two_unresolved_patients() -> String {
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <lcm:SubmitObjectsRequest xmlns:lcm="urn:oasis:names:tc:ebxml-regrep:xsd:lcm:3.0">
      <rim:RegistryObjectList xmlns:rim="urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0">
        <rim:RegistryPackage id="SubmissionSet01">
          <rim:ExternalIdentifier identificationScheme="urn:uuid:6b5aea1a-874d-4603-a4bc-96a0a7b38446" value="76cc765a442f410^^^&amp;1.3.6.1.4.1.21367.2005.3.7&amp;ISO" registryObject="SubmissionSet01"/>
        </rim:RegistryPackage>
        <rim:ExtrinsicObject id="Document01" mimeType="text/xml">
          <rim:ExternalIdentifier identificationScheme="urn:uuid:58a6f841-87b3-4a3e-92fd-a8ffeff98427" value="1111111111^^^&amp;1.2.3&amp;ISO" registryObject="Document01"/>
        </rim:ExtrinsicObject>
      </rim:RegistryObjectList>
    </lcm:SubmitObjectsRequest>
  </soap:Body>
</soap:Envelope>"#
            .to_string()
    }
}
