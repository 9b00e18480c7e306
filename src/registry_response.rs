// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XDS `RegistryResponseType` serialization for the orchestrator's two
//! terminal outcomes. Both are wrapped at HTTP 200 by the hosting
//! transport (§6.1) — the status lives in the XML body, not the HTTP
//! status line.

use bytes::Bytes;

use crate::error::{RegistryError, Severity};

const RS_NS: &str = "urn:oasis:names:tc:ebxml-regrep:xsd:rs:3.0";
const RIM_NS: &str = "urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0";

/// Build the `Failure` response body carrying one `RegistryError` per
/// entry in `errors` (§7, §8 property 5).
pub fn failure_response(errors: &[RegistryError]) -> Bytes {
    let mut body = format!(
        r#"<ns2:RegistryResponse xmlns:ns2="{rs}" xmlns:ns3="{rim}" status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Failure"><ns2:RegistryErrorList>"#,
        rs = RS_NS,
        rim = RIM_NS,
    );
    for error in errors {
        body.push_str(&format!(
            r#"<ns3:RegistryError errorCode="{code}" codeContext="{context}" severity="urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:{severity}"/>"#,
            code = escape_xml_attr(&error.code),
            context = escape_xml_attr(&error.code_context),
            severity = error.severity.as_str(),
        ));
    }
    body.push_str("</ns2:RegistryErrorList></ns2:RegistryResponse>");
    Bytes::from(body)
}

/// Escape the characters that are unsafe inside a double-quoted XML
/// attribute value. `&` must come first so `&amp;` is not itself escaped.
///
/// Shared with the rewriter (§4.5): any enterprise identifier spliced back
/// into an attribute value goes through here too, since a CX/XCN value can
/// itself contain a bare `&` (e.g. `ECID1^^^ECID&ECID&ECID`).
pub(crate) fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssigningAuthority, Identifier};

    #[test]
    fn failure_response_escapes_ampersands_in_code_context() {
        let id = Identifier::new(
            "76cc765a442f410",
            AssigningAuthority::new("", "1.3.6.1.4.1.21367.2005.3.7", "ISO"),
        );
        let context = crate::hl7::composite::render_patient_error_cx(&id);
        let error = RegistryError::new("XDSUnknownPatientId", format!("Failed to resolve patient identifier: {}", context), Severity::Error);
        let response = failure_response(&[error]);
        let xml = std::str::from_utf8(&response).unwrap();
        assert!(xml.contains(
            r#"codeContext="Failed to resolve patient identifier: 76cc765a442f410^^^&amp;1.3.6.1.4.1.21367.2005.3.7&amp;ISO""#
        ));
        assert!(xml.contains(r#"errorCode="XDSUnknownPatientId""#));
    }

    #[test]
    fn failure_response_carries_one_entry_per_error() {
        let errors = vec![
            RegistryError::new("XDSUnknownPatientId", "a", Severity::Error),
            RegistryError::new("XDSUnknownPatientId", "b", Severity::Error),
        ];
        let response = failure_response(&errors);
        let xml = std::str::from_utf8(&response).unwrap();
        assert_eq!(xml.matches("RegistryError ").count(), 2);
    }
}
