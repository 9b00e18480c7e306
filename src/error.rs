// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Orchestrator errors and their mapping onto XDS `RegistryError` entries.

use thiserror::Error;

use crate::model::Identifier;

/// Severity of an XDS `RegistryError` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
        }
    }
}

/// One `<RegistryError>` entry destined for a `RegistryResponseType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError {
    pub code: String,
    pub code_context: String,
    pub severity: Severity,
}

impl RegistryError {
    pub fn new(code: impl Into<String>, code_context: impl Into<String>, severity: Severity) -> Self {
        Self {
            code: code.into(),
            code_context: code_context.into(),
            severity,
        }
    }
}

/// Top-level orchestration failure kinds (§7).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("malformed PnR envelope: {0}")]
    MalformedRequest(String),

    #[error("unknown patient identifier: {0:?}")]
    UnknownPatient(Identifier),

    #[error("unresolved provider identifier: {0:?}")]
    UnresolvedProvider(Identifier),

    #[error("unresolved facility identifier: {name} {identifier:?}")]
    UnresolvedFacility { name: String, identifier: Identifier },

    #[error("external transport error: {0}")]
    ExternalTransportError(String),

    #[error("orchestration timed out")]
    Timeout,

    #[error("PnR contains ambiguous patient identity (multiple distinct ECIDs)")]
    AmbiguousPatient,
}

impl OrchestratorError {
    /// Render this failure as the XDS `RegistryError` entries it surfaces.
    /// Most variants surface exactly one entry; callers that need the
    /// "one entry per unresolved identifier" aggregation (§7, §8 property 5)
    /// build a `Vec<RegistryError>` directly from the `ResolutionMap`
    /// instead of going through a single `OrchestratorError`.
    pub fn to_registry_error(&self) -> RegistryError {
        match self {
            Self::MalformedRequest(msg) => {
                RegistryError::new("XDSRegistryError", msg.clone(), Severity::Error)
            }
            Self::UnknownPatient(id) => RegistryError::new(
                "XDSUnknownPatientId",
                format!("Failed to resolve patient identifier: {}", crate::hl7::composite::render_patient_error_cx(id)),
                Severity::Error,
            ),
            Self::UnresolvedProvider(id) => RegistryError::new(
                "XDSRepositoryError",
                format!("Failed to resolve provider identifier: {}", crate::hl7::composite::render_provider_error_cx(id)),
                Severity::Error,
            ),
            Self::UnresolvedFacility { name, identifier } => RegistryError::new(
                "XDSRepositoryError",
                format!(
                    "Failed to resolve facility identifier: {}",
                    crate::hl7::composite::render_facility_error_cx(name, identifier)
                ),
                Severity::Error,
            ),
            Self::ExternalTransportError(msg) => {
                RegistryError::new("XDSRepositoryError", msg.clone(), Severity::Error)
            }
            Self::Timeout => {
                RegistryError::new("XDSRepositoryError", "Orchestration timed out", Severity::Error)
            }
            Self::AmbiguousPatient => RegistryError::new(
                "XDSRegistryError",
                "PnR references multiple distinct patient identities",
                Severity::Error,
            ),
        }
    }
}
