// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Orchestrator configuration (§6.3).
//!
//! Supports both programmatic construction and file-based (TOML) loading,
//! mirroring the router's `RouterConfig::from_file` / `::validate` pattern.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::AssigningAuthority;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which resolver backend to use for `ResolverClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    Hl7Pix,
    Fhir,
    #[default]
    Internal,
}

/// Per-category target assigning authorities
/// (`client.requestedAssigningAuthority[...]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedAuthorities {
    #[serde(default = "default_patient_authority")]
    pub patient: AssigningAuthority,
    #[serde(default = "default_provider_authority")]
    pub provider: AssigningAuthority,
    #[serde(default = "default_facility_authority")]
    pub facility: AssigningAuthority,
}

impl Default for RequestedAuthorities {
    fn default() -> Self {
        Self {
            patient: default_patient_authority(),
            provider: default_provider_authority(),
            facility: default_facility_authority(),
        }
    }
}

fn default_patient_authority() -> AssigningAuthority {
    AssigningAuthority::ecid()
}

fn default_provider_authority() -> AssigningAuthority {
    AssigningAuthority::epid()
}

fn default_facility_authority() -> AssigningAuthority {
    AssigningAuthority::elid()
}

/// `fhir.mpiUrl` / `fhir.mpiClientName` / `fhir.mpiPassword`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    #[serde(default)]
    pub mpi_url: String,
    #[serde(default)]
    pub mpi_client_name: String,
    #[serde(default)]
    pub mpi_password: String,
    /// Enterprise identifier system URI matched against a returned FHIR
    /// Patient's `identifier.system` (§9 open question 2).
    #[serde(default = "default_enterprise_identifier_system")]
    pub enterprise_identifier_system: String,
}

fn default_enterprise_identifier_system() -> String {
    "http://openclientregistry.org/fhir/sourceid".to_string()
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            mpi_url: String::new(),
            mpi_client_name: String::new(),
            mpi_password: String::new(),
            enterprise_identifier_system: default_enterprise_identifier_system(),
        }
    }
}

/// `pix.manager.host` / `pix.manager.port`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixConfig {
    #[serde(default = "default_pix_host")]
    pub manager_host: String,
    #[serde(default = "default_pix_port")]
    pub manager_port: u16,
}

fn default_pix_host() -> String {
    "localhost".to_string()
}

fn default_pix_port() -> u16 {
    2575
}

impl Default for PixConfig {
    fn default() -> Self {
        Self {
            manager_host: default_pix_host(),
            manager_port: default_pix_port(),
        }
    }
}

/// Top-level orchestrator configuration (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Mediator instance name, for logging/identification.
    #[serde(default = "default_name")]
    pub name: String,

    /// `pnr.sendParseOrchestration` — route via the pre-parse bypass.
    #[serde(default)]
    pub send_parse_orchestration: bool,

    /// `pnr.providers.enrich`.
    #[serde(default = "default_true")]
    pub providers_enrich: bool,

    /// `pnr.facilities.enrich`.
    #[serde(default = "default_true")]
    pub facilities_enrich: bool,

    /// `pnr.patients.autoRegister`.
    #[serde(default)]
    pub patients_auto_register: bool,

    #[serde(default)]
    pub requested_authorities: RequestedAuthorities,

    #[serde(default)]
    pub resolver: ResolverKind,

    #[serde(default)]
    pub fhir: FhirConfig,

    #[serde(default)]
    pub pix: PixConfig,

    /// Per-resolve-call deadline, seconds (§9 open question 3 default 60).
    #[serde(default = "default_resolver_timeout_secs")]
    pub resolver_timeout_secs: u64,

    /// Whole-transaction deadline, seconds (§9 open question 3 default 120).
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "pnr-mediator".to_string()
}

fn default_true() -> bool {
    true
}

fn default_resolver_timeout_secs() -> u64 {
    60
}

fn default_transaction_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            send_parse_orchestration: false,
            providers_enrich: true,
            facilities_enrich: true,
            patients_auto_register: false,
            requested_authorities: RequestedAuthorities::default(),
            resolver: ResolverKind::default(),
            fhir: FhirConfig::default(),
            pix: PixConfig::default(),
            resolver_timeout_secs: default_resolver_timeout_secs(),
            transaction_timeout_secs: default_transaction_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver_timeout_secs == 0 {
            return Err(ConfigError::Invalid("resolver_timeout_secs must be > 0".into()));
        }
        if self.transaction_timeout_secs == 0 {
            return Err(ConfigError::Invalid("transaction_timeout_secs must be > 0".into()));
        }
        if self.resolver == ResolverKind::Fhir && self.fhir.mpi_url.is_empty() {
            return Err(ConfigError::Invalid(
                "resolver = fhir requires fhir.mpi_url".into(),
            ));
        }
        if self.resolver == ResolverKind::Hl7Pix && self.pix.manager_host.is_empty() {
            return Err(ConfigError::Invalid(
                "resolver = hl7_pix requires pix.manager_host".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn fhir_resolver_requires_mpi_url() {
        let mut config = OrchestratorConfig {
            resolver: ResolverKind::Fhir,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.fhir.mpi_url = "https://mpi.example.org/fhir".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_authorities_match_named_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.requested_authorities.patient.namespace_id, "ECID");
        assert_eq!(config.requested_authorities.provider.namespace_id, "EPID");
        assert_eq!(config.requested_authorities.facility.namespace_id, "ELID");
    }

    #[test]
    fn toml_roundtrip() {
        let config = OrchestratorConfig::default();
        let s = toml::to_string_pretty(&config).expect("serialize");
        let parsed: OrchestratorConfig = toml::from_str(&s).expect("deserialize");
        assert_eq!(parsed.name, config.name);
        assert_eq!(parsed.resolver_timeout_secs, config.resolver_timeout_secs);
    }

    #[test]
    fn from_file_loads_and_validates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mediator.toml");
        std::fs::write(
            &path,
            r#"
            name = "test-mediator"
            patients_auto_register = true

            [pix]
            manager_host = "pix.example.org"
            manager_port = 2575
            "#,
        )
        .expect("write config");

        let config = OrchestratorConfig::from_file(&path).expect("load config");
        assert_eq!(config.name, "test-mediator");
        assert!(config.patients_auto_register);
        assert_eq!(config.pix.manager_host, "pix.example.org");
    }

    #[test]
    fn from_file_rejects_invalid_combination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mediator.toml");
        std::fs::write(&path, "resolver = \"fhir\"\n").expect("write config");

        let err = OrchestratorConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
