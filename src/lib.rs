// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IHE XDS.b Provide-and-Register orchestration engine.
//!
//! Sits between document source clients and an XDS registry/repository and
//! performs validation, identifier cross-referencing, and enrichment of
//! `Provide and Register Document Set-b` (PnR) transactions before
//! forwarding them.
//!
//! # Pipeline
//!
//! - **Parser** (`parser`): decodes the PnR SOAP envelope and locates every
//!   registry object carrying an identifier.
//! - **Extractor** (`extractor`): dedups patient/provider/facility
//!   identifier occurrences by `(category, identifier)`.
//! - **Resolver** (`resolver`): resolves each occurrence against an MPI /
//!   Client Registry over HL7v2 PIX, FHIR, or an internal table.
//! - **Identity Feed** (`identity_feed`): auto-registers previously unknown
//!   patients when policy allows.
//! - **Rewriter** (`rewriter`): splices resolved identifiers back into the
//!   original envelope bytes.
//! - **Orchestrator** (`orchestrator`): the state machine tying the above
//!   together, one task per in-flight transaction.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use xds_pnr_mediator::collaborators::{NullAuditSink, NullSubscriptionPublisher};
//! use xds_pnr_mediator::config::OrchestratorConfig;
//! use xds_pnr_mediator::identity_feed::InternalIdentityFeed;
//! use xds_pnr_mediator::model::AttachmentMap;
//! use xds_pnr_mediator::orchestrator::Orchestrator;
//! use xds_pnr_mediator::resolver::InternalResolver;
//!
//! # async fn run(envelope: bytes::Bytes) {
//! let orchestrator = Orchestrator::new(
//!     Arc::new(OrchestratorConfig::default()),
//!     Arc::new(InternalResolver::new()),
//!     Arc::new(InternalIdentityFeed),
//!     Arc::new(NullSubscriptionPublisher),
//!     Arc::new(NullAuditSink),
//! );
//! let _outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;
//! # }
//! ```

pub mod collaborators;
pub mod config;
pub mod error;
pub mod extractor;
pub mod hl7;
pub mod identity_feed;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod registry_response;
pub mod resolver;
pub mod rewriter;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, RegistryError, Severity};
pub use model::{AssigningAuthority, Identifier, IdentifierCategory};
pub use orchestrator::{OrchestrateOutcome, Orchestrator};
