// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PnR Mediator CLI
//!
//! Command-line front end for the Provide-and-Register orchestration
//! engine. Reads a PnR SOAP envelope from a file, runs it through the
//! orchestrator, and prints the resulting envelope or registry error
//! response.
//!
//! # Usage
//!
//! ```bash
//! # Run a PnR envelope through the orchestrator
//! pnr-mediator run --input pnr.xml --config mediator.toml
//!
//! # Validate a configuration file
//! pnr-mediator validate --config mediator.toml
//!
//! # Generate an example configuration file
//! pnr-mediator gen-config --output mediator.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xds_pnr_mediator::collaborators::{NullSubscriptionPublisher, TracingAuditSink};
use xds_pnr_mediator::config::{ConfigError, OrchestratorConfig, ResolverKind};
use xds_pnr_mediator::identity_feed::{FhirIdentityFeed, Hl7IdentityFeed, IdentityFeedClient, InternalIdentityFeed};
use xds_pnr_mediator::model::AttachmentMap;
use xds_pnr_mediator::orchestrator::{OrchestrateOutcome, Orchestrator};
use xds_pnr_mediator::resolver::{FhirResolver, Hl7PixResolver, InternalResolver, ResolverClient};

/// IHE XDS.b Provide-and-Register orchestration engine
#[derive(Parser, Debug)]
#[command(name = "pnr-mediator")]
#[command(about = "PnR Mediator - identifier resolution, auto-registration, and metadata enrichment")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a PnR envelope through the orchestrator
    Run {
        /// Path to the PnR SOAP envelope
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to write the resulting envelope/response to (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Generate an example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "mediator.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Commands::Run { input, config, output } => cmd_run(input, config, output).await,
        Commands::Validate { config } => cmd_validate(config),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

async fn cmd_run(
    input: PathBuf,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => OrchestratorConfig::from_file(path)?,
        None => OrchestratorConfig::default(),
    };

    let envelope = bytes::Bytes::from(std::fs::read(&input)?);
    let orchestrator = build_orchestrator(&config);

    println!("PnR Mediator v{}", env!("CARGO_PKG_VERSION"));
    println!("===================================");
    println!("Processing: {}", input.display());
    println!();

    let outcome = orchestrator.orchestrate(envelope, AttachmentMap::new()).await;
    let body = match &outcome {
        OrchestrateOutcome::Completed { envelope } => {
            println!("Outcome: Completed");
            envelope.clone()
        }
        OrchestrateOutcome::Failed { registry_response } => {
            println!("Outcome: Failed");
            registry_response.clone()
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &body)?;
            println!("Wrote response to: {}", path.display());
        }
        None => {
            println!();
            println!("{}", std::str::from_utf8(&body)?);
        }
    }

    Ok(())
}

fn build_orchestrator(config: &OrchestratorConfig) -> Orchestrator {
    let resolver: Arc<dyn ResolverClient> = match config.resolver {
        ResolverKind::Hl7Pix => Arc::new(Hl7PixResolver::new(config.pix.clone())),
        ResolverKind::Fhir => Arc::new(FhirResolver::new(config.fhir.clone())),
        ResolverKind::Internal => Arc::new(InternalResolver::new()),
    };

    let identity_feed: Arc<dyn IdentityFeedClient> = match config.resolver {
        ResolverKind::Hl7Pix => Arc::new(Hl7IdentityFeed::new(config.pix.clone())),
        ResolverKind::Fhir => Arc::new(FhirIdentityFeed::new(
            config.fhir.mpi_url.clone(),
            config.fhir.mpi_client_name.clone(),
            config.fhir.mpi_password.clone(),
        )),
        ResolverKind::Internal => Arc::new(InternalIdentityFeed),
    };

    Orchestrator::new(
        Arc::new(config.clone()),
        resolver,
        identity_feed,
        Arc::new(NullSubscriptionPublisher),
        Arc::new(TracingAuditSink),
    )
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match OrchestratorConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Mediator: {}", config.name);
            println!("Resolver: {:?}", config.resolver);
            println!("Providers enrich: {}", config.providers_enrich);
            println!("Facilities enrich: {}", config.facilities_enrich);
            println!("Patients auto-register: {}", config.patients_auto_register);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = OrchestratorConfig::default();
    let toml_str = toml::to_string_pretty(&config).map_err(|e| {
        Box::new(ConfigError::Invalid(e.to_string())) as Box<dyn std::error::Error>
    })?;

    let content = format!(
        r#"# PnR Mediator Configuration
# Generated by pnr-mediator gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}
