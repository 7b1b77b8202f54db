// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! stagegate - Release Pipeline Synthesizer
//!
//! Build gated staging-to-production release pipeline declarations.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stagegate::cli::{Cli, Commands};
use stagegate::StagegateError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // STAGEGATE_LOG wins over RUST_LOG; --verbose raises the default
    let default_filter = if cli.verbose {
        "stagegate=debug"
    } else {
        "stagegate=info"
    };
    let filter = EnvFilter::try_from_env("STAGEGATE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    stagegate::utils::configure();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let result = match cli.command {
        Commands::Init { name, force } => stagegate::cli::init::run(name, force, cli.verbose).await,
        Commands::Synth {
            source,
            format,
            output,
            check,
        } => stagegate::cli::synth::run(source, format, output, check, cli.verbose).await,
        Commands::Validate {
            declaration,
            structural_only,
        } => stagegate::cli::validate::run(declaration, structural_only, cli.verbose).await,
        Commands::Graph {
            source,
            declaration,
            format,
        } => stagegate::cli::graph::run(source, declaration, format, cli.verbose).await,
        Commands::Walk {
            source,
            declaration,
            fail,
            reject,
        } => stagegate::cli::walk::run(source, declaration, fail, reject, cli.verbose).await,
    };

    if let Err(ref report) = result {
        if let Some(suggestion) = report
            .downcast_ref::<StagegateError>()
            .and_then(StagegateError::recovery)
        {
            eprintln!("{}", suggestion);
        }
    }

    result
}
