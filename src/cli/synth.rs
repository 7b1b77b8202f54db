// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Synth command - build the release declaration and emit it

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::SourceArgs;
use crate::emit::{emitter_for, FileEmitter, RenderedDeclaration};
use crate::pipeline::{short_fingerprint, DeclarationFormat, PipelineValidator};

/// Run the synth command
pub async fn run(
    source: SourceArgs,
    format: Option<DeclarationFormat>,
    output: Option<PathBuf>,
    check: bool,
    verbose: bool,
) -> Result<()> {
    let cwd = super::current_dir()?;
    let (config, spec) = source.build(&cwd)?;

    let output = output.or_else(|| config.output.path.clone());
    let format = format
        .or_else(|| {
            output
                .as_deref()
                .and_then(|p| DeclarationFormat::from_path(p).ok())
        })
        .unwrap_or(config.output.format);

    // Status goes to stderr so stdout stays a clean document
    let validation = PipelineValidator::validate(&spec)?;
    if validation.has_warnings() {
        eprintln!("{}", "Declaration warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let rendered = RenderedDeclaration::render(&spec, format)?;

    if check {
        let path = output.ok_or_else(|| {
            miette::miette!(
                help = "Pass -o <file> or set output.path in the config",
                "--check needs a declaration file to compare against"
            )
        })?;

        if !path.exists() {
            return Err(miette::miette!(
                "Declaration file not found: {}\n\n\
                 Run 'stagegate synth -o {}' to create it.",
                path.display(),
                path.display()
            ));
        }

        FileEmitter::new(path.clone()).check_current(&rendered).await?;
        eprintln!(
            "  {} {} is up to date ({})",
            "✓".green(),
            path.display(),
            short_fingerprint(&rendered.fingerprint).dimmed()
        );
        return Ok(());
    }

    let emitter = emitter_for(output);
    let report = emitter.emit(&rendered).await?;

    if let Some(ref path) = report.path {
        eprintln!(
            "  {} Wrote {} ({} stages, {})",
            "✓".green(),
            path.display(),
            spec.stages.len(),
            short_fingerprint(&rendered.fingerprint).dimmed()
        );
    }

    if verbose {
        eprintln!();
        eprintln!("{}:", "Declaration summary".bold());
        eprintln!("  Name: {}", spec.name);
        eprintln!("  Format: {}", format);
        eprintln!("  Emitter: {}", report.emitter);
        eprintln!("  Bytes: {}", report.bytes);
        eprintln!("  Fingerprint: {}", rendered.fingerprint);
    }

    Ok(())
}
