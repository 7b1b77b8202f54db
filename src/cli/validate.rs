// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Validate command - check a declaration file

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{fingerprint, PipelineSpec, PipelineValidator, ReleaseContract};
use crate::utils::{print_success, print_warning};

/// Run the validate command
pub async fn run(declaration_path: PathBuf, structural_only: bool, verbose: bool) -> Result<()> {
    println!("{}", "Validating declaration...".bold());
    println!();

    if !declaration_path.exists() {
        return Err(miette::miette!(
            "Declaration file not found: {}\n\n\
             Run 'stagegate synth -o {}' to create it.",
            declaration_path.display(),
            declaration_path.display()
        ));
    }

    let spec = match PipelineSpec::from_file(&declaration_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("  {} Failed to parse declaration", "✗".red());
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };

    print_success("Declaration file parses");

    let validation = PipelineValidator::validate(&spec)?;
    let violations = if structural_only {
        Vec::new()
    } else {
        ReleaseContract::check(&spec)
    };

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !violations.is_empty() {
        println!();
        println!("{}:", "Release contract".red().bold());
        for violation in &violations {
            println!("  {} {}", "✗".red(), violation);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Declaration summary".bold());
        println!("  Name: {}", spec.name);
        println!("  Fingerprint: {}", fingerprint(&spec)?);
        println!("  Stages: {}", spec.stages.len());
        for stage in &spec.stages {
            let actions: Vec<&str> = stage.actions.iter().map(|a| a.name.as_str()).collect();
            println!(
                "    - {} {}",
                stage.name,
                format!("[{}]", actions.join(", ")).dimmed()
            );
        }
    }

    println!();

    if !validation.is_valid() || !violations.is_empty() {
        return Err(miette::miette!("Declaration validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Declaration is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Declaration is valid!".green().bold());
    }

    Ok(())
}
