// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Init command - write a starter project configuration

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::config::{ProjectConfig, CONFIG_FILE_NAMES};
use crate::pipeline::PipelineValidator;
use crate::utils::{print_info, print_success};

/// Run the init command
pub async fn run(name: Option<String>, force: bool, verbose: bool) -> Result<()> {
    let pipeline_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "release".to_string())
    });

    if !PipelineValidator::is_valid_name(&pipeline_name) {
        return Err(miette::miette!(
            help = "Names may use letters, digits and . @ _ - (at most 100 characters)",
            "'{}' is not a valid pipeline name",
            pipeline_name
        ));
    }

    println!("{}", "Initializing stagegate project...".bold());
    println!();

    let config_path = Path::new(CONFIG_FILE_NAMES[0]);
    if config_path.exists() && !force {
        return Err(miette::miette!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        ));
    }

    let content = ProjectConfig::template(&pipeline_name);
    std::fs::write(config_path, &content).map_err(|e| {
        miette::miette!("Failed to write {}: {}", config_path.display(), e)
    })?;

    print_success(&format!("Created {}", config_path.display()));

    println!();
    println!("{}", "Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    print_info(&format!(
        "Edit {} with your repository and token secret",
        config_path.display().to_string().cyan()
    ));
    print_info(&format!("Run {} to review the declaration", "stagegate synth".cyan()));
    print_info(&format!("Run {} to see the artifact flow", "stagegate graph".cyan()));
    println!();

    if verbose {
        println!("{}", "Generated configuration:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", content.dimmed());
    }

    Ok(())
}
