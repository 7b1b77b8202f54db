// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Walk command - simulate one release run through the gates

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::SourceArgs;
use crate::pipeline::{PromotionWalk, RunOutcome, StepStatus, WalkOutcomes};
use crate::utils::print_header;

/// Run the walk command
pub async fn run(
    source: SourceArgs,
    declaration: Option<PathBuf>,
    fail: Vec<String>,
    reject: bool,
    verbose: bool,
) -> Result<()> {
    let spec = super::load_or_build(declaration.as_deref(), &source)?;

    let mut outcomes = fail
        .into_iter()
        .fold(WalkOutcomes::all_succeed(), |o, action| o.fail(action));
    if reject {
        outcomes = outcomes.reject();
    }

    let report = PromotionWalk::new(&spec).walk(&outcomes)?;

    print_header(&format!("Walking '{}'", spec.name));

    let mut current_stage: Option<&str> = None;
    for step in &report.steps {
        if current_stage != Some(step.stage.as_str()) {
            println!();
            println!("{}:", step.stage.bold());
            current_stage = Some(step.stage.as_str());
        }

        let glyph = match step.status {
            StepStatus::Succeeded | StepStatus::Approved => "✓".green(),
            StepStatus::Failed | StepStatus::Rejected => "✗".red(),
            StepStatus::Skipped => "-".dimmed(),
        };
        let label = format!("[{}] {}", step.run_order, step.action);
        if step.status == StepStatus::Skipped {
            println!("  {} {} {}", glyph, label.dimmed(), "(skipped)".dimmed());
        } else {
            println!("  {} {} ({})", glyph, label, step.status);
        }
    }

    println!();

    if verbose || !report.is_completed() {
        let artifacts: Vec<&str> = report.valid_artifacts.iter().map(|a| a.name()).collect();
        let shown = if artifacts.is_empty() {
            "none".to_string()
        } else {
            artifacts.join(", ")
        };
        println!("Valid artifacts: {}", shown);
        println!();
    }

    match &report.outcome {
        RunOutcome::Completed => {
            println!("{}", "Release completed.".green().bold());
        }
        outcome @ RunOutcome::Failed { .. } => {
            println!("{}", format!("Release {}.", outcome).red().bold());
        }
        outcome @ RunOutcome::Rejected { .. } => {
            println!("{}", format!("Release {}.", outcome).yellow().bold());
        }
    }

    Ok(())
}
