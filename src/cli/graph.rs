// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Graph command - show the artifact flow between actions

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{GraphFormat, SourceArgs};
use crate::pipeline::ArtifactGraph;

/// Run the graph command
pub async fn run(
    source: SourceArgs,
    declaration: Option<PathBuf>,
    format: GraphFormat,
    verbose: bool,
) -> Result<()> {
    let spec = super::load_or_build(declaration.as_deref(), &source)?;
    let graph = ArtifactGraph::build(&spec)?;

    let output = match format {
        GraphFormat::Text => graph.to_text(&spec),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    if verbose && format == GraphFormat::Text {
        println!("{}:", "Topological order".bold());
        for (i, name) in graph.topological_order_names()?.iter().enumerate() {
            match graph.dependencies(name) {
                Some(deps) if !deps.is_empty() => {
                    println!("  {}. {} {}", i + 1, name, format!("<- {}", deps.join(", ")).dimmed())
                }
                _ => println!("  {}. {}", i + 1, name),
            }
        }
    }

    Ok(())
}
