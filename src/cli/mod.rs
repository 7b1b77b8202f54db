// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for stagegate.

pub mod graph;
pub mod init;
pub mod synth;
pub mod validate;
pub mod walk;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{ProjectConfig, SourceOverrides};
use crate::pipeline::{DeclarationFormat, PipelineSpec};

/// Release pipeline synthesizer
///
/// Build, check and explain gated staging-to-production release pipelines.
#[derive(Parser, Debug)]
#[clap(
    name = "stagegate",
    version,
    about = "Synthesize gated staging-to-production release pipeline declarations",
    long_about = None,
    after_help = "Examples:\n\
        stagegate init                       Write a starter .stagegate.yaml\n\
        stagegate synth -o release.yaml      Build the declaration into a file\n\
        stagegate synth --check              Fail if the committed file is stale\n\
        stagegate graph -f mermaid           Show the artifact flow\n\
        stagegate walk --reject              Simulate a rejected approval\n\n\
        See 'stagegate <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter project configuration
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Overwrite an existing configuration
        #[clap(long)]
        force: bool,
    },

    /// Build the release declaration and emit it
    Synth {
        #[clap(flatten)]
        source: SourceArgs,

        /// Output format: yaml or json (default: output extension, then config value)
        #[clap(short, long)]
        format: Option<DeclarationFormat>,

        /// Output file (default: config value, then stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,

        /// Compare with the existing output file instead of writing it
        #[clap(long)]
        check: bool,
    },

    /// Validate a declaration file
    Validate {
        /// Declaration file to validate
        #[clap(default_value = "release.yaml")]
        declaration: PathBuf,

        /// Skip the release contract checks
        #[clap(long)]
        structural_only: bool,
    },

    /// Show the pipeline as an artifact graph
    Graph {
        #[clap(flatten)]
        source: SourceArgs,

        /// Read an existing declaration instead of building one
        #[clap(short, long, conflicts_with = "config")]
        declaration: Option<PathBuf>,

        /// Output format: text, dot or mermaid
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Simulate a release run through the gates
    Walk {
        #[clap(flatten)]
        source: SourceArgs,

        /// Read an existing declaration instead of building one
        #[clap(short, long, conflicts_with = "config")]
        declaration: Option<PathBuf>,

        /// Actions that fail during the walk
        #[clap(long, value_name = "ACTION")]
        fail: Vec<String>,

        /// Reject the manual approval
        #[clap(long)]
        reject: bool,
    },
}

/// Where the construction parameters come from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Project configuration file (default: discovered from the working directory)
    #[clap(short, long, env = "STAGEGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository owner
    #[clap(long, env = "STAGEGATE_OWNER")]
    pub owner: Option<String>,

    /// Repository name
    #[clap(long, env = "STAGEGATE_REPO")]
    pub repo: Option<String>,

    /// Branch to track
    #[clap(long, env = "STAGEGATE_BRANCH")]
    pub branch: Option<String>,

    /// Id of the stored repository token secret
    #[clap(long, env = "STAGEGATE_SECRET")]
    pub secret: Option<String>,

    /// Load balancer reference
    #[clap(long, env = "STAGEGATE_LOAD_BALANCER")]
    pub load_balancer: Option<String>,
}

impl SourceArgs {
    pub fn overrides(&self) -> SourceOverrides {
        SourceOverrides {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            token_secret: self.secret.clone(),
            load_balancer: self.load_balancer.clone(),
        }
    }

    /// Resolve the project config and apply flag overrides
    ///
    /// Without a config file, flags alone are enough as long as the
    /// required source values are all given.
    pub fn load_config(&self, cwd: &Path) -> miette::Result<ProjectConfig> {
        let overrides = self.overrides();

        let mut config = match ProjectConfig::resolve(self.config.as_deref(), cwd) {
            Ok((config, path)) => {
                tracing::debug!(path = %path.display(), "using configuration");
                config
            }
            Err(crate::errors::StagegateError::ConfigNotFound { .. })
                if self.config.is_none() && !overrides.is_empty() =>
            {
                tracing::debug!("no configuration file, using flags only");
                ProjectConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.apply_overrides(&overrides);
        Ok(config)
    }

    /// Build the declaration from config and flags
    pub fn build(&self, cwd: &Path) -> miette::Result<(ProjectConfig, PipelineSpec)> {
        let config = self.load_config(cwd)?;
        let spec = config.to_builder()?.build()?;
        Ok((config, spec))
    }
}

/// Load a declaration file or build one from the project config
pub(crate) fn load_or_build(
    declaration: Option<&Path>,
    source: &SourceArgs,
) -> miette::Result<PipelineSpec> {
    match declaration {
        Some(path) => {
            if !path.exists() {
                return Err(miette::miette!(
                    "Declaration file not found: {}\n\n\
                     Run 'stagegate synth -o {}' to create it.",
                    path.display(),
                    path.display()
                ));
            }
            Ok(PipelineSpec::from_file(path)?)
        }
        None => Ok(source.build(&current_dir()?)?.1),
    }
}

pub(crate) fn current_dir() -> miette::Result<PathBuf> {
    std::env::current_dir().map_err(|e| miette::miette!("Failed to get current directory: {}", e))
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_graph_format_parsing() {
        assert_eq!("Mermaid".parse::<GraphFormat>().unwrap(), GraphFormat::Mermaid);
        assert!("svg".parse::<GraphFormat>().is_err());
    }

    #[test]
    fn test_walk_flags() {
        let cli = Cli::parse_from([
            "stagegate", "walk", "--fail", "StagingEcs", "--reject", "-C", "/tmp",
        ]);
        match cli.command {
            Commands::Walk { fail, reject, .. } => {
                assert_eq!(fail, vec!["StagingEcs".to_string()]);
                assert!(reject);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp")));
    }
}
