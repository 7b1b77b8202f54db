// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Error types with actionable messages
//!
//! Every failure a user can hit while building, checking or emitting a
//! release declaration maps to one variant here, with a diagnostic code
//! and, where possible, a hint on how to fix it.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stagegate operations
pub type StagegateResult<T> = Result<T, StagegateError>;

/// Main error type for stagegate
#[derive(Error, Debug, Diagnostic)]
pub enum StagegateError {
    // ─────────────────────────────────────────────────────────────────────────
    // Construction Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid parameter '{name}': {reason}")]
    #[diagnostic(code(stagegate::invalid_parameter))]
    InvalidParameter {
        name: String,
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid pipeline declaration: {reason}")]
    #[diagnostic(code(stagegate::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Release contract violated ({})", count_issues(.violations))]
    #[diagnostic(
        code(stagegate::contract_violation),
        help("A release pipeline must be Source → Staging → Approval → Production")
    )]
    ContractViolation { violations: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Action '{action}' consumes artifact '{artifact}' which no action produces")]
    #[diagnostic(
        code(stagegate::unknown_artifact),
        help("Declare an action that outputs '{artifact}' in an earlier stage")
    )]
    UnknownArtifact { action: String, artifact: String },

    #[error("Artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    #[diagnostic(code(stagegate::duplicate_producer))]
    DuplicateProducer {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("Artifact flow contradicts stage order")]
    #[diagnostic(
        code(stagegate::artifact_cycle),
        help("An artifact must be produced before any action that consumes it")
    )]
    ArtifactCycle { actions: Vec<String> },

    #[error("Action '{action}' not found in pipeline")]
    #[diagnostic(code(stagegate::action_not_found))]
    ActionNotFound { action: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(stagegate::config_not_found),
        help("Create one with 'stagegate init' or pass --config <FILE>")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(stagegate::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Unsupported file format for '{path}'")]
    #[diagnostic(
        code(stagegate::unsupported_format),
        help("Supported formats: .yaml, .yml, .json, .toml")
    )]
    UnsupportedFormat { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Emission Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Declaration '{path}' is out of date")]
    #[diagnostic(
        code(stagegate::drift),
        help("Re-run 'stagegate synth' with the same output path and commit the result")
    )]
    Drift {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Emitter '{emitter}' failed: {message}")]
    #[diagnostic(code(stagegate::emit_failed))]
    EmitFailed { emitter: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(stagegate::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(stagegate::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(stagegate::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(stagegate::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(stagegate::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(stagegate::toml_error))]
    Toml { message: String },
}

fn count_issues(violations: &[String]) -> String {
    match violations.len() {
        1 => "1 issue".to_string(),
        n => format!("{} issues", n),
    }
}

impl From<std::io::Error> for StagegateError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for StagegateError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for StagegateError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for StagegateError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl StagegateError {
    /// Create an invalid parameter error without a hint
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
            help: None,
        }
    }

    /// Create an invalid parameter error with a hint
    pub fn invalid_parameter_with_help(
        name: &str,
        reason: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
            help: Some(help.into()),
        }
    }

    /// Build an invalid pipeline error from a list of validation errors
    pub fn from_validation_errors(errors: &[String]) -> Self {
        let reason = match errors {
            [] => "unknown validation failure".to_string(),
            [only] => only.clone(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        };

        Self::InvalidPipeline {
            reason,
            help: Some("Run 'stagegate validate' on the declaration for the full report".into()),
        }
    }

    /// Recovery steps for this error, if any apply
    pub fn recovery(&self) -> Option<RecoverySuggestion> {
        match self {
            Self::ConfigNotFound { path } => Some(RecoverySuggestion::create_config(path)),
            Self::ContractViolation { violations } => {
                Some(RecoverySuggestion::fix_contract_violation(violations))
            }
            Self::UnknownArtifact { action, artifact } => {
                Some(RecoverySuggestion::fix_artifact_order(action, artifact))
            }
            Self::Drift { path, .. } => Some(RecoverySuggestion::regenerate_declaration(path)),
            _ => None,
        }
    }
}
