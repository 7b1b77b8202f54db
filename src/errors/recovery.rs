// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use std::path::Path;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest creating a project configuration
    pub fn create_config(path: &Path) -> Self {
        Self {
            action: "Create a stagegate configuration".into(),
            steps: vec![
                format!("No configuration found at {}", path.display()),
                "Generate a template and fill in the repository coordinates".into(),
            ],
            commands: vec![
                "# Write .stagegate.yaml in the current directory:".into(),
                "stagegate init".into(),
            ],
        }
    }

    /// Suggest fixing release contract violations
    pub fn fix_contract_violation(violations: &[String]) -> Self {
        let mut steps: Vec<String> = violations.iter().map(|v| format!("• {}", v)).collect();
        steps.push("Production must stay behind the Approval stage".into());

        Self {
            action: "Restore the release pipeline shape".into(),
            steps,
            commands: vec![
                "# Inspect the current stage layout:".into(),
                "stagegate graph --format text".into(),
            ],
        }
    }

    /// Suggest fixing an artifact that is consumed before it exists
    pub fn fix_artifact_order(action: &str, artifact: &str) -> Self {
        Self {
            action: format!("Produce '{}' before '{}' runs", artifact, action),
            steps: vec![
                format!("Action '{}' reads '{}'", action, artifact),
                "Move the producing action to an earlier stage, or give it a lower run-order in the same stage".into(),
            ],
            commands: vec![
                "# Visualise artifact flow:".into(),
                "stagegate graph --format mermaid".into(),
            ],
        }
    }

    /// Suggest regenerating a stale declaration
    pub fn regenerate_declaration(path: &Path) -> Self {
        Self {
            action: "Regenerate the declaration".into(),
            steps: vec![
                format!("{} no longer matches the configuration", path.display()),
                "Regenerate it and review the diff before submitting".into(),
            ],
            commands: vec![format!("stagegate synth -o {}", path.display())],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
