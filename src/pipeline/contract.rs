// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Release contract
//!
//! The shape every release declaration must keep: a single source fetch,
//! a staging build and deploy, a manual approval gate, then a production
//! build and deploy. Structural validity is checked separately by
//! [`PipelineValidator`](crate::pipeline::PipelineValidator).

use std::fmt;

use crate::pipeline::builder::{
    ENV_VAR, PRODUCTION_ENV, RELEASE_STAGES, STAGE_APPROVAL, STAGE_PRODUCTION, STAGE_SOURCE,
    STAGE_STAGING, STAGING_ENV,
};
use crate::pipeline::{ActionCategory, Artifact, PipelineSpec, Stage};

/// One way a declaration departs from the release shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    StageCount {
        found: usize,
    },
    StageOrder {
        position: usize,
        expected: &'static str,
        found: Option<String>,
    },
    MissingApprovalGate,
    ApprovalNotBare {
        action: String,
    },
    ApprovalCount {
        found: usize,
    },
    SourceShape {
        reason: String,
    },
    EnvironmentShape {
        stage: String,
        reason: String,
    },
    BuildEnvironment {
        action: String,
        expected: &'static str,
        found: Option<String>,
    },
    BuildInput {
        action: String,
        expected: String,
        found: String,
    },
    ArtifactEscapesStage {
        artifact: String,
        stage: String,
        consumer: String,
        consumer_stage: String,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageCount { found } => {
                write!(f, "expected {} stages, found {}", RELEASE_STAGES.len(), found)
            }
            Self::StageOrder {
                position,
                expected,
                found: Some(found),
            } => write!(f, "stage {} should be '{}' but is '{}'", position, expected, found),
            Self::StageOrder {
                position,
                expected,
                found: None,
            } => write!(f, "stage {} should be '{}' but is missing", position, expected),
            Self::MissingApprovalGate => write!(
                f,
                "no manual approval gate in '{}'; production would be promoted automatically",
                STAGE_APPROVAL
            ),
            Self::ApprovalNotBare { action } => write!(
                f,
                "'{}' stage may only hold manual approvals, found '{}'",
                STAGE_APPROVAL, action
            ),
            Self::ApprovalCount { found } => write!(
                f,
                "'{}' stage must hold exactly one manual approval, found {} actions",
                STAGE_APPROVAL, found
            ),
            Self::SourceShape { reason } => write!(f, "'{}' stage {}", STAGE_SOURCE, reason),
            Self::EnvironmentShape { stage, reason } => write!(f, "'{}' stage {}", stage, reason),
            Self::BuildEnvironment {
                action,
                expected,
                found: Some(found),
            } => write!(
                f,
                "build '{}' sets {}={} but must set {}={}",
                action, ENV_VAR, found, ENV_VAR, expected
            ),
            Self::BuildEnvironment {
                action,
                expected,
                found: None,
            } => write!(f, "build '{}' must set {}={}", action, ENV_VAR, expected),
            Self::BuildInput {
                action,
                expected,
                found,
            } => write!(
                f,
                "build '{}' consumes '{}' but must consume the source artifact '{}'",
                action, found, expected
            ),
            Self::ArtifactEscapesStage {
                artifact,
                stage,
                consumer,
                consumer_stage,
            } => write!(
                f,
                "'{}' from '{}' is consumed by '{}' in '{}'",
                artifact, stage, consumer, consumer_stage
            ),
        }
    }
}

/// Checker for the release pipeline shape
pub struct ReleaseContract;

impl ReleaseContract {
    /// All contract violations in a declaration; empty when it conforms
    pub fn check(spec: &PipelineSpec) -> Vec<ContractViolation> {
        let mut violations = Vec::new();

        if spec.stages.len() != RELEASE_STAGES.len() {
            violations.push(ContractViolation::StageCount {
                found: spec.stages.len(),
            });
        }

        for (position, expected) in RELEASE_STAGES.iter().enumerate() {
            let found = spec.stages.get(position).map(|s| s.name.clone());
            if found.as_deref() != Some(*expected) {
                violations.push(ContractViolation::StageOrder {
                    position: position + 1,
                    expected: *expected,
                    found,
                });
            }
        }

        Self::check_approval(spec, &mut violations);
        let source_artifact = Self::check_source(spec, &mut violations);

        for (name, env) in [(STAGE_STAGING, STAGING_ENV), (STAGE_PRODUCTION, PRODUCTION_ENV)] {
            if let Some(stage) = spec.get_stage(name) {
                Self::check_environment(
                    spec,
                    stage,
                    env,
                    source_artifact.as_ref(),
                    &mut violations,
                );
            }
        }

        violations
    }

    /// Convenience wrapper for callers that only need a yes/no
    pub fn conforms(spec: &PipelineSpec) -> bool {
        Self::check(spec).is_empty()
    }

    fn check_approval(spec: &PipelineSpec, violations: &mut Vec<ContractViolation>) {
        let Some(stage) = spec.get_stage(STAGE_APPROVAL) else {
            violations.push(ContractViolation::MissingApprovalGate);
            return;
        };

        if !stage
            .actions
            .iter()
            .any(|a| a.category() == ActionCategory::Approval)
        {
            violations.push(ContractViolation::MissingApprovalGate);
        }

        if stage.actions.len() > 1 {
            violations.push(ContractViolation::ApprovalCount {
                found: stage.actions.len(),
            });
        }

        for action in &stage.actions {
            if action.category() != ActionCategory::Approval {
                violations.push(ContractViolation::ApprovalNotBare {
                    action: action.name.clone(),
                });
            }
        }
    }

    /// Returns the artifact the source stage produces, when there is exactly one
    fn check_source(
        spec: &PipelineSpec,
        violations: &mut Vec<ContractViolation>,
    ) -> Option<Artifact> {
        let stage = spec.get_stage(STAGE_SOURCE)?;

        let fetches: Vec<_> = stage
            .actions
            .iter()
            .filter(|a| a.category() == ActionCategory::Source)
            .collect();

        match fetches.as_slice() {
            [single] => single.output().cloned(),
            [] => {
                violations.push(ContractViolation::SourceShape {
                    reason: "has no source fetch".into(),
                });
                None
            }
            many => {
                violations.push(ContractViolation::SourceShape {
                    reason: format!("must hold one source fetch, found {}", many.len()),
                });
                None
            }
        }
    }

    fn check_environment(
        spec: &PipelineSpec,
        stage: &Stage,
        env: &'static str,
        source: Option<&Artifact>,
        violations: &mut Vec<ContractViolation>,
    ) {
        let builds: Vec<_> = stage
            .actions
            .iter()
            .filter(|a| a.category() == ActionCategory::Build)
            .collect();
        let deploys: Vec<_> = stage
            .actions
            .iter()
            .filter(|a| a.category() == ActionCategory::Deploy)
            .collect();

        let ([build], [deploy]) = (builds.as_slice(), deploys.as_slice()) else {
            violations.push(ContractViolation::EnvironmentShape {
                stage: stage.name.clone(),
                reason: format!(
                    "must hold one build and one deploy, found {} and {}",
                    builds.len(),
                    deploys.len()
                ),
            });
            return;
        };

        let found_env = build.env_var(ENV_VAR);
        if found_env != Some(env) {
            violations.push(ContractViolation::BuildEnvironment {
                action: build.name.clone(),
                expected: env,
                found: found_env.map(String::from),
            });
        }

        if let Some(source) = source {
            for input in build.inputs() {
                if input != source {
                    violations.push(ContractViolation::BuildInput {
                        action: build.name.clone(),
                        expected: source.to_string(),
                        found: input.to_string(),
                    });
                }
            }
        }

        if build.run_order >= deploy.run_order {
            violations.push(ContractViolation::EnvironmentShape {
                stage: stage.name.clone(),
                reason: format!(
                    "must run build '{}' before deploy '{}' (run-order {} vs {})",
                    build.name, deploy.name, build.run_order, deploy.run_order
                ),
            });
        }

        let Some(output) = build.output() else {
            violations.push(ContractViolation::EnvironmentShape {
                stage: stage.name.clone(),
                reason: format!("build '{}' produces no artifact to deploy", build.name),
            });
            return;
        };

        if !deploy.inputs().contains(&output) {
            violations.push(ContractViolation::EnvironmentShape {
                stage: stage.name.clone(),
                reason: format!(
                    "deploy '{}' must promote '{}' built in this stage",
                    deploy.name, output
                ),
            });
        }

        for (consumer_stage, consumer) in spec.consumers_of(output) {
            if consumer_stage.name != stage.name {
                violations.push(ContractViolation::ArtifactEscapesStage {
                    artifact: output.to_string(),
                    stage: stage.name.clone(),
                    consumer: consumer.name.clone(),
                    consumer_stage: consumer_stage.name.clone(),
                });
            }
        }
    }
}
