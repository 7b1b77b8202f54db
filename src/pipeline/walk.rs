// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Promotion walk
//!
//! Walks the fixed stage graph once with simulated outcomes and reports
//! what a run would do: which actions run, which are skipped, where the
//! run halts and which artifacts remain valid. Nothing is executed.
//!
//! Gating rules:
//! - stages run strictly in order; a stage starts only when the previous
//!   one completed
//! - run-order groups inside a stage run in ascending order; a failure in
//!   a group skips every later group of that stage
//! - a rejected manual approval halts the run like a failure
//! - artifacts become valid downstream only once their whole stage
//!   succeeded

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::debug;

use crate::errors::{StagegateError, StagegateResult};
use crate::pipeline::{ActionCategory, Artifact, PipelineSpec};

/// Decision taken at manual approval gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ApprovalDecision {
    #[default]
    Approve,
    Reject,
}

/// Simulated outcomes for one walk
#[derive(Debug, Clone, Default)]
pub struct WalkOutcomes {
    failed: HashSet<String>,
    approval: ApprovalDecision,
}

impl WalkOutcomes {
    /// Every action succeeds and every gate is approved
    pub fn all_succeed() -> Self {
        Self::default()
    }

    /// Mark an action as failing
    pub fn fail(mut self, action: impl Into<String>) -> Self {
        self.failed.insert(action.into());
        self
    }

    /// Reject every manual approval gate
    pub fn reject(mut self) -> Self {
        self.approval = ApprovalDecision::Reject;
        self
    }
}

/// What happened to one action during the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
    Approved,
    Rejected,
    Skipped,
}

impl StepStatus {
    fn halts(&self) -> bool {
        matches!(self, Self::Failed | Self::Rejected)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One action's entry in the walk report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub stage: String,
    pub action: String,
    pub run_order: u32,
    pub status: StepStatus,
}

/// How the walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed { stage: String, action: String },
    Rejected { stage: String, action: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed { stage, action } => {
                write!(f, "halted in '{}': '{}' failed", stage, action)
            }
            Self::Rejected { stage, action } => {
                write!(f, "halted in '{}': '{}' was rejected", stage, action)
            }
        }
    }
}

/// Result of a walk
#[derive(Debug, Clone)]
pub struct WalkReport {
    pub steps: Vec<StepRecord>,
    pub outcome: RunOutcome,
    /// Artifacts whose producing stage completed
    pub valid_artifacts: BTreeSet<Artifact>,
}

impl WalkReport {
    /// Status of an action, if it is part of the pipeline
    pub fn status_of(&self, action: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|s| s.action == action)
            .map(|s| s.status)
    }

    /// Whether an action was started at all
    pub fn ran(&self, action: &str) -> bool {
        matches!(self.status_of(action), Some(s) if s != StepStatus::Skipped)
    }

    /// Whether any action of a stage was started
    pub fn reached_stage(&self, stage: &str) -> bool {
        self.steps
            .iter()
            .any(|s| s.stage == stage && s.status != StepStatus::Skipped)
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Walks a declaration's stages with simulated outcomes
pub struct PromotionWalk<'a> {
    spec: &'a PipelineSpec,
}

impl<'a> PromotionWalk<'a> {
    pub fn new(spec: &'a PipelineSpec) -> Self {
        Self { spec }
    }

    /// Walk the pipeline once
    pub fn walk(&self, outcomes: &WalkOutcomes) -> StagegateResult<WalkReport> {
        for name in &outcomes.failed {
            if self.spec.find_action(name).is_none() {
                return Err(StagegateError::ActionNotFound {
                    action: name.clone(),
                });
            }
        }

        let mut steps = Vec::new();
        let mut committed: BTreeSet<Artifact> = BTreeSet::new();
        let mut halted: Option<RunOutcome> = None;

        for stage in &self.spec.stages {
            let mut pending: BTreeSet<Artifact> = BTreeSet::new();
            let mut stage_halted = halted.is_some();

            for order in stage.run_orders() {
                let mut group_halt: Option<RunOutcome> = None;

                for action in stage.actions_at(order) {
                    let status = if stage_halted {
                        StepStatus::Skipped
                    } else if action.category() == ActionCategory::Approval {
                        // A gate marked as failing is a rejection of that gate
                        match outcomes.approval {
                            _ if outcomes.failed.contains(&action.name) => StepStatus::Rejected,
                            ApprovalDecision::Approve => StepStatus::Approved,
                            ApprovalDecision::Reject => StepStatus::Rejected,
                        }
                    } else if outcomes.failed.contains(&action.name)
                        || action
                            .inputs()
                            .iter()
                            .any(|a| !committed.contains(*a) && !pending.contains(*a))
                    {
                        StepStatus::Failed
                    } else {
                        StepStatus::Succeeded
                    };

                    debug!(stage = %stage.name, action = %action.name, %status, "walk step");

                    if status.halts() && group_halt.is_none() {
                        let (stage, action) = (stage.name.clone(), action.name.clone());
                        group_halt = Some(if status == StepStatus::Rejected {
                            RunOutcome::Rejected { stage, action }
                        } else {
                            RunOutcome::Failed { stage, action }
                        });
                    }

                    if status == StepStatus::Succeeded {
                        if let Some(output) = action.output() {
                            pending.insert(output.clone());
                        }
                    }

                    steps.push(StepRecord {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                        run_order: order,
                        status,
                    });
                }

                if let Some(outcome) = group_halt {
                    stage_halted = true;
                    halted.get_or_insert(outcome);
                }
            }

            if !stage_halted {
                committed.extend(pending);
            }
        }

        Ok(WalkReport {
            steps,
            outcome: halted.unwrap_or(RunOutcome::Completed),
            valid_artifacts: committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineParams, ReleasePipelineBuilder};

    fn release() -> PipelineSpec {
        ReleasePipelineBuilder::new(PipelineParams {
            secret_ref: "github-token".into(),
            repo_owner: "acme".into(),
            repo_name: "app".into(),
            branch: "main".into(),
            load_balancer_ref: None,
        })
        .build()
        .unwrap()
    }

    fn artifacts(names: &[&str]) -> BTreeSet<Artifact> {
        names.iter().map(|n| Artifact::new(*n)).collect()
    }

    #[test]
    fn test_happy_path_reaches_production() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed())
            .unwrap();

        assert!(report.is_completed());
        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.status_of("Approve"), Some(StepStatus::Approved));
        assert!(report.ran("ProductionEcs"));
        assert_eq!(
            report.valid_artifacts,
            artifacts(&["production_output", "source_output", "staging_output"])
        );
    }

    #[test]
    fn test_rejection_blocks_production() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed().reject())
            .unwrap();

        assert_eq!(
            report.outcome,
            RunOutcome::Rejected {
                stage: "Approval".into(),
                action: "Approve".into(),
            }
        );
        assert!(report.ran("StagingEcs"));
        assert!(!report.reached_stage("Production"));
        assert_eq!(
            report.valid_artifacts,
            artifacts(&["source_output", "staging_output"])
        );
    }

    #[test]
    fn test_build_failure_skips_deploy() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed().fail("StagingInfra"))
            .unwrap();

        assert_eq!(report.status_of("StagingInfra"), Some(StepStatus::Failed));
        assert_eq!(report.status_of("StagingEcs"), Some(StepStatus::Skipped));
        assert_eq!(report.status_of("Approve"), Some(StepStatus::Skipped));
        assert_eq!(report.valid_artifacts, artifacts(&["source_output"]));
    }

    #[test]
    fn test_failed_stage_discards_its_artifacts() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed().fail("StagingEcs"))
            .unwrap();

        assert!(report.ran("StagingInfra"));
        assert!(!report.valid_artifacts.contains(&Artifact::new("staging_output")));
        assert_eq!(
            report.outcome,
            RunOutcome::Failed {
                stage: "Staging".into(),
                action: "StagingEcs".into(),
            }
        );
    }

    #[test]
    fn test_source_failure_fails_whole_run() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed().fail("GitHub_Source"))
            .unwrap();

        assert_eq!(
            report.steps.iter().filter(|s| s.status == StepStatus::Skipped).count(),
            5
        );
        assert!(report.valid_artifacts.is_empty());
    }

    #[test]
    fn test_failing_approval_gate_is_a_rejection() {
        let spec = release();
        let report = PromotionWalk::new(&spec)
            .walk(&WalkOutcomes::all_succeed().fail("Approve"))
            .unwrap();

        assert_eq!(report.status_of("Approve"), Some(StepStatus::Rejected));
        assert!(!report.ran("ProductionEcs"));
        assert_eq!(
            report.outcome,
            RunOutcome::Rejected {
                stage: "Approval".into(),
                action: "Approve".into(),
            }
        );
    }

    #[test]
    fn test_unknown_failed_action() {
        let spec = release();
        let result = PromotionWalk::new(&spec).walk(&WalkOutcomes::all_succeed().fail("Nope"));
        assert!(matches!(result, Err(StagegateError::ActionNotFound { .. })));
    }

    #[test]
    fn test_walk_leaves_declaration_untouched() {
        let spec = release();
        let before = spec.clone();
        let _ = PromotionWalk::new(&spec).walk(&WalkOutcomes::all_succeed().reject());
        assert_eq!(spec, before);
    }
}
