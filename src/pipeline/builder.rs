// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Release pipeline builder
//!
//! Turns repository coordinates and a secret reference into the fixed
//! four-stage release declaration: Source → Staging → Approval → Production.
//! Construction either yields a complete, checked declaration or fails.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::{StagegateError, StagegateResult};
use crate::pipeline::{
    Action, ActionKind, Artifact, BuildProject, DeploymentTarget, PipelineSpec, PipelineValidator,
    ReleaseContract, Resource, ResourceKind, SecretRef, Stage, ADMINISTRATOR_POLICY,
};

pub const STAGE_SOURCE: &str = "Source";
pub const STAGE_STAGING: &str = "Staging";
pub const STAGE_APPROVAL: &str = "Approval";
pub const STAGE_PRODUCTION: &str = "Production";

/// Required stage order of a release pipeline
pub const RELEASE_STAGES: [&str; 4] = [
    STAGE_SOURCE,
    STAGE_STAGING,
    STAGE_APPROVAL,
    STAGE_PRODUCTION,
];

pub const ACTION_SOURCE: &str = "GitHub_Source";
pub const ACTION_STAGING_BUILD: &str = "StagingInfra";
pub const ACTION_STAGING_DEPLOY: &str = "StagingEcs";
pub const ACTION_APPROVE: &str = "Approve";
pub const ACTION_PRODUCTION_BUILD: &str = "ProductionInfra";
pub const ACTION_PRODUCTION_DEPLOY: &str = "ProductionEcs";

pub const SOURCE_OUTPUT: &str = "source_output";
pub const STAGING_OUTPUT: &str = "staging_output";
pub const PRODUCTION_OUTPUT: &str = "production_output";

/// Environment variable that tells the build which environment it targets
pub const ENV_VAR: &str = "ENV";
pub const STAGING_ENV: &str = "stg";
pub const PRODUCTION_ENV: &str = "prd";

pub const BUILD_PROJECT: &str = "Codebuild";
pub const ENCRYPTION_KEY: &str = "ArtifactKey";
pub const ARTIFACT_STORE: &str = "ArtifactStore";
pub const BUILD_CACHE: &str = "BuildCache";
pub const BUILD_ROLE: &str = "BuildRole";
pub const BUILD_PRINCIPAL: &str = "codebuild.amazonaws.com";

/// Construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineParams {
    /// Id of the secret that holds the repository access token
    pub secret_ref: String,
    /// Repository owner
    pub repo_owner: String,
    /// Repository name
    pub repo_name: String,
    /// Branch to release from
    pub branch: String,
    /// Load balancer reference; accepted but not wired into any action
    pub load_balancer_ref: Option<String>,
}

/// Permissions granted to the build execution role
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePolicy {
    /// Full administrative access
    #[default]
    Administrator,
    /// Only the listed managed policies
    Scoped(Vec<String>),
}

impl RolePolicy {
    fn managed_policies(&self) -> Vec<String> {
        match self {
            Self::Administrator => vec![ADMINISTRATOR_POLICY.to_string()],
            Self::Scoped(policies) => policies.clone(),
        }
    }
}

/// Knobs that shape the generated declaration
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderOptions {
    /// Pipeline name
    pub name: String,
    /// Build specification path inside the source tree
    pub build_spec: PathBuf,
    /// Build image
    pub build_image: String,
    /// Run builds privileged
    pub privileged: bool,
    /// Build role permissions
    pub role_policy: RolePolicy,
    /// Staging deployment target
    pub staging_target: DeploymentTarget,
    /// Production deployment target; `None` reuses the staging target
    pub production_target: Option<DeploymentTarget>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            name: "release".to_string(),
            build_spec: PathBuf::from("codebuild/buildspec.yaml"),
            build_image: "aws/codebuild/standard:2.0".to_string(),
            privileged: true,
            role_policy: RolePolicy::default(),
            staging_target: DeploymentTarget::new("stg", "banana"),
            production_target: None,
        }
    }
}

/// Builds the release pipeline declaration
pub struct ReleasePipelineBuilder {
    params: PipelineParams,
    options: BuilderOptions,
}

fn owner_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})$").expect("owner pattern is valid")
    })
}

fn repo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("repo pattern is valid"))
}

impl ReleasePipelineBuilder {
    /// Create a builder with default options
    pub fn new(params: PipelineParams) -> Self {
        Self {
            params,
            options: BuilderOptions::default(),
        }
    }

    /// Replace the builder options
    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Build and check the declaration
    pub fn build(self) -> StagegateResult<PipelineSpec> {
        Self::check_params(&self.params)?;

        if let Some(ref alb) = self.params.load_balancer_ref {
            debug!(load_balancer = %alb, "load balancer reference accepted; no action uses it");
        }

        let spec = self.assemble();

        let validation = PipelineValidator::validate(&spec)?;
        if !validation.is_valid() {
            return Err(StagegateError::from_validation_errors(&validation.errors));
        }

        let violations = ReleaseContract::check(&spec);
        if !violations.is_empty() {
            return Err(StagegateError::ContractViolation {
                violations: violations.iter().map(ToString::to_string).collect(),
            });
        }

        info!(
            pipeline = %spec.name,
            owner = %self.params.repo_owner,
            repo = %self.params.repo_name,
            branch = %self.params.branch,
            "built release pipeline"
        );

        Ok(spec)
    }

    /// Reject parameters the source provider would refuse
    fn check_params(params: &PipelineParams) -> StagegateResult<()> {
        if params.secret_ref.trim().is_empty() {
            return Err(StagegateError::invalid_parameter_with_help(
                "secret_ref",
                "must not be empty",
                "Pass the id of the secret that stores the repository token",
            ));
        }

        if !owner_pattern().is_match(&params.repo_owner) {
            return Err(StagegateError::invalid_parameter_with_help(
                "repo_owner",
                format!("'{}' is not a valid repository owner", params.repo_owner),
                "Owners are 1-39 alphanumeric characters or hyphens, not starting with a hyphen",
            ));
        }

        if !repo_pattern().is_match(&params.repo_name) {
            return Err(StagegateError::invalid_parameter(
                "repo_name",
                format!("'{}' is not a valid repository name", params.repo_name),
            ));
        }

        let branch = &params.branch;
        if branch.is_empty()
            || branch.chars().any(|c| c.is_whitespace() || c.is_control())
            || branch.starts_with('/')
            || branch.ends_with('/')
            || branch.contains("..")
            || branch.contains("@{")
            || branch.ends_with(".lock")
            || branch.contains(&['~', '^', ':', '?', '*', '[', '\\'][..])
        {
            return Err(StagegateError::invalid_parameter(
                "branch",
                format!("'{}' is not a valid branch name", branch),
            ));
        }

        if let Some(ref alb) = params.load_balancer_ref {
            if alb.trim().is_empty() {
                return Err(StagegateError::invalid_parameter(
                    "load_balancer_ref",
                    "must not be blank when given",
                ));
            }
        }

        Ok(())
    }

    fn assemble(&self) -> PipelineSpec {
        let opts = &self.options;
        let source_output = Artifact::new(SOURCE_OUTPUT);
        let staging_output = Artifact::new(STAGING_OUTPUT);
        let production_output = Artifact::new(PRODUCTION_OUTPUT);

        let production_target = opts
            .production_target
            .clone()
            .unwrap_or_else(|| opts.staging_target.clone());

        let source = Stage::new(
            STAGE_SOURCE,
            vec![Action::new(
                ACTION_SOURCE,
                ActionKind::SourceFetch {
                    owner: self.params.repo_owner.clone(),
                    repo: self.params.repo_name.clone(),
                    branch: self.params.branch.clone(),
                    token: SecretRef::new(self.params.secret_ref.clone()),
                    output: source_output.clone(),
                },
            )],
        );

        let staging = Self::environment_stage(
            STAGE_STAGING,
            (ACTION_STAGING_BUILD, ACTION_STAGING_DEPLOY),
            STAGING_ENV,
            &source_output,
            staging_output,
            opts.staging_target.clone(),
        );

        let approval = Stage::new(
            STAGE_APPROVAL,
            vec![Action::new(
                ACTION_APPROVE,
                ActionKind::ManualApproval { comment: None },
            )],
        );

        let production = Self::environment_stage(
            STAGE_PRODUCTION,
            (ACTION_PRODUCTION_BUILD, ACTION_PRODUCTION_DEPLOY),
            PRODUCTION_ENV,
            &source_output,
            production_output,
            production_target,
        );

        PipelineSpec {
            version: "1".to_string(),
            name: opts.name.clone(),
            description: Some(format!(
                "Release {}/{}@{} through staging and production",
                self.params.repo_owner, self.params.repo_name, self.params.branch
            )),
            artifact_store: ARTIFACT_STORE.to_string(),
            stages: vec![source, staging, approval, production],
            projects: vec![BuildProject {
                name: BUILD_PROJECT.to_string(),
                build_spec: opts.build_spec.clone(),
                image: opts.build_image.clone(),
                privileged: opts.privileged,
                role: BUILD_ROLE.to_string(),
                cache: Some(BUILD_CACHE.to_string()),
            }],
            resources: self.resources(),
        }
    }

    /// A build at run-order 1 followed by a deploy of its output at run-order 2
    fn environment_stage(
        name: &str,
        (build_name, deploy_name): (&str, &str),
        env_value: &str,
        source: &Artifact,
        output: Artifact,
        target: DeploymentTarget,
    ) -> Stage {
        let mut env = BTreeMap::new();
        env.insert(ENV_VAR.to_string(), env_value.to_string());

        let build = Action::new(
            build_name,
            ActionKind::Build {
                project: BUILD_PROJECT.to_string(),
                input: source.clone(),
                output: Some(output.clone()),
                env,
            },
        )
        .with_run_order(1);

        let deploy = Action::new(
            deploy_name,
            ActionKind::Deploy {
                target,
                app_spec_input: output.clone(),
                task_definition_input: output,
            },
        )
        .with_run_order(2);

        Stage::new(name, vec![build, deploy])
    }

    fn resources(&self) -> Vec<Resource> {
        vec![
            Resource::new(
                ENCRYPTION_KEY,
                ResourceKind::EncryptionKey {
                    rotation_enabled: false,
                },
            ),
            Resource::new(
                ARTIFACT_STORE,
                ResourceKind::ArtifactStore {
                    encryption_key: ENCRYPTION_KEY.to_string(),
                },
            ),
            Resource::new(BUILD_CACHE, ResourceKind::BuildCache { prefix: None }),
            Resource::new(
                BUILD_ROLE,
                ResourceKind::ExecutionRole {
                    assumed_by: BUILD_PRINCIPAL.to_string(),
                    managed_policies: self.options.role_policy.managed_policies(),
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ActionCategory;

    fn params() -> PipelineParams {
        PipelineParams {
            secret_ref: "github-token".into(),
            repo_owner: "acme".into(),
            repo_name: "app".into(),
            branch: "main".into(),
            load_balancer_ref: None,
        }
    }

    #[test]
    fn test_four_stages_in_fixed_order() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();
        assert_eq!(spec.stage_names(), RELEASE_STAGES.to_vec());
    }

    #[test]
    fn test_source_action_carries_coordinates() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();
        let source = &spec.stages[0].actions;
        assert_eq!(source.len(), 1);
        assert_eq!(source[0].name, "GitHub_Source");

        match &source[0].kind {
            ActionKind::SourceFetch {
                owner,
                repo,
                branch,
                token,
                output,
            } => {
                assert_eq!(owner, "acme");
                assert_eq!(repo, "app");
                assert_eq!(branch, "main");
                assert_eq!(token.id(), "github-token");
                assert_eq!(output.name(), "source_output");
            }
            _ => panic!("Expected SourceFetch action"),
        }
    }

    #[test]
    fn test_builds_target_their_environment() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();

        let (_, staging) = spec.find_action(ACTION_STAGING_BUILD).unwrap();
        let (_, production) = spec.find_action(ACTION_PRODUCTION_BUILD).unwrap();

        assert_eq!(staging.env_var("ENV"), Some("stg"));
        assert_eq!(production.env_var("ENV"), Some("prd"));
        assert_eq!(staging.inputs(), vec![&Artifact::new(SOURCE_OUTPUT)]);
        assert_eq!(production.inputs(), vec![&Artifact::new(SOURCE_OUTPUT)]);
    }

    #[test]
    fn test_build_precedes_deploy() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();

        for stage_name in [STAGE_STAGING, STAGE_PRODUCTION] {
            let stage = spec.get_stage(stage_name).unwrap();
            let build = stage
                .actions
                .iter()
                .find(|a| a.category() == ActionCategory::Build)
                .unwrap();
            let deploy = stage
                .actions
                .iter()
                .find(|a| a.category() == ActionCategory::Deploy)
                .unwrap();
            assert!(build.run_order < deploy.run_order);
            assert_eq!(deploy.inputs(), vec![build.output().unwrap()]);
        }
    }

    #[test]
    fn test_approval_stage_is_a_bare_gate() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();
        let approval = spec.get_stage(STAGE_APPROVAL).unwrap();

        assert_eq!(approval.actions.len(), 1);
        assert_eq!(approval.actions[0].category(), ActionCategory::Approval);
        assert!(approval.actions[0].inputs().is_empty());
        assert!(approval.actions[0].output().is_none());
    }

    #[test]
    fn test_production_reuses_staging_target_by_default() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();
        let targets = spec.deployment_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].2, targets[1].2);
    }

    #[test]
    fn test_distinct_production_target() {
        let options = BuilderOptions {
            production_target: Some(DeploymentTarget::new("prd", "live")),
            ..BuilderOptions::default()
        };
        let spec = ReleasePipelineBuilder::new(params())
            .with_options(options)
            .build()
            .unwrap();

        let targets = spec.deployment_targets();
        assert_eq!(targets[1].2, &DeploymentTarget::new("prd", "live"));
    }

    #[test]
    fn test_supporting_resources_declared() {
        let spec = ReleasePipelineBuilder::new(params()).build().unwrap();

        let kinds: Vec<&str> = spec.resources.iter().map(|r| r.kind.kind_name()).collect();
        assert_eq!(
            kinds,
            vec!["encryption_key", "artifact_store", "build_cache", "execution_role"]
        );
        assert!(spec.get_resource(BUILD_ROLE).unwrap().kind.is_administrator_role());
    }

    #[test]
    fn test_scoped_role_policy() {
        let options = BuilderOptions {
            role_policy: RolePolicy::Scoped(vec!["AWSCodeDeployRoleForECS".into()]),
            ..BuilderOptions::default()
        };
        let spec = ReleasePipelineBuilder::new(params())
            .with_options(options)
            .build()
            .unwrap();

        assert!(!spec.get_resource(BUILD_ROLE).unwrap().kind.is_administrator_role());
    }

    #[test]
    fn test_rejects_empty_secret() {
        let mut p = params();
        p.secret_ref = "  ".into();
        let err = ReleasePipelineBuilder::new(p).build().unwrap_err();
        assert!(matches!(
            err,
            StagegateError::InvalidParameter { ref name, .. } if name == "secret_ref"
        ));
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        let mut p = params();
        p.repo_owner = "-acme".into();
        assert!(ReleasePipelineBuilder::new(p).build().is_err());

        let mut p = params();
        p.repo_name = "my app".into();
        assert!(ReleasePipelineBuilder::new(p).build().is_err());

        let mut p = params();
        p.branch = "feature/../main".into();
        assert!(ReleasePipelineBuilder::new(p).build().is_err());
    }

    #[test]
    fn test_rejects_branches_git_refuses() {
        for branch in ["feat~1", "a:b", "x.lock", "a@{b}", "we*ird", "top^", "why?", "[wip]"] {
            let mut p = params();
            p.branch = branch.into();
            let err = ReleasePipelineBuilder::new(p).build().unwrap_err();
            assert!(
                matches!(
                    err,
                    StagegateError::InvalidParameter { ref name, .. } if name == "branch"
                ),
                "{} should be refused",
                branch
            );
        }

        let mut p = params();
        p.branch = "release/2025.10".into();
        assert!(ReleasePipelineBuilder::new(p).build().is_ok());
    }

    #[test]
    fn test_load_balancer_is_accepted_but_unused() {
        let mut p = params();
        p.load_balancer_ref = Some("app/prod-alb/50dc6c495c0c9188".into());
        let with_alb = ReleasePipelineBuilder::new(p).build().unwrap();
        let without = ReleasePipelineBuilder::new(params()).build().unwrap();
        assert_eq!(with_alb, without);
    }
}
