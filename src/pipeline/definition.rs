// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Pipeline declaration structures
//!
//! Defines the schema of an emitted release declaration: stages, actions,
//! artifacts, build projects and the supporting resources they reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{StagegateError, StagegateResult};

/// Managed policy that grants full administrative access
pub const ADMINISTRATOR_POLICY: &str = "AdministratorAccess";

/// Release pipeline declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Declaration version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resource id of the store that holds artifacts between actions
    pub artifact_store: String,

    /// Stages in execution order
    pub stages: Vec<Stage>,

    /// Build projects referenced by build actions
    #[serde(default)]
    pub projects: Vec<BuildProject>,

    /// Supporting resources allocated alongside the pipeline
    #[serde(default)]
    pub resources: Vec<Resource>,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineSpec {
    /// Load a declaration from a YAML or JSON file
    pub fn from_file(path: &Path) -> StagegateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StagegateError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match DeclarationFormat::from_path(path)? {
            DeclarationFormat::Yaml => Self::from_yaml(&content),
            DeclarationFormat::Json => Self::from_json(&content),
        }
    }

    /// Parse a declaration from a YAML string
    pub fn from_yaml(yaml: &str) -> StagegateResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Parse a declaration from a JSON string
    pub fn from_json(json: &str) -> StagegateResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> StagegateResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> StagegateResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Render in the requested format
    pub fn render(&self, format: DeclarationFormat) -> StagegateResult<String> {
        match format {
            DeclarationFormat::Yaml => self.to_yaml(),
            DeclarationFormat::Json => self.to_json(),
        }
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every action paired with the index of its stage, in declaration order
    pub fn actions(&self) -> impl Iterator<Item = (usize, &Stage, &Action)> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(idx, stage)| stage.actions.iter().map(move |a| (idx, stage, a)))
    }

    /// Find an action by name anywhere in the pipeline
    pub fn find_action(&self, name: &str) -> Option<(&Stage, &Action)> {
        self.actions()
            .find(|(_, _, a)| a.name == name)
            .map(|(_, s, a)| (s, a))
    }

    /// Get a build project by name
    pub fn get_project(&self, name: &str) -> Option<&BuildProject> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Get a supporting resource by id
    pub fn get_resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// The action that outputs an artifact
    pub fn producer_of(&self, artifact: &Artifact) -> Option<(&Stage, &Action)> {
        self.actions()
            .find(|(_, _, a)| a.output() == Some(artifact))
            .map(|(_, s, a)| (s, a))
    }

    /// Every action that reads an artifact
    pub fn consumers_of(&self, artifact: &Artifact) -> Vec<(&Stage, &Action)> {
        self.actions()
            .filter(|(_, _, a)| a.inputs().contains(&artifact))
            .map(|(_, s, a)| (s, a))
            .collect()
    }

    /// Every deployment target referenced by a deploy action
    pub fn deployment_targets(&self) -> Vec<(&Stage, &Action, &DeploymentTarget)> {
        self.actions()
            .filter_map(|(_, s, a)| match &a.kind {
                ActionKind::Deploy { target, .. } => Some((s, a, target)),
                _ => None,
            })
            .collect()
    }
}

/// A named, sequential phase of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (must be unique within pipeline)
    pub name: String,

    /// Actions in this stage
    pub actions: Vec<Action>,
}

impl Stage {
    /// Create a stage from its actions
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    /// Distinct run-orders used in this stage, ascending
    pub fn run_orders(&self) -> Vec<u32> {
        let mut orders: Vec<u32> = self.actions.iter().map(|a| a.run_order).collect();
        orders.sort_unstable();
        orders.dedup();
        orders
    }

    /// Actions sharing one run-order
    pub fn actions_at(&self, run_order: u32) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.run_order == run_order)
            .collect()
    }
}

/// A unit of work within a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action name
    pub name: String,

    /// Relative sequencing within the stage; equal values may run in parallel
    #[serde(default = "default_run_order")]
    pub run_order: u32,

    /// What the action does
    #[serde(flatten)]
    pub kind: ActionKind,
}

fn default_run_order() -> u32 {
    1
}

impl Action {
    /// Create an action with the default run-order
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            run_order: default_run_order(),
            kind,
        }
    }

    /// Set the run-order
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Artifacts this action reads, without duplicates
    pub fn inputs(&self) -> Vec<&Artifact> {
        match &self.kind {
            ActionKind::SourceFetch { .. } | ActionKind::ManualApproval { .. } => vec![],
            ActionKind::Build { input, .. } => vec![input],
            ActionKind::Deploy {
                app_spec_input,
                task_definition_input,
                ..
            } => {
                if app_spec_input == task_definition_input {
                    vec![app_spec_input]
                } else {
                    vec![app_spec_input, task_definition_input]
                }
            }
        }
    }

    /// Artifact this action writes, if any
    pub fn output(&self) -> Option<&Artifact> {
        match &self.kind {
            ActionKind::SourceFetch { output, .. } => Some(output),
            ActionKind::Build { output, .. } => output.as_ref(),
            ActionKind::Deploy { .. } | ActionKind::ManualApproval { .. } => None,
        }
    }

    /// The action category
    pub fn category(&self) -> ActionCategory {
        match &self.kind {
            ActionKind::SourceFetch { .. } => ActionCategory::Source,
            ActionKind::Build { .. } => ActionCategory::Build,
            ActionKind::Deploy { .. } => ActionCategory::Deploy,
            ActionKind::ManualApproval { .. } => ActionCategory::Approval,
        }
    }

    /// Look up a build environment variable
    pub fn env_var(&self, key: &str) -> Option<&str> {
        match &self.kind {
            ActionKind::Build { env, .. } => env.get(key).map(String::as_str),
            _ => None,
        }
    }
}

/// Action variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Pull a branch of a hosted repository
    SourceFetch {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Branch to track
        branch: String,
        /// Access token reference
        token: SecretRef,
        /// Artifact holding the fetched tree
        output: Artifact,
    },

    /// Run a build project over an input artifact
    Build {
        /// Build project name
        project: String,
        /// Artifact to build
        input: Artifact,
        /// Artifact produced by the build
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Artifact>,
        /// Environment variables injected into the build
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },

    /// Promote an artifact into a deployment target
    Deploy {
        /// Where to deploy
        target: DeploymentTarget,
        /// Artifact holding the application spec template
        app_spec_input: Artifact,
        /// Artifact holding the task definition template
        task_definition_input: Artifact,
    },

    /// Block until a human approves or rejects
    ManualApproval {
        /// Note shown to the reviewer
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
}

/// Action categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
    Approval,
}

impl std::fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
            Self::Approval => write!(f, "approval"),
        }
    }
}

/// Opaque named handle passed between actions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a stored secret; never the secret value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "secret:{}", self.0)
    }
}

/// Application and deployment group an artifact is promoted into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub application: String,
    pub deployment_group: String,
}

impl DeploymentTarget {
    pub fn new(application: impl Into<String>, deployment_group: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            deployment_group: deployment_group.into(),
        }
    }
}

impl std::fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.application, self.deployment_group)
    }
}

/// Build project shared by build actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProject {
    /// Project name
    pub name: String,

    /// Path of the build specification inside the source artifact
    pub build_spec: PathBuf,

    /// Build image
    pub image: String,

    /// Run the build container in privileged mode
    #[serde(default)]
    pub privileged: bool,

    /// Resource id of the execution role
    pub role: String,

    /// Resource id of the build cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

/// Supporting resource declared alongside the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource id (unique within the declaration)
    pub id: String,

    #[serde(flatten)]
    pub kind: ResourceKind,
}

impl Resource {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Kinds of supporting resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Key that encrypts stored artifacts
    EncryptionKey {
        #[serde(default)]
        rotation_enabled: bool,
    },

    /// Store that holds artifacts between actions
    ArtifactStore {
        /// Resource id of the encryption key
        encryption_key: String,
    },

    /// Location for build caches
    BuildCache {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },

    /// Role assumed by a build project
    ExecutionRole {
        /// Service principal allowed to assume the role
        assumed_by: String,
        /// Managed policies attached to the role
        #[serde(default)]
        managed_policies: Vec<String>,
    },
}

impl ResourceKind {
    /// Short kind name
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::EncryptionKey { .. } => "encryption_key",
            Self::ArtifactStore { .. } => "artifact_store",
            Self::BuildCache { .. } => "build_cache",
            Self::ExecutionRole { .. } => "execution_role",
        }
    }

    /// Whether this is a role carrying administrative access
    pub fn is_administrator_role(&self) -> bool {
        matches!(
            self,
            Self::ExecutionRole { managed_policies, .. }
                if managed_policies.iter().any(|p| p == ADMINISTRATOR_POLICY)
        )
    }
}

/// Serialization format of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationFormat {
    #[default]
    Yaml,
    Json,
}

impl DeclarationFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> StagegateResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(StagegateError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl std::fmt::Display for DeclarationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yaml => write!(f, "yaml"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for DeclarationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown declaration format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STAGE: &str = r#"
version: "1"
name: "demo"
artifact_store: "ArtifactStore"
stages:
  - name: "Source"
    actions:
      - name: "Fetch"
        type: source_fetch
        owner: "acme"
        repo: "app"
        branch: "main"
        token: "github-token"
        output: "source_output"
  - name: "Build"
    actions:
      - name: "Compile"
        type: build
        project: "Codebuild"
        input: "source_output"
        output: "build_output"
        env:
          ENV: "stg"
      - name: "Ship"
        run_order: 2
        type: deploy
        target:
          application: "stg"
          deployment_group: "banana"
        app_spec_input: "build_output"
        task_definition_input: "build_output"
"#;

    #[test]
    fn test_parse_declaration() {
        let spec = PipelineSpec::from_yaml(TWO_STAGE).unwrap();
        assert_eq!(spec.name, "demo");
        assert_eq!(spec.stage_names(), vec!["Source", "Build"]);

        let (_, fetch) = spec.find_action("Fetch").unwrap();
        match &fetch.kind {
            ActionKind::SourceFetch { owner, token, .. } => {
                assert_eq!(owner, "acme");
                assert_eq!(token.id(), "github-token");
            }
            _ => panic!("Expected SourceFetch action"),
        }
        assert_eq!(fetch.run_order, 1);

        let (_, ship) = spec.find_action("Ship").unwrap();
        assert_eq!(ship.run_order, 2);
        assert_eq!(ship.category(), ActionCategory::Deploy);
    }

    #[test]
    fn test_deploy_inputs_are_deduplicated() {
        let spec = PipelineSpec::from_yaml(TWO_STAGE).unwrap();
        let (_, ship) = spec.find_action("Ship").unwrap();
        assert_eq!(ship.inputs(), vec![&Artifact::new("build_output")]);
        assert!(ship.output().is_none());
    }

    #[test]
    fn test_producer_and_consumers() {
        let spec = PipelineSpec::from_yaml(TWO_STAGE).unwrap();
        let artifact = Artifact::new("build_output");

        let (stage, producer) = spec.producer_of(&artifact).unwrap();
        assert_eq!(stage.name, "Build");
        assert_eq!(producer.name, "Compile");

        let consumers = spec.consumers_of(&artifact);
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].1.name, "Ship");
    }

    #[test]
    fn test_run_orders_sorted_and_distinct() {
        let spec = PipelineSpec::from_yaml(TWO_STAGE).unwrap();
        let stage = spec.get_stage("Build").unwrap();
        assert_eq!(stage.run_orders(), vec![1, 2]);
        assert_eq!(stage.actions_at(2)[0].name, "Ship");
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let spec = PipelineSpec::from_yaml(TWO_STAGE).unwrap();
        let json = spec.to_json().unwrap();
        assert_eq!(PipelineSpec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DeclarationFormat::from_path(Path::new("release.yml")).unwrap(),
            DeclarationFormat::Yaml
        );
        assert_eq!(
            DeclarationFormat::from_path(Path::new("release.json")).unwrap(),
            DeclarationFormat::Json
        );
        assert!(DeclarationFormat::from_path(Path::new("release.txt")).is_err());
    }

    #[test]
    fn test_administrator_role_detection() {
        let admin = ResourceKind::ExecutionRole {
            assumed_by: "codebuild.amazonaws.com".into(),
            managed_policies: vec![ADMINISTRATOR_POLICY.into()],
        };
        let scoped = ResourceKind::ExecutionRole {
            assumed_by: "codebuild.amazonaws.com".into(),
            managed_policies: vec!["ReadOnlyAccess".into()],
        };
        assert!(admin.is_administrator_role());
        assert!(!scoped.is_administrator_role());
    }
}
