// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Project configuration loading
//!
//! Load pipeline parameters and builder options from `.stagegate.yaml`
//! (or `.stagegate.toml`). Lookup order: an explicit path, then the
//! working directory and its ancestors, then the user config directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{StagegateError, StagegateResult};
use crate::pipeline::{
    BuilderOptions, DeclarationFormat, DeploymentTarget, PipelineParams, ReleasePipelineBuilder,
    RolePolicy,
};

/// File names searched for, in priority order
pub const CONFIG_FILE_NAMES: [&str; 3] = [".stagegate.yaml", ".stagegate.yml", ".stagegate.toml"];

/// Project configuration from .stagegate.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Config version
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    #[serde(default = "default_name")]
    pub name: String,

    /// Source repository coordinates
    #[serde(default)]
    pub source: SourceConfig,

    /// Load balancer reference (accepted, currently unused)
    #[serde(default)]
    pub load_balancer: Option<String>,

    /// Build project settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Deployment targets
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Where and how to emit the declaration
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_name() -> String {
    BuilderOptions::default().name
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: default_name(),
            source: SourceConfig::default(),
            load_balancer: None,
            build: BuildConfig::default(),
            deploy: DeployConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Source repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Repository owner
    pub owner: Option<String>,

    /// Repository name
    pub repo: Option<String>,

    /// Branch to release from
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Id of the secret holding the access token
    pub token_secret: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            branch: default_branch(),
            token_secret: None,
        }
    }
}

/// Build project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build specification path inside the source tree
    #[serde(default = "default_spec_file")]
    pub spec_file: PathBuf,

    /// Build image
    #[serde(default = "default_image")]
    pub image: String,

    /// Run builds privileged
    #[serde(default = "default_true")]
    pub privileged: bool,

    /// Execution role permissions
    #[serde(default)]
    pub role_policy: RolePolicy,
}

fn default_spec_file() -> PathBuf {
    BuilderOptions::default().build_spec
}

fn default_image() -> String {
    BuilderOptions::default().build_image
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            spec_file: default_spec_file(),
            image: default_image(),
            privileged: true,
            role_policy: RolePolicy::default(),
        }
    }
}

/// Deployment targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Target for the staging deploy
    #[serde(default = "default_staging_target")]
    pub staging: DeploymentTarget,

    /// Target for the production deploy; omitted means the staging target
    #[serde(default)]
    pub production: Option<DeploymentTarget>,
}

fn default_staging_target() -> DeploymentTarget {
    BuilderOptions::default().staging_target
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            staging: default_staging_target(),
            production: None,
        }
    }
}

/// Emission settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Declaration format
    #[serde(default)]
    pub format: DeclarationFormat,

    /// Output file; omitted means stdout
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct SourceOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub token_secret: Option<String>,
    pub load_balancer: Option<String>,
}

impl SourceOverrides {
    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
            && self.repo.is_none()
            && self.branch.is_none()
            && self.token_secret.is_none()
            && self.load_balancer.is_none()
    }
}

impl ProjectConfig {
    /// Load configuration from a YAML, JSON or TOML file
    pub fn load(path: &Path) -> StagegateResult<Self> {
        if !path.exists() {
            return Err(StagegateError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StagegateError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(StagegateError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Find a config file from `start` upwards, falling back to the user config directory
    pub fn discover(start: &Path) -> Option<PathBuf> {
        for dir in start.ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        Self::user_config_path().filter(|p| p.is_file())
    }

    /// Location of the per-user fallback configuration
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "stagegate", "stagegate")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Load the explicit path when given, otherwise the discovered one
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> StagegateResult<(Self, PathBuf)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::discover(cwd).ok_or_else(|| StagegateError::ConfigNotFound {
                path: cwd.join(CONFIG_FILE_NAMES[0]),
            })?,
        };

        let config = Self::load(&path)?;
        Ok((config, path))
    }

    /// Apply command-line or environment values on top of the file
    pub fn apply_overrides(&mut self, overrides: &SourceOverrides) {
        if let Some(ref owner) = overrides.owner {
            self.source.owner = Some(owner.clone());
        }
        if let Some(ref repo) = overrides.repo {
            self.source.repo = Some(repo.clone());
        }
        if let Some(ref branch) = overrides.branch {
            self.source.branch = branch.clone();
        }
        if let Some(ref secret) = overrides.token_secret {
            self.source.token_secret = Some(secret.clone());
        }
        if let Some(ref alb) = overrides.load_balancer {
            self.load_balancer = Some(alb.clone());
        }
    }

    /// Construction parameters; fails when a required value is missing
    pub fn params(&self) -> StagegateResult<PipelineParams> {
        fn required(value: &Option<String>, key: &str) -> StagegateResult<String> {
            value.clone().ok_or_else(|| StagegateError::InvalidConfig {
                reason: format!("'{}' is not set", key),
                help: Some(format!(
                    "Set '{}' in the config file or pass it on the command line",
                    key
                )),
            })
        }

        Ok(PipelineParams {
            secret_ref: required(&self.source.token_secret, "source.token_secret")?,
            repo_owner: required(&self.source.owner, "source.owner")?,
            repo_name: required(&self.source.repo, "source.repo")?,
            branch: self.source.branch.clone(),
            load_balancer_ref: self.load_balancer.clone(),
        })
    }

    /// Builder options derived from the config
    pub fn builder_options(&self) -> BuilderOptions {
        BuilderOptions {
            name: self.name.clone(),
            build_spec: self.build.spec_file.clone(),
            build_image: self.build.image.clone(),
            privileged: self.build.privileged,
            role_policy: self.build.role_policy.clone(),
            staging_target: self.deploy.staging.clone(),
            production_target: self.deploy.production.clone(),
        }
    }

    /// A builder ready to produce this project's declaration
    pub fn to_builder(&self) -> StagegateResult<ReleasePipelineBuilder> {
        Ok(ReleasePipelineBuilder::new(self.params()?).with_options(self.builder_options()))
    }

    /// Commented starter configuration
    pub fn template(name: &str) -> String {
        format!(
            r#"# stagegate release pipeline configuration

version: "1"
name: "{name}"

source:
  owner: "acme"
  repo: "app"
  branch: "main"
  # Id of the stored secret holding the repository token (never the token itself)
  token_secret: "github-token"

# Accepted for forward compatibility; no action uses it yet
# load_balancer: "app/my-alb/50dc6c495c0c9188"

build:
  spec_file: "codebuild/buildspec.yaml"
  image: "aws/codebuild/standard:2.0"
  privileged: true
  # Full admin by default. Prefer scoping the role:
  # role_policy:
  #   scoped:
  #     - "AWSCodeDeployRoleForECS"
  role_policy: administrator

deploy:
  staging:
    application: "stg"
    deployment_group: "banana"
  # Without this, production deploys to the staging target
  # production:
  #   application: "prd"
  #   deployment_group: "live"

output:
  format: yaml
  # path: "release.yaml"
"#
        )
    }
}
