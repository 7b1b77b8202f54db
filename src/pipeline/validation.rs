// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Pipeline validation
//!
//! Structural checks that apply to any declaration, release-shaped or not.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::errors::StagegateError;
use crate::pipeline::{
    ActionCategory, ActionKind, Artifact, ArtifactGraph, PipelineSpec, ResourceKind,
};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9.@_-]{1,100}$").expect("name pattern is valid"))
}

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Whether a pipeline, stage or action name is acceptable
    pub fn is_valid_name(name: &str) -> bool {
        name_pattern().is_match(name)
    }

    /// Validate a declaration
    pub fn validate(spec: &PipelineSpec) -> Result<ValidationResult, StagegateError> {
        let mut result = ValidationResult::new();

        if spec.stages.is_empty() {
            result.add_error("Pipeline has no stages defined");
            return Ok(result);
        }

        Self::validate_names(spec, &mut result);
        Self::validate_source_placement(spec, &mut result);
        Self::validate_artifacts(spec, &mut result);
        Self::validate_references(spec, &mut result);
        Self::collect_warnings(spec, &mut result);

        // The graph re-checks ordering; only report it when nothing above did
        if result.is_valid() {
            match ArtifactGraph::build(spec) {
                Ok(_) => {}
                Err(StagegateError::ArtifactCycle { actions }) => {
                    result.add_error(&format!(
                        "Artifact flow contradicts stage order: {}",
                        actions.join(" → ")
                    ));
                }
                Err(e) => result.add_error(&format!("Graph validation error: {}", e)),
            }
        }

        debug!(
            pipeline = %spec.name,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated declaration"
        );

        Ok(result)
    }

    /// Name syntax, uniqueness and run-order checks
    fn validate_names(spec: &PipelineSpec, result: &mut ValidationResult) {
        let mut stage_names = HashSet::new();
        let mut action_names = HashSet::new();

        for stage in &spec.stages {
            if !name_pattern().is_match(&stage.name) {
                result.add_error(&format!("Stage name '{}' is not valid", stage.name));
            }
            if !stage_names.insert(stage.name.as_str()) {
                result.add_error(&format!("Duplicate stage name: '{}'", stage.name));
            }
            if stage.actions.is_empty() {
                result.add_error(&format!("Stage '{}' has no actions", stage.name));
            }

            for action in &stage.actions {
                if !name_pattern().is_match(&action.name) {
                    result.add_error(&format!(
                        "Stage '{}': Action name '{}' is not valid",
                        stage.name, action.name
                    ));
                }
                if !action_names.insert(action.name.as_str()) {
                    result.add_error(&format!("Duplicate action name: '{}'", action.name));
                }
                if action.run_order == 0 {
                    result.add_error(&format!(
                        "Stage '{}': Action '{}' has run-order 0; run-orders start at 1",
                        stage.name, action.name
                    ));
                }
            }
        }
    }

    /// Source actions belong in the first stage, and only there
    fn validate_source_placement(spec: &PipelineSpec, result: &mut ValidationResult) {
        for (idx, stage, action) in spec.actions() {
            let is_source = action.category() == ActionCategory::Source;
            if idx == 0 && !is_source {
                result.add_error(&format!(
                    "Stage '{}': Action '{}' is a {} action; the first stage may only hold source actions",
                    stage.name,
                    action.name,
                    action.category()
                ));
            }
            if idx > 0 && is_source {
                result.add_error(&format!(
                    "Stage '{}': Source action '{}' must be in the first stage",
                    stage.name, action.name
                ));
            }
        }
    }

    /// Each artifact has one producer that runs before all of its consumers
    fn validate_artifacts(spec: &PipelineSpec, result: &mut ValidationResult) {
        let mut producers: HashMap<&Artifact, (usize, u32, &str)> = HashMap::new();

        for (idx, _, action) in spec.actions() {
            if let Some(output) = action.output() {
                if let Some((_, _, first)) = producers.get(output) {
                    result.add_error(&format!(
                        "Artifact '{}' is produced by both '{}' and '{}'",
                        output, first, action.name
                    ));
                } else {
                    producers.insert(output, (idx, action.run_order, action.name.as_str()));
                }
            }
        }

        let mut consumed = HashSet::new();
        for (idx, stage, action) in spec.actions() {
            for input in action.inputs() {
                consumed.insert(input);
                match producers.get(input) {
                    None => result.add_error(&format!(
                        "Stage '{}': Action '{}' consumes '{}' which no action produces",
                        stage.name, action.name, input
                    )),
                    Some(&(p_idx, p_order, p_name)) => {
                        if (p_idx, p_order) >= (idx, action.run_order) {
                            result.add_error(&format!(
                                "Stage '{}': Action '{}' consumes '{}' before '{}' produces it",
                                stage.name, action.name, input, p_name
                            ));
                        }
                    }
                }
            }
        }

        for (artifact, (_, _, producer)) in &producers {
            if !consumed.contains(artifact) {
                result.add_warning(&format!(
                    "Artifact '{}' produced by '{}' is never consumed",
                    artifact, producer
                ));
            }
        }
    }

    /// Project and resource references resolve
    fn validate_references(spec: &PipelineSpec, result: &mut ValidationResult) {
        let mut ids = HashSet::new();
        for resource in &spec.resources {
            if !ids.insert(resource.id.as_str()) {
                result.add_error(&format!("Duplicate resource id: '{}'", resource.id));
            }
        }

        match spec.get_resource(&spec.artifact_store).map(|r| &r.kind) {
            Some(ResourceKind::ArtifactStore { encryption_key }) => {
                if !matches!(
                    spec.get_resource(encryption_key).map(|r| &r.kind),
                    Some(ResourceKind::EncryptionKey { .. })
                ) {
                    result.add_error(&format!(
                        "Artifact store '{}' references unknown encryption key '{}'",
                        spec.artifact_store, encryption_key
                    ));
                }
            }
            Some(other) => result.add_error(&format!(
                "Artifact store '{}' is a {}, not an artifact store",
                spec.artifact_store,
                other.kind_name()
            )),
            None => result.add_error(&format!(
                "Artifact store '{}' is not declared",
                spec.artifact_store
            )),
        }

        for project in &spec.projects {
            if !matches!(
                spec.get_resource(&project.role).map(|r| &r.kind),
                Some(ResourceKind::ExecutionRole { .. })
            ) {
                result.add_error(&format!(
                    "Project '{}' references unknown execution role '{}'",
                    project.name, project.role
                ));
            }
            if let Some(ref cache) = project.cache {
                if !matches!(
                    spec.get_resource(cache).map(|r| &r.kind),
                    Some(ResourceKind::BuildCache { .. })
                ) {
                    result.add_error(&format!(
                        "Project '{}' references unknown build cache '{}'",
                        project.name, cache
                    ));
                }
            }
            if project.build_spec.as_os_str().is_empty() {
                result.add_error(&format!(
                    "Project '{}' has an empty build spec path",
                    project.name
                ));
            }
        }

        for (_, stage, action) in spec.actions() {
            if let ActionKind::Build { project, .. } = &action.kind {
                if spec.get_project(project).is_none() {
                    result.add_error(&format!(
                        "Stage '{}': Action '{}' references unknown project '{}'",
                        stage.name, action.name, project
                    ));
                }
            }
        }
    }

    /// Legal but suspicious configuration
    fn collect_warnings(spec: &PipelineSpec, result: &mut ValidationResult) {
        let targets = spec.deployment_targets();
        let mut first_use: HashMap<_, (&str, &str)> = HashMap::new();
        for (stage, action, target) in &targets {
            match first_use.get(target) {
                Some(&(first_stage, first_action)) if first_stage != stage.name => {
                    result.add_warning(&format!(
                        "Deployment target '{}' is shared by '{}' ({}) and '{}' ({}); \
                         both environments deploy to the same group",
                        target, first_action, first_stage, action.name, stage.name
                    ));
                }
                Some(_) => {}
                None => {
                    first_use.insert(*target, (stage.name.as_str(), action.name.as_str()));
                }
            }
        }

        for resource in &spec.resources {
            if resource.kind.is_administrator_role() {
                result.add_warning(&format!(
                    "Execution role '{}' has administrative access; consider scoping it to the policies builds need",
                    resource.id
                ));
            }
        }

        for project in &spec.projects {
            if project.privileged {
                result.add_warning(&format!(
                    "Project '{}' runs builds in privileged mode",
                    project.name
                ));
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
