// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! File emitter

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{EmitReport, Emitter, RenderedDeclaration};
use crate::errors::StagegateError;
use crate::pipeline::{fingerprint, DeclarationFormat, PipelineSpec};

/// Writes declarations to a file, creating parent directories
pub struct FileEmitter {
    path: PathBuf,
}

impl FileEmitter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compare the declaration on disk with a freshly rendered one
    pub async fn check_current(
        &self,
        declaration: &RenderedDeclaration,
    ) -> Result<(), StagegateError> {
        let existing = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StagegateError::FileReadError {
                path: self.path.clone(),
                error: e.to_string(),
            }
        })?;

        // The file on disk is parsed by its own extension
        let existing = match DeclarationFormat::from_path(&self.path)? {
            DeclarationFormat::Yaml => PipelineSpec::from_yaml(&existing)?,
            DeclarationFormat::Json => PipelineSpec::from_json(&existing)?,
        };
        let found = fingerprint(&existing)?;

        if found != declaration.fingerprint {
            return Err(StagegateError::Drift {
                path: self.path.clone(),
                expected: declaration.fingerprint.clone(),
                found,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Emitter for FileEmitter {
    fn name(&self) -> &str {
        "file"
    }

    async fn emit(&self, declaration: &RenderedDeclaration) -> Result<EmitReport, StagegateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StagegateError::FileWriteError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        tokio::fs::write(&self.path, declaration.content.as_bytes())
            .await
            .map_err(|e| StagegateError::FileWriteError {
                path: self.path.clone(),
                error: e.to_string(),
            })?;

        info!(
            path = %self.path.display(),
            pipeline = %declaration.name,
            fingerprint = %crate::pipeline::short_fingerprint(&declaration.fingerprint),
            "wrote declaration"
        );

        Ok(EmitReport {
            emitter: self.name().to_string(),
            path: Some(self.path.clone()),
            bytes: declaration.content.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineParams, ReleasePipelineBuilder};
    use tempfile::TempDir;

    fn rendered(branch: &str, format: DeclarationFormat) -> RenderedDeclaration {
        let spec = ReleasePipelineBuilder::new(PipelineParams {
            secret_ref: "github-token".into(),
            repo_owner: "acme".into(),
            repo_name: "app".into(),
            branch: branch.into(),
            load_balancer_ref: None,
        })
        .build()
        .unwrap();
        RenderedDeclaration::render(&spec, format).unwrap()
    }

    #[tokio::test]
    async fn test_writes_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deploy").join("release.yaml");
        let emitter = FileEmitter::new(path.clone());

        let declaration = rendered("main", DeclarationFormat::Yaml);
        let report = emitter.emit(&declaration).await.unwrap();

        assert_eq!(report.path.as_deref(), Some(path.as_path()));
        assert_eq!(report.bytes, declaration.content.len());
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(PipelineSpec::from_yaml(&written).unwrap().name, "release");
    }

    #[tokio::test]
    async fn test_check_current_detects_drift() {
        let dir = TempDir::new().unwrap();
        let emitter = FileEmitter::new(dir.path().join("release.json"));

        emitter
            .emit(&rendered("main", DeclarationFormat::Json))
            .await
            .unwrap();

        assert!(emitter
            .check_current(&rendered("main", DeclarationFormat::Json))
            .await
            .is_ok());

        let result = emitter
            .check_current(&rendered("develop", DeclarationFormat::Json))
            .await;
        assert!(matches!(result, Err(StagegateError::Drift { .. })));
    }

    #[tokio::test]
    async fn test_check_current_reads_file_by_extension() {
        let dir = TempDir::new().unwrap();
        let emitter = FileEmitter::new(dir.path().join("release.yaml"));

        emitter
            .emit(&rendered("main", DeclarationFormat::Yaml))
            .await
            .unwrap();

        assert!(emitter
            .check_current(&rendered("main", DeclarationFormat::Json))
            .await
            .is_ok());
    }
}
