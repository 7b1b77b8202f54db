// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Stdout emitter

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{EmitReport, Emitter, RenderedDeclaration};
use crate::errors::StagegateError;

/// Prints declarations to standard output
pub struct StdoutEmitter;

impl StdoutEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdoutEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Emitter for StdoutEmitter {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn emit(&self, declaration: &RenderedDeclaration) -> Result<EmitReport, StagegateError> {
        let mut stdout = tokio::io::stdout();
        let write = async {
            stdout.write_all(declaration.content.as_bytes()).await?;
            if !declaration.content.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await
        };

        write.await.map_err(|e| StagegateError::EmitFailed {
            emitter: self.name().to_string(),
            message: e.to_string(),
        })?;

        Ok(EmitReport {
            emitter: self.name().to_string(),
            path: None,
            bytes: declaration.content.len(),
        })
    }
}
