// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Declaration emitters
//!
//! An emitter hands a rendered declaration to whatever submits it to the
//! orchestration service: a file that is committed and applied later, or
//! stdout for piping.

mod file;
mod stdout;

pub use file::FileEmitter;
pub use stdout::StdoutEmitter;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::StagegateError;
use crate::pipeline::{fingerprint, DeclarationFormat, PipelineSpec};

/// A declaration serialized and fingerprinted, ready to emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDeclaration {
    /// Pipeline name
    pub name: String,
    /// Serialization format
    pub format: DeclarationFormat,
    /// Serialized document
    pub content: String,
    /// Fingerprint of the declaration
    pub fingerprint: String,
}

impl RenderedDeclaration {
    /// Render a declaration in the given format
    pub fn render(spec: &PipelineSpec, format: DeclarationFormat) -> Result<Self, StagegateError> {
        Ok(Self {
            name: spec.name.clone(),
            format,
            content: spec.render(format)?,
            fingerprint: fingerprint(spec)?,
        })
    }
}

/// What an emitter did
#[derive(Debug, Clone)]
pub struct EmitReport {
    /// Emitter name
    pub emitter: String,
    /// File written, when the emitter writes one
    pub path: Option<PathBuf>,
    /// Bytes emitted
    pub bytes: usize,
}

/// Trait for declaration emitters
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Emitter name
    fn name(&self) -> &str;

    /// Emit a rendered declaration
    async fn emit(&self, declaration: &RenderedDeclaration) -> Result<EmitReport, StagegateError>;
}

/// Emitter for an optional output path: a file when given, stdout otherwise
pub fn emitter_for(path: Option<PathBuf>) -> Box<dyn Emitter> {
    match path {
        Some(path) => Box::new(FileEmitter::new(path)),
        None => Box::new(StdoutEmitter::new()),
    }
}
