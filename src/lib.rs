// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! # stagegate - Release Pipeline Synthesizer
//!
//! `stagegate` builds the declaration of a four-stage release pipeline:
//! source fetch, a staging build and deploy, a manual approval gate, and
//! a production build and deploy of the same source revision.
//!
//! ## Features
//!
//! - **One-call construction** - `ReleasePipelineBuilder` turns four parameters into a declaration
//! - **Checks** - structural validation plus the gated release contract
//! - **Artifact graph** - which action feeds which, as text, DOT or Mermaid
//! - **Promotion walk** - simulate failures and a rejected approval
//! - **Drift detection** - fingerprint a committed declaration against a fresh build
//!
//! ## Quick Start
//!
//! ```bash
//! stagegate init
//! stagegate synth -o release.yaml
//! stagegate walk --reject
//! ```
//!
//! ```no_run
//! use stagegate::{PipelineParams, ReleasePipelineBuilder};
//!
//! let spec = ReleasePipelineBuilder::new(PipelineParams {
//!     secret_ref: "github-token".into(),
//!     repo_owner: "acme".into(),
//!     repo_name: "app".into(),
//!     branch: "main".into(),
//!     load_balancer_ref: None,
//! })
//! .build()?;
//! println!("{}", spec.to_yaml()?);
//! # Ok::<(), stagegate::StagegateError>(())
//! ```

pub mod cli;
pub mod config;
pub mod emit;
pub mod errors;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use errors::{StagegateError, StagegateResult};
pub use pipeline::{PipelineParams, PipelineSpec, ReleasePipelineBuilder, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
