// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Pipeline declarations and types
//!
//! This module defines the release declaration model, the builder that
//! produces it, and the checks and views layered on top.

mod builder;
mod contract;
mod dag;
mod definition;
mod fingerprint;
mod validation;
mod walk;

pub use builder::*;
pub use contract::{ContractViolation, ReleaseContract};
pub use dag::{ActionNode, ArtifactGraph, EdgeKind};
pub use definition::*;
pub use fingerprint::{fingerprint, short as short_fingerprint};
pub use validation::{PipelineValidator, ValidationResult};
pub use walk::{PromotionWalk, RunOutcome, StepRecord, StepStatus, WalkOutcomes, WalkReport};
