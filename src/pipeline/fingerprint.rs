// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Declaration fingerprints
//!
//! BLAKE3 over the canonical JSON encoding. Two declarations share a
//! fingerprint exactly when they describe the same pipeline, whatever file
//! format or key order they were loaded from.

use blake3::Hasher;

use crate::errors::StagegateError;
use crate::pipeline::PipelineSpec;

/// Compute the fingerprint of a declaration
pub fn fingerprint(spec: &PipelineSpec) -> Result<String, StagegateError> {
    let canonical = serde_json::to_vec(spec)?;

    let mut hasher = Hasher::new();
    hasher.update(b"stagegate/declaration/v1\0");
    hasher.update(&canonical);

    Ok(hasher.finalize().to_hex().to_string())
}

/// First 12 hex characters, for display
pub fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}
