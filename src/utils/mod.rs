// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Utility modules
//!
//! Common utilities for the stagegate CLI.

pub mod colors;

pub use colors::*;
