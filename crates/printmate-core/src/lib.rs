// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printmate — Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod pricing;
pub mod remedy;
pub mod types;

pub use config::PrepareConfig;
pub use error::PrintmateError;
pub use types::*;
