// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressd core types, configuration, identity generation, and the error
// type shared across all crates.

pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::{PrinterConfig, SystemConfig};
pub use error::{PressdError, Result};
pub use types::*;
