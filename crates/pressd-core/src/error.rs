// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for pressd.

use thiserror::Error;

/// Top-level error type for all pressd operations.
#[derive(Debug, Error)]
pub enum PressdError {
    // -- Startup --
    /// The runtime cannot be constructed (bad name, spool directory
    /// uncreatable, unreadable config file).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The runtime was driven in a way its state machine forbids, such as
    /// running twice or running without listeners.
    #[error("usage error: {0}")]
    Usage(String),

    // -- Runtime --
    #[error("device error: {0}")]
    Device(String),

    #[error("DNS-SD error: {0}")]
    DnsSd(String),

    #[error("unknown printer: {0}")]
    UnknownPrinter(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// A job was moved to a state the call does not allow, e.g. a terminal
    /// state through `set_job_state`.
    #[error("job {job}: state {state} not allowed here")]
    InvalidJobState { job: String, state: String },

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PressdError>;
