// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the pressd runtime.

use serde::{Deserialize, Serialize};

/// Identifier assigned to a printer when it joins the system.
///
/// Ids are handed out from a monotonically increasing counter starting at 1
/// and are never reused within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrinterId(pub u32);

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to each accepted client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-printer job number (IPP style: small sequential integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created, data still arriving.
    Pending,
    /// Being streamed to the output device.
    Processing,
    /// All bytes reached the device.
    Completed,
    /// Transmission failed.
    Aborted,
    /// Cancelled before completion.
    Canceled,
}

impl JobState {
    /// Whether the job still counts as active (holds the printer).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Lifecycle of the service runtime.
///
/// `Created → Running → (ShuttingDown) → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Not chosen yet; resolved to [`LogLevel::Error`] at system creation.
    #[default]
    Unspec,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Resolve `Unspec` to the runtime default.
    pub fn resolved(self) -> Self {
        match self {
            Self::Unspec => Self::Error,
            other => other,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(self) -> &'static str {
        match self.resolved() {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Fatal | Self::Unspec => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            "" | "unspec" => Ok(Self::Unspec),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspec_log_level_resolves_to_error() {
        assert_eq!(LogLevel::Unspec.resolved(), LogLevel::Error);
        assert_eq!(LogLevel::Info.resolved(), LogLevel::Info);
        assert_eq!(LogLevel::Fatal.filter_directive(), "error");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn only_pending_and_processing_jobs_are_active() {
        assert!(JobState::Pending.is_active());
        assert!(JobState::Processing.is_active());
        assert!(!JobState::Completed.is_active());
        assert!(!JobState::Aborted.is_active());
        assert!(!JobState::Canceled.is_active());
    }
}
