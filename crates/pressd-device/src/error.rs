// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device error types.

use thiserror::Error;

/// Why a device could not be opened.
///
/// The `Display` text is what gets handed to the caller's error sink, so it
/// names the URI (or host/path) involved.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Bad device URI '{uri}': {reason}")]
    BadUri { uri: String, reason: String },

    #[error("Unsupported device URI scheme '{0}'.")]
    UnsupportedScheme(String),

    #[error("Unable to lookup '{host}:{port}': {reason}")]
    ResolutionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Unable to connect to '{host}:{port}': {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to find USB printer matching '{0}'.")]
    DeviceNotFound(String),

    #[error("Unable to initialize USB access: {0}")]
    UsbInit(String),

    #[error("Unable to open '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a read or write on an open device.
///
/// Every variant is fatal for the call that produced it; transient
/// conditions (interrupted, would-block) are retried inside the backend and
/// never surface here.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device is closed")]
    Closed,

    #[error("device I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("USB transfer failed: {0}")]
    Usb(String),

    #[error("device has no read endpoint (uni-directional)")]
    NoReadEndpoint,
}
