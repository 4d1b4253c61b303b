// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent system configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PressdError, Result};
use crate::types::LogLevel;

/// File name used for the saved configuration inside the spool directory.
pub const CONFIG_FILE_NAME: &str = "pressd.json";

/// A printer as it is persisted: just enough to recreate it on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Human-readable printer name (also the DNS-SD instance name).
    pub name: String,
    /// Output transport, e.g. `socket://10.0.0.5:9100` or `usb://HP/LaserJet`.
    pub device_uri: String,
}

/// Settings used to create the service runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// System name, advertised via DNS-SD. Must not be empty.
    pub name: String,
    /// Fixed system UUID (`urn:uuid:...`); generated when absent.
    pub uuid: Option<String>,
    /// Hostname; resolved from the OS when absent.
    pub hostname: Option<String>,
    /// Listening port, `0` selects `8000 + uid % 1000`.
    pub port: u16,
    /// Spool directory; defaults to `$TMPDIR/pressd<uid>.d`.
    pub spool_dir: Option<PathBuf>,
    /// Log target: a path, `"syslog"`, or `"-"` for stderr.
    /// Defaults to `$TMPDIR/pressd<uid>.log`.
    pub log_file: Option<String>,
    /// Log verbosity.
    pub log_level: LogLevel,
    /// PAM service name used for authentication, `"none"` disables it.
    pub auth_service: Option<String>,
    /// DNS-SD sub-types, comma separated.
    pub subtypes: Option<String>,
    /// Hostnames or addresses to listen on (`"*"` = all interfaces).
    pub listen: Vec<String>,
    /// Printers recreated at startup.
    pub printers: Vec<PrinterConfig>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "pressd".into(),
            uuid: None,
            hostname: None,
            port: 0,
            spool_dir: None,
            log_file: None,
            log_level: LogLevel::Unspec,
            auth_service: None,
            subtypes: None,
            listen: Vec::new(),
            printers: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Read a configuration file written by [`SystemConfig::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PressdError::Configuration(format!("read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the configuration as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The authentication service with the `"none"` sentinel normalised away.
    pub fn effective_auth_service(&self) -> Option<&str> {
        match self.auth_service.as_deref() {
            None | Some("none") | Some("") => None,
            Some(other) => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_service_none_is_normalised() {
        let mut config = SystemConfig {
            auth_service: Some("none".into()),
            ..SystemConfig::default()
        };
        assert_eq!(config.effective_auth_service(), None);

        config.auth_service = Some("cups".into());
        assert_eq!(config.effective_auth_service(), Some("cups"));
    }

    #[test]
    fn save_then_load_preserves_printers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = SystemConfig {
            name: "Front Desk".into(),
            port: 8631,
            printers: vec![PrinterConfig {
                name: "Label".into(),
                device_uri: "socket://10.0.0.7:9100".into(),
            }],
            ..SystemConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = SystemConfig::load(&path).unwrap();
        assert_eq!(loaded.name, "Front Desk");
        assert_eq!(loaded.port, 8631);
        assert_eq!(loaded.printers, config.printers);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: SystemConfig = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(config.name, "x");
        assert_eq!(config.port, 0);
        assert_eq!(config.log_level, LogLevel::Unspec);
        assert!(config.listen.is_empty());
    }

    #[test]
    fn load_missing_file_is_configuration_error() {
        let err = SystemConfig::load("/nonexistent/pressd.json").unwrap_err();
        assert!(matches!(err, PressdError::Configuration(_)));
    }
}
