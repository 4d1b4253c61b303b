// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DNS-SD advertisement.
//
// The runtime only needs to register, re-register and withdraw names; the
// `DnsSdRegistrar` trait is that seam.  `MdnsRegistrar` implements it on top
// of the `mdns-sd` daemon.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

use pressd_core::{PressdError, Result};

/// Service type advertised for the system itself.
pub const SYSTEM_SERVICE_TYPE: &str = "_ipp._tcp.local.";

/// Service type advertised for each printer's raw data port.
pub const PRINTER_SERVICE_TYPE: &str = "_pdl-datastream._tcp.local.";

/// Which kind of object an instance name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    System,
    Printer,
}

/// Registers service instances with a DNS-SD responder.
pub trait DnsSdRegistrar: Send + Sync {
    fn register_system(&self, instance: &str, port: u16, uuid: &str) -> Result<()>;

    fn register_printer(&self, instance: &str, port: u16, uuid: &str, device_uri: &str)
    -> Result<()>;

    /// Withdraw a previously registered instance.  Unknown names are ignored.
    fn unregister(&self, kind: ServiceKind, instance: &str) -> Result<()>;
}

/// Multicast DNS registrar.
pub struct MdnsRegistrar {
    daemon: ServiceDaemon,
    hostname: String,
    subtype: Option<String>,
    registered: Mutex<HashMap<(ServiceKind, String), String>>,
}

impl MdnsRegistrar {
    /// Start an mDNS daemon advertising on behalf of `hostname`.
    ///
    /// `subtypes` is the comma separated list from the configuration; the
    /// first entry is attached to the system registration.
    pub fn new(hostname: &str, subtypes: Option<&str>) -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| PressdError::DnsSd(format!("failed to create mDNS daemon: {e}")))?;

        let subtype = subtypes
            .and_then(|s| s.split(',').map(str::trim).find(|s| !s.is_empty()))
            .map(str::to_string);

        Ok(Self {
            daemon,
            hostname: hostname.trim_end_matches(".local").to_string(),
            subtype,
            registered: Mutex::new(HashMap::new()),
        })
    }

    fn register(
        &self,
        kind: ServiceKind,
        service_type: &str,
        instance: &str,
        port: u16,
        properties: &[(&str, &str)],
    ) -> Result<()> {
        let info = ServiceInfo::new(
            service_type,
            instance,
            &format!("{}.local.", self.hostname),
            "",
            port,
            properties,
        )
        .map_err(|e| PressdError::DnsSd(format!("service info for '{instance}': {e}")))?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_owned();
        self.daemon
            .register(info)
            .map_err(|e| PressdError::DnsSd(format!("register '{instance}': {e}")))?;

        info!(service_type, name = %instance, port, "mDNS service registered");
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((kind, instance.to_string()), fullname);
        Ok(())
    }
}

impl DnsSdRegistrar for MdnsRegistrar {
    fn register_system(&self, instance: &str, port: u16, uuid: &str) -> Result<()> {
        let service_type = match &self.subtype {
            Some(sub) => format!("{sub}._sub.{SYSTEM_SERVICE_TYPE}"),
            None => SYSTEM_SERVICE_TYPE.to_string(),
        };
        let uuid = uuid.trim_start_matches("urn:uuid:");
        let properties = [("txtvers", "1"), ("qtotal", "1"), ("rp", "ipp/print"), ("UUID", uuid)];
        self.register(ServiceKind::System, &service_type, instance, port, &properties)
    }

    fn register_printer(
        &self,
        instance: &str,
        port: u16,
        uuid: &str,
        device_uri: &str,
    ) -> Result<()> {
        let uuid = uuid.trim_start_matches("urn:uuid:");
        let scheme = device_uri.split("://").next().unwrap_or_default();
        let properties = [("txtvers", "1"), ("UUID", uuid), ("device", scheme)];
        self.register(ServiceKind::Printer, PRINTER_SERVICE_TYPE, instance, port, &properties)
    }

    fn unregister(&self, kind: ServiceKind, instance: &str) -> Result<()> {
        let fullname = self
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind, instance.to_string()));

        if let Some(fullname) = fullname {
            self.daemon
                .unregister(&fullname)
                .map_err(|e| PressdError::DnsSd(format!("unregister '{fullname}': {e}")))?;
            info!(name = %fullname, "mDNS service unregistered");
        }
        Ok(())
    }
}

impl Drop for MdnsRegistrar {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "failed to shut down mDNS daemon");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Registrar that records calls instead of touching the network.
    #[derive(Default)]
    pub(crate) struct RecordingRegistrar {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingRegistrar {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DnsSdRegistrar for RecordingRegistrar {
        fn register_system(&self, instance: &str, port: u16, _uuid: &str) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("+system {instance}:{port}"));
            Ok(())
        }

        fn register_printer(
            &self,
            instance: &str,
            port: u16,
            _uuid: &str,
            _device_uri: &str,
        ) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("+printer {instance}:{port}"));
            Ok(())
        }

        fn unregister(&self, kind: ServiceKind, instance: &str) -> Result<()> {
            let kind = match kind {
                ServiceKind::System => "system",
                ServiceKind::Printer => "printer",
            };
            self.events
                .lock()
                .unwrap()
                .push(format!("-{kind} {instance}"));
            Ok(())
        }
    }

    #[test]
    fn recording_registrar_tracks_order() {
        let r = RecordingRegistrar::default();
        r.register_system("pressd", 8000, "urn:uuid:x").unwrap();
        r.unregister(ServiceKind::System, "pressd").unwrap();
        r.register_system("pressd (2)", 8000, "urn:uuid:x").unwrap();
        assert_eq!(
            r.events(),
            vec!["+system pressd:8000", "-system pressd", "+system pressd (2):8000"]
        );
    }
}
