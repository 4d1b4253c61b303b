// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// libusb-backed printer scanning and the open USB device binding.
//
// `UsbScanner` is a lazy iterator: it walks the attached devices one at a
// time, plans the printer-class interfaces worth trying, and yields each
// one already opened, negotiated and named.  Whatever the caller does not
// keep is released on drop, on every path.

use std::collections::VecDeque;
use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, Direction, Recipient, RequestType, TransferType, UsbContext};
use tracing::{debug, trace};

use super::device_id::{self, DEVICE_ID_BUFFER, DeviceIdFields};
use super::select::{
    AltSettingInfo, EndpointInfo, Selection, UsbProtocol, device_is_candidate, select_alt_setting,
};
use crate::error::{DeviceError, OpenError};
use crate::uri::assemble_usb_uri;

/// Bound for control transfers (configuration, Device ID).
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Bulk transfers block until completion or a device error.
const BULK_TIMEOUT: Duration = Duration::ZERO;

/// Printer-class GET_DEVICE_ID request.
const REQUEST_GET_DEVICE_ID: u8 = 0;

/// An open, claimed USB printer interface.
///
/// Dropping the binding releases the interface claim and closes the device.
pub struct UsbBinding {
    handle: DeviceHandle<Context>,
    vendor_id: u16,
    product_id: u16,
    configuration: u8,
    interface_number: u8,
    alt_setting: u8,
    read_endpoint: Option<u8>,
    write_endpoint: u8,
    protocol: UsbProtocol,
    claimed: bool,
}

impl UsbBinding {
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn protocol(&self) -> UsbProtocol {
        self.protocol
    }

    pub fn configuration(&self) -> u8 {
        self.configuration
    }

    pub fn interface_number(&self) -> u8 {
        self.interface_number
    }

    pub fn alt_setting(&self) -> u8 {
        self.alt_setting
    }

    /// One bulk-IN transfer with no timeout.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let endpoint = self.read_endpoint.ok_or(DeviceError::NoReadEndpoint)?;
        self.handle
            .read_bulk(endpoint, buf, BULK_TIMEOUT)
            .map_err(|e| DeviceError::Usb(format!("bulk read on 0x{endpoint:02x}: {e}")))
    }

    /// One bulk-OUT transfer with no timeout.
    pub fn write(&self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.handle
            .write_bulk(self.write_endpoint, buf, BULK_TIMEOUT)
            .map_err(|e| {
                DeviceError::Usb(format!("bulk write on 0x{:02x}: {e}", self.write_endpoint))
            })
    }

    /// Select the configuration, detach `usblp`, claim the interface and
    /// pick the alternate setting.
    fn negotiate(&mut self, num_alt_settings: usize) -> Result<(), String> {
        let current = self.handle.active_configuration().unwrap_or(0);
        if current != self.configuration {
            self.handle
                .set_active_configuration(self.configuration)
                .map_err(|e| {
                    format!(
                        "Unable to set configuration {} for USB printer {:04x}:{:04x}: {e}",
                        self.configuration, self.vendor_id, self.product_id
                    )
                })?;
        }

        #[cfg(target_os = "linux")]
        {
            if self
                .handle
                .kernel_driver_active(self.interface_number)
                .unwrap_or(false)
            {
                self.handle
                    .detach_kernel_driver(self.interface_number)
                    .map_err(|e| {
                        format!(
                            "Unable to detach usblp kernel driver for USB printer {:04x}:{:04x}: {e}",
                            self.vendor_id, self.product_id
                        )
                    })?;
            }
        }

        self.handle
            .claim_interface(self.interface_number)
            .map_err(|e| format!("Unable to claim USB interface: {e}"))?;
        self.claimed = true;

        if num_alt_settings > 1 {
            self.handle
                .set_alternate_setting(self.interface_number, self.alt_setting)
                .map_err(|e| format!("Unable to set alternate USB interface: {e}"))?;
        }

        Ok(())
    }

    /// Fetch the IEEE-1284 Device ID text.
    fn device_id(&self, config_index: u8, interface_index: u8) -> Result<String, String> {
        let mut buf = [0u8; DEVICE_ID_BUFFER];
        let request_type = rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        let index = (u16::from(interface_index) << 8) | u16::from(self.alt_setting);

        let received = self
            .handle
            .read_control(
                request_type,
                REQUEST_GET_DEVICE_ID,
                u16::from(config_index),
                index,
                &mut buf,
                CONTROL_TIMEOUT,
            )
            .map_err(|e| format!("Unable to get IEEE-1284 device ID: {e}"))?;

        trace!(
            received,
            head = %hex::encode(&buf[..received.min(16)]),
            "raw device id"
        );
        Ok(device_id::extract(&buf[..received]))
    }
}

impl Drop for UsbBinding {
    fn drop(&mut self) {
        if self.claimed {
            let _ = self.handle.release_interface(self.interface_number);
            self.claimed = false;
        }
    }
}

impl std::fmt::Debug for UsbBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbBinding")
            .field("vendor_id", &format_args!("{:04x}", self.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.product_id))
            .field("interface", &self.interface_number)
            .field("alt_setting", &self.alt_setting)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// A printer found during a scan, open and ready to use.
#[derive(Debug)]
pub struct UsbCandidate {
    /// `usb://make/model[?serial=...]`.
    pub uri: String,
    /// The raw IEEE-1284 Device ID (may be empty).
    pub device_id: String,
    binding: UsbBinding,
}

impl UsbCandidate {
    /// Keep the device open.
    pub fn into_binding(self) -> UsbBinding {
        self.binding
    }
}

/// One printer-class interface planned for opening.
struct Attempt {
    device: Device<Context>,
    vendor_id: u16,
    product_id: u16,
    serial_index: Option<u8>,
    config_index: u8,
    config_value: u8,
    interface_index: u8,
    num_alt_settings: usize,
    selection: Selection,
}

/// Lazy scan over attached USB printers.
///
/// Per-device failures are reported through the error sink and the scan
/// moves on.  Create a new scanner to start over.
pub struct UsbScanner<'sink> {
    _context: Context,
    devices: std::vec::IntoIter<Device<Context>>,
    pending: VecDeque<Attempt>,
    err_sink: &'sink mut dyn FnMut(&str),
}

impl<'sink> UsbScanner<'sink> {
    /// Initialise libusb and snapshot the device list.
    pub fn new(err_sink: &'sink mut dyn FnMut(&str)) -> Result<Self, OpenError> {
        let context = Context::new().map_err(|e| OpenError::UsbInit(e.to_string()))?;

        // The list itself is released here; each Device keeps its own ref.
        let devices: Vec<Device<Context>> = context
            .devices()
            .map_err(|e| OpenError::UsbInit(e.to_string()))?
            .iter()
            .collect();

        debug!(count = devices.len(), "scanning USB devices");

        Ok(Self {
            _context: context,
            devices: devices.into_iter(),
            pending: VecDeque::new(),
            err_sink,
        })
    }

    /// Pull candidates until `matcher` accepts one.
    pub fn find(
        matcher: &mut dyn FnMut(&str) -> bool,
        err_sink: &mut dyn FnMut(&str),
    ) -> Result<Option<UsbBinding>, OpenError> {
        for candidate in UsbScanner::new(err_sink)? {
            if matcher(&candidate.uri) {
                debug!(uri = %candidate.uri, "USB printer matched");
                return Ok(Some(candidate.into_binding()));
            }
        }
        Ok(None)
    }

    /// Queue every printer-class interface of `device`, best protocol first.
    fn plan_device(&mut self, device: Device<Context>) {
        let Ok(descriptor) = device.device_descriptor() else {
            trace!("USB device without descriptor skipped");
            return;
        };

        let (vendor_id, product_id) = (descriptor.vendor_id(), descriptor.product_id());
        if !device_is_candidate(descriptor.num_configurations(), vendor_id, product_id) {
            return;
        }

        let mut best: Option<UsbProtocol> = None;
        let mut planned = Vec::new();

        for config_index in 0..descriptor.num_configurations() {
            let Ok(config) = device.config_descriptor(config_index) else {
                continue;
            };

            for (interface_index, interface) in config.interfaces().enumerate() {
                let alt_settings: Vec<AltSettingInfo> = interface
                    .descriptors()
                    .map(|alt| AltSettingInfo {
                        class_code: alt.class_code(),
                        sub_class_code: alt.sub_class_code(),
                        protocol_code: alt.protocol_code(),
                        interface_number: alt.interface_number(),
                        setting_number: alt.setting_number(),
                        endpoints: alt
                            .endpoint_descriptors()
                            .map(|ep| EndpointInfo {
                                address: ep.address(),
                                bulk: ep.transfer_type() == TransferType::Bulk,
                            })
                            .collect(),
                    })
                    .collect();

                let Some(selection) = select_alt_setting(&alt_settings, best) else {
                    continue;
                };
                best = Some(selection.protocol);

                planned.push(Attempt {
                    device: device.clone(),
                    vendor_id,
                    product_id,
                    serial_index: descriptor.serial_number_string_index(),
                    config_index,
                    config_value: config.number(),
                    interface_index: interface_index as u8,
                    num_alt_settings: alt_settings.len(),
                    selection,
                });
            }
        }

        // Stable: equal protocols keep descriptor order.
        planned.sort_by(|a, b| b.selection.protocol.cmp(&a.selection.protocol));
        self.pending.extend(planned);
    }

    /// Open and name one planned interface; `None` when it could not be used.
    fn open_attempt(&mut self, attempt: Attempt) -> Option<UsbCandidate> {
        let handle = match attempt.device.open() {
            Ok(handle) => handle,
            Err(e) => {
                (self.err_sink)(&format!(
                    "Unable to open USB printer {:04x}:{:04x}: {e}",
                    attempt.vendor_id, attempt.product_id
                ));
                return None;
            }
        };

        let selection = attempt.selection;
        let mut binding = UsbBinding {
            handle,
            vendor_id: attempt.vendor_id,
            product_id: attempt.product_id,
            configuration: attempt.config_value,
            interface_number: selection.interface_number,
            alt_setting: selection.alt_setting,
            read_endpoint: selection.read_endpoint,
            write_endpoint: selection.write_endpoint,
            protocol: selection.protocol,
            claimed: false,
        };

        if let Err(message) = binding.negotiate(attempt.num_alt_settings) {
            (self.err_sink)(&message);
            return None;
        }

        let device_id = match binding.device_id(attempt.config_index, attempt.interface_index) {
            Ok(id) => id,
            Err(message) => {
                (self.err_sink)(&message);
                String::new()
            }
        };

        let fields = DeviceIdFields::parse(&device_id);
        let serial = fields.serial.clone().or_else(|| {
            attempt
                .serial_index
                .and_then(|index| binding.handle.read_string_descriptor_ascii(index).ok())
                .filter(|s| !s.is_empty())
        });

        let uri = assemble_usb_uri(
            fields.make_or_unknown(),
            fields.model_or_unknown(),
            serial.as_deref(),
        );
        debug!(%uri, protocol = ?binding.protocol, "USB printer candidate");

        Some(UsbCandidate {
            uri,
            device_id,
            binding,
        })
    }
}

impl Iterator for UsbScanner<'_> {
    type Item = UsbCandidate;

    fn next(&mut self) -> Option<UsbCandidate> {
        loop {
            if let Some(attempt) = self.pending.pop_front() {
                if let Some(candidate) = self.open_attempt(attempt) {
                    return Some(candidate);
                }
                continue;
            }
            let device = self.devices.next()?;
            self.plan_device(device);
        }
    }
}
