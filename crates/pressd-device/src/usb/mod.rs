// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB printer-class support.
//
// `select` and `device_id` are pure and always built; the libusb-backed
// scanner and device binding need the `usb` feature.

pub mod device_id;
pub mod select;

#[cfg(feature = "usb")]
mod scan;

#[cfg(feature = "usb")]
pub use scan::{UsbBinding, UsbCandidate, UsbScanner};

pub use device_id::DeviceIdFields;
pub use select::UsbProtocol;
