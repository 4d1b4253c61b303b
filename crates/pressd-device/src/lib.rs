// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressd device layer: output transports behind one URI-addressed handle.
//
//   file:///dev/usb/lp0              character device or plain file
//   socket://10.0.0.5:9100           raw TCP (AppSocket / JetDirect)
//   usb://HP/LaserJet%201020?serial=X  USB printer class, matched by URI
//
// Errors from `open` are routed through a caller-supplied error sink as
// human-readable text *and* returned as a typed `OpenError`; this crate
// never logs them itself.

pub mod device;
pub mod error;
pub mod stream;
pub mod uri;
pub mod usb;

pub use device::Device;
pub use error::{DeviceError, OpenError};
pub use uri::DeviceUri;
