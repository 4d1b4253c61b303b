// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The device handle: one open output transport behind a uniform
// read/write/close contract.
//
// A handle is owned by one writer for the lifetime of a transmission; it is
// `Send` but deliberately not shared.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::error::{DeviceError, OpenError};
use crate::stream::FdStream;
use crate::uri::{DEFAULT_SOCKET_PORT, DeviceUri};

#[cfg(feature = "usb")]
use crate::usb::{UsbBinding, UsbScanner};

/// Size of the formatting buffer used by [`Device::printf`].
pub const PRINTF_BUFFER_SIZE: usize = 8192;

/// Environment variable naming the outbound-bytes tee file.
#[cfg(feature = "debug-tee")]
pub const DEBUG_TEE_ENV: &str = "PRESSD_DEVICE_DEBUG";

/// The active transport.
enum Backend {
    Stream(FdStream),
    #[cfg(feature = "usb")]
    Usb(UsbBinding),
    Closed,
}

/// An open output device.
pub struct Device {
    backend: Backend,
    uri: String,
    #[cfg(feature = "debug-tee")]
    tee: Option<std::fs::File>,
}

impl Device {
    /// Open the device named by `uri`.
    ///
    /// Supported schemes: `file`, `socket`, and (with the `usb` feature)
    /// `usb`.  On failure the error text is passed to `err_sink` and the
    /// typed error is returned; nothing is logged.
    #[instrument(skip(err_sink))]
    pub fn open(uri: &str, err_sink: &mut dyn FnMut(&str)) -> Result<Self, OpenError> {
        match Self::open_backend(uri, err_sink) {
            Ok(backend) => {
                info!(uri, "device opened");
                Ok(Self {
                    backend,
                    uri: uri.to_string(),
                    #[cfg(feature = "debug-tee")]
                    tee: open_tee(),
                })
            }
            Err(e) => {
                err_sink(&e.to_string());
                Err(e)
            }
        }
    }

    fn open_backend(
        uri: &str,
        #[cfg_attr(not(feature = "usb"), allow(unused_variables))] err_sink: &mut dyn FnMut(&str),
    ) -> Result<Backend, OpenError> {
        let parsed = DeviceUri::parse(uri).map_err(|reason| OpenError::BadUri {
            uri: uri.to_string(),
            reason,
        })?;

        match parsed.scheme.as_str() {
            "file" => Ok(Backend::Stream(FdStream::open_file(&parsed.resource)?)),
            "socket" => {
                if parsed.host.is_empty() {
                    return Err(OpenError::BadUri {
                        uri: uri.to_string(),
                        reason: "missing host name".into(),
                    });
                }
                let port = parsed.port.unwrap_or(DEFAULT_SOCKET_PORT);
                Ok(Backend::Stream(FdStream::connect(&parsed.host, port)?))
            }
            #[cfg(feature = "usb")]
            "usb" => {
                let mut matches_uri = |candidate: &str| candidate == uri;
                match UsbScanner::find(&mut matches_uri, err_sink)? {
                    Some(binding) => Ok(Backend::Usb(binding)),
                    None => Err(OpenError::DeviceNotFound(uri.to_string())),
                }
            }
            other => Err(OpenError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Enumerate attached USB printers, calling `matcher` with each
    /// candidate URI until it returns `true`.
    ///
    /// Without the `usb` feature this does nothing.
    #[cfg_attr(not(feature = "usb"), allow(unused_variables))]
    pub fn list(matcher: &mut dyn FnMut(&str) -> bool, err_sink: &mut dyn FnMut(&str)) {
        #[cfg(feature = "usb")]
        {
            match UsbScanner::find(matcher, err_sink) {
                Ok(Some(binding)) => debug!(?binding, "listing stopped at match"),
                Ok(None) => {}
                Err(e) => err_sink(&e.to_string()),
            }
        }
    }

    /// The URI this device was opened with.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether the handle still owns a transport.
    pub fn is_open(&self) -> bool {
        !matches!(self.backend, Backend::Closed)
    }

    /// Blocking read of up to `buf.len()` bytes; `Ok(0)` is end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        match &mut self.backend {
            Backend::Stream(stream) => Ok(stream.read(buf)?),
            #[cfg(feature = "usb")]
            Backend::Usb(binding) => binding.read(buf),
            Backend::Closed => Err(DeviceError::Closed),
        }
    }

    /// Blocking write.
    ///
    /// Descriptor-backed devices either write everything or fail.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        #[cfg(feature = "debug-tee")]
        if let Some(tee) = self.tee.as_mut() {
            use std::io::Write;
            let _ = tee.write_all(buf);
        }

        match &mut self.backend {
            Backend::Stream(stream) => Ok(stream.write(buf)?),
            #[cfg(feature = "usb")]
            Backend::Usb(binding) => binding.write(buf),
            Backend::Closed => Err(DeviceError::Closed),
        }
    }

    /// Format into a bounded buffer and write it.
    ///
    /// Output beyond [`PRINTF_BUFFER_SIZE`] bytes is silently dropped.
    pub fn printf(&mut self, args: fmt::Arguments<'_>) -> Result<usize, DeviceError> {
        let mut buf = BoundedBuffer::default();
        // Truncation is reported as fmt::Error and is accepted.
        let _ = fmt::write(&mut buf, args);
        self.write(&buf.bytes)
    }

    /// Write a literal string.
    pub fn puts(&mut self, s: &str) -> Result<usize, DeviceError> {
        self.write(s.as_bytes())
    }

    /// Release the transport.  Further calls are no-ops and further I/O
    /// fails with [`DeviceError::Closed`].
    pub fn close(&mut self) {
        let backend = std::mem::replace(&mut self.backend, Backend::Closed);
        match backend {
            Backend::Stream(stream) => {
                stream.shutdown_write();
                debug!(uri = %self.uri, "device closed");
            }
            #[cfg(feature = "usb")]
            Backend::Usb(binding) => {
                drop(binding);
                debug!(uri = %self.uri, "USB device released");
            }
            Backend::Closed => {}
        }
        #[cfg(feature = "debug-tee")]
        {
            self.tee = None;
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match &self.backend {
            Backend::Stream(FdStream::File(_)) => "file",
            Backend::Stream(FdStream::Socket(_)) => "socket",
            #[cfg(feature = "usb")]
            Backend::Usb(_) => "usb",
            Backend::Closed => "closed",
        };
        f.debug_struct("Device")
            .field("uri", &self.uri)
            .field("backend", &backend)
            .finish()
    }
}

#[cfg(feature = "debug-tee")]
fn open_tee() -> Option<std::fs::File> {
    let path = std::env::var_os(DEBUG_TEE_ENV)?;
    std::fs::File::create(path).ok()
}

/// `fmt::Write` sink that stops at [`PRINTF_BUFFER_SIZE`] bytes.
#[derive(Default)]
struct BoundedBuffer {
    bytes: Vec<u8>,
}

impl fmt::Write for BoundedBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = PRINTF_BUFFER_SIZE - self.bytes.len();
        if s.len() <= room {
            self.bytes.extend_from_slice(s.as_bytes());
            Ok(())
        } else {
            self.bytes.extend_from_slice(&s.as_bytes()[..room]);
            Err(fmt::Error)
        }
    }
}
