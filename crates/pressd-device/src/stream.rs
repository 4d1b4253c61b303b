// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Descriptor-backed transports: character-special files and raw TCP sockets.
//
// Both are plain blocking byte streams.  Reads and writes retry
// transparently on `Interrupted` and `WouldBlock` without an attempt limit;
// anything else is fatal for the call.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::OpenError;

/// Upper bound for establishing a `socket://` connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An open file or socket.
#[derive(Debug)]
pub enum FdStream {
    File(File),
    Socket(TcpStream),
}

impl FdStream {
    /// Open `path` for exclusive read/write access.
    pub fn open_file(path: &str) -> Result<Self, OpenError> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_EXCL);
        }

        let file = options.open(path).map_err(|source| OpenError::Io {
            path: path.to_string(),
            source,
        })?;

        debug!(path, "opened file device");
        Ok(Self::File(file))
    }

    /// Resolve `host:port` and connect to the first address that answers.
    ///
    /// Every resolved address is tried in order; the whole attempt is
    /// bounded by [`CONNECT_TIMEOUT`].
    pub fn connect(host: &str, port: u16) -> Result<Self, OpenError> {
        let addrs: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(|e| OpenError::ResolutionFailed {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(OpenError::ResolutionFailed {
                host: host.to_string(),
                port,
                reason: "no addresses found".into(),
            });
        }

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        let mut last_error = io::Error::from(io::ErrorKind::TimedOut);

        for addr in addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(stream) => {
                    debug!(%addr, "connected socket device");
                    return Ok(Self::Socket(stream));
                }
                Err(e) => last_error = e,
            }
        }

        Err(OpenError::ConnectFailed {
            host: host.to_string(),
            port,
            source: last_error,
        })
    }

    /// Blocking read; `Ok(0)` means end of stream.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_retrying(self, buf)
    }

    /// Blocking write of the whole buffer.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        write_retrying(self, buf)
    }

    /// Tell the peer we are done sending (sockets only).
    pub fn shutdown_write(&self) {
        if let Self::Socket(stream) = self {
            let _ = stream.shutdown(Shutdown::Write);
        }
    }
}

impl Read for FdStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Socket(s) => s.read(buf),
        }
    }
}

impl Write for FdStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.write(buf),
            Self::Socket(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(f) => f.flush(),
            Self::Socket(s) => s.flush(),
        }
    }
}

fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Read once, retrying transient failures until data, EOF, or a real error.
pub fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if is_retryable(&e) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Write all of `buf`, accumulating partial writes.
///
/// Returns `buf.len()` on success; there is no short count.
pub fn write_retrying<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match writer.write(&buf[total..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("device accepted no bytes after {total} of {}", buf.len()),
                ));
            }
            Ok(n) => total += n,
            Err(e) if is_retryable(&e) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
