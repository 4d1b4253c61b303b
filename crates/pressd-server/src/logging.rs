// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Log target selection and subscriber installation.
//
// The configured log file is resolved in a fixed order: the literal
// "syslog" routes to syslog(3), "-" routes to stderr, anything else is a
// path opened create+append without following symlinks.  A path that cannot
// be opened falls back to stderr.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{Level, Metadata, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use pressd_core::{LogLevel, PressdError, Result};

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Syslog,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Interpret a configured log file value; `None` selects `default_path`.
    pub fn resolve(log_file: Option<&str>, default_path: &Path) -> Self {
        match log_file {
            None | Some("") => Self::File(default_path.to_path_buf()),
            Some("syslog") => Self::Syslog,
            Some("-") => Self::Stderr,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }

    /// The value that resolves back to this target.
    pub fn as_config_value(&self) -> String {
        match self {
            Self::Syslog => "syslog".into(),
            Self::Stderr => "-".into(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Open a log file for appending: created 0600, never through a symlink.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options
            .mode(0o600)
            .custom_flags(libc::O_NOFOLLOW | libc::O_CLOEXEC);
    }

    options.open(path)
}

/// A resolved, opened sink.
#[derive(Debug, Clone)]
pub enum LogSink {
    Stderr,
    File(Arc<File>),
    Syslog,
}

impl LogSink {
    /// Open `target`, falling back to stderr when a file cannot be opened.
    ///
    /// Returns the sink and the target actually in use.
    pub fn open(target: &LogTarget) -> (Self, LogTarget) {
        match target {
            LogTarget::Stderr => (Self::Stderr, LogTarget::Stderr),
            LogTarget::Syslog => {
                // SAFETY: the ident is a static C string literal.
                unsafe {
                    libc::openlog(c"pressd".as_ptr(), libc::LOG_PID, libc::LOG_LPR);
                }
                (Self::Syslog, LogTarget::Syslog)
            }
            LogTarget::File(path) => match open_log_file(path) {
                Ok(file) => (Self::File(Arc::new(file)), target.clone()),
                Err(e) => {
                    eprintln!(
                        "pressd: unable to open log file '{}': {e}, using stderr",
                        path.display()
                    );
                    (Self::Stderr, LogTarget::Stderr)
                }
            },
        }
    }
}

/// Writer handed out per event.
pub enum SinkWriter<'a> {
    Stderr(io::Stderr),
    File(&'a File),
    Syslog(SyslogWriter),
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr(w) => w.write(buf),
            Self::File(w) => w.write(buf),
            Self::Syslog(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr(w) => w.flush(),
            Self::File(w) => w.flush(),
            Self::Syslog(w) => w.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            Self::Stderr => SinkWriter::Stderr(io::stderr()),
            Self::File(file) => SinkWriter::File(file.as_ref()),
            Self::Syslog => SinkWriter::Syslog(SyslogWriter::new(libc::LOG_INFO)),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        match self {
            Self::Syslog => SinkWriter::Syslog(SyslogWriter::new(syslog_priority(*meta.level()))),
            _ => self.make_writer(),
        }
    }
}

fn syslog_priority(level: Level) -> libc::c_int {
    match level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

/// Buffers one formatted record and sends it to syslog on drop.
pub struct SyslogWriter {
    priority: libc::c_int,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(priority: libc::c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        let line: Vec<u8> = self
            .buf
            .iter()
            .copied()
            .filter(|&b| b != 0)
            .collect();
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return;
        }
        if let Ok(message) = CString::new(line) {
            // SAFETY: both pointers are valid NUL-terminated strings and the
            // format consumes exactly one string argument.
            unsafe {
                libc::syslog(self.priority, c"%s".as_ptr(), message.as_ptr());
            }
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `level`.  Returns the target actually in use after
/// any stderr fallback.
pub fn init(target: &LogTarget, level: LogLevel) -> Result<LogTarget> {
    let (sink, effective) = LogSink::open(target);
    let ansi = matches!(sink, LogSink::Stderr);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(sink)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| PressdError::Configuration(format!("logging setup: {e}")))?;

    if &effective != target {
        warn!(requested = %target.as_config_value(), "log file unavailable, logging to stderr");
    }
    Ok(effective)
}
