// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw (AppSocket / JetDirect style) print handler.
//
// Everything the client sends until it closes is one job.  The data is
// spooled to disk first, then streamed to the printer's device on a
// blocking thread, since the device layer is synchronous.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use pressd_core::{JobState, PressdError, Result};
use pressd_device::Device;

use crate::dispatcher::{Client, ConnectionHandler};
use crate::printer::Printer;

/// Upper bound on one job's data.
pub const MAX_JOB_BYTES: u64 = 64 * 1024 * 1024;

/// Size of each write to the device.
pub const DEVICE_CHUNK_SIZE: usize = 8192;

/// Sends each connection's bytes to one printer.
#[derive(Debug, Clone, Default)]
pub struct RawPrintHandler {
    printer_name: Option<String>,
}

impl RawPrintHandler {
    /// Print to the named printer, or to the first printer when `None`.
    pub fn new(printer_name: Option<String>) -> Self {
        Self { printer_name }
    }

    fn target(&self, client: &Client) -> Result<Arc<Printer>> {
        let printer = match &self.printer_name {
            Some(name) => client.system.find_printer(name),
            None => client.system.printers().into_iter().next(),
        };
        printer.ok_or_else(|| {
            PressdError::UnknownPrinter(
                self.printer_name
                    .clone()
                    .unwrap_or_else(|| "(no printers configured)".into()),
            )
        })
    }
}

impl ConnectionHandler for RawPrintHandler {
    async fn handle(&self, mut client: Client) -> Result<()> {
        let printer = self.target(&client)?;

        let mut first = vec![0u8; DEVICE_CHUNK_SIZE];
        let n = client.stream.read(&mut first).await?;
        if n == 0 {
            debug!(client = %client.id, peer = %client.peer, "empty connection");
            return Ok(());
        }

        let job = printer.create_job(
            &format!("raw job from {}", client.peer),
            client.system.spool_dir(),
        );
        let spool_path = job
            .spool_path
            .clone()
            .ok_or_else(|| PressdError::UnknownJob(job.id.to_string()))?;

        let spooled = spool(&mut client, &first[..n], &spool_path).await;
        let size = match spooled {
            Ok(size) if size <= MAX_JOB_BYTES => size,
            Ok(size) => {
                warn!(job = %job.id, size, limit = MAX_JOB_BYTES, "job data too large");
                printer.finish_job(job.id, JobState::Aborted)?;
                return Ok(());
            }
            Err(e) => {
                printer.finish_job(job.id, JobState::Aborted)?;
                return Err(e);
            }
        };
        debug!(job = %job.id, size, "job spooled");

        printer.set_job_state(job.id, JobState::Processing)?;
        let device_uri = printer.device_uri().to_string();
        let path = spool_path.clone();
        let sent = tokio::task::spawn_blocking(move || send_file(&device_uri, &path))
            .await
            .map_err(|e| PressdError::Device(format!("device task failed: {e}")));

        match sent.and_then(|r| r) {
            Ok(bytes) => {
                info!(printer = %printer.name(), job = %job.id, bytes, "job printed");
                printer.finish_job(job.id, JobState::Completed)?;
                Ok(())
            }
            Err(e) => {
                warn!(
                    printer = %printer.name(),
                    job = %job.id,
                    peer = %client.peer,
                    uri = %printer.device_uri(),
                    error = %e,
                    "job aborted"
                );
                printer.finish_job(job.id, JobState::Aborted)?;
                Ok(())
            }
        }
    }
}

/// Copy the connection into the spool file, stopping one byte past the
/// limit so oversize jobs can be detected.  Returns the bytes written.
async fn spool(client: &mut Client, first: &[u8], path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(first).await?;

    let remaining = (MAX_JOB_BYTES + 1).saturating_sub(first.len() as u64);
    let mut limited = (&mut client.stream).take(remaining);
    let copied = tokio::io::copy(&mut limited, &mut file).await?;
    file.flush().await?;
    Ok(first.len() as u64 + copied)
}

/// Open `device_uri` and stream the spool file to it in fixed-size chunks.
pub fn send_file(device_uri: &str, path: &Path) -> Result<u64> {
    let mut messages = Vec::new();
    let mut device = Device::open(device_uri, &mut |m: &str| messages.push(m.to_string()))
        .map_err(|e| PressdError::Device(e.to_string()))?;
    for message in &messages {
        debug!(uri = device_uri, message = %message, "device open note");
    }

    let mut file = File::open(path)?;
    let mut buf = vec![0u8; DEVICE_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        device
            .write(&buf[..n])
            .map_err(|e| PressdError::Device(format!("{device_uri}: {e}")))?;
        total += n as u64;
    }
    device.close();
    Ok(total)
}
