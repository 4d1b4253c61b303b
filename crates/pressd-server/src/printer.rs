// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printers and their jobs.
//
// Every printer guards its mutable state (active and completed jobs, the
// job counter, DNS-SD naming) with its own `RwLock`.  Nothing in this module
// ever takes the system lock, and no method holds a printer lock across a
// call into another printer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use pressd_core::identity;
use pressd_core::{JobId, JobState, PressdError, PrinterId, Result};

/// Read-only view of how many jobs a printer is still working on.
///
/// The system's job aggregate only ever sees printers through this trait,
/// one at a time, while it holds the system lock for reading.
pub trait JobCountProvider {
    fn active_jobs(&self) -> usize;
}

/// One print job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub uuid: String,
    pub name: String,
    pub state: JobState,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    /// Spooled document data, removed when the job is cleaned.
    pub spool_path: Option<PathBuf>,
}

#[derive(Debug)]
struct PrinterState {
    active: Vec<Job>,
    /// Oldest first.
    completed: VecDeque<Job>,
    next_job_id: u32,
    dns_sd_name: String,
    dns_sd_serial: u32,
    dns_sd_collision: bool,
}

/// A named output queue bound to one device URI.
#[derive(Debug)]
pub struct Printer {
    id: PrinterId,
    name: String,
    uuid: String,
    device_uri: String,
    system_uuid: String,
    port: u16,
    /// Shared with the owning system so one flag covers every printer.
    any_collision: Arc<AtomicBool>,
    state: RwLock<PrinterState>,
}

impl Printer {
    /// Create a printer whose UUID is derived from the system identity.
    pub(crate) fn new(
        id: PrinterId,
        name: &str,
        device_uri: &str,
        system_uuid: &str,
        port: u16,
        any_collision: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            uuid: identity::printer_uuid(system_uuid, port, name),
            device_uri: device_uri.to_string(),
            system_uuid: system_uuid.to_string(),
            port,
            any_collision,
            state: RwLock::new(PrinterState {
                active: Vec::new(),
                completed: VecDeque::new(),
                next_job_id: 1,
                dns_sd_name: name.to_string(),
                dns_sd_serial: 1,
                dns_sd_collision: false,
            }),
        }
    }

    pub fn id(&self) -> PrinterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn device_uri(&self) -> &str {
        &self.device_uri
    }

    fn read(&self) -> RwLockReadGuard<'_, PrinterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PrinterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new pending job.  Its data is spooled under `spool_dir`.
    pub fn create_job(&self, name: &str, spool_dir: &Path) -> Job {
        let mut state = self.write();
        let id = JobId(state.next_job_id);
        state.next_job_id += 1;

        let job = Job {
            id,
            uuid: identity::job_uuid(&self.system_uuid, self.port, &self.name, id.0),
            name: name.to_string(),
            state: JobState::Pending,
            created: Utc::now(),
            completed: None,
            spool_path: Some(spool_dir.join(format!("p{:05}-j{:09}.prn", self.id.0, id.0))),
        };
        state.active.push(job.clone());

        info!(printer = %self.name, job = %id, "job created");
        job
    }

    /// Move an active job to a new active state (e.g. `Processing`).
    ///
    /// Terminal states go through [`Printer::finish_job`].
    pub fn set_job_state(&self, id: JobId, new_state: JobState) -> Result<()> {
        if !new_state.is_active() {
            return Err(self.invalid_state(id, new_state));
        }
        let mut state = self.write();
        let job = state
            .active
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| PressdError::UnknownJob(format!("{}/{id}", self.name)))?;
        job.state = new_state;
        Ok(())
    }

    /// Retire an active job with its terminal state.
    ///
    /// The job moves to the completed list, where periodic cleanup picks it
    /// up.
    pub fn finish_job(&self, id: JobId, final_state: JobState) -> Result<()> {
        if final_state.is_active() {
            return Err(self.invalid_state(id, final_state));
        }
        let mut state = self.write();
        let index = state
            .active
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| PressdError::UnknownJob(format!("{}/{id}", self.name)))?;

        let mut job = state.active.remove(index);
        job.state = final_state;
        job.completed = Some(Utc::now());
        info!(printer = %self.name, job = %id, state = ?final_state, "job finished");
        state.completed.push_back(job);
        Ok(())
    }

    /// Cancel an active job.
    pub fn cancel_job(&self, id: JobId) -> Result<()> {
        self.finish_job(id, JobState::Canceled)
    }

    fn invalid_state(&self, id: JobId, state: JobState) -> PressdError {
        PressdError::InvalidJobState {
            job: format!("{}/{id}", self.name),
            state: format!("{state:?}"),
        }
    }

    /// Look up a job by id, active or completed.
    pub fn job(&self, id: JobId) -> Option<Job> {
        let state = self.read();
        state
            .active
            .iter()
            .chain(state.completed.iter())
            .find(|j| j.id == id)
            .cloned()
    }

    /// Snapshot of the active jobs.
    pub fn active_job_list(&self) -> Vec<Job> {
        self.read().active.clone()
    }

    /// Snapshot of the completed jobs, oldest first.
    pub fn completed_jobs(&self) -> Vec<Job> {
        self.read().completed.iter().cloned().collect()
    }

    /// Drop the oldest completed jobs beyond `keep`, returning them so the
    /// caller can delete spool files without holding any lock.
    pub(crate) fn clean_completed(&self, keep: usize) -> Vec<Job> {
        let mut state = self.write();
        let excess = state.completed.len().saturating_sub(keep);
        let removed: Vec<Job> = state.completed.drain(..excess).collect();
        if !removed.is_empty() {
            debug!(printer = %self.name, count = removed.len(), "cleaned completed jobs");
        }
        removed
    }

    /// The name currently advertised over DNS-SD.
    pub fn dns_sd_name(&self) -> String {
        self.read().dns_sd_name.clone()
    }

    /// Flag a DNS-SD name collision for the maintenance loop to resolve.
    pub fn report_dns_sd_collision(&self) {
        self.write().dns_sd_collision = true;
        self.any_collision.store(true, Ordering::SeqCst);
    }

    /// If a collision is pending, pick the next `"<name> (<n>)"` name and
    /// clear the flag.  Returns `(old, new)`.
    pub(crate) fn take_dns_sd_rename(&self) -> Option<(String, String)> {
        let mut state = self.write();
        if !state.dns_sd_collision {
            return None;
        }
        state.dns_sd_serial += 1;
        let renamed = format!("{} ({})", self.name, state.dns_sd_serial);
        let old = std::mem::replace(&mut state.dns_sd_name, renamed.clone());
        state.dns_sd_collision = false;
        Some((old, renamed))
    }
}

impl JobCountProvider for Printer {
    fn active_jobs(&self) -> usize {
        self.read().active.iter().filter(|j| j.state.is_active()).count()
    }
}
