// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The maintenance loop.
//
// Each iteration waits at most one poll interval for connections, then
// handles DNS-SD collisions, pending saves, shutdown and job cleanup in that
// order.  Nothing else blocks the loop, so housekeeping is never more than
// one interval late.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use pressd_core::Result;

use crate::dispatcher::{AcceptFailure, ConnectionHandler, classify_accept_error, poll_listeners, spawn_worker};
use crate::shutdown::ShutdownToken;
use crate::system::System;

/// Upper bound on one wait for connections.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// After a shutdown request the loop exits at the latest after this long,
/// active jobs or not.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(60);

/// Period of completed-job cleanup.
pub const CLEAN_INTERVAL: Duration = Duration::from_secs(60);

impl System {
    /// Run the service until shutdown.
    ///
    /// Requires `Created` state and at least one listener; otherwise the
    /// problem is logged and a `Usage` error returned.  The loop ends when
    /// `token` is cancelled, when a requested shutdown finds no active jobs
    /// (or hits [`SHUTDOWN_DEADLINE`]), or when the listeners fail.  A
    /// pending save is flushed on the way out and the state becomes
    /// `Stopped`.
    pub async fn run<H: ConnectionHandler>(
        self: &Arc<Self>,
        handler: Arc<H>,
        token: ShutdownToken,
    ) -> Result<()> {
        let listeners = self.start_running()?;
        info!(listeners = listeners.len(), port = self.port(), "Starting main loop.");

        self.register_dns_sd();
        let mut clean_at = Instant::now() + CLEAN_INTERVAL;

        while !token.is_cancelled() {
            let ready = tokio::select! {
                _ = token.cancelled() => break,
                polled = tokio::time::timeout(POLL_INTERVAL, poll_listeners(&listeners)) => {
                    polled.unwrap_or_default()
                }
            };

            let mut listeners_failed = false;
            for result in ready {
                match result {
                    Ok((stream, peer)) => spawn_worker(&handler, self.new_client(stream, peer)),
                    Err(e) => match classify_accept_error(&e) {
                        AcceptFailure::Retry => {}
                        AcceptFailure::Connection => {
                            warn!(error = %e, "unable to accept client connection");
                        }
                        AcceptFailure::Fatal => {
                            error!(error = %e, "Unable to accept new connections.");
                            listeners_failed = true;
                        }
                    },
                }
            }
            if listeners_failed {
                break;
            }

            self.handle_dns_sd_collisions();

            if self.is_save_pending() {
                self.save_now();
            }

            if let Some(requested) = self.shutdown_requested_at() {
                if requested.elapsed() >= SHUTDOWN_DEADLINE {
                    warn!(
                        active_jobs = self.active_job_count(),
                        "shutdown deadline reached, stopping with jobs still active"
                    );
                    break;
                }
                if self.active_job_count() == 0 {
                    break;
                }
            }

            if Instant::now() >= clean_at {
                let removed = self.clean_jobs();
                if removed > 0 {
                    info!(removed, "cleaned old jobs");
                }
                clean_at = Instant::now() + CLEAN_INTERVAL;
            }
        }

        info!("Shutting down main loop.");

        if self.is_save_pending() {
            self.save_now();
        }
        self.unregister_dns_sd();
        self.set_stopped();
        Ok(())
    }
}
