// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection dispatch: polling the listener set and launching one detached
// worker per accepted connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use pressd_core::{ClientId, Result};

use crate::system::System;

/// Per-connection worker context.
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub peer: SocketAddr,
    pub stream: TcpStream,
    pub system: Arc<System>,
}

/// Serves one accepted connection.
///
/// Called on its own detached task; an `Err` is logged with the client id
/// and peer and otherwise ignored.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn handle(&self, client: Client) -> impl Future<Output = Result<()>> + Send;
}

/// Wait until at least one listener has a connection (or an error) ready,
/// and return every result available in that wake-up.
pub(crate) async fn poll_listeners(
    listeners: &[TcpListener],
) -> Vec<io::Result<(TcpStream, SocketAddr)>> {
    std::future::poll_fn(|cx| {
        let ready: Vec<_> = listeners
            .iter()
            .filter_map(|listener| match listener.poll_accept(cx) {
                Poll::Ready(result) => Some(result),
                Poll::Pending => None,
            })
            .collect();
        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(ready)
        }
    })
    .await
}

/// How the loop should treat a failed poll/accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcceptFailure {
    /// Interrupted or would-block: try again next iteration.
    Retry,
    /// One connection could not be accepted; keep serving.
    Connection,
    /// The listener set itself is unusable; leave the loop.
    Fatal,
}

pub(crate) fn classify_accept_error(err: &io::Error) -> AcceptFailure {
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => AcceptFailure::Retry,
        io::ErrorKind::InvalidInput => AcceptFailure::Fatal,
        _ => match err.raw_os_error() {
            Some(libc::EBADF | libc::ENOTSOCK | libc::EINVAL) => AcceptFailure::Fatal,
            _ => AcceptFailure::Connection,
        },
    }
}

/// Launch `handler` for `client` on a detached task.
pub(crate) fn spawn_worker<H: ConnectionHandler>(handler: &Arc<H>, client: Client) {
    let handler = Arc::clone(handler);
    let (id, peer) = (client.id, client.peer);
    debug!(client = %id, %peer, "starting connection worker");

    // Detached: the handle is dropped and the worker runs to completion.
    tokio::spawn(async move {
        if let Err(e) = handler.handle(client).await {
            warn!(client = %id, %peer, error = %e, "connection handler error");
        }
        debug!(client = %id, %peer, "connection worker finished");
    });
}
