// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressd service runtime.
//
// A `System` owns the printers, the listening sockets and the lifecycle
// flags.  `System::run` is the maintenance loop: it accepts connections and
// hands each one to a `ConnectionHandler` on a detached task, re-registers
// DNS-SD names after collisions, saves configuration on request, cleans old
// jobs, and drives shutdown.

pub mod defaults;
pub mod dispatcher;
pub mod dnssd;
pub mod logging;
pub mod printer;
pub mod raw;
pub mod runtime;
pub mod shutdown;
pub mod system;

pub use dispatcher::{Client, ConnectionHandler};
pub use dnssd::{DnsSdRegistrar, MdnsRegistrar, ServiceKind};
pub use logging::LogTarget;
pub use printer::{Job, JobCountProvider, Printer};
pub use raw::RawPrintHandler;
pub use shutdown::ShutdownToken;
pub use system::{SaveCallback, System};
