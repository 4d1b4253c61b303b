// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pressd: print server runtime.
//
// Entry point. Parses the command line, sets up logging, and either runs the
// service or performs a one-shot device operation.

mod cli;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use pressd_core::{LogLevel, SystemConfig};
use pressd_device::Device;
use pressd_server::{LogTarget, MdnsRegistrar, RawPrintHandler, ShutdownToken, System, defaults, logging};

use cli::{Cli, Command, RunArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Devices => {
            logging::init(&LogTarget::Stderr, LogLevel::Warn)?;
            tokio::task::spawn_blocking(list_devices).await?;
            Ok(())
        }
        Command::Send { uri, file } => {
            logging::init(&LogTarget::Stderr, LogLevel::Info)?;
            let bytes = tokio::task::spawn_blocking(move || send(&uri, &file)).await??;
            println!("{bytes} bytes sent");
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config_path = args.config_path();
    let mut config = if config_path.exists() {
        SystemConfig::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        SystemConfig::default()
    };
    args.apply(&mut config);

    let requested = LogTarget::resolve(config.log_file.as_deref(), &defaults::default_log_path());
    logging::init(&requested, config.log_level.resolved())?;
    info!(config = %config_path.display(), "pressd starting");

    let system = System::create(&config)?;

    let hosts = if config.listen.is_empty() {
        vec!["*".to_string()]
    } else {
        config.listen.clone()
    };
    for host in &hosts {
        let bound = system
            .add_listeners(host)
            .with_context(|| format!("listening on {host}:{}", system.port()))?;
        info!(host = %host, port = system.port(), sockets = bound, "listening");
    }

    {
        let path = config_path.clone();
        system.set_save_callback(Box::new(move |system: &System| {
            system.to_config().save(&path)?;
            info!(path = %path.display(), "configuration saved");
            Ok(())
        }));
    }

    match MdnsRegistrar::new(system.hostname(), config.subtypes.as_deref()) {
        Ok(registrar) => system.set_dns_sd_registrar(Arc::new(registrar)),
        Err(e) => warn!(error = %e, "DNS-SD unavailable, continuing without advertising"),
    }

    let token = ShutdownToken::new();
    #[cfg(unix)]
    token
        .install_signal_handlers()
        .context("installing signal handlers")?;

    let system = Arc::new(system);
    let handler = Arc::new(RawPrintHandler::new(args.raw_printer.clone()));
    system.run(handler, token).await?;

    info!("pressd stopped");
    Ok(())
}

/// Print the URI of every attached USB printer.
fn list_devices() {
    let mut found = 0usize;
    Device::list(
        &mut |uri: &str| {
            println!("{uri}");
            found += 1;
            false
        },
        &mut |message: &str| eprintln!("{message}"),
    );
    if found == 0 {
        eprintln!("no printers found");
    }
}

/// Write `path` to the device at `uri` unchanged.
fn send(uri: &str, path: &Path) -> anyhow::Result<u64> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut device = Device::open(uri, &mut |message: &str| eprintln!("{message}"))
        .with_context(|| format!("opening device {uri}"))?;

    let mut buf = vec![0u8; pressd_server::raw::DEVICE_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if let Err(e) = device.write(&buf[..n]) {
            device.close();
            bail!("writing to {uri} after {total} bytes: {e}");
        }
        total += n as u64;
    }
    device.close();
    Ok(total)
}
