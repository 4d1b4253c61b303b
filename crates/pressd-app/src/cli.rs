// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pressd_core::config::CONFIG_FILE_NAME;
use pressd_core::{LogLevel, PrinterConfig, SystemConfig};
use pressd_server::defaults;

#[derive(Parser, Debug)]
#[command(name = "pressd")]
#[command(about = "Print server runtime and device utility", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the print service until SIGTERM/SIGINT
    Run(RunArgs),

    /// List attached USB printers by device URI
    Devices,

    /// Send a file to a device URI
    Send {
        /// e.g. socket://10.0.0.5:9100 or usb://HP/LaserJet%201020
        uri: String,
        /// File whose bytes are written unchanged
        file: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON configuration file; also where changes are saved
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// System name advertised over DNS-SD
    #[arg(long)]
    pub name: Option<String>,

    /// Listening port (default 8000 + uid % 1000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Host or address to listen on, repeatable ("*" for all)
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Vec<String>,

    /// Printer definition, repeatable
    #[arg(long = "printer", value_name = "NAME=URI", value_parser = parse_printer)]
    pub printers: Vec<PrinterConfig>,

    /// Printer that receives raw connections (default: the first one)
    #[arg(long, value_name = "NAME")]
    pub raw_printer: Option<String>,

    #[arg(long)]
    pub spool_dir: Option<PathBuf>,

    /// Log file path, "syslog", or "-" for stderr
    #[arg(long)]
    pub log_file: Option<String>,

    /// debug, info, warn, error or fatal
    #[arg(long)]
    pub log_level: Option<LogLevel>,
}

/// Parse `NAME=URI`.
pub fn parse_printer(s: &str) -> Result<PrinterConfig, String> {
    let (name, uri) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URI, got '{s}'"))?;
    let (name, uri) = (name.trim(), uri.trim());
    if name.is_empty() || uri.is_empty() {
        return Err(format!("expected NAME=URI, got '{s}'"));
    }
    Ok(PrinterConfig {
        name: name.to_string(),
        device_uri: uri.to_string(),
    })
}

impl RunArgs {
    /// Where the configuration is loaded from and saved to.
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => path.clone(),
            None => self
                .spool_dir
                .clone()
                .unwrap_or_else(defaults::default_spool_dir)
                .join(CONFIG_FILE_NAME),
        }
    }

    /// Overlay command-line settings on a loaded configuration.
    ///
    /// A `--printer` whose name already exists replaces that printer's URI.
    pub fn apply(&self, config: &mut SystemConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if !self.listen.is_empty() {
            config.listen = self.listen.clone();
        }
        if let Some(dir) = &self.spool_dir {
            config.spool_dir = Some(dir.clone());
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        for printer in &self.printers {
            match config.printers.iter_mut().find(|p| p.name == printer.name) {
                Some(existing) => existing.device_uri = printer.device_uri.clone(),
                None => config.printers.push(printer.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_with_everything() {
        let cli = Cli::try_parse_from([
            "pressd",
            "run",
            "--name",
            "Warehouse",
            "--port",
            "8631",
            "--listen",
            "*",
            "--listen",
            "localhost",
            "--printer",
            "Label=socket://10.0.0.5:9100",
            "--printer",
            "Office=usb://HP/LaserJet%201020",
            "--log-level",
            "debug",
            "--log-file",
            "-",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.listen, vec!["*", "localhost"]);
        assert_eq!(args.printers.len(), 2);
        assert_eq!(args.printers[1].device_uri, "usb://HP/LaserJet%201020");
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn parse_send() {
        let cli = Cli::try_parse_from(["pressd", "send", "file:///dev/usb/lp0", "label.zpl"]).unwrap();
        match cli.command {
            Command::Send { uri, file } => {
                assert_eq!(uri, "file:///dev/usb/lp0");
                assert_eq!(file, PathBuf::from("label.zpl"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_printer_spec_is_rejected() {
        assert!(parse_printer("no-equals").is_err());
        assert!(parse_printer("=socket://x").is_err());
        assert!(parse_printer("name=").is_err());
        assert!(Cli::try_parse_from(["pressd", "run", "--printer", "oops"]).is_err());
    }

    #[test]
    fn bad_log_level_is_rejected() {
        assert!(Cli::try_parse_from(["pressd", "run", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn apply_overrides_and_merges_printers() {
        let mut config = SystemConfig {
            printers: vec![PrinterConfig {
                name: "Label".into(),
                device_uri: "socket://old".into(),
            }],
            ..SystemConfig::default()
        };
        let args = RunArgs {
            name: Some("Shop".into()),
            port: Some(9000),
            printers: vec![
                parse_printer("Label=socket://new").unwrap(),
                parse_printer("Office=file:///dev/null").unwrap(),
            ],
            ..RunArgs::default()
        };

        args.apply(&mut config);
        assert_eq!(config.name, "Shop");
        assert_eq!(config.port, 9000);
        assert_eq!(config.printers.len(), 2);
        assert_eq!(config.printers[0].device_uri, "socket://new");
        // Unset flags leave the file's values alone.
        assert!(config.listen.is_empty());
        assert_eq!(config.log_level, LogLevel::Unspec);
    }

    #[test]
    fn config_path_defaults_into_the_spool_dir() {
        let args = RunArgs {
            spool_dir: Some(PathBuf::from("/var/spool/pressd")),
            ..RunArgs::default()
        };
        assert_eq!(args.config_path(), PathBuf::from("/var/spool/pressd/pressd.json"));

        let args = RunArgs {
            config: Some(PathBuf::from("/etc/pressd.json")),
            ..RunArgs::default()
        };
        assert_eq!(args.config_path(), PathBuf::from("/etc/pressd.json"));
    }
}
