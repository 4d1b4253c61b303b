// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The service state shared by the maintenance loop and every worker.
//
// Lock order: the system `RwLock` first, then at most one printer lock at a
// time.  Lifecycle flags (save pending, shutdown time, collision summary) are
// atomics or small mutexes that are never held while taking another lock.

use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use pressd_core::identity;
use pressd_core::{
    ClientId, LogLevel, PressdError, PrinterConfig, PrinterId, Result, RunState, SystemConfig,
};

use crate::defaults;
use crate::dispatcher::Client;
use crate::dnssd::{DnsSdRegistrar, ServiceKind};
use crate::logging::LogTarget;
use crate::printer::{JobCountProvider, Printer};

/// Completed jobs kept per printer before cleanup drops the oldest.
pub const DEFAULT_MAX_COMPLETED_JOBS: usize = 100;

/// Persists the configuration; runs on the maintenance loop.
pub type SaveCallback = Box<dyn Fn(&System) -> Result<()> + Send + Sync>;

#[derive(Debug)]
struct SystemState {
    run_state: RunState,
    printers: Vec<Arc<Printer>>,
    next_printer_id: u32,
    dns_sd_name: String,
    dns_sd_serial: u32,
    dns_sd_collision: bool,
}

/// The print service: identity, printers, listeners and lifecycle flags.
pub struct System {
    name: String,
    uuid: String,
    hostname: String,
    port: u16,
    spool_dir: PathBuf,
    log_target: LogTarget,
    log_level: LogLevel,
    auth_service: Option<String>,
    subtypes: Option<String>,
    start_time: DateTime<Utc>,
    max_completed_jobs: usize,

    state: RwLock<SystemState>,
    listeners: Mutex<Vec<StdTcpListener>>,
    listen_addrs: Mutex<Vec<String>>,
    next_client_id: AtomicU64,

    any_collision: Arc<AtomicBool>,
    save_pending: AtomicBool,
    shutdown_at: Mutex<Option<Instant>>,
    save_cb: Mutex<Option<SaveCallback>>,
    registrar: RwLock<Option<Arc<dyn DnsSdRegistrar>>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl System {
    /// Build the service from configuration.
    ///
    /// Fails with `Configuration` when the name is empty, the spool
    /// directory cannot be created, or a configured printer is a duplicate.
    #[instrument(skip(config), fields(name = %config.name))]
    pub fn create(config: &SystemConfig) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(PressdError::Configuration("system name must not be empty".into()));
        }

        let hostname = config
            .hostname
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(defaults::system_hostname);
        let port = match config.port {
            0 => defaults::default_port(),
            p => p,
        };

        let (uuid, generated_uuid) = match config.uuid.as_deref() {
            Some(uuid) if !uuid.is_empty() => (uuid.to_string(), false),
            _ => (identity::system_uuid(), true),
        };

        let spool_dir = config
            .spool_dir
            .clone()
            .unwrap_or_else(defaults::default_spool_dir);
        defaults::ensure_spool_dir(&spool_dir)?;

        let log_target =
            LogTarget::resolve(config.log_file.as_deref(), &defaults::default_log_path());

        let system = Self {
            name: config.name.clone(),
            uuid,
            hostname,
            port,
            spool_dir,
            log_target,
            log_level: config.log_level.resolved(),
            auth_service: config.effective_auth_service().map(str::to_string),
            subtypes: config.subtypes.clone(),
            start_time: Utc::now(),
            max_completed_jobs: DEFAULT_MAX_COMPLETED_JOBS,
            state: RwLock::new(SystemState {
                run_state: RunState::Created,
                printers: Vec::new(),
                next_printer_id: 1,
                dns_sd_name: config.name.clone(),
                dns_sd_serial: 1,
                dns_sd_collision: false,
            }),
            listeners: Mutex::new(Vec::new()),
            listen_addrs: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
            any_collision: Arc::new(AtomicBool::new(false)),
            save_pending: AtomicBool::new(generated_uuid),
            shutdown_at: Mutex::new(None),
            save_cb: Mutex::new(None),
            registrar: RwLock::new(None),
        };

        for printer in &config.printers {
            system.insert_printer(&printer.name, &printer.device_uri)?;
        }

        info!(
            uuid = %system.uuid,
            hostname = %system.hostname,
            port = system.port,
            spool = %system.spool_dir.display(),
            printers = config.printers.len(),
            "system created"
        );
        Ok(system)
    }

    // -- Identity and settings --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    pub fn log_target(&self) -> &LogTarget {
        &self.log_target
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Authentication service, `None` when disabled.
    pub fn auth_service(&self) -> Option<&str> {
        self.auth_service.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn run_state(&self) -> RunState {
        self.read_state().run_state
    }

    /// Snapshot of the current settings and printers, suitable for saving.
    pub fn to_config(&self) -> SystemConfig {
        let printers = self
            .printers()
            .iter()
            .map(|p| PrinterConfig {
                name: p.name().to_string(),
                device_uri: p.device_uri().to_string(),
            })
            .collect();

        SystemConfig {
            name: self.name.clone(),
            uuid: Some(self.uuid.clone()),
            hostname: Some(self.hostname.clone()),
            port: self.port,
            spool_dir: Some(self.spool_dir.clone()),
            log_file: Some(self.log_target.as_config_value()),
            log_level: self.log_level,
            auth_service: self.auth_service.clone(),
            subtypes: self.subtypes.clone(),
            listen: lock(&self.listen_addrs).clone(),
            printers,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SystemState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SystemState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Listeners --

    /// Bind listeners for `host` on the system port.
    ///
    /// `"*"` or an empty host binds `0.0.0.0` and `[::]`; the IPv6 socket
    /// may fail (for instance when the IPv4 one already covers both) as
    /// long as the IPv4 one succeeded.  Returns the number bound.
    pub fn add_listeners(&self, host: &str) -> Result<usize> {
        self.ensure_not_running("add listeners")?;

        let addrs: Vec<SocketAddr> = if host.is_empty() || host == "*" {
            vec![
                SocketAddr::from(([0, 0, 0, 0], self.port)),
                SocketAddr::from(([0u16; 8], self.port)),
            ]
        } else {
            (host, self.port)
                .to_socket_addrs()
                .map_err(|e| {
                    PressdError::Configuration(format!("unable to resolve '{host}': {e}"))
                })?
                .collect()
        };

        let mut bound = 0;
        let mut last_error = None;
        for addr in addrs {
            match StdTcpListener::bind(addr) {
                Ok(listener) => {
                    self.add_listener(listener)?;
                    bound += 1;
                }
                Err(e) => {
                    debug!(%addr, error = %e, "listener bind failed");
                    last_error = Some(format!("{addr}: {e}"));
                }
            }
        }

        if bound == 0 {
            return Err(PressdError::Configuration(format!(
                "unable to listen on '{host}': {}",
                last_error.unwrap_or_else(|| "no addresses".into())
            )));
        }
        lock(&self.listen_addrs).push(host.to_string());
        Ok(bound)
    }

    /// Adopt an already bound listener.
    pub fn add_listener(&self, listener: StdTcpListener) -> Result<()> {
        self.ensure_not_running("add listeners")?;
        listener.set_nonblocking(true)?;
        info!(addr = ?listener.local_addr().ok(), "listening");
        lock(&self.listeners).push(listener);
        Ok(())
    }

    /// Number of listeners waiting for `run`.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn ensure_not_running(&self, what: &str) -> Result<()> {
        match self.run_state() {
            RunState::Created => Ok(()),
            state => Err(PressdError::Usage(format!(
                "cannot {what} while the system is {state:?}"
            ))),
        }
    }

    /// Move `Created → Running` and hand the listeners to the loop.
    pub(crate) fn start_running(&self) -> Result<Vec<TcpListener>> {
        let mut state = self.write_state();
        if state.run_state != RunState::Created {
            error!("Tried to run main loop when already running.");
            return Err(PressdError::Usage(format!(
                "system cannot run from state {:?}",
                state.run_state
            )));
        }

        let std_listeners = std::mem::take(&mut *lock(&self.listeners));
        if std_listeners.is_empty() {
            error!("Tried to run main loop without listeners.");
            return Err(PressdError::Usage("system has no listeners".into()));
        }

        let listeners = std_listeners
            .into_iter()
            .map(TcpListener::from_std)
            .collect::<std::io::Result<Vec<_>>>()?;

        state.run_state = if self.shutdown_requested_at().is_some() {
            RunState::ShuttingDown
        } else {
            RunState::Running
        };
        Ok(listeners)
    }

    pub(crate) fn set_stopped(&self) {
        self.write_state().run_state = RunState::Stopped;
    }

    pub(crate) fn new_client(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) -> Client {
        Client {
            id: ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst)),
            peer,
            stream,
            system: Arc::clone(self),
        }
    }

    // -- Printers --

    /// Add a printer and request a configuration save.
    pub fn add_printer(&self, name: &str, device_uri: &str) -> Result<Arc<Printer>> {
        let printer = self.insert_printer(name, device_uri)?;
        self.request_save();

        if self.run_state() == RunState::Running {
            self.register_printer(&printer, &printer.dns_sd_name());
        }
        Ok(printer)
    }

    fn insert_printer(&self, name: &str, device_uri: &str) -> Result<Arc<Printer>> {
        if name.trim().is_empty() {
            return Err(PressdError::Configuration("printer name must not be empty".into()));
        }

        let mut state = self.write_state();
        if state.printers.iter().any(|p| p.name() == name) {
            return Err(PressdError::Configuration(format!(
                "printer '{name}' already exists"
            )));
        }

        let id = PrinterId(state.next_printer_id);
        state.next_printer_id += 1;

        let printer = Arc::new(Printer::new(
            id,
            name,
            device_uri,
            &self.uuid,
            self.port,
            Arc::clone(&self.any_collision),
        ));
        state.printers.push(Arc::clone(&printer));

        info!(printer = %name, id = %id, device_uri, "printer added");
        Ok(printer)
    }

    /// Remove a printer, withdraw its advertisement and request a save.
    pub fn remove_printer(&self, id: PrinterId) -> Result<Arc<Printer>> {
        let printer = {
            let mut state = self.write_state();
            let index = state
                .printers
                .iter()
                .position(|p| p.id() == id)
                .ok_or_else(|| PressdError::UnknownPrinter(id.to_string()))?;
            state.printers.remove(index)
        };

        if let Some(registrar) = self.registrar() {
            if let Err(e) = registrar.unregister(ServiceKind::Printer, &printer.dns_sd_name()) {
                warn!(printer = %printer.name(), error = %e, "DNS-SD unregister failed");
            }
        }

        info!(printer = %printer.name(), id = %id, "printer removed");
        self.request_save();
        Ok(printer)
    }

    pub fn printer(&self, id: PrinterId) -> Option<Arc<Printer>> {
        self.read_state()
            .printers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    pub fn find_printer(&self, name: &str) -> Option<Arc<Printer>> {
        self.read_state()
            .printers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn printers(&self) -> Vec<Arc<Printer>> {
        self.read_state().printers.clone()
    }

    /// Sum of active jobs over all printers.
    ///
    /// Holds the system lock for reading while each printer's own lock is
    /// taken and released in turn.
    pub fn active_job_count(&self) -> usize {
        let state = self.read_state();
        state
            .printers
            .iter()
            .map(|p| {
                let provider: &dyn JobCountProvider = &**p;
                provider.active_jobs()
            })
            .sum()
    }

    /// Drop completed jobs beyond the retention limit and delete their
    /// spool files.  Returns the number of jobs removed.
    pub fn clean_jobs(&self) -> usize {
        let removed: Vec<_> = {
            let state = self.read_state();
            state
                .printers
                .iter()
                .flat_map(|p| p.clean_completed(self.max_completed_jobs))
                .collect()
        };

        for job in &removed {
            if let Some(path) = &job.spool_path {
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "unable to remove spool file"),
                }
            }
        }
        removed.len()
    }

    // -- Save and shutdown requests --

    /// Ask the maintenance loop to run the save callback.
    pub fn request_save(&self) {
        self.save_pending.store(true, Ordering::SeqCst);
    }

    pub fn is_save_pending(&self) -> bool {
        self.save_pending.load(Ordering::SeqCst)
    }

    pub fn set_save_callback(&self, cb: SaveCallback) {
        *lock(&self.save_cb) = Some(cb);
    }

    /// Run the save callback if one is installed, then clear the request.
    pub(crate) fn save_now(&self) {
        if let Some(cb) = lock(&self.save_cb).as_ref() {
            match cb(self) {
                Ok(()) => debug!("configuration saved"),
                Err(e) => error!(error = %e, "unable to save configuration"),
            }
        }
        self.save_pending.store(false, Ordering::SeqCst);
    }

    /// Begin a graceful shutdown: the loop exits once no jobs are active,
    /// or after the forced deadline.
    pub fn request_shutdown(&self) {
        {
            let mut at = lock(&self.shutdown_at);
            if at.is_some() {
                return;
            }
            *at = Some(Instant::now());
        }
        info!("shutdown requested");

        let mut state = self.write_state();
        if state.run_state == RunState::Running {
            state.run_state = RunState::ShuttingDown;
        }
    }

    pub fn shutdown_requested_at(&self) -> Option<Instant> {
        *lock(&self.shutdown_at)
    }

    // -- DNS-SD --

    pub fn set_dns_sd_registrar(&self, registrar: Arc<dyn DnsSdRegistrar>) {
        *self.registrar.write().unwrap_or_else(PoisonError::into_inner) = Some(registrar);
    }

    fn registrar(&self) -> Option<Arc<dyn DnsSdRegistrar>> {
        self.registrar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The system name currently advertised over DNS-SD.
    pub fn dns_sd_name(&self) -> String {
        self.read_state().dns_sd_name.clone()
    }

    /// Flag a collision on the system's own DNS-SD name.
    pub fn report_dns_sd_collision(&self) {
        self.write_state().dns_sd_collision = true;
        self.any_collision.store(true, Ordering::SeqCst);
    }

    fn register_printer(&self, printer: &Printer, instance: &str) {
        if let Some(registrar) = self.registrar() {
            if let Err(e) =
                registrar.register_printer(instance, self.port, printer.uuid(), printer.device_uri())
            {
                warn!(printer = %printer.name(), error = %e, "DNS-SD registration failed");
            }
        }
    }

    /// Advertise the system and every printer under their current names.
    pub(crate) fn register_dns_sd(&self) {
        let Some(registrar) = self.registrar() else {
            return;
        };
        let state = self.read_state();
        if let Err(e) = registrar.register_system(&state.dns_sd_name, self.port, &self.uuid) {
            warn!(error = %e, "DNS-SD registration failed");
        }
        for printer in &state.printers {
            self.register_printer(printer, &printer.dns_sd_name());
        }
    }

    /// Withdraw every advertisement.
    pub(crate) fn unregister_dns_sd(&self) {
        let Some(registrar) = self.registrar() else {
            return;
        };
        let state = self.read_state();
        let _ = registrar.unregister(ServiceKind::System, &state.dns_sd_name);
        for printer in &state.printers {
            let _ = registrar.unregister(ServiceKind::Printer, &printer.dns_sd_name());
        }
    }

    /// Re-register every name that reported a collision, under the
    /// exclusive lock, then clear the flags.
    pub(crate) fn handle_dns_sd_collisions(&self) {
        if !self.any_collision.swap(false, Ordering::SeqCst) {
            return;
        }
        let registrar = self.registrar();
        let mut state = self.write_state();

        if state.dns_sd_collision {
            state.dns_sd_serial += 1;
            let renamed = format!("{} ({})", self.name, state.dns_sd_serial);
            let old = std::mem::replace(&mut state.dns_sd_name, renamed.clone());
            state.dns_sd_collision = false;
            info!(old = %old, new = %renamed, "DNS-SD name collision, renaming system");

            if let Some(registrar) = &registrar {
                let _ = registrar.unregister(ServiceKind::System, &old);
                if let Err(e) = registrar.register_system(&renamed, self.port, &self.uuid) {
                    warn!(error = %e, "DNS-SD re-registration failed");
                }
            }
        }

        for printer in &state.printers {
            let Some((old, renamed)) = printer.take_dns_sd_rename() else {
                continue;
            };
            info!(printer = %printer.name(), old = %old, new = %renamed, "DNS-SD name collision, renaming printer");
            if let Some(registrar) = &registrar {
                let _ = registrar.unregister(ServiceKind::Printer, &old);
            }
            self.register_printer(printer, &renamed);
        }
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("spool_dir", &self.spool_dir)
            .field("run_state", &self.run_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dnssd::tests::RecordingRegistrar;
    use pressd_core::JobState;

    pub(crate) fn config_in(dir: &Path) -> SystemConfig {
        SystemConfig {
            name: "Test System".into(),
            hostname: Some("testhost".into()),
            port: 8631,
            spool_dir: Some(dir.join("spool")),
            log_file: Some("-".into()),
            ..SystemConfig::default()
        }
    }

    #[test]
    fn create_resolves_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.auth_service = Some("none".into());

        let system = System::create(&config).unwrap();
        assert_eq!(system.run_state(), RunState::Created);
        assert_eq!(system.log_level(), LogLevel::Error);
        assert_eq!(system.auth_service(), None);
        assert_eq!(system.log_target(), &LogTarget::Stderr);
        assert!(system.uuid().starts_with("urn:uuid:"));
        assert!(system.spool_dir().is_dir());
        // A generated UUID has to be persisted.
        assert!(system.is_save_pending());
    }

    #[test]
    fn configured_uuid_is_kept_and_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.uuid = Some("urn:uuid:6f1b7ad2-0c4e-3d11-9a6b-1f2e3d4c5b6a".into());

        let system = System::create(&config).unwrap();
        assert_eq!(system.uuid(), "urn:uuid:6f1b7ad2-0c4e-3d11-9a6b-1f2e3d4c5b6a");
        assert!(!system.is_save_pending());
    }

    #[test]
    fn empty_name_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.name = String::new();
        assert!(matches!(
            System::create(&config),
            Err(PressdError::Configuration(_))
        ));
    }

    #[test]
    fn uncreatable_spool_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.spool_dir = Some(tmp.path().join("missing").join("deeper"));
        assert!(matches!(
            System::create(&config),
            Err(PressdError::Configuration(_))
        ));
    }

    #[test]
    fn printers_get_sequential_ids_and_stable_uuids() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();

        let a = system.add_printer("Label", "socket://10.0.0.5").unwrap();
        let b = system.add_printer("Office", "file:///dev/usb/lp0").unwrap();
        assert_eq!(a.id(), PrinterId(1));
        assert_eq!(b.id(), PrinterId(2));
        assert_eq!(
            a.uuid(),
            identity::printer_uuid(system.uuid(), system.port(), "Label")
        );

        assert!(system.add_printer("Label", "socket://10.0.0.6").is_err());
        assert_eq!(system.find_printer("Office").unwrap().id(), b.id());
        assert_eq!(system.printer(PrinterId(1)).unwrap().name(), "Label");

        system.remove_printer(a.id()).unwrap();
        assert!(system.printer(a.id()).is_none());
        assert!(matches!(
            system.remove_printer(a.id()),
            Err(PressdError::UnknownPrinter(_))
        ));
        // Ids are never reused.
        assert_eq!(system.add_printer("Third", "file:///dev/null").unwrap().id(), PrinterId(3));
    }

    #[test]
    fn configured_printers_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.printers = vec![
            PrinterConfig {
                name: "one".into(),
                device_uri: "file:///dev/null".into(),
            },
            PrinterConfig {
                name: "two".into(),
                device_uri: "socket://printer.local".into(),
            },
        ];
        let system = System::create(&config).unwrap();
        assert_eq!(system.printers().len(), 2);

        let saved = system.to_config();
        assert_eq!(saved.printers, config.printers);
        assert_eq!(saved.uuid.as_deref(), Some(system.uuid()));
        assert_eq!(saved.log_file.as_deref(), Some("-"));
    }

    #[test]
    fn active_job_count_sums_all_printers() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        let a = system.add_printer("a", "file:///dev/null").unwrap();
        let b = system.add_printer("b", "file:///dev/null").unwrap();

        let j1 = a.create_job("1", system.spool_dir());
        a.create_job("2", system.spool_dir());
        b.create_job("3", system.spool_dir());
        assert_eq!(system.active_job_count(), 3);

        a.finish_job(j1.id, JobState::Completed).unwrap();
        assert_eq!(system.active_job_count(), 2);
    }

    #[test]
    fn clean_jobs_removes_spool_files_beyond_the_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        let printer = system.add_printer("lp", "file:///dev/null").unwrap();

        let mut paths = Vec::new();
        for i in 0..(DEFAULT_MAX_COMPLETED_JOBS + 3) {
            let job = printer.create_job(&format!("doc{i}"), system.spool_dir());
            let path = job.spool_path.clone().unwrap();
            std::fs::write(&path, b"data").unwrap();
            paths.push(path);
            printer.finish_job(job.id, JobState::Completed).unwrap();
        }

        assert_eq!(system.clean_jobs(), 3);
        assert!(!paths[0].exists());
        assert!(!paths[2].exists());
        assert!(paths[3].exists());
        assert_eq!(printer.completed_jobs().len(), DEFAULT_MAX_COMPLETED_JOBS);
    }

    #[test]
    fn listeners_bind_loopback() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();

        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        system.add_listener(listener).unwrap();
        assert_eq!(system.listener_count(), 1);
    }

    #[test]
    fn unresolvable_listen_host_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        assert!(system.add_listeners("no-such-host.invalid").is_err());
        assert_eq!(system.listener_count(), 0);
    }

    #[test]
    fn shutdown_request_is_recorded_once() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        assert!(system.shutdown_requested_at().is_none());

        system.request_shutdown();
        let first = system.shutdown_requested_at().unwrap();
        system.request_shutdown();
        assert_eq!(system.shutdown_requested_at(), Some(first));
    }

    #[test]
    fn save_callback_runs_and_clears_request() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        let path = tmp.path().join("saved.json");

        let target = path.clone();
        system.set_save_callback(Box::new(move |s: &System| s.to_config().save(&target)));
        system.add_printer("lp", "file:///dev/null").unwrap();
        assert!(system.is_save_pending());

        system.save_now();
        assert!(!system.is_save_pending());

        let saved = SystemConfig::load(&path).unwrap();
        assert_eq!(saved.printers.len(), 1);
        assert_eq!(saved.name, "Test System");
    }

    #[test]
    fn collisions_rename_and_reregister() {
        let tmp = tempfile::tempdir().unwrap();
        let system = System::create(&config_in(tmp.path())).unwrap();
        let registrar = Arc::new(RecordingRegistrar::default());
        system.set_dns_sd_registrar(registrar.clone());
        let printer = system.add_printer("Label", "file:///dev/null").unwrap();

        // Nothing flagged: no work.
        system.handle_dns_sd_collisions();
        assert!(registrar.events().is_empty());

        system.report_dns_sd_collision();
        printer.report_dns_sd_collision();
        system.handle_dns_sd_collisions();

        assert_eq!(system.dns_sd_name(), "Test System (2)");
        assert_eq!(printer.dns_sd_name(), "Label (2)");
        assert_eq!(
            registrar.events(),
            vec![
                "-system Test System",
                "+system Test System (2):8631",
                "-printer Label",
                "+printer Label (2):8631",
            ]
        );

        // Flags are cleared.
        system.handle_dns_sd_collisions();
        assert_eq!(registrar.events().len(), 4);
    }
}
