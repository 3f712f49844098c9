//! Starting and stopping monitoring of one directory.
//!
//! [`SessionController::start`] validates the target directory, subscribes
//! the watcher and spawns the rescan loop, and hands back a [`Session`].
//! Both triggers share one dispatcher and one shutdown signal;
//! [`Session::stop`] fires the signal, releases the subscription and joins
//! the rescan thread.
//!
//! A controller runs at most one session at a time. A second `start` while
//! one is active fails with [`SessionError::AlreadyActive`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{CompiledFilters, ConfigError, OrderConfig};
use crate::dispatch::Dispatcher;
use crate::file_category::ExtensionTable;
use crate::reconciler::ReconciliationLoop;
use crate::relocator::{RelocationPolicy, Relocator};
use crate::shutdown::ShutdownSignal;
use crate::watch_trigger::{WatchError, WatchTrigger};

/// Status line shown once monitoring is running.
pub const STARTED_MESSAGE: &str = "Monitoring started...";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid folder path: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("A monitoring session is already running for {}", .0.display())]
    AlreadyActive(PathBuf),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Failed to start rescan thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Everything a session needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub table: Arc<ExtensionTable>,
    pub filters: CompiledFilters,
    pub policy: RelocationPolicy,
    pub rescan_interval: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &OrderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            table: Arc::new(config.extension_table()?),
            filters: config.compile_filters()?,
            policy: config.relocation_policy(),
            rescan_interval: config.rescan_interval(),
        })
    }

    /// A dispatcher whose retry backoff stops on `shutdown`.
    pub fn dispatcher(&self, shutdown: ShutdownSignal) -> Dispatcher {
        Dispatcher::new(
            self.table.clone(),
            self.filters.clone(),
            Relocator::new(self.policy.clone()).with_shutdown(shutdown),
        )
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            table: Arc::new(ExtensionTable::default()),
            filters: CompiledFilters::default(),
            policy: RelocationPolicy::default(),
            rescan_interval: Duration::from_secs(10),
        }
    }
}

/// Starts monitoring sessions.
pub struct SessionController {
    settings: SessionSettings,
    active: Arc<AtomicBool>,
}

impl SessionController {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Begins monitoring `target`.
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidDirectory`] if `target` is not an existing
    ///   directory; nothing is started.
    /// * [`SessionError::AlreadyActive`] if this controller's previous
    ///   session has not been stopped.
    /// * [`SessionError::Watch`] / [`SessionError::Spawn`] if the watcher or
    ///   rescan thread cannot be started; anything already started is torn
    ///   down again.
    pub fn start(&self, target: &Path) -> Result<Session, SessionError> {
        let target = resolve_target(target)?;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::AlreadyActive(target.to_path_buf()));
        }

        match self.spawn_triggers(target.clone()) {
            Ok(session) => {
                info!("Monitoring started for {}", target.display());
                Ok(session)
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn spawn_triggers(&self, target: PathBuf) -> Result<Session, SessionError> {
        let shutdown = ShutdownSignal::new();
        let dispatcher = Arc::new(self.settings.dispatcher(shutdown.clone()));

        let watch = WatchTrigger::subscribe(&target, dispatcher.clone(), shutdown.clone())?;

        let rescan = ReconciliationLoop::new(
            target.clone(),
            dispatcher,
            self.settings.rescan_interval,
            shutdown.clone(),
        );
        let rescan_handle = match rescan.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                shutdown.trigger();
                watch.unsubscribe();
                return Err(SessionError::Spawn(e));
            }
        };

        Ok(Session {
            target,
            shutdown,
            watch: Some(watch),
            rescan: Some(rescan_handle),
            active: self.active.clone(),
        })
    }
}

/// Canonical form of `target`, which must be an existing directory.
fn resolve_target(target: &Path) -> Result<PathBuf, SessionError> {
    match target.canonicalize() {
        Ok(resolved) if resolved.is_dir() => Ok(resolved),
        _ => Err(SessionError::InvalidDirectory(target.to_path_buf())),
    }
}

/// A running monitoring session. Stops when dropped.
pub struct Session {
    target: PathBuf,
    shutdown: ShutdownSignal,
    watch: Option<WatchTrigger>,
    rescan: Option<JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl Session {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn status_message(&self) -> &'static str {
        STARTED_MESSAGE
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered()
    }

    /// Stops both triggers and waits for their threads to finish.
    ///
    /// An in-flight retry backoff is cut short; the file it was retrying
    /// stays where it is.
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if self.watch.is_none() && self.rescan.is_none() {
            return;
        }

        self.shutdown.trigger();
        if let Some(watch) = self.watch.take() {
            watch.unsubscribe();
        }
        if let Some(handle) = self.rescan.take()
            && handle.join().is_err()
        {
            error!("Rescan thread for {} panicked", self.target.display());
        }
        self.active.store(false, Ordering::SeqCst);
        info!("Monitoring stopped for {}", self.target.display());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
