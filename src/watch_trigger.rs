//! Event-driven relocation of newly created files.
//!
//! A [`WatchTrigger`] subscribes to creation notifications for one
//! directory (not its subdirectories) and dispatches every created file on
//! a dedicated worker thread. It keeps no retry state: anything it misses
//! is picked up by the next rescan.

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, Origin, PendingFile};
use crate::shutdown::ShutdownSignal;

/// How often the worker checks for shutdown while no events arrive.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to subscribe to directory notifications: {0}")]
    Subscribe(#[from] notify::Error),

    #[error("Failed to start watch worker: {0}")]
    Spawn(#[from] io::Error),
}

type EventResult = Result<Event, notify::Error>;

/// An active subscription plus the thread draining it.
pub struct WatchTrigger {
    target: PathBuf,
    watcher: Option<RecommendedWatcher>,
    worker: Option<JoinHandle<()>>,
    stop: ShutdownSignal,
}

impl WatchTrigger {
    /// Starts watching `target` non-recursively.
    ///
    /// The worker runs until `shutdown` fires or the subscription is
    /// released with [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(
        target: &Path,
        dispatcher: Arc<Dispatcher>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel::<EventResult>();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(target, RecursiveMode::NonRecursive)?;

        let stop = ShutdownSignal::new();
        let worker_stop = stop.clone();
        let worker = thread::Builder::new()
            .name("order-watch".to_string())
            .spawn(move || drain_events(rx, &dispatcher, &[shutdown, worker_stop]))?;

        info!("Watching {} for new files", target.display());

        Ok(Self {
            target: target.to_path_buf(),
            watcher: Some(watcher),
            worker: Some(worker),
            stop,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Releases the subscription and waits for the worker to exit.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.stop.trigger();
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.target) {
                debug!("Unwatching {} failed: {}", self.target.display(), e);
            }
            drop(watcher);
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Watch worker for {} panicked", self.target.display());
        }
    }
}

impl Drop for WatchTrigger {
    fn drop(&mut self) {
        self.release();
    }
}

/// True for "file created" notifications. Folder creation is ignored.
///
/// Backends that cannot tell files from folders report `Any`; those paths
/// are still checked for being a regular file before anything moves.
pub fn is_file_creation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File | CreateKind::Any | CreateKind::Other)
    )
}

fn drain_events(rx: Receiver<EventResult>, dispatcher: &Dispatcher, stops: &[ShutdownSignal]) {
    loop {
        if stops.iter().any(ShutdownSignal::is_triggered) {
            break;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => handle_event(event, dispatcher),
            Ok(Err(e)) => warn!("Watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("Watch worker stopped");
}

fn handle_event(event: Event, dispatcher: &Dispatcher) {
    if !is_file_creation(&event.kind) {
        return;
    }
    for path in event.paths {
        debug!("Created: {}", path.display());
        let pending = PendingFile::new(path, Origin::WatchEvent);
        // Outcomes are logged by the dispatcher; a failure here must not end the loop.
        let _ = dispatcher.dispatch(&pending);
    }
}
