/// Periodic full rescans of the target directory.
///
/// Notifications can arrive before a download finishes or be dropped
/// entirely, so a [`ReconciliationLoop`] relists the target directory on a
/// fixed period and dispatches every regular file it finds, exactly as the
/// watcher would. One file failing never stops the rest of the pass.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Origin, PendingFile};
use crate::file_category::Category;
use crate::relocator::RelocationOutcome;
use crate::shutdown::ShutdownSignal;

/// Tally of one reconciliation pass.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Files moved, per destination category.
    pub moved: BTreeMap<Category, usize>,
    /// Number of files left alone on purpose.
    pub skipped: usize,
    /// Files that could not be moved, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CycleReport {
    pub fn moved_count(&self) -> usize {
        self.moved.values().sum()
    }

    pub fn total_processed(&self) -> usize {
        self.moved_count() + self.skipped + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: &Path, category: Category, outcome: &RelocationOutcome) {
        match outcome {
            RelocationOutcome::Moved(_) => *self.moved.entry(category).or_insert(0) += 1,
            RelocationOutcome::Skipped(_) => self.skipped += 1,
            RelocationOutcome::Failed(e) => self.failed.push((path.to_path_buf(), e.to_string())),
        }
    }
}

/// Rescans one directory on a fixed period until shut down.
pub struct ReconciliationLoop {
    target: PathBuf,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl ReconciliationLoop {
    pub fn new(
        target: PathBuf,
        dispatcher: Arc<Dispatcher>,
        interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            target,
            dispatcher,
            interval,
            shutdown,
        }
    }

    /// Regular files directly inside the target directory, sorted by name.
    pub fn list_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.target)?
            .flatten()
            .filter(|entry| fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Runs one full pass over the directory.
    ///
    /// # Errors
    ///
    /// Fails only if the directory itself cannot be listed; per-file
    /// problems end up in the report.
    pub fn run_cycle(&self) -> io::Result<CycleReport> {
        self.run_cycle_with(|_, _| {})
    }

    /// Like [`run_cycle`](Self::run_cycle), calling `on_file` after each file.
    pub fn run_cycle_with<F>(&self, mut on_file: F) -> io::Result<CycleReport>
    where
        F: FnMut(&Path, &RelocationOutcome),
    {
        let mut report = CycleReport::default();

        for path in self.list_files()? {
            if self.shutdown.is_triggered() {
                debug!("Shutdown requested; ending rescan early");
                break;
            }
            let pending = PendingFile::new(path, Origin::Rescan);
            let (category, outcome) = self.dispatcher.dispatch(&pending);
            report.record(&pending.path, category, &outcome);
            on_file(&pending.path, &outcome);
        }

        Ok(report)
    }

    /// Sleeps, rescans, repeats. Returns once the shutdown signal fires.
    pub fn run(&self) {
        info!(
            "Rescanning {} every {:?}",
            self.target.display(),
            self.interval
        );

        while !self.shutdown.wait_timeout(self.interval) {
            match self.run_cycle() {
                Ok(report) if report.total_processed() > 0 => info!(
                    "Rescan of {}: {} moved, {} skipped, {} failed",
                    self.target.display(),
                    report.moved_count(),
                    report.skipped,
                    report.failed.len()
                ),
                Ok(_) => debug!("Rescan of {}: nothing to do", self.target.display()),
                Err(e) => warn!("Could not list {}: {}", self.target.display(), e),
            }
        }

        info!("Reconciliation loop for {} stopped", self.target.display());
    }

    /// Runs [`run`](Self::run) on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("order-rescan".to_string())
            .spawn(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompiledFilters;
    use crate::file_category::ExtensionTable;
    use crate::relocator::{FileMover, FsMover, RelocationPolicy, Relocator};
    use std::ffi::OsStr;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Always fails for one file name and moves everything else.
    struct FailOn(&'static str);

    impl FileMover for FailOn {
        fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
            if from.file_name() == Some(OsStr::new(self.0)) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            FsMover.move_file(from, to)
        }
    }

    fn make_loop(target: &Path, interval: Duration, shutdown: ShutdownSignal) -> ReconciliationLoop {
        let dispatcher = Dispatcher::new(
            Arc::new(ExtensionTable::default()),
            CompiledFilters::default(),
            Relocator::new(RelocationPolicy::default()).with_shutdown(shutdown.clone()),
        );
        ReconciliationLoop::new(target.to_path_buf(), Arc::new(dispatcher), interval, shutdown)
    }

    #[test]
    fn test_cycle_sorts_files_and_leaves_partials() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["a.jpg", "b.mp4", "b.mp4.part", "c.xyz"] {
            fs::write(root.join(name), name).unwrap();
        }

        let report = make_loop(root, Duration::from_secs(10), ShutdownSignal::new())
            .run_cycle()
            .unwrap();

        assert!(root.join("1. Images").join("a.jpg").is_file());
        assert!(root.join("2. Videos").join("b.mp4").is_file());
        assert!(root.join("b.mp4.part").is_file());
        assert!(root.join("12. Others").join("c.xyz").is_file());
        assert_eq!(report.moved_count(), 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.moved.get(&Category::Videos), Some(&1));
        assert!(report.is_complete_success());
    }

    #[test]
    fn test_one_failing_file_does_not_abort_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(root.join(name), name).unwrap();
        }
        let shutdown = ShutdownSignal::new();
        let relocator = Relocator::with_mover(
            RelocationPolicy {
                backoff: Duration::from_millis(5),
                ..RelocationPolicy::default()
            },
            Box::new(FailOn("a.jpg")),
        );
        let dispatcher = Dispatcher::new(
            Arc::new(ExtensionTable::default()),
            CompiledFilters::default(),
            relocator,
        );
        let rescan = ReconciliationLoop::new(
            root.to_path_buf(),
            Arc::new(dispatcher),
            Duration::from_secs(10),
            shutdown,
        );

        let report = rescan.run_cycle().unwrap();

        assert_eq!(report.moved_count(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, root.join("a.jpg"));
        assert!(!report.is_complete_success());
        assert_eq!(fs::read_to_string(root.join("a.jpg")).unwrap(), "a.jpg");
        assert!(root.join("1. Images").join("b.jpg").is_file());
        assert!(root.join("1. Images").join("c.jpg").is_file());
    }

    #[test]
    fn test_cycle_ignores_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("nested.zip")).unwrap();
        fs::write(root.join("nested.zip").join("inner.jpg"), "").unwrap();

        let report = make_loop(root, Duration::from_secs(10), ShutdownSignal::new())
            .run_cycle()
            .unwrap();

        assert_eq!(report.total_processed(), 0);
        assert!(root.join("nested.zip").join("inner.jpg").exists());
        assert!(!root.join("5. Archives").exists());
    }

    #[test]
    fn test_second_cycle_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("notes.txt"), "").unwrap();
        let rescan = make_loop(root, Duration::from_secs(10), ShutdownSignal::new());

        assert_eq!(rescan.run_cycle().unwrap().moved_count(), 1);
        let second = rescan.run_cycle().unwrap();

        assert_eq!(second.total_processed(), 0);
        assert!(root.join("4. Documents").join("notes.txt").exists());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let rescan = make_loop(
            &temp_dir.path().join("gone"),
            Duration::from_secs(10),
            ShutdownSignal::new(),
        );
        assert!(rescan.run_cycle().is_err());
    }

    #[test]
    fn test_spawned_loop_picks_up_files_and_stops() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let shutdown = ShutdownSignal::new();
        let handle = make_loop(&root, Duration::from_millis(50), shutdown.clone())
            .spawn()
            .unwrap();

        fs::write(root.join("song.mp3"), "").unwrap();
        let moved = root.join("3. Music").join("song.mp3");
        let deadline = Instant::now() + Duration::from_secs(10);
        while !moved.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(moved.exists());

        shutdown.trigger();
        handle.join().unwrap();
    }
}
