/// Moving files into their category subfolders.
///
/// The [`Relocator`] takes one file, the root its category folders live
/// under, and a category. It creates the category folder on demand, picks a
/// free name (`photo.jpg`, `photo_1.jpg`, `photo_2.jpg`, ...), and moves the
/// file, retrying transient failures a bounded number of times.
///
/// Both triggers share a single relocator. Every move attempt holds a lock
/// on its destination folder from the "is the source still there" check
/// through the rename, so two relocations of the same file serialize and the
/// second one sees the source gone.
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::default_ignored_suffixes;
use crate::file_category::Category;
use crate::shutdown::ShutdownSignal;

/// The primitive that physically moves one file.
///
/// `to` never exists when this is called.
pub trait FileMover: Send + Sync {
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Moves files with `fs::rename`, copying across devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FileMover for FsMover {
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                if let Err(copy_error) = fs::copy(from, to) {
                    let _ = fs::remove_file(to);
                    return Err(copy_error);
                }
                // Keep the original if it cannot be removed; never leave two copies.
                if let Err(remove_error) = fs::remove_file(from) {
                    let _ = fs::remove_file(to);
                    return Err(remove_error);
                }
                Ok(())
            }
            result => result,
        }
    }
}

/// Knobs controlling a relocation.
#[derive(Debug, Clone)]
pub struct RelocationPolicy {
    /// Name suffixes of downloads still being written; such files are left alone.
    pub ignored_suffixes: Vec<String>,
    /// Total move attempts, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        Self {
            ignored_suffixes: default_ignored_suffixes(),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Why a file was left where it is without counting as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a regular file any more: already moved, deleted, or a directory.
    Vanished,
    /// Still being downloaded.
    InProgress,
    /// Matched a configured exclude rule.
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Vanished => f.write_str("source no longer present"),
            SkipReason::InProgress => f.write_str("download in progress"),
            SkipReason::Excluded => f.write_str("excluded by filter rules"),
        }
    }
}

/// Errors that end a relocation with the file still in place.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("{} has no file name component", .path.display())]
    NoFileName { path: PathBuf },

    #[error("Failed to move {} to {} after {attempts} attempts: {last_error}", .source_path.display(), .destination.display())]
    ExhaustedRetries {
        source_path: PathBuf,
        destination: PathBuf,
        attempts: u32,
        #[source]
        last_error: io::Error,
    },

    #[error("Relocation of {} cancelled by shutdown", .path.display())]
    Cancelled { path: PathBuf },
}

/// Result of one [`Relocator::relocate`] call.
#[derive(Debug)]
pub enum RelocationOutcome {
    Moved(PathBuf),
    Skipped(SkipReason),
    Failed(RelocateError),
}

impl RelocationOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, RelocationOutcome::Moved(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RelocationOutcome::Skipped(_))
    }

    /// The final path, for a successful move.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            RelocationOutcome::Moved(path) => Some(path),
            _ => None,
        }
    }
}

/// Moves files into category subfolders with collision renaming and retries.
pub struct Relocator {
    policy: RelocationPolicy,
    mover: Box<dyn FileMover>,
    folder_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    shutdown: Option<ShutdownSignal>,
}

impl Relocator {
    pub fn new(policy: RelocationPolicy) -> Self {
        Self::with_mover(policy, Box::new(FsMover))
    }

    pub fn with_mover(policy: RelocationPolicy, mover: Box<dyn FileMover>) -> Self {
        Self {
            policy,
            mover,
            folder_locks: Mutex::new(HashMap::new()),
            shutdown: None,
        }
    }

    /// Makes retry backoff interruptible by `signal`.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Returns true if `file_name` ends with an in-progress download suffix.
    pub fn is_in_progress(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.policy
            .ignored_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }

    /// Moves `file_path` into `destination_root/<category folder>/`.
    ///
    /// Never panics and never returns an error: every problem is folded
    /// into the returned [`RelocationOutcome`], and on anything but `Moved`
    /// the source is left where it was.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use order::file_category::Category;
    /// use order::relocator::{RelocationOutcome, RelocationPolicy, Relocator};
    /// use std::path::Path;
    ///
    /// let relocator = Relocator::new(RelocationPolicy::default());
    /// let outcome = relocator.relocate(
    ///     Path::new("/home/me/Downloads/photo.jpg"),
    ///     Path::new("/home/me/Downloads"),
    ///     Category::Images,
    /// );
    ///
    /// if let RelocationOutcome::Moved(path) = outcome {
    ///     println!("Moved to {}", path.display());
    /// }
    /// ```
    pub fn relocate(
        &self,
        file_path: &Path,
        destination_root: &Path,
        category: Category,
    ) -> RelocationOutcome {
        if !is_regular_file(file_path) {
            debug!("Skipping {}: not a regular file", file_path.display());
            return RelocationOutcome::Skipped(SkipReason::Vanished);
        }

        let Some(file_name) = file_path.file_name() else {
            return RelocationOutcome::Failed(RelocateError::NoFileName {
                path: file_path.to_path_buf(),
            });
        };

        if self.is_in_progress(&file_name.to_string_lossy()) {
            debug!("Skipping {}: download in progress", file_path.display());
            return RelocationOutcome::Skipped(SkipReason::InProgress);
        }

        let category_path = destination_root.join(category.dir_name());
        if let Err(e) = fs::create_dir_all(&category_path) {
            warn!("Failed to create {}: {}", category_path.display(), e);
            return RelocationOutcome::Failed(RelocateError::DirectoryCreationFailed {
                path: category_path,
                source: e,
            });
        }

        let folder_lock = self.folder_lock(&category_path);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let (destination, result) = {
                let _guard = folder_lock
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());

                if !is_regular_file(file_path) {
                    debug!("{} vanished before it could be moved", file_path.display());
                    return RelocationOutcome::Skipped(SkipReason::Vanished);
                }

                // The folder may have been removed since the last attempt.
                match fs::create_dir_all(&category_path) {
                    Ok(()) => {
                        let destination = unique_destination(&category_path, file_name);
                        let result = self.mover.move_file(file_path, &destination);
                        (destination, result)
                    }
                    Err(e) => (category_path.join(file_name), Err(e)),
                }
            };

            let error = match result {
                Ok(()) => {
                    info!(
                        "Moved {} to {}",
                        file_path.display(),
                        destination.display()
                    );
                    return RelocationOutcome::Moved(destination);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && !file_path.exists() => {
                    debug!("{} was moved by someone else", file_path.display());
                    return RelocationOutcome::Skipped(SkipReason::Vanished);
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                error!(
                    "Failed to move file {} after {} attempts: {}",
                    file_path.display(),
                    attempt,
                    error
                );
                return RelocationOutcome::Failed(RelocateError::ExhaustedRetries {
                    source_path: file_path.to_path_buf(),
                    destination,
                    attempts: attempt,
                    last_error: error,
                });
            }

            warn!(
                "Move attempt {}/{} for {} failed: {}. Retrying in {:?}",
                attempt,
                self.policy.max_attempts,
                file_path.display(),
                error,
                self.policy.backoff
            );

            if self.wait_backoff() {
                return RelocationOutcome::Failed(RelocateError::Cancelled {
                    path: file_path.to_path_buf(),
                });
            }
        }
    }

    /// Sleeps one backoff interval. Returns true if shutdown interrupted it.
    fn wait_backoff(&self) -> bool {
        match &self.shutdown {
            Some(signal) => signal.wait_timeout(self.policy.backoff),
            None => {
                thread::sleep(self.policy.backoff);
                false
            }
        }
    }

    fn folder_lock(&self, folder: &Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .folder_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(folder.to_path_buf()).or_default().clone()
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// First path in `folder` named `file_name`, or `stem_N.ext` for the
/// smallest N >= 1 that does not exist yet.
pub fn unique_destination(folder: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = folder.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name.file_stem().unwrap_or(file_name);
    let extension = name.extension();

    let mut counter = 1u64;
    loop {
        let mut numbered = stem.to_os_string();
        numbered.push(format!("_{}", counter));
        if let Some(ext) = extension {
            numbered.push(".");
            numbered.push(ext);
        }
        let candidate = folder.join(numbered);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
