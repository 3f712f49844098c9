//! The classify-and-relocate step shared by both triggers.
//!
//! The watcher and the periodic rescan each wrap a discovered path in a
//! [`PendingFile`] and hand it to the same [`Dispatcher`], so a file is
//! treated identically no matter which trigger noticed it first.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CompiledFilters;
use crate::file_category::{Category, ExtensionTable};
use crate::relocator::{RelocationOutcome, Relocator, SkipReason};

/// Which trigger discovered a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    WatchEvent,
    Rescan,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::WatchEvent => f.write_str("watch"),
            Origin::Rescan => f.write_str("rescan"),
        }
    }
}

/// A file waiting for one relocation attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub path: PathBuf,
    pub discovered_at: DateTime<Utc>,
    pub origin: Origin,
}

impl PendingFile {
    pub fn new(path: PathBuf, origin: Origin) -> Self {
        Self {
            path,
            discovered_at: Utc::now(),
            origin,
        }
    }

    /// The folder the file sits in, which is also where its category
    /// folders go.
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Classifies pending files and relocates them.
pub struct Dispatcher {
    table: Arc<ExtensionTable>,
    filters: CompiledFilters,
    relocator: Relocator,
}

impl Dispatcher {
    pub fn new(table: Arc<ExtensionTable>, filters: CompiledFilters, relocator: Relocator) -> Self {
        Self {
            table,
            filters,
            relocator,
        }
    }

    pub fn classify(&self, path: &Path) -> Category {
        self.table.classify_path(path)
    }

    /// Relocates one pending file into its category folder next to it.
    ///
    /// Returns the category alongside the outcome so callers can tally.
    pub fn dispatch(&self, pending: &PendingFile) -> (Category, RelocationOutcome) {
        let category = self.classify(&pending.path);

        if !self.filters.should_include(&pending.path) {
            debug!("[{}] {} excluded by filters", pending.origin, pending.path.display());
            return (category, RelocationOutcome::Skipped(SkipReason::Excluded));
        }

        let Some(root) = pending.parent() else {
            debug!("[{}] {} has no parent directory", pending.origin, pending.path.display());
            return (category, RelocationOutcome::Skipped(SkipReason::Vanished));
        };

        let outcome = self.relocator.relocate(&pending.path, root, category);
        match &outcome {
            RelocationOutcome::Moved(destination) => debug!(
                "[{}] {} -> {} (discovered {})",
                pending.origin,
                pending.path.display(),
                destination.display(),
                pending.discovered_at.to_rfc3339()
            ),
            RelocationOutcome::Skipped(reason) => debug!(
                "[{}] Skipped {}: {}",
                pending.origin,
                pending.path.display(),
                reason
            ),
            RelocationOutcome::Failed(e) => warn!(
                "[{}] Could not organize {}: {}",
                pending.origin,
                pending.path.display(),
                e
            ),
        }
        (category, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderConfig;
    use crate::relocator::RelocationPolicy;
    use std::fs;
    use tempfile::TempDir;

    fn dispatcher(filters: CompiledFilters) -> Dispatcher {
        Dispatcher::new(
            Arc::new(ExtensionTable::default()),
            filters,
            Relocator::new(RelocationPolicy::default()),
        )
    }

    #[test]
    fn test_pending_file_records_origin_and_time() {
        let before = Utc::now();
        let pending = PendingFile::new(PathBuf::from("/d/a.jpg"), Origin::Rescan);
        assert_eq!(pending.origin, Origin::Rescan);
        assert!(pending.discovered_at >= before);
        assert_eq!(pending.parent(), Some(Path::new("/d")));
    }

    #[test]
    fn test_dispatch_moves_into_sibling_category_folder() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.JPG");
        fs::write(&file_path, "img").unwrap();

        let (category, outcome) = dispatcher(CompiledFilters::default())
            .dispatch(&PendingFile::new(file_path, Origin::WatchEvent));

        assert_eq!(category, Category::Images);
        assert_eq!(
            outcome.destination(),
            Some(temp_dir.path().join("1. Images").join("a.JPG").as_path())
        );
    }

    #[test]
    fn test_dispatch_respects_exclude_rules() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("scratch.tmp");
        fs::write(&file_path, "").unwrap();
        let filters = OrderConfig::from_toml_str("[filters.exclude]\npatterns = [\"*.tmp\"]\n")
            .unwrap()
            .compile_filters()
            .unwrap();

        let (_, outcome) =
            dispatcher(filters).dispatch(&PendingFile::new(file_path.clone(), Origin::Rescan));

        assert!(matches!(outcome, RelocationOutcome::Skipped(SkipReason::Excluded)));
        assert!(file_path.exists());
    }
}
