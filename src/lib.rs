//! order - keep a directory tidy as files arrive
//!
//! This library watches one directory and moves each new file into a
//! category subfolder picked by its extension. An event-driven watcher and a
//! periodic rescan run side by side over the same directory; collisions get
//! numbered names and transient move failures are retried.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod file_category;
pub mod output;
pub mod reconciler;
pub mod relocator;
pub mod session;
pub mod shutdown;
pub mod watch_trigger;

pub use config::{CompiledFilters, ConfigError, OrderConfig};
pub use dispatch::{Dispatcher, Origin, PendingFile};
pub use file_category::{Category, ExtensionTable};
pub use reconciler::{CycleReport, ReconciliationLoop};
pub use relocator::{RelocateError, RelocationOutcome, RelocationPolicy, Relocator, SkipReason};
pub use session::{Session, SessionController, SessionError, SessionSettings};
pub use shutdown::ShutdownSignal;
pub use watch_trigger::WatchTrigger;

pub use cli::{OrganizeCommand, run_cli, run_cli_with_config};
