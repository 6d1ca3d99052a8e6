//! kwci - Klocwork CI helper
//!
//! This library prepares the environment CI jobs need to run Klocwork
//! analyses, works out incremental cross-project synchronisation windows, and
//! drives the Klocwork command-line tools and web API.
//!
//! # Core Concepts
//!
//! - **Build environment**: the `KLOCWORK_*` variables and `PATH` entries a job
//!   needs, decided from server, install and license configuration
//! - **Sync window**: how far back `kwxsync` has to look, either a duration
//!   expression or the start time of an earlier build
//! - **Build history**: the CI host's per-job builds directory, holding one
//!   `build.xml` record per build
//!
//! # Example Usage
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use kwci::command::EnvMap;
//! use kwci::sync::SyncCutoff;
//! use kwci::xsync::XSyncOptions;
//!
//! let env = EnvMap::from([(
//!     "KLOCWORK_URL".to_string(),
//!     "http://kw.example.com:8080".to_string(),
//! )]);
//! let command = XSyncOptions::default()
//!     .xsync_command(&env, &SyncCutoff::Full, &["app".to_string()])
//!     .unwrap();
//!
//! assert_eq!(command.to_string(), "kwxsync --url http://kw.example.com:8080 --full app");
//! ```
//!
//! # Project Structure
//!
//! - [`sync`]: duration expressions and sync window resolution
//! - [`history`]: build history lookups
//! - [`api`]: Klocwork web API client and ltoken handling
//! - [`xsync`]: `kwxsync` command assembly
//! - [`wrapper`]: job environment setup and project creation
//! - [`command`]: argument lists and process execution

pub mod api;
pub mod cli;
pub mod command;
pub mod config;
pub mod fs;
pub mod history;
pub mod sync;
pub mod util;
pub mod wrapper;
pub mod xsync;

pub use api::{ApiError, KlocworkApi, Project, ProjectSource};
pub use command::{ArgumentList, CommandError, CommandRunner, EnvMap, ProcessRunner};
pub use config::{ConfigError, KwciConfig};
pub use history::{BuildContext, BuildHistory, HistoryError};
pub use sync::{DurationExpr, LastSyncType, SyncCutoff, SyncError, SyncRequest, SyncWindowResolver};
pub use util::{init_from_env, init_logging, LoggingConfig};
pub use wrapper::{BuildEnvironment, EnvironmentSetup, WrapperError};
pub use xsync::{IssueStatus, XSyncError, XSyncOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
