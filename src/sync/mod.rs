//! Incremental synchronization window resolution
//!
//! `kwxsync` either performs a full cross-project synchronization or only looks
//! at issue changes newer than a cutoff passed with `--last-sync`. This module
//! computes that cutoff from one of four modes:
//!
//! - **manual**: a duration expression subtracted from the current time
//! - **previous build**: the start time of the build before the current one
//! - **last successful build**: the start time of the last successful build
//! - **full**: no cutoff at all
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use kwci::fs::RealFileSystem;
//! use kwci::sync::{SyncRequest, SyncWindowResolver};
//!
//! let fs = RealFileSystem::new();
//! let resolver = SyncWindowResolver::new(&fs);
//! let now = Utc.with_ymd_and_hms(2023, 3, 15, 10, 0, 0).unwrap();
//!
//! let cutoff = resolver
//!     .resolve(&SyncRequest::manual("2d3h"), now)
//!     .unwrap();
//! assert_eq!(cutoff.as_arg(), "2023-03-13T07:00:00");
//! ```

mod duration;
mod window;

pub use duration::{DurationExpr, COMPACT_PATTERN, LEGACY_PATTERN};
pub use window::{
    validate_timestamp_format, LastSyncType, SyncCutoff, SyncRequest, SyncWindowResolver,
    DEFAULT_TIMESTAMP_FORMAT, FULL_SYNC,
};

use crate::history::HistoryError;
use thiserror::Error;

/// Errors raised while resolving a sync window
///
/// None of these are retried: the action that asked for the window is aborted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Could not match last sync value \"{value}\". Expected a duration such as 2d3h, 1mo12h or 01-00-0000T00:00:00")]
    InvalidDuration { value: String },

    #[error("Manual last sync requires a duration expression")]
    MissingDuration,

    #[error("Duration component {field}={amount} is out of range")]
    OutOfRange { field: &'static str, amount: u32 },

    #[error("Subtracting {value} from {reference} leaves the supported calendar range")]
    CalendarOverflow { value: String, reference: String },

    #[error("Invalid timestamp format \"{0}\"")]
    InvalidTimestampFormat(String),

    #[error("Unknown last sync type \"{0}\". Valid options: manual, lastBuild, lastSuccess, full")]
    UnknownSyncType(String),

    #[error("Last sync type {mode} needs {missing}")]
    MissingBuildContext {
        mode: LastSyncType,
        missing: &'static str,
    },

    #[error(transparent)]
    History(#[from] HistoryError),
}
