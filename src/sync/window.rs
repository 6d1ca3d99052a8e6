use super::{DurationExpr, SyncError};
use crate::fs::FileSystem;
use crate::history::{BuildContext, BuildHistory, BuildSelector};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;
use tracing::{debug, info};

/// Layout of the `--last-sync` argument
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Sentinel meaning no prior synchronization exists
pub const FULL_SYNC: &str = "full";

/// How the last-sync cutoff is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastSyncType {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "lastBuild", alias = "previous-build")]
    LastBuild,
    #[serde(rename = "lastSuccess", alias = "last-success")]
    LastSuccess,
    #[default]
    #[serde(rename = "full")]
    Full,
}

impl FromStr for LastSyncType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "lastbuild" | "last-build" | "previous-build" => Ok(Self::LastBuild),
            "lastsuccess" | "last-success" | "last-successful-build" => Ok(Self::LastSuccess),
            "full" => Ok(Self::Full),
            _ => Err(SyncError::UnknownSyncType(s.to_string())),
        }
    }
}

impl fmt::Display for LastSyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manual => "manual",
            Self::LastBuild => "lastBuild",
            Self::LastSuccess => "lastSuccess",
            Self::Full => "full",
        };
        f.write_str(name)
    }
}

/// One sync window request; exactly one mode per invocation
#[derive(Debug, Clone)]
pub enum SyncRequest {
    /// Go back from now by a duration expression
    Manual { duration: Option<String> },
    /// Start time of the build preceding `build_id`
    PreviousBuild {
        history: BuildHistory,
        build_id: String,
    },
    /// Start time of the last successful build
    LastSuccessfulBuild { history: BuildHistory },
    /// No cutoff
    Full,
}

impl SyncRequest {
    pub fn manual(duration: impl Into<String>) -> Self {
        Self::Manual {
            duration: Some(duration.into()),
        }
    }

    /// Builds the request for `mode` from configuration and the build context
    pub fn for_mode(
        mode: LastSyncType,
        duration: Option<&str>,
        context: &BuildContext,
    ) -> Result<Self, SyncError> {
        let history = |mode: LastSyncType| -> Result<BuildHistory, SyncError> {
            context
                .history()?
                .ok_or(SyncError::MissingBuildContext {
                    mode,
                    missing: "a builds directory (or WORKSPACE and BUILD_TAG)",
                })
        };

        match mode {
            LastSyncType::Full => Ok(Self::Full),
            LastSyncType::Manual => Ok(Self::Manual {
                duration: duration.map(str::to_string),
            }),
            LastSyncType::LastBuild => {
                let history = history(mode)?;
                match context.build_id.clone() {
                    Some(build_id) => Ok(Self::PreviousBuild { history, build_id }),
                    None => {
                        info!("No build available, will do full synchronisation");
                        Ok(Self::Full)
                    }
                }
            }
            LastSyncType::LastSuccess => Ok(Self::LastSuccessfulBuild {
                history: history(mode)?,
            }),
        }
    }

    pub fn mode(&self) -> LastSyncType {
        match self {
            Self::Manual { .. } => LastSyncType::Manual,
            Self::PreviousBuild { .. } => LastSyncType::LastBuild,
            Self::LastSuccessfulBuild { .. } => LastSyncType::LastSuccess,
            Self::Full => LastSyncType::Full,
        }
    }
}

/// Result of resolving a sync window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "since", rename_all = "lowercase")]
pub enum SyncCutoff {
    Full,
    Since(String),
}

impl SyncCutoff {
    /// Value handed to `kwxsync`: the literal `full` or the formatted timestamp
    pub fn as_arg(&self) -> &str {
        match self {
            Self::Full => FULL_SYNC,
            Self::Since(ts) => ts,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl fmt::Display for SyncCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Resolves [`SyncRequest`]s into [`SyncCutoff`]s
pub struct SyncWindowResolver<'a> {
    fs: &'a dyn FileSystem,
    timestamp_format: String,
}

impl<'a> SyncWindowResolver<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self {
            fs,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    pub fn resolve<Tz>(
        &self,
        request: &SyncRequest,
        now: DateTime<Tz>,
    ) -> Result<SyncCutoff, SyncError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        debug!("Resolving sync window, mode: {}", request.mode());

        match request {
            SyncRequest::Full => Ok(SyncCutoff::Full),
            SyncRequest::Manual { duration } => {
                let raw = duration
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .ok_or(SyncError::MissingDuration)?;
                let expr = DurationExpr::parse(raw)?;
                let cutoff = expr.subtract_from(now)?;
                debug!("Manual last sync {} resolves to {}", expr, cutoff.naive_local());
                Ok(SyncCutoff::Since(self.format(&cutoff)?))
            }
            SyncRequest::PreviousBuild { history, build_id } => self.from_history(
                history,
                &BuildSelector::Previous {
                    current_id: build_id.clone(),
                },
                &now.timezone(),
            ),
            SyncRequest::LastSuccessfulBuild { history } => {
                self.from_history(history, &BuildSelector::LastSuccessful, &now.timezone())
            }
        }
    }

    fn from_history<Tz>(
        &self,
        history: &BuildHistory,
        selector: &BuildSelector,
        tz: &Tz,
    ) -> Result<SyncCutoff, SyncError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match history.reference_build(self.fs, selector)? {
            Some(record) => {
                let started = record.started_at.with_timezone(tz);
                info!(
                    "Synchronising changes since build #{} started at {}",
                    record.id,
                    started.naive_local()
                );
                Ok(SyncCutoff::Since(self.format(&started)?))
            }
            None => {
                info!("No build available, will do full synchronisation");
                Ok(SyncCutoff::Full)
            }
        }
    }

    fn format<Tz>(&self, dt: &DateTime<Tz>) -> Result<String, SyncError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        validate_timestamp_format(&self.timestamp_format)?;
        let mut out = String::new();
        write!(out, "{}", dt.format(&self.timestamp_format))
            .map_err(|_| SyncError::InvalidTimestampFormat(self.timestamp_format.clone()))?;
        Ok(out)
    }
}

/// Rejects empty layouts and unknown `%` specifiers
pub fn validate_timestamp_format(format: &str) -> Result<(), SyncError> {
    if format.trim().is_empty() || StrftimeItems::new(format).any(|item| item == Item::Error) {
        return Err(SyncError::InvalidTimestampFormat(format.to_string()));
    }
    Ok(())
}
