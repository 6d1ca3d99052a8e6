//! `kwxsync` invocation: project selection and argument assembly
//!
//! A cross-sync run copies issue status and comment changes between the
//! server's projects. The projects are picked by a regular expression over the
//! server's project list, and the sync window comes from [`crate::sync`].

use crate::api::{ApiError, Project, ProjectSource};
use crate::command::{expand_env, ArgumentList, CommandError, EnvMap};
use crate::history::BuildContext;
use crate::sync::{LastSyncType, SyncCutoff, SyncError, SyncRequest, SyncWindowResolver};
use crate::wrapper::KLOCWORK_URL;
use chrono::{DateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub const KWXSYNC: &str = "kwxsync";

#[derive(Debug, Error)]
pub enum XSyncError {
    #[error("KLOCWORK_URL is not set; configure a server first")]
    MissingUrl,

    #[error("Invalid project regular expression \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Could not match any projects on server {url} with regular expression \"{pattern}\"")]
    NoMatchingProjects { url: String, pattern: String },

    #[error("Unknown issue status \"{0}\"")]
    UnknownStatus(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Issue statuses `kwxsync` can be restricted to, in the order they are passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Analyze,
    Ignore,
    NotAProblem,
    Fix,
    FixInNextRelease,
    FixInLaterRelease,
    Defer,
    Filter,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 8] = [
        Self::Analyze,
        Self::Ignore,
        Self::NotAProblem,
        Self::Fix,
        Self::FixInNextRelease,
        Self::FixInLaterRelease,
        Self::Defer,
        Self::Filter,
    ];

    /// Name as the server spells it
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analyze => "Analyze",
            Self::Ignore => "Ignore",
            Self::NotAProblem => "Not a Problem",
            Self::Fix => "Fix",
            Self::FixInNextRelease => "Fix in Next Release",
            Self::FixInLaterRelease => "Fix in Later Release",
            Self::Defer => "Defer",
            Self::Filter => "Filter",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IssueStatus {
    type Err = XSyncError;

    /// Accepts the server label or its kebab-case form, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', " ");
        Self::ALL
            .into_iter()
            .find(|status| status.label().to_lowercase() == wanted)
            .ok_or_else(|| XSyncError::UnknownStatus(s.to_string()))
    }
}

/// Joins the selected statuses in canonical order, dropping duplicates
pub fn statuses_arg(selected: &[IssueStatus]) -> Option<String> {
    let labels: Vec<&str> = IssueStatus::ALL
        .iter()
        .filter(|status| selected.contains(status))
        .map(IssueStatus::label)
        .collect();

    if labels.is_empty() {
        None
    } else {
        Some(labels.join(","))
    }
}

/// One cross-sync job as configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct XSyncOptions {
    pub dry_run: bool,
    pub last_sync_type: LastSyncType,
    /// Duration expression used in manual mode
    pub manual_sync: Option<String>,
    pub project_regexp: String,
    pub statuses: Vec<IssueStatus>,
    /// Extra `kwxsync` options; `$VAR` references are expanded first
    pub additional_opts: Option<String>,
}

impl XSyncOptions {
    pub fn sync_request(&self, context: &BuildContext) -> Result<SyncRequest, XSyncError> {
        Ok(SyncRequest::for_mode(
            self.last_sync_type,
            self.manual_sync.as_deref(),
            context,
        )?)
    }

    /// Assembles the full command line from an already resolved cutoff and project list
    pub fn xsync_command(
        &self,
        env: &EnvMap,
        cutoff: &SyncCutoff,
        projects: &[String],
    ) -> Result<ArgumentList, XSyncError> {
        let url = server_url(env)?;
        let mut cmd = ArgumentList::new(KWXSYNC);
        cmd.add_pair("--url", url);

        match cutoff {
            SyncCutoff::Full => {
                cmd.add("--full");
            }
            SyncCutoff::Since(ts) => {
                cmd.add_pair("--last-sync", ts.as_str());
            }
        }

        if self.dry_run {
            cmd.add("--dry");
        }

        if let Some(statuses) = statuses_arg(&self.statuses) {
            cmd.add_pair("--statuses", statuses);
        }

        if let Some(opts) = self.additional_opts.as_deref().filter(|o| !o.trim().is_empty()) {
            cmd.add_tokenized(&expand_env(opts, env))?;
        }

        cmd.add_all(projects.iter().cloned());
        Ok(cmd)
    }
}

/// `kwxsync --version`, logged before a run so the tool version shows up in build logs
pub fn version_command() -> ArgumentList {
    let mut cmd = ArgumentList::new(KWXSYNC);
    cmd.add("--version");
    cmd
}

/// Names of every project the expression matches somewhere in the name
pub fn select_projects(
    projects: &[Project],
    pattern: &str,
    server_url: &str,
) -> Result<Vec<String>, XSyncError> {
    let regex = Regex::new(pattern).map_err(|e| XSyncError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let selected: Vec<String> = projects
        .iter()
        .filter(|p| regex.is_match(&p.name))
        .map(|p| p.name.clone())
        .collect();

    if selected.is_empty() {
        return Err(XSyncError::NoMatchingProjects {
            url: server_url.to_string(),
            pattern: pattern.to_string(),
        });
    }

    debug!("Selected {} of {} projects", selected.len(), projects.len());
    Ok(selected)
}

/// Lists projects, resolves the sync window, then builds the `kwxsync` command
pub async fn prepare<Tz>(
    options: &XSyncOptions,
    env: &EnvMap,
    source: &dyn ProjectSource,
    resolver: &SyncWindowResolver<'_>,
    context: &BuildContext,
    now: DateTime<Tz>,
) -> Result<ArgumentList, XSyncError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let url = server_url(env)?;
    let projects = source.list_projects().await?;
    let selected = select_projects(&projects, &options.project_regexp, url)?;
    info!("Synchronising projects: {}", selected.join(", "));

    let request = options.sync_request(context)?;
    let cutoff = resolver.resolve(&request, now)?;
    info!("Last sync: {}", cutoff);

    options.xsync_command(env, &cutoff, &selected)
}

fn server_url(env: &EnvMap) -> Result<&str, XSyncError> {
    env.get(KLOCWORK_URL)
        .map(String::as_str)
        .filter(|url| !url.trim().is_empty())
        .ok_or(XSyncError::MissingUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use async_trait::async_trait;
    use chrono::Utc;
    use yare::parameterized;

    const URL: &str = "http://kw.example.com:8080";

    struct StaticProjects(Vec<&'static str>);

    #[async_trait]
    impl ProjectSource for StaticProjects {
        async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
            Ok(self
                .0
                .iter()
                .map(|name| Project {
                    name: name.to_string(),
                    id: None,
                    creator: None,
                    description: None,
                })
                .collect())
        }
    }

    fn env() -> EnvMap {
        EnvMap::from([
            (KLOCWORK_URL.to_string(), URL.to_string()),
            ("BRANCH".to_string(), "main".to_string()),
        ])
    }

    fn projects(names: &[&str]) -> Vec<Project> {
        names
            .iter()
            .map(|name| Project {
                name: name.to_string(),
                id: None,
                creator: None,
                description: None,
            })
            .collect()
    }

    #[test]
    fn test_version_command() {
        assert_eq!(version_command().as_slice(), ["kwxsync", "--version"]);
    }

    #[test]
    fn test_full_sync_command() {
        let options = XSyncOptions::default();
        let cmd = options
            .xsync_command(&env(), &SyncCutoff::Full, &["app".to_string()])
            .unwrap();

        assert_eq!(cmd.as_slice(), ["kwxsync", "--url", URL, "--full", "app"]);
    }

    #[test]
    fn test_last_sync_command_with_everything() {
        let options = XSyncOptions {
            dry_run: true,
            statuses: vec![IssueStatus::Fix, IssueStatus::Analyze],
            additional_opts: Some("--max-issues 10 --tag '$BRANCH build'".to_string()),
            ..Default::default()
        };
        let cutoff = SyncCutoff::Since("2023-03-13T07:00:00".to_string());
        let cmd = options
            .xsync_command(&env(), &cutoff, &["app".to_string(), "lib".to_string()])
            .unwrap();

        assert_eq!(
            cmd.as_slice(),
            [
                "kwxsync",
                "--url",
                URL,
                "--last-sync",
                "2023-03-13T07:00:00",
                "--dry",
                "--statuses",
                "Analyze,Fix",
                "--max-issues",
                "10",
                "--tag",
                "main build",
                "app",
                "lib",
            ]
        );
    }

    #[test]
    fn test_status_order_is_fixed() {
        let all_reversed: Vec<IssueStatus> = IssueStatus::ALL.iter().rev().copied().collect();
        assert_eq!(
            statuses_arg(&all_reversed).unwrap(),
            "Analyze,Ignore,Not a Problem,Fix,Fix in Next Release,Fix in Later Release,Defer,Filter"
        );
        assert_eq!(
            statuses_arg(&[IssueStatus::Defer, IssueStatus::Defer]).unwrap(),
            "Defer"
        );
        assert!(statuses_arg(&[]).is_none());
    }

    #[parameterized(
        label = { "Not a Problem", IssueStatus::NotAProblem },
        kebab = { "fix-in-next-release", IssueStatus::FixInNextRelease },
        upper = { "DEFER", IssueStatus::Defer },
    )]
    fn test_status_from_str(input: &str, expected: IssueStatus) {
        assert_eq!(input.parse::<IssueStatus>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_status() {
        assert!(matches!(
            "Won't Fix".parse::<IssueStatus>(),
            Err(XSyncError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_missing_url() {
        let err = XSyncOptions::default()
            .xsync_command(&EnvMap::new(), &SyncCutoff::Full, &[])
            .unwrap_err();
        assert!(matches!(err, XSyncError::MissingUrl));
    }

    #[test]
    fn test_unbalanced_additional_opts() {
        let options = XSyncOptions {
            additional_opts: Some("--tag \"oops".to_string()),
            ..Default::default()
        };
        let err = options
            .xsync_command(&env(), &SyncCutoff::Full, &[])
            .unwrap_err();
        assert!(matches!(err, XSyncError::Command(CommandError::UnbalancedQuote(_))));
    }

    #[test]
    fn test_select_projects_uses_find_semantics() {
        let all = projects(&["core-app", "core-lib", "tools"]);
        assert_eq!(
            select_projects(&all, "core", URL).unwrap(),
            vec!["core-app", "core-lib"]
        );
        assert_eq!(select_projects(&all, "^tools$", URL).unwrap(), vec!["tools"]);
    }

    #[test]
    fn test_select_projects_no_match() {
        let err = select_projects(&projects(&["app"]), "^web", URL).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(URL));
        assert!(message.contains("^web"));
    }

    #[test]
    fn test_select_projects_invalid_regex() {
        let err = select_projects(&projects(&["app"]), "(unclosed", URL).unwrap_err();
        assert!(matches!(err, XSyncError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_prepare_full_sync() {
        let fs = MockFileSystem::new();
        let resolver = SyncWindowResolver::new(&fs);
        let options = XSyncOptions {
            project_regexp: "app".to_string(),
            ..Default::default()
        };

        let cmd = prepare(
            &options,
            &env(),
            &StaticProjects(vec!["app", "other"]),
            &resolver,
            &BuildContext::default(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(cmd.as_slice(), ["kwxsync", "--url", URL, "--full", "app"]);
    }

    #[tokio::test]
    async fn test_prepare_manual_sync() {
        let fs = MockFileSystem::new();
        let resolver = SyncWindowResolver::new(&fs);
        let options = XSyncOptions {
            last_sync_type: LastSyncType::Manual,
            manual_sync: Some("2d3h".to_string()),
            project_regexp: ".*".to_string(),
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2023, 3, 15, 10, 0, 0).unwrap();

        let cmd = prepare(
            &options,
            &env(),
            &StaticProjects(vec!["app"]),
            &resolver,
            &BuildContext::default(),
            now,
        )
        .await
        .unwrap();

        assert_eq!(
            cmd.as_slice(),
            ["kwxsync", "--url", URL, "--last-sync", "2023-03-13T07:00:00", "app"]
        );
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_duration() {
        let fs = MockFileSystem::new();
        let resolver = SyncWindowResolver::new(&fs);
        let options = XSyncOptions {
            last_sync_type: LastSyncType::Manual,
            manual_sync: Some("abc".to_string()),
            project_regexp: "app".to_string(),
            ..Default::default()
        };

        let err = prepare(
            &options,
            &env(),
            &StaticProjects(vec!["app"]),
            &resolver,
            &BuildContext::default(),
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, XSyncError::Sync(SyncError::InvalidDuration { .. })));
    }
}
