use super::{BuildHistory, HistoryError};
use crate::command::EnvMap;
use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "WORKSPACE";
pub const BUILD_TAG_ENV: &str = "BUILD_TAG";
pub const BUILD_ID_ENV: &str = "BUILD_ID";

/// Where the current build sits in the CI host's history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    /// Explicit builds directory; wins over workspace/tag derivation
    pub builds_dir: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub build_tag: Option<String>,
    pub build_id: Option<String>,
}

impl BuildContext {
    /// Reads `WORKSPACE`, `BUILD_TAG` and `BUILD_ID`
    pub fn from_env(env: &EnvMap) -> Self {
        let get = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();
        Self {
            builds_dir: None,
            workspace: get(WORKSPACE_ENV).map(PathBuf::from),
            build_tag: get(BUILD_TAG_ENV),
            build_id: get(BUILD_ID_ENV),
        }
    }

    /// `Ok(None)` when neither an explicit directory nor workspace plus tag is known
    pub fn history(&self) -> Result<Option<BuildHistory>, HistoryError> {
        if let Some(dir) = &self.builds_dir {
            return Ok(Some(BuildHistory::new(dir.clone())));
        }
        match (&self.workspace, &self.build_tag) {
            (Some(workspace), Some(tag)) => BuildHistory::locate(workspace, tag).map(Some),
            _ => Ok(None),
        }
    }
}
