//! ltoken file lookup
//!
//! `kwauth` writes one line per server, `host;port;user;token`.

use crate::command::EnvMap;
use reqwest::Url;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable pointing the vendor tools at an ltoken file
pub const LTOKEN_ENV: &str = "KLOCWORK_LTOKEN";
pub const LTOKEN_USER_INDEX: usize = 2;
pub const LTOKEN_HASH_INDEX: usize = 3;

#[derive(Debug, Error)]
pub enum LtokenError {
    #[error("No ltoken file found at {0:?}. Run kwauth or set KLOCWORK_LTOKEN")]
    NotFound(PathBuf),

    #[error("Failed to read ltoken file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed ltoken line {line_no}: expected host;port;user;token")]
    Malformed { line_no: usize },

    #[error("ltoken file {0:?} has no entries")]
    Empty(PathBuf),

    #[error("Cannot determine the home directory to locate the ltoken file")]
    NoHomeDirectory,

    #[error("Invalid server URL \"{0}\"")]
    InvalidUrl(String),
}

/// One line of the ltoken file
#[derive(Clone, PartialEq, Eq)]
pub struct LtokenEntry {
    pub host: String,
    pub port: String,
    pub user: String,
    pub token: String,
}

impl fmt::Debug for LtokenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LtokenEntry")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// User name and token sent with every API request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl From<&LtokenEntry> for Credentials {
    fn from(entry: &LtokenEntry) -> Self {
        Self {
            user: entry.user.clone(),
            token: entry.token.clone(),
        }
    }
}

pub fn default_ltoken_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".klocwork").join("ltoken"))
}

/// `KLOCWORK_LTOKEN` from `env` when set, else `~/.klocwork/ltoken`
pub fn resolve_ltoken_path(env: &EnvMap) -> Result<PathBuf, LtokenError> {
    match env.get(LTOKEN_ENV).filter(|v| !v.trim().is_empty()) {
        Some(path) => Ok(PathBuf::from(path)),
        None => default_ltoken_path().ok_or(LtokenError::NoHomeDirectory),
    }
}

pub fn parse_ltoken(content: &str) -> Result<Vec<LtokenEntry>, LtokenError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let fields: Vec<&str> = line.trim().split(';').collect();
            if fields.len() <= LTOKEN_HASH_INDEX {
                return Err(LtokenError::Malformed { line_no: idx + 1 });
            }
            Ok(LtokenEntry {
                host: fields[0].to_string(),
                port: fields[1].to_string(),
                user: fields[LTOKEN_USER_INDEX].to_string(),
                token: fields[LTOKEN_HASH_INDEX].to_string(),
            })
        })
        .collect()
}

/// Picks the entry for `host:port`, falling back to the first entry
pub fn select_entry<'a>(
    entries: &'a [LtokenEntry],
    host: &str,
    port: &str,
) -> Option<&'a LtokenEntry> {
    entries
        .iter()
        .find(|e| e.host.eq_ignore_ascii_case(host) && e.port == port)
        .or_else(|| entries.first())
}

impl Credentials {
    /// Reads `path` and returns the credentials for `server_url`
    pub fn from_ltoken_file(path: &Path, server_url: &str) -> Result<Self, LtokenError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LtokenError::NotFound(path.to_path_buf())
            } else {
                LtokenError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let url = Url::parse(server_url.trim())
            .map_err(|_| LtokenError::InvalidUrl(server_url.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| LtokenError::InvalidUrl(server_url.to_string()))?;
        let port = url
            .port_or_known_default()
            .map(|p| p.to_string())
            .unwrap_or_default();

        let entries = parse_ltoken(&content)?;
        let entry = select_entry(&entries, host, &port)
            .ok_or_else(|| LtokenError::Empty(path.to_path_buf()))?;

        debug!(
            "Using ltoken entry for {}@{}:{}",
            entry.user, entry.host, entry.port
        );
        Ok(Self::from(entry))
    }
}
