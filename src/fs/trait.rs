//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Abstraction over the file system operations build-history resolution needs
pub trait FileSystem: Send + Sync {
    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Read the target of a symbolic link
    fn read_link(&self, path: &Path) -> Result<PathBuf>;
}
