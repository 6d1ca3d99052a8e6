use super::FileSystem;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RealFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context(format!("Failed to read file {:?}", path))
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).context(format!("Failed to read link {:?}", path))
    }
}
