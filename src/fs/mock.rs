use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone)]
enum MockEntry {
    File(String),
    Directory,
    Symlink(PathBuf),
}

pub struct MockFileSystem {
    entries: RwLock<HashMap<PathBuf, MockEntry>>,
    root: PathBuf,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            root: PathBuf::from("/mock"),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: &str) {
        self.insert(path.as_ref(), MockEntry::File(content.to_string()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Directory);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert(path.as_ref(), MockEntry::Symlink(target.into()));
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let path = self.normalize_path(path);
        let mut entries = self.entries.write().unwrap();

        if let Some(parent) = path.parent() {
            let mut current = PathBuf::new();
            for component in parent.components() {
                current.push(component);
                entries
                    .entry(current.clone())
                    .or_insert(MockEntry::Directory);
            }
        }

        entries.insert(path, entry);
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn get(&self, path: &Path) -> Option<MockEntry> {
        let path = self.normalize_path(path);
        self.entries.read().unwrap().get(&path).cloned()
    }

    // Follows one level of symlink, relative to the link's directory.
    fn resolve(&self, path: &Path) -> Option<MockEntry> {
        match self.get(path)? {
            MockEntry::Symlink(target) => {
                let base = self.normalize_path(path);
                let target = match base.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
                self.get(&target)
            }
            other => Some(other),
        }
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        matches!(self.resolve(path), Some(MockEntry::File(_)))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.resolve(path) {
            Some(MockEntry::File(content)) => Ok(content),
            Some(_) => Err(anyhow!("Not a file: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        match self.get(path) {
            Some(MockEntry::Symlink(target)) => Ok(target),
            _ => Err(anyhow!("Not a symlink: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file() {
        let fs = MockFileSystem::new();
        fs.add_file("builds/3/build.xml", "<build/>");

        assert!(fs.is_file(Path::new("/mock/builds/3/build.xml")));
        assert!(!fs.is_file(Path::new("/mock/builds/3")));
        assert_eq!(
            fs.read_to_string(Path::new("/mock/builds/3/build.xml"))
                .unwrap(),
            "<build/>"
        );
    }

    #[test]
    fn test_symlink_resolves_relative_to_parent() {
        let fs = MockFileSystem::new();
        fs.add_file("builds/12", "not a directory");
        fs.add_symlink("builds/lastSuccessfulBuild", "12");

        assert!(fs.is_file(Path::new("/mock/builds/lastSuccessfulBuild")));
        assert_eq!(
            fs.read_to_string(Path::new("/mock/builds/lastSuccessfulBuild"))
                .unwrap(),
            "not a directory"
        );
        assert_eq!(
            fs.read_link(Path::new("/mock/builds/lastSuccessfulBuild"))
                .unwrap(),
            PathBuf::from("12")
        );
    }

    #[test]
    fn test_read_missing_file() {
        let fs = MockFileSystem::new();
        assert!(fs.read_to_string(Path::new("missing.txt")).is_err());
    }
}
