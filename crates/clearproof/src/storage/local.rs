use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Maps stored media paths to files on disk.
pub trait FileStorage: Send + Sync {
    /// Resolves a stored (relative) path to the physical file.
    fn resolve_physical_path(&self, stored_path: &str) -> Result<PathBuf, StorageError>;
}

/// Media stored below a single root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStorage for LocalFileStorage {
    fn resolve_physical_path(&self, stored_path: &str) -> Result<PathBuf, StorageError> {
        let relative = validate_relative(stored_path)?;
        if relative.as_os_str().is_empty() {
            return Err(StorageError::EmptyPath);
        }

        let physical = self.root.join(relative);
        if !physical.is_file() {
            return Err(StorageError::NotFound(physical));
        }
        Ok(physical)
    }
}

/// Accepts only plain relative paths: no root, prefix, or `..` segments.
fn validate_relative(stored_path: &str) -> Result<PathBuf, StorageError> {
    let trimmed = stored_path.trim();
    let mut relative = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::OutsideRoot(stored_path.to_string()));
            }
        }
    }

    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, stored_path: &str, content: &[u8]) {
        let path = root.join(stored_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolve_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "s1/banner.png", b"png-bytes");
        let storage = LocalFileStorage::new(temp_dir.path());

        let physical = storage.resolve_physical_path("s1/banner.png").unwrap();
        assert_eq!(physical, temp_dir.path().join("s1").join("banner.png"));
        assert_eq!(std::fs::read(physical).unwrap(), b"png-bytes");

        let dotted = storage.resolve_physical_path("./s1/banner.png").unwrap();
        assert!(dotted.ends_with("s1/banner.png"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path());

        for bad in ["../etc/passwd", "/etc/passwd", "s1/../../x.png"] {
            let err = storage.resolve_physical_path(bad).unwrap_err();
            assert_eq!(err.kind(), "OutsideRoot", "{}", bad);
        }
        assert_eq!(storage.resolve_physical_path("  ").unwrap_err().kind(), "EmptyPath");
    }

    #[test]
    fn test_resolve_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path());

        let err = storage.resolve_physical_path("s1/missing.png").unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }

    #[test]
    fn test_directory_is_not_a_media_file() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "s1/a.png", b"x");
        let storage = LocalFileStorage::new(temp_dir.path());

        assert_eq!(storage.resolve_physical_path("s1").unwrap_err().kind(), "NotFound");
    }
}
