use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read access to level files, keyed by root-relative paths.
pub trait LevelStorage {
    fn file_exists(&self, path: &Path) -> bool;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LevelStorage for FsStorage {
    fn file_exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl LevelStorage for MemoryStorage {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such level file: {}", path.display()),
            )
        })
    }
}

impl<S: LevelStorage + ?Sized> LevelStorage for &S {
    fn file_exists(&self, path: &Path) -> bool {
        (**self).file_exists(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_file(path)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn fs_storage_reads_relative_to_root() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("levels")).expect("mkdir");
        fs::write(temp.path().join("levels").join("7.txt"), b"1,1,2,0,3,0;").expect("write");

        let storage = FsStorage::new(temp.path());
        let path = Path::new("levels").join("7.txt");
        assert!(storage.file_exists(&path));
        assert_eq!(storage.read_file(&path).expect("read"), b"1,1,2,0,3,0;");
        assert!(!storage.file_exists(Path::new("levels/8.txt")));
        assert!(!storage.file_exists(Path::new("levels")));
    }

    #[test]
    fn memory_storage_missing_file_is_not_found() {
        let storage = MemoryStorage::new().with_file("levels/1.txt", "abc");
        assert!(storage.file_exists(Path::new("levels/1.txt")));
        let error = storage
            .read_file(Path::new("levels/2.txt"))
            .expect_err("missing");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }
}
