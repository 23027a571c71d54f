//! The storage collaborator boundary.
//!
//! The engine never performs platform I/O itself; documents move through
//! the [`Storage`] trait as opaque byte blobs. [`FsStorage`] is the plain
//! filesystem implementation; [`MemStorage`] keeps everything in a map and
//! is what tests and embedders without a filesystem use.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// Byte-level document storage.
pub trait Storage {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_bytes(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
}

/// Storage over the local filesystem.
#[derive(Debug, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_bytes(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory storage keyed by path.
#[derive(Debug, Default)]
pub struct MemStorage {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_bytes(&mut self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}
