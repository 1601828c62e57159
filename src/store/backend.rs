//! Durable backings for entity collections.
//!
//! A backend stores one opaque document per collection and replaces it as a
//! whole. Replacement must be atomic: a reader (or a process restarted after a
//! crash) sees either the previous document or the new one, never a
//! truncated mix.

use log::{debug, error};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::PersistenceError;

/// Whole-document storage for named collections.
pub trait Backend: Send + Sync + Debug {
    /// Returns the last successfully written document, or `None` when the
    /// collection has never been written.
    fn read(&self, collection: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Atomically replaces the document of a collection.
    fn replace(&self, collection: &str, contents: &[u8]) -> Result<(), PersistenceError>;
}

/// Volatile backend for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, collection: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(collection).cloned())
    }

    fn replace(&self, collection: &str, contents: &[u8]) -> Result<(), PersistenceError> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(collection.to_string(), contents.to_vec());
        Ok(())
    }
}

/// One `<collection>.json` file per collection under a data directory.
///
/// Writes go to a temporary file in the same directory, are flushed to disk,
/// then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a collection's document.
    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }
}

impl Backend for FileBackend {
    fn read(&self, collection: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(self.path_for(collection)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                collection: collection.to_string(),
                source,
            }),
        }
    }

    fn replace(&self, collection: &str, contents: &[u8]) -> Result<(), PersistenceError> {
        let io_err = |source: std::io::Error| PersistenceError::Io {
            collection: collection.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_err)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        staged.write_all(contents).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;

        let target = self.path_for(collection);
        match staged.persist(&target) {
            Ok(_) => {
                debug!(
                    "event=collection_replace module=store status=ok collection={} bytes={}",
                    collection,
                    contents.len()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=collection_replace module=store status=error collection={} error={}",
                    collection, err.error
                );
                Err(io_err(err.error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.read("rooms").unwrap().is_none());

        backend.replace("rooms", b"{\"items\":[]}").unwrap();
        assert_eq!(backend.read("rooms").unwrap().unwrap(), b"{\"items\":[]}");
    }

    #[test]
    fn test_file_backend_replaces_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("data"));

        assert!(backend.read("shifts").unwrap().is_none());

        backend.replace("shifts", b"first version, longer").unwrap();
        backend.replace("shifts", b"second").unwrap();

        let stored = backend.read("shifts").unwrap().unwrap();
        assert_eq!(stored, b"second");
        assert!(backend.path_for("shifts").exists());

        // Only the collection file remains; the temporary file was renamed.
        let entries: Vec<_> = fs::read_dir(backend.root()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_file_backend_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let backend = FileBackend::new(&blocker);
        let err = backend.replace("rooms", b"{}").unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }
}
