//! Entity store: ordered, persisted collections with sequential identities.
//!
//! # Model
//! Each collection is held in memory behind a `RwLock` and persisted as one
//! JSON document `{"items": [...], "last_id": n}`. Every successful mutation
//! rewrites the whole document through a [`Backend`]; the in-memory copy is
//! only swapped after the backend accepted the write, so readers never see
//! state that failed to persist.
//!
//! # Identity
//! New identities are `max(last_id, max(item ids)) + 1`. `last_id` is the
//! high-water mark, so numbers freed by [`EntityStore::remove`] are never
//! handed out again.
//!
//! # Locking
//! [`EntityStore::write`] returns a guard holding the collection's exclusive
//! lock for a whole read-validate-write sequence. Changes are staged on the
//! guard and persisted by a single [`CollectionWriter::commit`]; dropping the
//! guard discards them. Callers locking several collections must acquire them
//! in alphabetical order of collection name.

mod backend;
mod record;

pub use backend::{Backend, FileBackend, MemoryBackend};
pub use record::{EntityId, Record};
pub(crate) use record::{default_true, ensure_same_id, present, required, required_text};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{PersistenceError, RegistryError, Result};

/// Persisted shape of one collection.
#[derive(Debug, Deserialize)]
struct CollectionDocument<T> {
    items: Vec<T>,
    #[serde(default)]
    last_id: Option<EntityId>,
}

/// Borrowed form of [`CollectionDocument`] used when writing.
#[derive(Serialize)]
struct CollectionDocumentRef<'a, T> {
    items: &'a [T],
    #[serde(skip_serializing_if = "Option::is_none")]
    last_id: Option<EntityId>,
}

#[derive(Debug, Clone)]
struct CollectionState<T> {
    items: Vec<T>,
    last_id: EntityId,
}

impl<T: Record> CollectionState<T> {
    fn next_id(&self) -> Result<EntityId> {
        let highest = self.items.iter().map(T::id).max().unwrap_or(0);
        highest.max(self.last_id).checked_add(1).ok_or_else(|| {
            RegistryError::invalid(
                "id",
                format!("{} has no identities left", T::COLLECTION),
            )
        })
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn get(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    fn ensure_unique(&self, record: &T, skip: Option<usize>) -> Result<()> {
        let key = record.natural_key();
        for (index, other) in self.items.iter().enumerate() {
            if Some(index) == skip {
                continue;
            }
            if other.id() == record.id() {
                return Err(RegistryError::DuplicateIdentity {
                    collection: T::COLLECTION,
                    key: record.id().to_string(),
                });
            }
            if let Some(key) = &key {
                if other.natural_key().as_ref() == Some(key) {
                    return Err(RegistryError::DuplicateIdentity {
                        collection: T::COLLECTION,
                        key: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn encode(&self) -> std::result::Result<Vec<u8>, PersistenceError> {
        let document = CollectionDocumentRef {
            items: &self.items,
            last_id: Some(self.last_id).filter(|id| *id > 0),
        };
        let mut bytes =
            serde_json::to_vec_pretty(&document).map_err(|source| PersistenceError::Encode {
                collection: T::COLLECTION.to_string(),
                source,
            })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(bytes: &[u8]) -> std::result::Result<Self, PersistenceError> {
        let document: CollectionDocument<T> =
            serde_json::from_slice(bytes).map_err(|source| PersistenceError::Decode {
                collection: T::COLLECTION.to_string(),
                source,
            })?;
        Ok(Self {
            items: document.items,
            last_id: document.last_id.unwrap_or(0),
        })
    }
}

/// A persisted collection of one record type.
#[derive(Debug)]
pub struct EntityStore<T: Record> {
    backend: Arc<dyn Backend>,
    state: RwLock<CollectionState<T>>,
}

impl<T: Record> EntityStore<T> {
    /// Loads the collection from `backend`. A collection that was never
    /// written starts empty.
    pub fn open(backend: Arc<dyn Backend>) -> Result<Self> {
        let state = match backend.read(T::COLLECTION)? {
            Some(bytes) => CollectionState::decode(&bytes)?,
            None => CollectionState {
                items: Vec::new(),
                last_id: 0,
            },
        };
        info!(
            "event=collection_open module=store status=ok collection={} items={}",
            T::COLLECTION,
            state.items.len()
        );
        Ok(Self {
            backend,
            state: RwLock::new(state),
        })
    }

    /// Collection name.
    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    /// All records, in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.read().records().to_vec()
    }

    /// Record by identity, or `NotFound`.
    pub fn get(&self, id: EntityId) -> Result<T> {
        self.read().get(id).cloned().ok_or(RegistryError::NotFound {
            collection: T::COLLECTION,
            id,
        })
    }

    /// Record by identity, if present.
    pub fn find(&self, id: EntityId) -> Option<T> {
        self.read().get(id).cloned()
    }

    /// Creates and persists a record.
    pub fn create(&self, patch: T::Patch) -> Result<T> {
        let mut writer = self.write();
        let record = writer.create(patch)?;
        writer.commit()?;
        Ok(record)
    }

    /// Merges `patch` over record `id` and persists the result.
    pub fn update(&self, id: EntityId, patch: T::Patch) -> Result<T> {
        let mut writer = self.write();
        let record = writer.update(id, patch)?;
        writer.commit()?;
        Ok(record)
    }

    /// Hard-deletes record `id`. Its identity is not reused.
    pub fn remove(&self, id: EntityId) -> Result<T> {
        let mut writer = self.write();
        let record = writer.remove(id)?;
        writer.commit()?;
        Ok(record)
    }

    /// Shared lock over the current records.
    pub fn read(&self) -> CollectionReader<'_, T> {
        CollectionReader {
            guard: self.state.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Exclusive lock for a staged read-validate-write sequence.
    pub fn write(&self) -> CollectionWriter<'_, T> {
        let guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let staged = (*guard).clone();
        CollectionWriter {
            guard,
            staged,
            backend: self.backend.as_ref(),
            dirty: false,
        }
    }
}

/// Shared view of a collection, held for the guard's lifetime.
pub struct CollectionReader<'a, T: Record> {
    guard: RwLockReadGuard<'a, CollectionState<T>>,
}

impl<T: Record> CollectionReader<'_, T> {
    /// All records, in insertion order.
    pub fn records(&self) -> &[T] {
        &self.guard.items
    }

    /// Record by identity, if present.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.guard.get(id)
    }
}

/// Exclusive, staged access to a collection.
pub struct CollectionWriter<'a, T: Record> {
    guard: RwLockWriteGuard<'a, CollectionState<T>>,
    staged: CollectionState<T>,
    backend: &'a dyn Backend,
    dirty: bool,
}

impl<T: Record> CollectionWriter<'_, T> {
    /// Staged records (committed state plus uncommitted changes).
    pub fn records(&self) -> &[T] {
        &self.staged.items
    }

    /// Staged record by identity, if present.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.staged.get(id)
    }

    /// Builds a validated record from a create payload without staging it.
    ///
    /// The identity is the explicitly requested one (which must be free and
    /// non-zero) or the next sequential identity.
    pub fn prepare_create(&self, patch: T::Patch) -> Result<T> {
        let id = match T::requested_id(&patch) {
            Some(0) => return Err(RegistryError::invalid("id", "identities start at 1")),
            Some(id) => id,
            None => self.staged.next_id()?,
        };
        let record = T::from_patch(id, patch)?;
        record.validate()?;
        self.staged.ensure_unique(&record, None)?;
        Ok(record)
    }

    /// Builds the merged, validated version of record `id` without staging it.
    pub fn prepare_update(&self, id: EntityId, patch: T::Patch) -> Result<T> {
        let mut record = self
            .staged
            .get(id)
            .cloned()
            .ok_or(RegistryError::NotFound {
                collection: T::COLLECTION,
                id,
            })?;
        record.merge(patch)?;
        record.validate()?;
        let index = self.staged.position(id);
        self.staged.ensure_unique(&record, index)?;
        Ok(record)
    }

    /// Stages a new record prepared by [`prepare_create`](Self::prepare_create).
    pub fn insert(&mut self, record: T) -> Result<()> {
        self.staged.ensure_unique(&record, None)?;
        self.staged.last_id = self.staged.last_id.max(record.id());
        self.staged.items.push(record);
        self.dirty = true;
        Ok(())
    }

    /// Stages a replacement for an existing record with the same identity.
    pub fn replace(&mut self, record: T) -> Result<()> {
        let index = self
            .staged
            .position(record.id())
            .ok_or(RegistryError::NotFound {
                collection: T::COLLECTION,
                id: record.id(),
            })?;
        self.staged.ensure_unique(&record, Some(index))?;
        self.staged.items[index] = record;
        self.dirty = true;
        Ok(())
    }

    /// Prepares and stages a new record.
    pub fn create(&mut self, patch: T::Patch) -> Result<T> {
        let record = self.prepare_create(patch)?;
        self.insert(record.clone())?;
        Ok(record)
    }

    /// Prepares and stages an update.
    pub fn update(&mut self, id: EntityId, patch: T::Patch) -> Result<T> {
        let record = self.prepare_update(id, patch)?;
        self.replace(record.clone())?;
        Ok(record)
    }

    /// Stages removal of record `id`.
    pub fn remove(&mut self, id: EntityId) -> Result<T> {
        let index = self.staged.position(id).ok_or(RegistryError::NotFound {
            collection: T::COLLECTION,
            id,
        })?;
        self.staged.last_id = self.staged.last_id.max(id);
        self.dirty = true;
        Ok(self.staged.items.remove(index))
    }

    /// Persists all staged changes as one whole-collection write.
    ///
    /// On failure nothing changes, neither on the backend nor in memory.
    pub fn commit(mut self) -> Result<()> {
        if !self.dirty {
            debug!(
                "event=collection_commit module=store status=skipped collection={}",
                T::COLLECTION
            );
            return Ok(());
        }
        let bytes = self.staged.encode()?;
        if let Err(err) = self.backend.replace(T::COLLECTION, &bytes) {
            warn!(
                "event=collection_commit module=store status=error collection={} error={}",
                T::COLLECTION,
                err
            );
            return Err(err.into());
        }
        info!(
            "event=collection_commit module=store status=ok collection={} items={}",
            T::COLLECTION,
            self.staged.items.len()
        );
        *self.guard = std::mem::replace(
            &mut self.staged,
            CollectionState {
                items: Vec::new(),
                last_id: 0,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Room, RoomPatch};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend whose writes can be made to fail on demand.
    #[derive(Debug, Default)]
    pub(crate) struct FlakyBackend {
        inner: MemoryBackend,
        pub(crate) fail_writes: AtomicBool,
    }

    impl Backend for FlakyBackend {
        fn read(&self, collection: &str) -> std::result::Result<Option<Vec<u8>>, PersistenceError> {
            self.inner.read(collection)
        }

        fn replace(
            &self,
            collection: &str,
            contents: &[u8],
        ) -> std::result::Result<(), PersistenceError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PersistenceError::Io {
                    collection: collection.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.replace(collection, contents)
        }
    }

    fn room(name: &str) -> RoomPatch {
        RoomPatch {
            name: Some(name.into()),
            capacity: Some(20),
            ..RoomPatch::default()
        }
    }

    fn memory_store() -> EntityStore<Room> {
        EntityStore::open(Arc::new(MemoryBackend::new())).unwrap()
    }

    #[test]
    fn test_sequential_identities() {
        let store = memory_store();
        let ids: Vec<EntityId> = (0..5)
            .map(|i| store.create(room(&format!("Room {i}"))).unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_explicit_identity_and_collision() {
        let store = memory_store();
        let explicit = RoomPatch {
            id: Some(10),
            ..room("Lab")
        };
        assert_eq!(store.create(explicit.clone()).unwrap().id, 10);
        assert_eq!(store.create(room("Next")).unwrap().id, 11);

        let err = store.create(explicit).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateIdentity { ref key, .. } if key == "10"));
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_exhausted_identity_space() {
        let store = memory_store();
        let last = RoomPatch {
            id: Some(EntityId::MAX),
            ..room("Last")
        };
        assert_eq!(store.create(last).unwrap().id, EntityId::MAX);

        let err = store.create(room("Next")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidField { field: "id", .. }));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_zero_identity_rejected() {
        let store = memory_store();
        let zero = RoomPatch {
            id: Some(0),
            ..room("Zero")
        };
        assert!(matches!(
            store.create(zero),
            Err(RegistryError::InvalidField { field: "id", .. })
        ));
        assert_eq!(store.create(room("First")).unwrap().id, 1);
    }

    #[test]
    fn test_identities_not_reused_after_removal() {
        let store = memory_store();
        store.create(room("A")).unwrap();
        let b = store.create(room("B")).unwrap();
        store.remove(b.id).unwrap();

        let c = store.create(room("C")).unwrap();
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_missing_required_field() {
        let store = memory_store();
        let err = store
            .create(RoomPatch {
                capacity: Some(10),
                ..RoomPatch::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::MissingRequiredField { field: "name", .. }
        ));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_update_merges_and_not_found() {
        let store = memory_store();
        let created = store.create(room("Lab")).unwrap();

        let updated = store
            .update(
                created.id,
                RoomPatch {
                    capacity: Some(32),
                    ..RoomPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Lab");
        assert_eq!(updated.capacity, 32);
        assert_eq!(store.get(created.id).unwrap().capacity, 32);

        let err = store.update(99, RoomPatch::default()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { id: 99, .. }));
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let backend = Arc::new(FlakyBackend::default());
        let store: EntityStore<Room> = EntityStore::open(backend.clone()).unwrap();
        store.create(room("Kept")).unwrap();

        backend.fail_writes.store(true, Ordering::SeqCst);
        let err = store.create(room("Lost")).unwrap_err();
        assert!(matches!(err, RegistryError::Persistence(_)));
        assert_eq!(store.list().len(), 1);

        backend.fail_writes.store(false, Ordering::SeqCst);
        let reopened: EntityStore<Room> = EntityStore::open(backend).unwrap();
        assert_eq!(reopened.list().len(), 1);
        // The failed attempt did not burn an identity.
        assert_eq!(store.create(room("Next")).unwrap().id, 2);
    }

    #[test]
    fn test_dropped_writer_discards_staged_changes() {
        let store = memory_store();
        {
            let mut writer = store.write();
            writer.create(room("A")).unwrap();
            writer.create(room("B")).unwrap();
            assert_eq!(writer.records().len(), 2);
        }
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_reload_roundtrip_is_lossless() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let store: EntityStore<Room> = EntityStore::open(backend.clone()).unwrap();
        store
            .create(RoomPatch {
                floor: Some(Some("2nd".into())),
                resources: Some(["projector".to_string(), "sink".to_string()].into()),
                ..room("Chem Lab")
            })
            .unwrap();
        store.create(room("Hall")).unwrap();
        let removed = store.create(room("Temp")).unwrap();
        store.remove(removed.id).unwrap();

        let reopened: EntityStore<Room> = EntityStore::open(backend).unwrap();
        assert_eq!(reopened.list(), store.list());
        assert_eq!(reopened.create(room("After")).unwrap().id, 4);
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn Backend> = Arc::new(FileBackend::new(dir.path()));
        let store: EntityStore<Room> = EntityStore::open(backend.clone()).unwrap();
        store.create(room("A")).unwrap();
        store.create(room("B")).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("rooms.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["items"].as_array().unwrap().len(), 2);

        let reopened: EntityStore<Room> = EntityStore::open(backend).unwrap();
        assert_eq!(reopened.list(), store.list());
    }
}
