//! Per-model index storage.
//!
//! What gets persisted is each document's analyzed [`DocEntry`]; postings and
//! statistics are derived from those entries when a [`ModelIndex`](crate::ModelIndex)
//! opens and maintained in memory from then on.

use crate::error::{Error, Result};
use crate::index::DocEntry;
use crate::scoring::Model;
use crate::DocId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DOCS_TREE: &str = "docs";
const META_KEY: &[u8] = b"meta";
pub const FORMAT_VERSION: u32 = 1;

pub trait IndexStore: Send + Sync {
    /// Human-readable location, for logs and errors.
    fn location(&self) -> String;
    fn load(&self) -> Result<Vec<(DocId, DocEntry)>>;
    fn put(&self, doc_id: DocId, entry: &DocEntry) -> Result<()>;
    /// Removing an absent id succeeds.
    fn remove(&self, doc_id: DocId) -> Result<()>;
    /// Atomically replace the full contents.
    fn replace_all(&self, entries: &[(DocId, DocEntry)]) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an index written earlier; a missing or unreadable location is an error.
    OpenExisting,
    /// Discard the index at the location and start empty. A location holding anything
    /// other than index files is refused.
    Create,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub model: Model,
    pub created_at: String,
}

pub struct SledIndexStore {
    path: PathBuf,
    db: sled::Db,
    docs: sled::Tree,
}

impl SledIndexStore {
    pub fn open<P: AsRef<Path>>(path: P, model: Model, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: &dyn std::fmt::Display| Error::unavailable(path.display(), reason);

        let db = match mode {
            OpenMode::OpenExisting => {
                if !path.is_dir() {
                    return Err(unavailable(&"no index at this location"));
                }
                if !is_index_location(&path).map_err(|e| unavailable(&e))? {
                    return Err(unavailable(&"location holds files that are not part of an index"));
                }
                let db = sled::open(&path).map_err(|e| unavailable(&e))?;
                let meta = read_meta(&db).map_err(|e| unavailable(&e))?.ok_or_else(|| unavailable(&"missing index metadata"))?;
                if meta.version != FORMAT_VERSION {
                    return Err(unavailable(&format!("unsupported format version {}", meta.version)));
                }
                if meta.model != model {
                    return Err(unavailable(&format!("index was built for {}, not {model}", meta.model)));
                }
                db
            }
            OpenMode::Create => {
                if !is_index_location(&path).map_err(|e| unavailable(&e))? {
                    return Err(unavailable(&"refusing to replace a location that is not an index"));
                }
                if path.is_dir() {
                    std::fs::remove_dir_all(&path).map_err(|e| unavailable(&e))?;
                }
                let db = sled::open(&path).map_err(|e| unavailable(&e))?;
                let meta = IndexMeta {
                    version: FORMAT_VERSION,
                    model,
                    created_at: time::OffsetDateTime::now_utc()
                        .format(&time::format_description::well_known::Rfc3339)
                        .unwrap_or_default(),
                };
                let json = serde_json::to_vec(&meta).map_err(|e| unavailable(&e))?;
                db.insert(META_KEY, json).map_err(|e| unavailable(&e))?;
                db.flush().map_err(|e| unavailable(&e))?;
                db
            }
        };
        let docs = db.open_tree(DOCS_TREE).map_err(|e| unavailable(&e))?;
        tracing::debug!(path = %path.display(), %model, ?mode, "opened index storage");
        Ok(Self { path, db, docs })
    }

    pub fn meta(&self) -> Result<Option<IndexMeta>> {
        read_meta(&self.db).map_err(|e| Error::unavailable(self.path.display(), e))
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for SledIndexStore {
    fn drop(&mut self) {
        if let Err(err) = self.db.flush() {
            tracing::warn!(path = %self.path.display(), error = %err, "flush on close failed");
        }
    }
}

/// True when `path` is absent, an empty directory, or a directory holding only sled's own files.
fn is_index_location(path: &Path) -> std::io::Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if !path.is_dir() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(path)? {
        let name = entry?.file_name();
        if !name.to_str().is_some_and(is_sled_file) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_sled_file(name: &str) -> bool {
    matches!(name, "conf" | "db" | "blobs") || name.starts_with("snap.")
}

fn read_meta(db: &sled::Db) -> std::result::Result<Option<IndexMeta>, String> {
    match db.get(META_KEY).map_err(|e| e.to_string())? {
        Some(raw) => serde_json::from_slice(&raw).map(Some).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

impl IndexStore for SledIndexStore {
    fn location(&self) -> String { self.path.display().to_string() }

    fn load(&self) -> Result<Vec<(DocId, DocEntry)>> {
        let mut entries = Vec::with_capacity(self.docs.len());
        for item in self.docs.iter() {
            let (key, value) = item?;
            let key = <[u8; 8]>::try_from(&key[..])
                .map_err(|_| Error::unavailable(self.path.display(), "corrupt document key"))?;
            let entry: DocEntry = bincode::deserialize(&value)
                .map_err(|e| Error::unavailable(self.path.display(), format!("corrupt document entry: {e}")))?;
            entries.push((DocId::from_be_bytes(key), entry));
        }
        Ok(entries)
    }

    fn put(&self, doc_id: DocId, entry: &DocEntry) -> Result<()> {
        self.docs.insert(doc_id.to_be_bytes(), bincode::serialize(entry)?)?;
        Ok(())
    }

    fn remove(&self, doc_id: DocId) -> Result<()> {
        self.docs.remove(doc_id.to_be_bytes())?;
        Ok(())
    }

    fn replace_all(&self, entries: &[(DocId, DocEntry)]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for key in self.docs.iter().keys() {
            batch.remove(key?);
        }
        for (doc_id, entry) in entries {
            batch.insert(doc_id.to_be_bytes().to_vec(), bincode::serialize(entry)?);
        }
        self.docs.apply_batch(batch)?;
        self.docs.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl<S: IndexStore + ?Sized> IndexStore for Arc<S> {
    fn location(&self) -> String { (**self).location() }
    fn load(&self) -> Result<Vec<(DocId, DocEntry)>> { (**self).load() }
    fn put(&self, doc_id: DocId, entry: &DocEntry) -> Result<()> { (**self).put(doc_id, entry) }
    fn remove(&self, doc_id: DocId) -> Result<()> { (**self).remove(doc_id) }
    fn replace_all(&self, entries: &[(DocId, DocEntry)]) -> Result<()> { (**self).replace_all(entries) }
    fn flush(&self) -> Result<()> { (**self).flush() }
}

/// Ephemeral storage; nothing survives the process.
#[derive(Default)]
pub struct MemoryIndexStore {
    entries: RwLock<BTreeMap<DocId, DocEntry>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}

impl IndexStore for MemoryIndexStore {
    fn location(&self) -> String { "memory".to_string() }

    fn load(&self) -> Result<Vec<(DocId, DocEntry)>> {
        Ok(self.entries.read().iter().map(|(id, e)| (*id, e.clone())).collect())
    }

    fn put(&self, doc_id: DocId, entry: &DocEntry) -> Result<()> {
        self.entries.write().insert(doc_id, entry.clone());
        Ok(())
    }

    fn remove(&self, doc_id: DocId) -> Result<()> {
        self.entries.write().remove(&doc_id);
        Ok(())
    }

    fn replace_all(&self, entries: &[(DocId, DocEntry)]) -> Result<()> {
        *self.entries.write() = entries.iter().cloned().collect();
        Ok(())
    }

    fn flush(&self) -> Result<()> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_existing_fails_on_missing_location() {
        let dir = tempdir().unwrap();
        let err = SledIndexStore::open(dir.path().join("nope"), Model::Bm25, OpenMode::OpenExisting).err().unwrap();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bm25");
        {
            let store = SledIndexStore::open(&path, Model::Bm25, OpenMode::Create).unwrap();
            store.put(2, &DocEntry::analyze("t", "cat sat")).unwrap();
            store.put(1, &DocEntry::analyze("", "dog")).unwrap();
            store.remove(2).unwrap();
            store.put(3, &DocEntry::analyze("", "mat")).unwrap();
        }
        let store = SledIndexStore::open(&path, Model::Bm25, OpenMode::OpenExisting).unwrap();
        let ids: Vec<DocId> = store.load().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.meta().unwrap().unwrap().model, Model::Bm25);
    }

    #[test]
    fn model_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        drop(SledIndexStore::open(dir.path(), Model::TfIdf, OpenMode::Create).unwrap());
        let err = SledIndexStore::open(dir.path(), Model::Bm25, OpenMode::OpenExisting).err().unwrap();
        assert!(err.to_string().contains("built for tfidf"));
    }

    #[test]
    fn create_discards_previous_contents() {
        let dir = tempdir().unwrap();
        {
            let store = SledIndexStore::open(dir.path(), Model::TfIdf, OpenMode::Create).unwrap();
            store.put(1, &DocEntry::analyze("", "cat")).unwrap();
        }
        let store = SledIndexStore::open(dir.path(), Model::TfIdf, OpenMode::Create).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn foreign_directory_is_left_untouched() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("thesis.txt"), b"draft").unwrap();
        for mode in [OpenMode::OpenExisting, OpenMode::Create] {
            let err = SledIndexStore::open(dir.path(), Model::TfIdf, mode).err().unwrap();
            assert!(matches!(err, Error::StorageUnavailable { .. }));
        }
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("thesis.txt")]);
    }

    #[test]
    fn create_refuses_a_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");
        std::fs::write(&path, b"x").unwrap();
        assert!(SledIndexStore::open(&path, Model::Bm25, OpenMode::Create).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }

    #[test]
    fn writes_are_visible_before_flush() {
        let dir = tempdir().unwrap();
        let store = SledIndexStore::open(dir.path(), Model::Bm25, OpenMode::Create).unwrap();
        store.put(4, &DocEntry::analyze("", "cat")).unwrap();
        store.put(5, &DocEntry::analyze("", "dog")).unwrap();
        store.remove(4).unwrap();
        let ids: Vec<DocId> = store.load().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![5]);
        store.flush().unwrap();
    }

    #[test]
    fn replace_all_swaps_contents() {
        let dir = tempdir().unwrap();
        let store = SledIndexStore::open(dir.path(), Model::TfIdf, OpenMode::Create).unwrap();
        store.put(1, &DocEntry::analyze("", "cat")).unwrap();
        store.put(2, &DocEntry::analyze("", "dog")).unwrap();
        store.replace_all(&[(2, DocEntry::analyze("", "bird")), (5, DocEntry::analyze("", "fish"))]).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![2, 5]);
        assert!(loaded[0].1.term_frequencies.contains_key("bird"));
    }

    #[test]
    fn memory_store_roundtrips() {
        let store = MemoryIndexStore::new();
        store.put(1, &DocEntry::analyze("", "cat")).unwrap();
        store.remove(9).unwrap();
        assert_eq!(store.len(), 1);
        store.replace_all(&[]).unwrap();
        assert!(store.is_empty());
    }
}
