//! The primary record store contract and two implementations.

use crate::error::Result;
use crate::{DocId, Document, NewDocument};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Canonical document storage. Assigns ids; the indices only ever derive from it.
pub trait DocumentRepository: Send + Sync {
    fn create(&self, doc: NewDocument) -> Result<Document>;

    fn create_many(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>> {
        docs.into_iter().map(|d| self.create(d)).collect()
    }

    fn find_by_id(&self, id: DocId) -> Result<Option<Document>>;

    /// Every stored document, in ascending id order.
    fn find_all(&self) -> Result<Vec<Document>>;

    /// Returns whether a document was removed.
    fn delete_by_id(&self, id: DocId) -> Result<bool>;
}

impl<R: DocumentRepository + ?Sized> DocumentRepository for Arc<R> {
    fn create(&self, doc: NewDocument) -> Result<Document> { (**self).create(doc) }
    fn create_many(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>> { (**self).create_many(docs) }
    fn find_by_id(&self, id: DocId) -> Result<Option<Document>> { (**self).find_by_id(id) }
    fn find_all(&self) -> Result<Vec<Document>> { (**self).find_all() }
    fn delete_by_id(&self, id: DocId) -> Result<bool> { (**self).delete_by_id(id) }
}

/// In-process store; ids start at 1.
#[derive(Default)]
pub struct MemoryRepository {
    docs: RwLock<BTreeMap<DocId, Document>>,
    last_id: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.docs.read().len() }

    pub fn is_empty(&self) -> bool { self.docs.read().is_empty() }
}

impl DocumentRepository for MemoryRepository {
    fn create(&self, doc: NewDocument) -> Result<Document> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let doc = doc.with_id(id);
        self.docs.write().insert(id, doc.clone());
        Ok(doc)
    }

    fn find_by_id(&self, id: DocId) -> Result<Option<Document>> {
        Ok(self.docs.read().get(&id).cloned())
    }

    fn find_all(&self) -> Result<Vec<Document>> {
        Ok(self.docs.read().values().cloned().collect())
    }

    fn delete_by_id(&self, id: DocId) -> Result<bool> {
        Ok(self.docs.write().remove(&id).is_some())
    }
}

const DOCUMENTS_TREE: &str = "documents";

/// Durable store on sled. Values are bincode-encoded [`Document`]s keyed by big-endian id.
pub struct SledRepository {
    db: sled::Db,
    docs: sled::Tree,
}

impl SledRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let docs = db.open_tree(DOCUMENTS_TREE)?;
        Ok(Self { db, docs })
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

impl DocumentRepository for SledRepository {
    fn create(&self, doc: NewDocument) -> Result<Document> {
        let id = self.db.generate_id()? + 1;
        let doc = doc.with_id(id);
        self.docs.insert(id.to_be_bytes(), bincode::serialize(&doc)?)?;
        self.docs.flush()?;
        Ok(doc)
    }

    fn create_many(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>> {
        let mut batch = sled::Batch::default();
        let mut created = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = doc.with_id(self.db.generate_id()? + 1);
            batch.insert(doc.id.to_be_bytes().to_vec(), bincode::serialize(&doc)?);
            created.push(doc);
        }
        self.docs.apply_batch(batch)?;
        self.docs.flush()?;
        Ok(created)
    }

    fn find_by_id(&self, id: DocId) -> Result<Option<Document>> {
        match self.docs.get(id.to_be_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn find_all(&self) -> Result<Vec<Document>> {
        self.docs.iter().values().map(|raw| -> Result<Document> { Ok(bincode::deserialize(&raw?)?) }).collect()
    }

    fn delete_by_id(&self, id: DocId) -> Result<bool> {
        let removed = self.docs.remove(id.to_be_bytes())?.is_some();
        if removed {
            self.docs.flush()?;
        }
        Ok(removed)
    }
}
