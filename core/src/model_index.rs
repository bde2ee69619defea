use crate::config::Bm25Params;
use crate::error::{Error, Result};
use crate::index::{DocEntry, InvertedIndex};
use crate::query::{self, ScoredDoc};
use crate::scoring::{scorer_for, Model, Scorer};
use crate::store::IndexStore;
use crate::{DocId, Document};
use parking_lot::RwLock;

/// One ranking model's index: in-memory postings and statistics over durable storage.
///
/// Mutations hold the write lock across the storage write and the in-memory update,
/// so there is one writer at a time and searches (read lock) never observe a
/// half-applied document. Storage is written first; if it fails, memory is untouched.
pub struct ModelIndex {
    model: Model,
    scorer: Box<dyn Scorer>,
    index: RwLock<InvertedIndex>,
    store: Box<dyn IndexStore>,
}

impl ModelIndex {
    /// Load every persisted entry from `store` and build the postings from them.
    pub fn open(model: Model, bm25: Bm25Params, store: Box<dyn IndexStore>) -> Result<Self> {
        let mut index = InvertedIndex::new();
        for (doc_id, entry) in store.load()? {
            index.insert(doc_id, entry);
        }
        tracing::info!(%model, location = %store.location(), num_docs = index.len(), "index opened");
        Ok(Self { model, scorer: scorer_for(model, bm25), index: RwLock::new(index), store })
    }

    pub fn model(&self) -> Model { self.model }

    pub fn location(&self) -> String { self.store.location() }

    /// Index (or re-index) a document. Any postings previously held for its id are retracted.
    pub fn add_document(&self, doc: &Document) -> Result<()> {
        let entry = DocEntry::analyze(&doc.title, &doc.body);
        let mut index = self.index.write();
        self.store.put(doc.id, &entry)?;
        index.insert(doc.id, entry);
        tracing::debug!(model = %self.model, doc_id = doc.id, "document indexed");
        Ok(())
    }

    /// Remove every posting for `doc_id`. Returns whether it was indexed; absent ids are a no-op.
    pub fn delete_document(&self, doc_id: DocId) -> Result<bool> {
        let mut index = self.index.write();
        self.store.remove(doc_id)?;
        let removed = index.remove(doc_id).is_some();
        tracing::debug!(model = %self.model, doc_id, removed, "document deleted");
        Ok(removed)
    }

    /// Discard everything and index `docs` from scratch. Returns the number of documents indexed.
    pub fn rebuild<'a, I>(&self, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let entries: Vec<(DocId, DocEntry)> =
            docs.into_iter().map(|d| (d.id, DocEntry::analyze(&d.title, &d.body))).collect();
        let mut index = self.index.write();
        self.store.replace_all(&entries)?;
        index.clear();
        for (doc_id, entry) in entries {
            index.insert(doc_id, entry);
        }
        tracing::info!(model = %self.model, num_docs = index.len(), "index rebuilt");
        Ok(index.len())
    }

    /// Ranked ids for `query`, best first. An empty or unmatched query yields no hits.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<ScoredDoc>> {
        if max_results == 0 {
            return Err(Error::InvalidMaxResults);
        }
        let terms = query::parse_query(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.index.read();
        let hits = query::execute(&index, self.scorer.as_ref(), &terms, max_results);
        tracing::debug!(model = %self.model, num_terms = terms.len(), hits = hits.len(), "search");
        Ok(hits)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.index.read().stats().document_frequency(term)
    }

    pub fn total_document_count(&self) -> u64 {
        self.index.read().stats().total_document_count()
    }

    pub fn average_document_length(&self) -> f64 {
        self.index.read().stats().average_document_length()
    }

    pub fn contains(&self, doc_id: DocId) -> bool { self.index.read().contains(doc_id) }

    /// Indexed ids in ascending order.
    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.index.read().doc_ids().collect();
        ids.sort_unstable();
        ids
    }

    /// Run `f` against a consistent view of the postings.
    pub fn with_index<T>(&self, f: impl FnOnce(&InvertedIndex) -> T) -> T {
        f(&self.index.read())
    }

    pub fn flush(&self) -> Result<()> { self.store.flush() }
}
