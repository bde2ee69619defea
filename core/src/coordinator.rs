//! The engine facade: one primary store, two model indices kept in lockstep.

use crate::config::EngineConfig;
use crate::error::{Error, Operation, Result};
use crate::model_index::ModelIndex;
use crate::query::ScoredDoc;
use crate::repository::DocumentRepository;
use crate::scoring::Model;
use crate::store::{OpenMode, SledIndexStore};
use crate::{DocId, Document, NewDocument};

/// Routes every mutation to both the TF-IDF and the BM25 index and reports divergence.
///
/// Each logical write is applied to TF-IDF first, then BM25. Both outcomes are always
/// collected; if exactly one model applied the change the caller gets
/// [`Error::PartialConsistency`] naming which, and [`reindex_all`](Self::reindex_all)
/// brings them back together.
pub struct IndexCoordinator<R> {
    repository: R,
    tfidf: ModelIndex,
    bm25: ModelIndex,
}

impl<R: DocumentRepository> IndexCoordinator<R> {
    pub fn new(repository: R, tfidf: ModelIndex, bm25: ModelIndex) -> Result<Self> {
        if tfidf.model() != Model::TfIdf || bm25.model() != Model::Bm25 {
            return Err(Error::InvalidConfig(format!(
                "expected (tfidf, bm25) indices, got ({}, {})",
                tfidf.model(),
                bm25.model()
            )));
        }
        Ok(Self { repository, tfidf, bm25 })
    }

    /// Open both on-disk indices described by `config` and reconcile them with `repository`.
    ///
    /// An index that cannot be opened is recreated empty. If either index was recreated
    /// or holds no documents, both are rebuilt from the repository once; a failure of
    /// that rebuild is returned to the caller.
    pub fn open(repository: R, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let (tfidf, tfidf_recreated) = open_model(Model::TfIdf, config)?;
        let (bm25, bm25_recreated) = open_model(Model::Bm25, config)?;
        let coordinator = Self::new(repository, tfidf, bm25)?;
        coordinator.recover(tfidf_recreated || bm25_recreated)?;
        Ok(coordinator)
    }

    /// Startup check for indices opened by the caller: rebuild both if either is empty.
    /// Returns whether a rebuild ran.
    pub fn ensure_ready(&self) -> Result<bool> { self.recover(false) }

    fn recover(&self, force: bool) -> Result<bool> {
        let empty: Vec<Model> = Model::ALL.into_iter().filter(|m| self.index(*m).total_document_count() == 0).collect();
        if !force && empty.is_empty() {
            return Ok(false);
        }
        tracing::info!(?empty, recreated = force, "index not ready, reindexing from primary store");
        let num_docs = self.reindex_all()?;
        tracing::info!(num_docs, "startup reindex complete");
        Ok(true)
    }

    pub fn repository(&self) -> &R { &self.repository }

    pub fn index(&self, model: Model) -> &ModelIndex {
        match model {
            Model::TfIdf => &self.tfidf,
            Model::Bm25 => &self.bm25,
        }
    }

    /// Store a new document and index it under both models.
    ///
    /// Once the store has the document, any indexing failure is reported as
    /// [`Error::PartialConsistency`]; retrying the create would store a duplicate.
    pub fn create_document(&self, doc: NewDocument) -> Result<Document> {
        let doc = self.repository.create(doc)?;
        self.index_stored(&doc)?;
        Ok(doc)
    }

    /// Bulk variant of [`create_document`](Self::create_document). Every stored document is
    /// offered to both indices; the first failure is returned after the whole batch ran.
    pub fn create_documents(&self, docs: Vec<NewDocument>) -> Result<Vec<Document>> {
        let docs = self.repository.create_many(docs)?;
        let mut first_err = None;
        let mut unindexed = 0usize;
        for doc in &docs {
            if let Err(err) = self.index_stored(doc) {
                unindexed += 1;
                first_err.get_or_insert(err);
            }
        }
        if let Some(err) = first_err {
            tracing::warn!(count = docs.len(), unindexed, "batch stored but not fully indexed");
            return Err(err);
        }
        tracing::info!(count = docs.len(), "documents created");
        Ok(docs)
    }

    fn index_stored(&self, doc: &Document) -> Result<()> {
        match self.index_document(doc) {
            Err(err @ Error::PartialConsistency { .. }) => Err(err),
            Err(err) => Err(store_only(Operation::Index(doc.id), err)),
            Ok(()) => Ok(()),
        }
    }

    /// Index (or re-index) `doc` in both models.
    pub fn index_document(&self, doc: &Document) -> Result<()> {
        self.fan_out(Operation::Index(doc.id), |index| index.add_document(doc))?;
        Ok(())
    }

    /// Remove `id` from the primary store, then from both indices.
    ///
    /// Index entries are retracted even when the store no longer had the document, so
    /// orphaned postings get cleaned up; the call still reports `NotFound` in that case.
    pub fn delete_document(&self, id: DocId) -> Result<()> {
        let existed = self.repository.delete_by_id(id)?;
        match self.fan_out(Operation::Delete(id), |index| index.delete_document(id)) {
            Ok(_) => {}
            Err(err @ Error::PartialConsistency { .. }) => return Err(err),
            Err(err) if existed => return Err(store_only(Operation::Delete(id), err)),
            Err(err) => return Err(err),
        }
        if existed {
            Ok(())
        } else {
            Err(Error::NotFound(id))
        }
    }

    /// Rebuild both indices from every document in the primary store.
    pub fn reindex_all(&self) -> Result<usize> {
        let docs = self.repository.find_all()?;
        let (num_docs, _) = self.fan_out(Operation::Reindex, |index| index.rebuild(&docs))?;
        Ok(num_docs)
    }

    /// Ranked document ids, best first.
    pub fn search(&self, query: &str, max_results: usize, model: Model) -> Result<Vec<DocId>> {
        Ok(self.search_scored(query, max_results, model)?.into_iter().map(|hit| hit.doc_id).collect())
    }

    /// [`search`](Self::search) with the model given by name (`tfidf` or `bm25`, any case).
    pub fn search_named(&self, query: &str, max_results: usize, model: &str) -> Result<Vec<DocId>> {
        self.search(query, max_results, model.parse()?)
    }

    pub fn search_scored(&self, query: &str, max_results: usize, model: Model) -> Result<Vec<ScoredDoc>> {
        self.index(model).search(query, max_results)
    }

    /// Search and resolve hits against the primary store. Ids the store no longer has are skipped.
    pub fn search_documents(&self, query: &str, max_results: usize, model: Model) -> Result<Vec<Document>> {
        let ids = self.search(query, max_results, model)?;
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.repository.find_by_id(id)? {
                Some(doc) => docs.push(doc),
                None => tracing::debug!(doc_id = id, %model, "hit missing from primary store"),
            }
        }
        Ok(docs)
    }

    pub fn get_document(&self, id: DocId) -> Result<Document> {
        self.repository.find_by_id(id)?.ok_or(Error::NotFound(id))
    }

    pub fn document_frequency(&self, model: Model, term: &str) -> u32 { self.index(model).document_frequency(term) }

    pub fn total_document_count(&self, model: Model) -> u64 { self.index(model).total_document_count() }

    pub fn average_document_length(&self, model: Model) -> f64 { self.index(model).average_document_length() }

    pub fn flush(&self) -> Result<()> {
        self.tfidf.flush()?;
        self.bm25.flush()
    }

    fn fan_out<T>(&self, operation: Operation, f: impl Fn(&ModelIndex) -> Result<T>) -> Result<(T, T)> {
        let tfidf = f(&self.tfidf);
        let bm25 = f(&self.bm25);
        match (tfidf, bm25) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Ok(_), Err(err)) => Err(partial(operation, Model::TfIdf, Model::Bm25, err)),
            (Err(err), Ok(_)) => Err(partial(operation, Model::Bm25, Model::TfIdf, err)),
            (Err(err), Err(other)) => {
                tracing::warn!(%operation, tfidf = %err, bm25 = %other, "both indices failed");
                Err(err)
            }
        }
    }
}

fn partial(operation: Operation, applied: Model, failed: Model, err: Error) -> Error {
    tracing::warn!(%operation, %applied, %failed, error = %err, "indices diverged");
    Error::PartialConsistency { operation, applied: vec![applied], failed: vec![failed], reason: err.to_string() }
}

/// The primary store changed but neither index followed.
fn store_only(operation: Operation, err: Error) -> Error {
    tracing::warn!(%operation, error = %err, "primary store changed, neither index applied it");
    Error::PartialConsistency { operation, applied: Vec::new(), failed: Model::ALL.to_vec(), reason: err.to_string() }
}

fn open_model(model: Model, config: &EngineConfig) -> Result<(ModelIndex, bool)> {
    let path = config.index_path(model);
    let existing = SledIndexStore::open(path, model, OpenMode::OpenExisting)
        .and_then(|store| ModelIndex::open(model, config.bm25, Box::new(store)));
    match existing {
        Ok(index) => Ok((index, false)),
        Err(err) => {
            tracing::warn!(%model, path = %path.display(), error = %err, "index unreadable, recreating");
            let store = SledIndexStore::open(path, model, OpenMode::Create)?;
            Ok((ModelIndex::open(model, config.bm25, Box::new(store))?, true))
        }
    }
}
