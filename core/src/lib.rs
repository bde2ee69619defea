//! Full-text search over a primary document store, ranked by TF-IDF or BM25.
//!
//! Each ranking model owns an independent inverted index ([`ModelIndex`]) backed by
//! its own storage location. The [`IndexCoordinator`] keeps both in lockstep with
//! the [`DocumentRepository`] that holds canonical document content.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod model_index;
pub mod query;
pub mod repository;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod tokenizer;

pub use config::{Bm25Params, EngineConfig};
pub use coordinator::IndexCoordinator;
pub use error::{Error, ErrorKind, Operation, Result};
pub use index::{DocEntry, InvertedIndex, Posting};
pub use model_index::ModelIndex;
pub use query::ScoredDoc;
pub use repository::{DocumentRepository, MemoryRepository, SledRepository};
pub use scoring::Model;
pub use stats::TermStats;
pub use store::{IndexStore, MemoryIndexStore, OpenMode, SledIndexStore};

pub type DocId = u64;

/// A document as held by the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub body: String,
}

/// A document that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub body: String,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into() }
    }

    pub fn with_id(self, id: DocId) -> Document {
        Document { id, title: self.title, body: self.body }
    }
}
