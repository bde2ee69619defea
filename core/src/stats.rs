use crate::index::DocEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-model corpus statistics, maintained alongside every postings mutation.
///
/// `document_frequency(t)` always equals the number of distinct documents with a
/// posting for `t`; `total_document_count()` equals the number of indexed documents.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TermStats {
    df: HashMap<String, u32>,
    num_docs: u64,
    total_length: u64,
}

impl TermStats {
    pub fn new() -> Self { Self::default() }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    pub fn total_document_count(&self) -> u64 { self.num_docs }

    /// Sum of all document lengths, in terms.
    pub fn total_length(&self) -> u64 { self.total_length }

    /// Number of distinct terms with at least one posting.
    pub fn vocabulary_size(&self) -> usize { self.df.len() }

    /// Mean document length; 0.0 for an empty corpus.
    pub fn average_document_length(&self) -> f64 {
        if self.num_docs == 0 {
            return 0.0;
        }
        self.total_length as f64 / self.num_docs as f64
    }

    pub(crate) fn record_insert(&mut self, entry: &DocEntry) {
        self.num_docs += 1;
        self.total_length += u64::from(entry.length);
        for term in entry.term_frequencies.keys() {
            *self.df.entry(term.clone()).or_insert(0) += 1;
        }
    }

    pub(crate) fn record_remove(&mut self, entry: &DocEntry) {
        self.num_docs = self.num_docs.saturating_sub(1);
        self.total_length = self.total_length.saturating_sub(u64::from(entry.length));
        for term in entry.term_frequencies.keys() {
            if let Some(df) = self.df.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.df.remove(term);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
