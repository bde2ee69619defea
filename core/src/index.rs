use crate::stats::TermStats;
use crate::tokenizer::tokenize_document;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The analyzed form of one document: what the index stores and persists per id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocEntry {
    /// Document length in terms (title + body).
    pub length: u32,
    pub term_frequencies: BTreeMap<String, u32>,
}

impl DocEntry {
    pub fn analyze(title: &str, body: &str) -> Self {
        let terms = tokenize_document(title, body);
        let mut term_frequencies = BTreeMap::new();
        for term in &terms {
            *term_frequencies.entry(term.clone()).or_insert(0) += 1;
        }
        Self { length: terms.len() as u32, term_frequencies }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_frequency: u32,
    pub doc_length: u32,
}

/// Term → postings map with forward entries for retraction and live statistics.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, BTreeMap<DocId, Posting>>, // keyed by doc_id for O(log n) retraction
    docs: HashMap<DocId, DocEntry>,
    stats: TermStats,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Index `entry` under `doc_id`, first retracting whatever was indexed for it before.
    pub fn insert(&mut self, doc_id: DocId, entry: DocEntry) {
        self.remove(doc_id);
        for (term, &tf) in &entry.term_frequencies {
            let posting = Posting { doc_id, term_frequency: tf, doc_length: entry.length };
            self.postings.entry(term.clone()).or_default().insert(doc_id, posting);
        }
        self.stats.record_insert(&entry);
        self.docs.insert(doc_id, entry);
    }

    /// Retract every posting for `doc_id`. Returns the removed entry, or `None` if it was absent.
    pub fn remove(&mut self, doc_id: DocId) -> Option<DocEntry> {
        let entry = self.docs.remove(&doc_id)?;
        for term in entry.term_frequencies.keys() {
            if let Some(list) = self.postings.get_mut(term) {
                list.remove(&doc_id);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.stats.record_remove(&entry);
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.docs.clear();
        self.stats.clear();
    }

    pub fn postings(&self, term: &str) -> impl Iterator<Item = &Posting> + '_ {
        self.postings.get(term).into_iter().flat_map(|list| list.values())
    }

    pub fn stats(&self) -> &TermStats { &self.stats }

    pub fn contains(&self, doc_id: DocId) -> bool { self.docs.contains_key(&doc_id) }

    pub fn entry(&self, doc_id: DocId) -> Option<&DocEntry> { self.docs.get(&doc_id) }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ { self.docs.keys().copied() }

    /// Distinct documents with a posting for `term`, counted from the postings themselves.
    pub fn posting_count(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, BTreeMap::len)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ { self.postings.keys().map(String::as_str) }
}
