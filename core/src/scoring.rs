//! Ranking models and their per-term scoring functions.
//!
//! A document's score for a query is `Σ idf(t) · tf_weight(t, d)` over the distinct
//! query terms it contains. Both factors are recomputed from live [`TermStats`] on
//! every query.

use crate::config::Bm25Params;
use crate::error::{Error, Result};
use crate::index::Posting;
use crate::stats::TermStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    TfIdf,
    Bm25,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::TfIdf, Model::Bm25];

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::TfIdf => "tfidf",
            Model::Bm25 => "bm25",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("tfidf") {
            Ok(Model::TfIdf)
        } else if s.eq_ignore_ascii_case("bm25") {
            Ok(Model::Bm25)
        } else {
            Err(Error::UnknownModel(s.to_string()))
        }
    }
}

/// Corpus-level values a query needs, captured once per query.
#[derive(Debug, Clone, Copy)]
pub struct CorpusView {
    pub num_docs: f64,
    pub avg_doc_length: f64,
}

impl CorpusView {
    pub fn of(stats: &TermStats) -> Self {
        Self { num_docs: stats.total_document_count() as f64, avg_doc_length: stats.average_document_length() }
    }
}

pub trait Scorer: Send + Sync {
    fn model(&self) -> Model;

    /// Weight of a term given its document frequency. Only called with `df >= 1`.
    fn idf(&self, df: u32, corpus: &CorpusView) -> f64;

    /// Contribution of one posting before the idf factor.
    fn tf_weight(&self, posting: &Posting, corpus: &CorpusView) -> f64;
}

/// Classic model: raw term frequency times `ln(N / df)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfScorer;

impl Scorer for TfIdfScorer {
    fn model(&self) -> Model { Model::TfIdf }

    fn idf(&self, df: u32, corpus: &CorpusView) -> f64 {
        (corpus.num_docs / f64::from(df.max(1))).ln()
    }

    fn tf_weight(&self, posting: &Posting, _corpus: &CorpusView) -> f64 {
        f64::from(posting.term_frequency)
    }
}

/// Okapi BM25 with term-frequency saturation `k1` and length normalization `b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params) -> Self { Self { params } }

    pub fn params(&self) -> Bm25Params { self.params }
}

impl Scorer for Bm25Scorer {
    fn model(&self) -> Model { Model::Bm25 }

    fn idf(&self, df: u32, corpus: &CorpusView) -> f64 {
        let df = f64::from(df);
        (1.0 + (corpus.num_docs - df + 0.5) / (df + 0.5)).ln()
    }

    fn tf_weight(&self, posting: &Posting, corpus: &CorpusView) -> f64 {
        let Bm25Params { k1, b } = self.params;
        let tf = f64::from(posting.term_frequency);
        let dl = f64::from(posting.doc_length);
        // a corpus of empty documents has no postings, but guard the division anyway
        let avgdl = if corpus.avg_doc_length > 0.0 { corpus.avg_doc_length } else { 1.0 };
        tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * dl / avgdl))
    }
}

/// Build the scorer for `model`.
pub fn scorer_for(model: Model, bm25: Bm25Params) -> Box<dyn Scorer> {
    match model {
        Model::TfIdf => Box::new(TfIdfScorer),
        Model::Bm25 => Box::new(Bm25Scorer::new(bm25)),
    }
}
