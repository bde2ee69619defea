use crate::index::InvertedIndex;
use crate::scoring::{CorpusView, Scorer};
use crate::tokenizer::tokenize;
use crate::DocId;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Distinct query terms, in the same normalized form the index uses.
pub fn parse_query(query: &str) -> Vec<String> {
    tokenize(query).into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Score the union of the terms' postings and return the best `max_results`.
///
/// Documents matching none of the terms are never scored. Results are ordered by
/// descending score, ties broken by ascending document id.
pub fn execute(index: &InvertedIndex, scorer: &dyn Scorer, terms: &[String], max_results: usize) -> Vec<ScoredDoc> {
    let stats = index.stats();
    let corpus = CorpusView::of(stats);
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for term in terms {
        let df = stats.document_frequency(term);
        if df == 0 {
            continue;
        }
        let idf = scorer.idf(df, &corpus);
        for posting in index.postings(term) {
            *scores.entry(posting.doc_id).or_insert(0.0) += idf * scorer.tf_weight(posting, &corpus);
        }
    }

    let mut ranked: Vec<ScoredDoc> = scores.into_iter().map(|(doc_id, score)| ScoredDoc { doc_id, score }).collect();
    ranked.sort_by(rank_order);
    ranked.truncate(max_results);
    ranked
}

fn rank_order(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bm25Params;
    use crate::index::DocEntry;
    use crate::scoring::{Bm25Scorer, TfIdfScorer};

    fn corpus() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        for (id, body) in [(1, "the cat sat"), (2, "the cat sat on the mat"), (3, "dogs run fast")] {
            index.insert(id, DocEntry::analyze("", body));
        }
        index
    }

    fn ids(hits: &[ScoredDoc]) -> Vec<DocId> { hits.iter().map(|h| h.doc_id).collect() }

    #[test]
    fn parse_dedups_terms() {
        assert_eq!(parse_query("Cat cat CAT mat"), vec!["cat", "mat"]);
        assert!(parse_query("  ?! ").is_empty());
    }

    #[test]
    fn only_matching_documents_are_candidates() {
        let index = corpus();
        let hits = execute(&index, &TfIdfScorer, &parse_query("cat"), 10);
        assert_eq!(ids(&hits), vec![1, 2]);
        let hits = execute(&index, &TfIdfScorer, &parse_query("unicorn"), 10);
        assert!(hits.is_empty());
    }

    #[test]
    fn tfidf_ties_break_by_ascending_id() {
        let index = corpus();
        let hits = execute(&index, &TfIdfScorer, &parse_query("cat"), 10);
        assert_eq!(hits[0].score, hits[1].score);
        assert!((hits[0].score - 1.5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn bm25_prefers_shorter_document() {
        let index = corpus();
        let hits = execute(&index, &Bm25Scorer::new(Bm25Params::default()), &parse_query("cat"), 10);
        assert_eq!(ids(&hits), vec![1, 2]);
        let idf = (1.0f64 + 1.5 / 2.5).ln();
        assert!((hits[0].score - idf * 2.2 / 1.975).abs() < 1e-12);
        assert!((hits[1].score - idf * 2.2 / 2.65).abs() < 1e-12);
    }

    #[test]
    fn scores_sum_over_query_terms() {
        let index = corpus();
        let single = execute(&index, &TfIdfScorer, &parse_query("mat"), 10);
        let both = execute(&index, &TfIdfScorer, &parse_query("cat mat"), 10);
        assert_eq!(ids(&both), vec![2, 1]);
        assert!(both[0].score > single[0].score);
    }

    #[test]
    fn truncates_to_max_results() {
        let index = corpus();
        let hits = execute(&index, &TfIdfScorer, &parse_query("the run"), 1);
        assert_eq!(hits.len(), 1);
    }
}
