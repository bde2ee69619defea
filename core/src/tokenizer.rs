use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Tokenize text into terms using NFKC normalization, lowercasing and stemming.
///
/// Splits on every character that is neither a letter nor a digit. Stopwords are
/// kept: every word counts toward document length. Indexing and query parsing both
/// go through this function, so a query term matches exactly the indexed form.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized)
        .map(|mat| STEMMER.stem(mat.as_str()).into_owned())
        .filter(|term| !term.is_empty())
        .collect()
}

/// Tokenize a document's title and body as one combined text field.
///
/// Title terms come first, then body terms; both are weighted equally.
pub fn tokenize_document(title: &str, body: &str) -> Vec<String> {
    let mut terms = tokenize(title);
    terms.extend(tokenize(body));
    terms
}
