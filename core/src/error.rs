use crate::scoring::Model;
use crate::DocId;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The logical mutation a coordinator fan-out was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Index(DocId),
    Delete(DocId),
    Reindex,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Index(id) => write!(f, "index document {id}"),
            Operation::Delete(id) => write!(f, "delete document {id}"),
            Operation::Reindex => f.write_str("reindex"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown ranking model `{0}` (expected `tfidf` or `bm25`)")]
    UnknownModel(String),

    #[error("max_results must be at least 1")]
    InvalidMaxResults,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("document {0} not found")]
    NotFound(DocId),

    #[error("index storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: String, reason: String },

    #[error("{operation} left the indices inconsistent (applied: {applied:?}, failed: {failed:?}): {reason}; run a reindex")]
    PartialConsistency {
        operation: Operation,
        applied: Vec<Model>,
        failed: Vec<Model>,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Coarse classification used by transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    NotFound,
    StorageUnavailable,
    PartialConsistency,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownModel(_) | Error::InvalidMaxResults | Error::InvalidConfig(_) => ErrorKind::Input,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            Error::PartialConsistency { .. } => ErrorKind::PartialConsistency,
            Error::Storage(_) | Error::Codec(_) => ErrorKind::Storage,
        }
    }

    /// True when the two model indices may disagree and `reindex_all` is the remedy.
    pub fn requires_reindex(&self) -> bool {
        matches!(self, Error::PartialConsistency { .. })
    }

    pub(crate) fn unavailable(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Error::StorageUnavailable { path: path.to_string(), reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_consistency_is_flagged_for_reindex() {
        let err = Error::PartialConsistency {
            operation: Operation::Index(7),
            applied: vec![Model::TfIdf],
            failed: vec![Model::Bm25],
            reason: "disk full".into(),
        };
        assert_eq!(err.kind(), ErrorKind::PartialConsistency);
        assert!(err.requires_reindex());
        assert!(err.to_string().contains("index document 7"));
    }

    #[test]
    fn input_errors_are_classified() {
        assert_eq!(Error::UnknownModel("lsi".into()).kind(), ErrorKind::Input);
        assert_eq!(Error::InvalidMaxResults.kind(), ErrorKind::Input);
        assert!(!Error::NotFound(1).requires_reindex());
    }
}
