use crate::error::{Error, Result};
use crate::scoring::Model;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_TFIDF_INDEX_PATH: &str = "SRI_TFIDF_INDEX_PATH";
pub const ENV_BM25_INDEX_PATH: &str = "SRI_BM25_INDEX_PATH";
pub const ENV_BM25_K1: &str = "SRI_BM25_K1";
pub const ENV_BM25_B: &str = "SRI_BM25_B";

/// BM25 tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::InvalidConfig(format!("bm25 k1 must be a finite value >= 0, got {}", self.k1)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::InvalidConfig(format!("bm25 b must lie in [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

/// Engine configuration: one index location per model plus scoring tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tfidf_index: PathBuf,
    pub bm25_index: PathBuf,
    pub bm25: Bm25Params,
}

impl Default for EngineConfig {
    fn default() -> Self { Self::under("./index") }
}

impl EngineConfig {
    /// Place both model indices below `root` (`root/tfidf`, `root/bm25`).
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self { tfidf_index: root.join("tfidf"), bm25_index: root.join("bm25"), bm25: Bm25Params::default() }
    }

    /// Overlay `SRI_*` environment variables on top of `self`.
    pub fn from_env(self) -> Result<Self> {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(p) = var(ENV_TFIDF_INDEX_PATH) { self.tfidf_index = PathBuf::from(p); }
        if let Some(p) = var(ENV_BM25_INDEX_PATH) { self.bm25_index = PathBuf::from(p); }
        if let Some(v) = var(ENV_BM25_K1) { self.bm25.k1 = parse_f64(ENV_BM25_K1, &v)?; }
        if let Some(v) = var(ENV_BM25_B) { self.bm25.b = parse_f64(ENV_BM25_B, &v)?; }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tfidf_index == self.bm25_index {
            return Err(Error::InvalidConfig(format!(
                "tfidf and bm25 indices must use distinct locations, both are {}",
                self.tfidf_index.display()
            )));
        }
        self.bm25.validate()
    }

    pub fn index_path(&self, model: Model) -> &Path {
        match model {
            Model::TfIdf => &self.tfidf_index,
            Model::Bm25 => &self.bm25_index,
        }
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value.trim().parse().map_err(|_| Error::InvalidConfig(format!("{key}={value:?} is not a number")))
}
