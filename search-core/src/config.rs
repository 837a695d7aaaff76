use serde::{Deserialize, Serialize};

/// Analysis options. Persisted with the index so queries are analyzed like documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Drop English stopwords (the classic Lucene stop set).
    pub remove_stopwords: bool,
    /// Apply the English Snowball stemmer to every term.
    pub stem: bool,
    /// Tokens longer than this many characters are discarded.
    pub max_token_len: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { remove_stopwords: true, stem: false, max_token_len: 255 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub analyzer: AnalyzerConfig,
    /// Keep token positions in each posting. Nothing scores with them yet, so they are off
    /// unless asked for.
    pub store_positions: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { analyzer: AnalyzerConfig::default(), store_positions: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Similarity {
    /// `tf(t,d) * idf(t)` with `idf = ln(N / df)`, or `ln(1 + N / df)` when smoothed.
    /// Unsmoothed, a term present in every document weighs nothing.
    TfIdf { smooth_idf: bool },
    Bm25 { k1: f32, b: f32 },
    /// Query likelihood with Jelinek-Mercer smoothing; `lambda` is the weight of the
    /// collection model.
    QueryLikelihood { lambda: f32 },
}

impl Similarity {
    pub fn bm25() -> Self {
        Similarity::Bm25 { k1: 1.2, b: 0.75 }
    }

    pub fn query_likelihood() -> Self {
        Similarity::QueryLikelihood { lambda: 0.35 }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Similarity::TfIdf { .. } => "TFIDF",
            Similarity::Bm25 { .. } => "BM25",
            Similarity::QueryLikelihood { .. } => "JM_QL",
        }
    }
}

impl Default for Similarity {
    fn default() -> Self { Similarity::TfIdf { smooth_idf: true } }
}

impl std::str::FromStr for Similarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tfidf" | "tf-idf" => Ok(Similarity::TfIdf { smooth_idf: true }),
            "tfidf-raw" => Ok(Similarity::TfIdf { smooth_idf: false }),
            "bm25" => Ok(Similarity::bm25()),
            "ql" | "jm" => Ok(Similarity::query_likelihood()),
            other => Err(format!("unknown similarity {other:?} (expected tfidf, tfidf-raw, bm25 or ql)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub similarity: Similarity,
    pub top_k: usize,
    /// Last column of every run-file line.
    pub system_name: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let similarity = Similarity::default();
        Self { similarity, top_k: 100, system_name: similarity.name().to_string() }
    }
}
