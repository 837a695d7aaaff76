//! Inverted-index engine: analysis, index building, durable commits, query parsing and
//! ranked retrieval.

pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod reader;
pub mod search;
pub mod tokenizer;
pub mod trec;
pub mod writer;

pub use config::{AnalyzerConfig, IndexConfig, SearchConfig, Similarity};
pub use error::{Error, Result};
pub use index::{DocId, DocMeta, IndexBuilder, IndexView, InvertedIndex, NewDocument, Posting, TermId};
pub use query::{Clause, Occur, Query, QueryParser};
pub use reader::IndexReader;
pub use search::{Hit, Searcher, TopDocs};
pub use tokenizer::{Analyzer, Token};
pub use writer::{CommitSummary, IndexWriter};
