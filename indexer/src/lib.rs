//! File-tree ingestion and query-file runs on top of `search-core`.

pub mod ingest;
pub mod run;
pub mod source;

pub use ingest::{index_path, ingest_batch, BatchSummary};
pub use run::{run_queries, run_query_file, QueryFailure, RunSummary};
pub use source::{enumerate, DocKind, Enumeration, SourceEntry};
