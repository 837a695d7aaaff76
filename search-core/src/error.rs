//! Error types shared by the build and query phases.
//!
//! Storage setup and index open failures are fatal to a run. Everything tied to a single
//! document or a single query is recoverable: callers log it, count it, and move on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The index location could not be created, locked, or written.
    #[error("cannot set up index at {}: {}", .path.display(), .reason)]
    Setup { path: PathBuf, reason: String },

    /// A single source document could not be read or decoded.
    #[error("could not add {}: {}", .path.display(), .reason)]
    DocumentIngest { path: PathBuf, reason: String },

    /// A document with this id is already in the index.
    #[error("document id {id:?} already exists in the index")]
    DuplicateDocument { id: String },

    #[error("query syntax error at {token:?}: {reason}")]
    QuerySyntax { token: String, reason: String },

    #[error("query has no searchable terms")]
    EmptyQuery,

    #[error("no index found at {}", .path.display())]
    IndexNotFound { path: PathBuf },

    #[error("index at {} is corrupt: {}", .path.display(), .reason)]
    IndexCorrupt { path: PathBuf, reason: String },

    /// The document source root could not be walked.
    #[error("cannot traverse {}: {}", .path.display(), .reason)]
    Traversal { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

impl Error {
    pub fn setup(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Setup { path: path.into(), reason: reason.to_string() }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::IndexCorrupt { path: path.into(), reason: reason.to_string() }
    }

    pub fn syntax(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::QuerySyntax { token: token.into(), reason: reason.into() }
    }

    /// True for failures that must abort the whole run rather than one document or query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Setup { .. }
                | Error::IndexNotFound { .. }
                | Error::IndexCorrupt { .. }
                | Error::Traversal { .. }
                | Error::Io(_)
                | Error::Encode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_errors_are_not_fatal() {
        assert!(!Error::EmptyQuery.is_fatal());
        assert!(!Error::DuplicateDocument { id: "a".into() }.is_fatal());
        assert!(!Error::syntax("(", "grouping is not supported").is_fatal());
        assert!(Error::IndexNotFound { path: "/nope".into() }.is_fatal());
    }

    #[test]
    fn syntax_error_names_the_token() {
        let msg = Error::syntax("foo^x", "invalid boost").to_string();
        assert!(msg.contains("foo^x"));
    }
}
