use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::{IndexBuilder, IndexView, InvertedIndex, NewDocument};
use crate::persist::{self, IndexPaths, MetaFile};
use crate::reader::IndexReader;
use crate::tokenizer::Token;

/// Exclusive write access to an index directory, released on drop.
#[derive(Debug)]
struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    fn acquire(paths: &IndexPaths) -> Result<Self> {
        let path = paths.lock();
        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => Error::setup(&paths.root, "index is locked by another writer"),
                _ => Error::setup(&paths.root, e),
            })?;
        let _ = writeln!(f, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Outcome of a [`IndexWriter::commit`].
#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub generation: u64,
    pub num_docs: u32,
    pub num_terms: u32,
    /// Documents added since the previous commit.
    pub added: u32,
}

/// Builds or appends to the index at one path. Changes become visible to readers only
/// through [`IndexWriter::commit`].
#[derive(Debug)]
pub struct IndexWriter {
    paths: IndexPaths,
    builder: IndexBuilder,
    generation: u64,
    committed_docs: u32,
    _lock: WriteLock,
}

impl IndexWriter {
    /// Open the index at `root` for appending, or start an empty one.
    ///
    /// An existing index keeps the configuration it was built with; `config` only applies
    /// to new indexes.
    pub fn open_or_create<P: AsRef<Path>>(root: P, config: IndexConfig) -> Result<Self> {
        let paths = IndexPaths::new(root);
        fs::create_dir_all(&paths.root).map_err(|e| Error::setup(&paths.root, e))?;
        let lock = WriteLock::acquire(&paths)?;

        let (builder, generation) = match IndexReader::open(&paths.root) {
            Ok(reader) => {
                if reader.config() != &config {
                    tracing::warn!(
                        stored = ?reader.config(),
                        requested = ?config,
                        "index already exists; keeping its stored configuration"
                    );
                }
                let index = reader.to_index()?;
                tracing::info!(
                    path = %paths.root.display(),
                    generation = reader.generation(),
                    num_docs = index.num_docs(),
                    "appending to existing index"
                );
                (IndexBuilder::with_index(reader.config().clone(), index), reader.generation())
            }
            Err(Error::IndexNotFound { .. }) => {
                tracing::info!(path = %paths.root.display(), "creating new index");
                (IndexBuilder::new(config), 0)
            }
            Err(e) => return Err(e),
        };
        let committed_docs = builder.index().num_docs();
        Ok(Self { paths, builder, generation, committed_docs, _lock: lock })
    }

    pub fn root(&self) -> &Path { &self.paths.root }

    pub fn config(&self) -> &IndexConfig { self.builder.config() }

    pub fn index(&self) -> &InvertedIndex { self.builder.index() }

    /// Documents added since the last commit.
    pub fn pending_docs(&self) -> u32 { self.builder.index().num_docs() - self.committed_docs }

    pub fn contains_doc(&self, external_id: &str) -> bool { self.builder.index().contains_doc(external_id) }

    pub fn add_document<I>(&mut self, doc: NewDocument, tokens: I) -> Result<usize>
    where
        I: IntoIterator<Item = Token>,
    {
        self.builder.add_document(doc, tokens)
    }

    pub fn add_text(&mut self, doc: NewDocument, text: &str) -> Result<usize> {
        self.builder.add_text(doc, text)
    }

    /// Atomically publish everything added so far as a new generation.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        let next = self.generation + 1;
        let meta: MetaFile = persist::save_generation(&self.paths, self.builder.index(), self.builder.config(), next)?;
        let added = meta.num_docs - self.committed_docs;
        self.generation = next;
        self.committed_docs = meta.num_docs;
        tracing::info!(generation = next, num_docs = meta.num_docs, num_terms = meta.num_terms, added, "committed index");
        Ok(CommitSummary { generation: next, num_docs: meta.num_docs, num_terms: meta.num_terms, added })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_writer_is_refused() {
        let dir = tempdir().unwrap();
        let _first = IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap();
        let second = IndexWriter::open_or_create(dir.path(), IndexConfig::default());
        assert!(matches!(second, Err(Error::Setup { .. })));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap());
        assert!(!IndexPaths::new(dir.path()).lock().exists());
        IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap();
    }

    #[test]
    fn uncommitted_documents_are_invisible() {
        let dir = tempdir().unwrap();
        let mut w = IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap();
        w.add_text(NewDocument::new("a"), "apple").unwrap();
        assert_eq!(w.pending_docs(), 1);
        assert!(matches!(IndexReader::open(dir.path()), Err(Error::IndexNotFound { .. })));
        let summary = w.commit().unwrap();
        assert_eq!((summary.generation, summary.added), (1, 1));
        assert_eq!(w.pending_docs(), 0);
        assert_eq!(IndexReader::open(dir.path()).unwrap().num_docs(), 1);
    }

    #[test]
    fn failed_commit_keeps_previous_generation() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut w = IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap();
        w.add_text(NewDocument::new("a"), "apple").unwrap();
        w.commit().unwrap();

        // a directory where CURRENT.tmp should go makes publishing fail
        fs::create_dir(dir.path().join("CURRENT.tmp")).unwrap();
        w.add_text(NewDocument::new("b"), "banana").unwrap();
        assert!(w.commit().is_err());

        assert!(!paths.generation(2).exists());
        let reader = IndexReader::open(dir.path()).unwrap();
        assert_eq!(reader.generation(), 1);
        assert_eq!(reader.num_docs(), 1);
        assert_eq!(reader.doc_freq("banana"), 0);
    }

    #[test]
    fn stored_configuration_wins_on_append() {
        let dir = tempdir().unwrap();
        let custom = IndexConfig { store_positions: true, ..Default::default() };
        let mut w = IndexWriter::open_or_create(dir.path(), custom.clone()).unwrap();
        w.commit().unwrap();
        drop(w);
        let w = IndexWriter::open_or_create(dir.path(), IndexConfig::default()).unwrap();
        assert_eq!(w.config(), &custom);
    }
}
