use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::tokenizer::{Analyzer, Token};

pub type TermId = u32;
pub type DocId = u32;

/// Stored fields of an indexed document. Not used for scoring except `token_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub path: String,
    pub filename: String,
    /// Length of the raw source text in bytes.
    pub byte_len: u64,
    pub token_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    /// Empty unless the index stores positions.
    pub positions: Vec<u32>,
}

/// Identity and stored fields of a document about to be added.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub external_id: String,
    pub path: String,
    pub filename: String,
    pub byte_len: u64,
}

impl NewDocument {
    pub fn new(external_id: impl Into<String>) -> Self {
        let external_id = external_id.into();
        Self { path: external_id.clone(), filename: external_id.clone(), external_id, byte_len: 0 }
    }
}

/// Read access shared by the in-memory index and committed snapshots.
pub trait IndexView {
    fn num_docs(&self) -> u32;
    fn total_tokens(&self) -> u64;
    fn doc(&self, doc_id: DocId) -> Option<&DocMeta>;
    /// Posting list of `term` ordered by doc id, or `None` if the term is not in the dictionary.
    fn postings(&self, term: &str) -> Result<Option<Cow<'_, [Posting]>>>;

    fn avg_doc_len(&self) -> f32 {
        match self.num_docs() {
            0 => 0.0,
            n => self.total_tokens() as f32 / n as f32,
        }
    }
}

/// Term dictionary, posting lists and collection statistics as one unit.
///
/// Document frequency is the length of a term's posting list and the document count is the
/// length of `docs`, so the statistics cannot drift from the postings.
#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    pub(crate) dictionary: HashMap<String, TermId>,
    pub(crate) terms: Vec<String>,
    pub(crate) postings: Vec<Vec<Posting>>, // by term id, sorted by doc_id
    pub(crate) docs: Vec<DocMeta>,          // by doc id
    pub(crate) doc_id_map: HashMap<String, DocId>,
    pub(crate) total_tokens: u64,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn num_terms(&self) -> usize { self.terms.len() }

    pub fn contains_doc(&self, external_id: &str) -> bool { self.doc_id_map.contains_key(external_id) }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.dictionary.get(term).map_or(0, |&tid| self.postings[tid as usize].len() as u32)
    }

    pub fn docs(&self) -> &[DocMeta] { &self.docs }

    /// Add one document. Returns the number of term occurrences indexed.
    ///
    /// A duplicate id is rejected before anything is touched.
    pub fn add_document<I>(&mut self, doc: NewDocument, tokens: I, store_positions: bool) -> Result<usize>
    where
        I: IntoIterator<Item = Token>,
    {
        if self.doc_id_map.contains_key(&doc.external_id) {
            return Err(Error::DuplicateDocument { id: doc.external_id });
        }
        let doc_id = self.docs.len() as DocId;

        // Per-document accumulation in first-occurrence order.
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut local: Vec<(String, u32, Vec<u32>)> = Vec::new();
        let mut count = 0usize;
        for Token { term, position } in tokens {
            count += 1;
            let slot = match slots.get(&term) {
                Some(&slot) => slot,
                None => {
                    slots.insert(term.clone(), local.len());
                    local.push((term, 0, Vec::new()));
                    local.len() - 1
                }
            };
            let entry = &mut local[slot];
            entry.1 += 1;
            if store_positions {
                entry.2.push(position);
            }
        }

        for (term, tf, positions) in local {
            let tid = match self.dictionary.get(&term) {
                Some(&tid) => tid,
                None => {
                    let tid = self.terms.len() as TermId;
                    self.dictionary.insert(term.clone(), tid);
                    self.terms.push(term);
                    self.postings.push(Vec::new());
                    tid
                }
            };
            // doc ids only grow, so pushing keeps the list sorted
            self.postings[tid as usize].push(Posting { doc_id, tf, positions });
        }

        self.doc_id_map.insert(doc.external_id.clone(), doc_id);
        self.docs.push(DocMeta {
            external_id: doc.external_id,
            path: doc.path,
            filename: doc.filename,
            byte_len: doc.byte_len,
            token_count: count as u32,
        });
        self.total_tokens += count as u64;
        Ok(count)
    }

    /// `term -> external doc id -> tf`, independent of the order documents were added in.
    pub fn postings_map(&self) -> BTreeMap<&str, BTreeMap<&str, u32>> {
        self.terms
            .iter()
            .zip(&self.postings)
            .map(|(term, list)| {
                let by_doc = list
                    .iter()
                    .map(|p| (self.docs[p.doc_id as usize].external_id.as_str(), p.tf))
                    .collect();
                (term.as_str(), by_doc)
            })
            .collect()
    }
}

impl IndexView for InvertedIndex {
    fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    fn total_tokens(&self) -> u64 { self.total_tokens }

    fn doc(&self, doc_id: DocId) -> Option<&DocMeta> { self.docs.get(doc_id as usize) }

    fn postings(&self, term: &str) -> Result<Option<Cow<'_, [Posting]>>> {
        Ok(self.dictionary.get(term).map(|&tid| Cow::Borrowed(self.postings[tid as usize].as_slice())))
    }
}

/// Single-writer front end: owns the configuration, its analyzer and the index being built.
#[derive(Debug)]
pub struct IndexBuilder {
    config: IndexConfig,
    analyzer: Analyzer,
    index: InvertedIndex,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_index(config, InvertedIndex::new())
    }

    /// Continue building on top of an existing index.
    pub fn with_index(config: IndexConfig, index: InvertedIndex) -> Self {
        let analyzer = Analyzer::new(config.analyzer.clone());
        Self { config, analyzer, index }
    }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn into_index(self) -> InvertedIndex { self.index }

    pub fn add_document<I>(&mut self, doc: NewDocument, tokens: I) -> Result<usize>
    where
        I: IntoIterator<Item = Token>,
    {
        self.index.add_document(doc, tokens, self.config.store_positions)
    }

    /// Analyze `text` with the configured analyzer and add it. `byte_len` defaults to the
    /// length of `text` when the caller left it at zero.
    pub fn add_text(&mut self, mut doc: NewDocument, text: &str) -> Result<usize> {
        if doc.byte_len == 0 {
            doc.byte_len = text.len() as u64;
        }
        let id = doc.external_id.clone();
        let added = self.index.add_document(doc, self.analyzer.tokenize(text), self.config.store_positions)?;
        tracing::debug!(doc = %id, terms = added, "added document");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(docs: &[(&str, &str)]) -> InvertedIndex {
        let mut b = IndexBuilder::new(IndexConfig::default());
        for (id, text) in docs {
            b.add_text(NewDocument::new(*id), text).unwrap();
        }
        b.into_index()
    }

    #[test]
    fn merges_repeated_terms_into_one_posting() {
        let idx = build(&[("d1", "hello hello hello world")]);
        let postings = idx.postings("hello").unwrap().unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].tf, 3);
        assert!(postings[0].positions.is_empty());
    }

    #[test]
    fn tracks_collection_statistics() {
        let idx = build(&[("d1", "rust programming language"), ("d2", "python programming")]);
        assert_eq!(idx.num_docs(), 2);
        assert_eq!(idx.total_tokens(), 5);
        assert_eq!(idx.doc_freq("programming"), 2);
        assert_eq!(idx.doc_freq("rust"), 1);
        assert_eq!(idx.doc_freq("missing"), 0);
        assert_eq!(idx.doc(1).unwrap().token_count, 2);
        assert!((idx.avg_doc_len() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn posting_lists_are_sorted_by_doc_id() {
        let idx = build(&[("a", "x y"), ("b", "y"), ("c", "x y")]);
        let ids: Vec<DocId> = idx.postings("y").unwrap().unwrap().iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_ids_are_rejected_without_side_effects() {
        let mut b = IndexBuilder::new(IndexConfig::default());
        b.add_text(NewDocument::new("a"), "apple").unwrap();
        let err = b.add_text(NewDocument::new("a"), "banana").unwrap_err();
        assert!(matches!(err, Error::DuplicateDocument { ref id } if id == "a"));
        assert_eq!(b.index().num_docs(), 1);
        assert_eq!(b.index().doc_freq("banana"), 0);
        assert_eq!(b.index().total_tokens(), 1);
    }

    #[test]
    fn empty_document_still_counts() {
        let idx = build(&[("blank", "  ... ")]);
        assert_eq!(idx.num_docs(), 1);
        assert_eq!(idx.num_terms(), 0);
    }

    #[test]
    fn positions_are_kept_when_enabled() {
        let config = IndexConfig { store_positions: true, ..Default::default() };
        let mut b = IndexBuilder::new(config);
        b.add_text(NewDocument::new("d"), "echo the echo").unwrap();
        let postings = b.index().postings("echo").unwrap().unwrap().into_owned();
        assert_eq!(postings[0].tf, 2);
        assert_eq!(postings[0].positions, vec![0, 2]);
    }

    #[test]
    fn insertion_order_does_not_change_postings() {
        let a = ("A", "apple banana cherry");
        let b = ("B", "banana banana");
        let c = ("C", "cherry apple apple");
        let first = build(&[a, b, c]);
        let second = build(&[c, a, b]);
        assert_eq!(first.postings_map(), second.postings_map());
        assert_eq!(first.total_tokens(), second.total_tokens());
    }
}
