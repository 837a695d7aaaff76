use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::{DocId, DocMeta, IndexView, InvertedIndex, Posting};
use crate::persist::{self, IndexPaths, MetaFile, TermEntry};
use crate::tokenizer::Analyzer;

/// Read-only snapshot of one committed generation.
///
/// Everything is loaded into memory on open; posting lists are decoded on demand, so a
/// query touches only the lists of its own terms. The snapshot is immutable and can be
/// shared between threads without locking.
#[derive(Debug)]
pub struct IndexReader {
    gen_dir: PathBuf,
    meta: MetaFile,
    terms: Vec<TermEntry>,
    dictionary: HashMap<String, usize>,
    docs: Vec<DocMeta>,
    doc_id_map: HashMap<String, DocId>,
    postings: Vec<u8>,
}

impl IndexReader {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        if !paths.root.is_dir() {
            return Err(Error::IndexNotFound { path: paths.root });
        }
        let generation = persist::current_generation(&paths)?
            .ok_or_else(|| Error::IndexNotFound { path: paths.root.clone() })?;
        let gen_dir = paths.generation(generation);
        if !gen_dir.is_dir() {
            return Err(Error::corrupt(&gen_dir, "CURRENT points at a missing generation"));
        }

        let meta = persist::load_meta(&gen_dir)?;
        let dict_path = persist::dictionary_path(&gen_dir);
        let terms: Vec<TermEntry> = persist::decode(&dict_path, &persist::read_checked(&dict_path)?)?;
        let docs_path = persist::docs_path(&gen_dir);
        let docs: Vec<DocMeta> = persist::decode(&docs_path, &persist::read_checked(&docs_path)?)?;
        let postings = persist::read_checked(&persist::postings_path(&gen_dir))?;

        if meta.generation != generation {
            return Err(Error::corrupt(&gen_dir, "generation number does not match CURRENT"));
        }
        if docs.len() != meta.num_docs as usize || terms.len() != meta.num_terms as usize {
            return Err(Error::corrupt(&gen_dir, "document or term count disagrees with meta.json"));
        }
        let total_tokens: u64 = docs.iter().map(|d| d.token_count as u64).sum();
        if total_tokens != meta.total_tokens {
            return Err(Error::corrupt(&gen_dir, "token count disagrees with meta.json"));
        }

        let mut dictionary = HashMap::with_capacity(terms.len());
        for (slot, entry) in terms.iter().enumerate() {
            let end = entry.offset.checked_add(entry.len);
            if end.map_or(true, |end| end > postings.len() as u64) {
                return Err(Error::corrupt(&dict_path, format!("posting list of {:?} is out of bounds", entry.term)));
            }
            if entry.df == 0 || entry.df > meta.num_docs {
                return Err(Error::corrupt(&dict_path, format!("impossible document frequency for {:?}", entry.term)));
            }
            if dictionary.insert(entry.term.clone(), slot).is_some() {
                return Err(Error::corrupt(&dict_path, format!("term {:?} appears twice", entry.term)));
            }
        }
        let mut doc_id_map = HashMap::with_capacity(docs.len());
        for (doc_id, doc) in docs.iter().enumerate() {
            if doc_id_map.insert(doc.external_id.clone(), doc_id as DocId).is_some() {
                return Err(Error::corrupt(&docs_path, format!("document {:?} appears twice", doc.external_id)));
            }
        }

        tracing::debug!(generation, num_docs = meta.num_docs, num_terms = meta.num_terms, "opened index");
        Ok(Self { gen_dir, meta, terms, dictionary, docs, doc_id_map, postings })
    }

    pub fn meta(&self) -> &MetaFile { &self.meta }

    pub fn config(&self) -> &IndexConfig { &self.meta.config }

    /// Analyzer matching the one the index was built with.
    pub fn analyzer(&self) -> Analyzer { Analyzer::new(self.meta.config.analyzer.clone()) }

    pub fn generation(&self) -> u64 { self.meta.generation }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.dictionary.get(term).map_or(0, |&slot| self.terms[slot].df)
    }

    pub fn doc_by_external_id(&self, external_id: &str) -> Option<&DocMeta> {
        self.doc_id_map.get(external_id).and_then(|&id| self.docs.get(id as usize))
    }

    fn decode_postings(&self, entry: &TermEntry) -> Result<Vec<Posting>> {
        let start = entry.offset as usize;
        let end = start + entry.len as usize;
        let path = persist::postings_path(&self.gen_dir);
        let list: Vec<Posting> = persist::decode(&path, &self.postings[start..end])?;
        if list.len() != entry.df as usize {
            return Err(Error::corrupt(&path, format!("posting list of {:?} disagrees with its df", entry.term)));
        }
        if list.iter().any(|p| p.doc_id >= self.meta.num_docs || p.tf == 0) {
            return Err(Error::corrupt(&path, format!("invalid posting for {:?}", entry.term)));
        }
        Ok(list)
    }

    /// Materialize the whole snapshot as a mutable index, for appending.
    pub fn to_index(&self) -> Result<InvertedIndex> {
        let mut postings = Vec::with_capacity(self.terms.len());
        for entry in &self.terms {
            postings.push(self.decode_postings(entry)?);
        }
        Ok(InvertedIndex {
            dictionary: self.dictionary.iter().map(|(t, &slot)| (t.clone(), slot as u32)).collect(),
            terms: self.terms.iter().map(|e| e.term.clone()).collect(),
            postings,
            docs: self.docs.clone(),
            doc_id_map: self.doc_id_map.clone(),
            total_tokens: self.meta.total_tokens,
        })
    }
}

impl IndexView for IndexReader {
    fn num_docs(&self) -> u32 { self.meta.num_docs }

    fn total_tokens(&self) -> u64 { self.meta.total_tokens }

    fn doc(&self, doc_id: DocId) -> Option<&DocMeta> { self.docs.get(doc_id as usize) }

    fn postings(&self, term: &str) -> Result<Option<Cow<'_, [Posting]>>> {
        match self.dictionary.get(term) {
            Some(&slot) => Ok(Some(Cow::Owned(self.decode_postings(&self.terms[slot])?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::{IndexBuilder, NewDocument};
    use std::fs;
    use tempfile::tempdir;

    fn commit_sample(root: &Path) {
        let mut b = IndexBuilder::new(IndexConfig::default());
        b.add_text(NewDocument::new("a"), "apple banana").unwrap();
        b.add_text(NewDocument::new("b"), "apple apple").unwrap();
        persist::save_generation(&IndexPaths::new(root), b.index(), b.config(), 1).unwrap();
    }

    #[test]
    fn round_trips_statistics_and_postings() {
        let dir = tempdir().unwrap();
        commit_sample(dir.path());
        let reader = IndexReader::open(dir.path()).unwrap();
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(reader.total_tokens(), 4);
        assert_eq!(reader.doc_freq("apple"), 2);
        let apple = reader.postings("apple").unwrap().unwrap();
        assert_eq!(apple.iter().map(|p| p.tf).collect::<Vec<_>>(), vec![1, 2]);
        assert!(reader.postings("cherry").unwrap().is_none());
        assert_eq!(reader.doc_by_external_id("b").unwrap().token_count, 2);
    }

    #[test]
    fn missing_index_is_not_found() {
        let dir = tempdir().unwrap();
        assert!(matches!(IndexReader::open(dir.path().join("nope")), Err(Error::IndexNotFound { .. })));
        assert!(matches!(IndexReader::open(dir.path()), Err(Error::IndexNotFound { .. })));
    }

    #[test]
    fn truncated_postings_are_corrupt() {
        let dir = tempdir().unwrap();
        commit_sample(dir.path());
        let path = persist::postings_path(&IndexPaths::new(dir.path()).generation(1));
        let raw = fs::read(&path).unwrap();
        fs::write(&path, &raw[..raw.len() / 2]).unwrap();
        assert!(matches!(IndexReader::open(dir.path()), Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn dangling_current_is_corrupt() {
        let dir = tempdir().unwrap();
        commit_sample(dir.path());
        fs::write(IndexPaths::new(dir.path()).current(), r#"{"generation": 7}"#).unwrap();
        assert!(matches!(IndexReader::open(dir.path()), Err(Error::IndexCorrupt { .. })));
    }

    #[test]
    fn to_index_restores_the_build() {
        let dir = tempdir().unwrap();
        commit_sample(dir.path());
        let reader = IndexReader::open(dir.path()).unwrap();
        let index = reader.to_index().unwrap();
        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.doc_freq("banana"), 1);
        assert!(index.contains_doc("a"));
    }
}
