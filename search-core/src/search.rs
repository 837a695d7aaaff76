use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::config::Similarity;
use crate::error::Result;
use crate::index::{DocId, IndexView, Posting};
use crate::query::{Occur, Query};

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub doc_id: DocId,
    pub external_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    /// Number of matching documents before the top-k cut.
    pub total_hits: usize,
    /// Best first; ties broken by ascending external id.
    pub hits: Vec<Hit>,
}

#[derive(Default)]
struct Accumulator {
    score: f32,
    required: usize,
}

/// Per-term values shared by every posting of one query term.
struct TermStats {
    idf: f32,
    /// Share of all collection tokens that are this term.
    collection_prob: f32,
}

/// Heap entry ordered so that "greater" means "ranks higher".
struct Ranked<'a> {
    score: f32,
    external_id: &'a str,
    doc_id: DocId,
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.external_id.cmp(self.external_id))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Ranked<'_> {}

/// Term-at-a-time ranked retrieval over any [`IndexView`].
///
/// Only the posting lists of the query's terms are read, so the cost of a query follows the
/// length of those lists rather than the size of the collection.
pub struct Searcher<'a, I: IndexView + ?Sized> {
    index: &'a I,
    similarity: Similarity,
}

impl<'a, I: IndexView + ?Sized> Searcher<'a, I> {
    pub fn new(index: &'a I, similarity: Similarity) -> Self {
        Self { index, similarity }
    }

    fn idf(&self, df: u32) -> f32 {
        let n = self.index.num_docs() as f32;
        let df = df.max(1) as f32;
        match self.similarity {
            Similarity::TfIdf { smooth_idf: false } => (n / df).ln(),
            Similarity::TfIdf { smooth_idf: true } => (1.0 + n / df).ln(),
            Similarity::Bm25 { .. } => (1.0 + (n - df + 0.5) / (df + 0.5)).ln(),
            Similarity::QueryLikelihood { .. } => 0.0,
        }
    }

    fn term_stats(&self, list: &[Posting]) -> TermStats {
        let collection_prob = match self.similarity {
            Similarity::QueryLikelihood { .. } => {
                let cf: u64 = list.iter().map(|p| p.tf as u64).sum();
                let total = self.index.total_tokens().max(1) as f32;
                cf as f32 / total
            }
            _ => 0.0,
        };
        TermStats { idf: self.idf(list.len() as u32), collection_prob }
    }

    fn term_weight(&self, tf: u32, doc_len: u32, term: &TermStats, avg_doc_len: f32) -> f32 {
        let tf = tf as f32;
        match self.similarity {
            Similarity::TfIdf { .. } => tf * term.idf,
            Similarity::Bm25 { k1, b } => {
                let norm = if avg_doc_len > 0.0 { doc_len as f32 / avg_doc_len } else { 1.0 };
                term.idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * norm))
            }
            // ln(1 + (1-l)P(t|d) / (l P(t|C))): the full smoothed log-likelihood minus a part
            // every document shares, so ranks match and absent terms add nothing
            Similarity::QueryLikelihood { lambda } => {
                if doc_len == 0 || term.collection_prob <= 0.0 {
                    return 0.0;
                }
                let doc_prob = tf / doc_len as f32;
                ((1.0 - lambda) * doc_prob / (lambda * term.collection_prob)).ln_1p()
            }
        }
    }

    /// Score every document containing at least one scoring query term and return the best
    /// `k`. Required and prohibited clauses filter the candidates.
    pub fn search(&self, query: &Query, k: usize) -> Result<TopDocs> {
        let avg_doc_len = self.index.avg_doc_len();
        let required_clauses = query.required().count();

        let mut excluded: HashSet<DocId> = HashSet::new();
        for clause in query.prohibited() {
            if let Some(list) = self.index.postings(&clause.term)? {
                excluded.extend(list.iter().map(|p| p.doc_id));
            }
        }

        let mut acc: HashMap<DocId, Accumulator> = HashMap::new();
        for clause in query.scoring() {
            let Some(list) = self.index.postings(&clause.term)? else {
                if clause.occur == Occur::Must {
                    // a required term nobody contains
                    return Ok(TopDocs::default());
                }
                continue;
            };
            let stats = self.term_stats(&list);
            for p in list.iter() {
                if excluded.contains(&p.doc_id) {
                    continue;
                }
                let doc_len = self.index.doc(p.doc_id).map_or(0, |d| d.token_count);
                let entry = acc.entry(p.doc_id).or_default();
                entry.score += clause.boost * self.term_weight(p.tf, doc_len, &stats, avg_doc_len);
                if clause.occur == Occur::Must {
                    entry.required += 1;
                }
            }
        }

        let mut total_hits = 0usize;
        let mut heap: BinaryHeap<Reverse<Ranked<'_>>> = BinaryHeap::with_capacity(k.saturating_add(1).min(1024));
        for (doc_id, a) in acc {
            if a.required < required_clauses {
                continue;
            }
            let Some(doc) = self.index.doc(doc_id) else { continue };
            total_hits += 1;
            if k == 0 {
                continue;
            }
            heap.push(Reverse(Ranked { score: a.score, external_id: &doc.external_id, doc_id }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let hits = heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| Hit { doc_id: r.doc_id, external_id: r.external_id.to_string(), score: r.score })
            .collect();
        Ok(TopDocs { total_hits, hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::{IndexBuilder, InvertedIndex, NewDocument};
    use crate::query::QueryParser;
    use crate::tokenizer::Analyzer;

    fn build(docs: &[(&str, &str)]) -> InvertedIndex {
        let mut b = IndexBuilder::new(IndexConfig::default());
        for (id, text) in docs {
            b.add_text(NewDocument::new(*id), text).unwrap();
        }
        b.into_index()
    }

    fn run(index: &InvertedIndex, similarity: Similarity, q: &str, k: usize) -> TopDocs {
        let query = QueryParser::new(Analyzer::default()).parse(q).unwrap();
        Searcher::new(index, similarity).search(&query, k).unwrap()
    }

    fn ids(top: &TopDocs) -> Vec<&str> {
        top.hits.iter().map(|h| h.external_id.as_str()).collect()
    }

    #[test]
    fn higher_tf_ranks_first() {
        let index = build(&[("doc2", "term"), ("doc1", "term term")]);
        let top = run(&index, Similarity::default(), "term", 10);
        assert_eq!(ids(&top), vec!["doc1", "doc2"]);
        assert!(top.hits[0].score > top.hits[1].score);
        // same idf on both sides: the score ratio is the tf ratio
        assert!((top.hits[0].score / top.hits[1].score - 2.0).abs() < 1e-5);
    }

    #[test]
    fn raw_idf_matches_formula() {
        let index = build(&[("a", "x x y"), ("b", "y"), ("c", "z")]);
        let top = run(&index, Similarity::TfIdf { smooth_idf: false }, "x", 10);
        let expected = 2.0 * (3.0f32 / 1.0).ln();
        assert_eq!(ids(&top), vec!["a"]);
        assert!((top.hits[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn ties_break_on_ascending_id() {
        let index = build(&[("zeta", "same words"), ("alpha", "same words"), ("mid", "same words")]);
        let top = run(&index, Similarity::default(), "same", 10);
        assert_eq!(ids(&top), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn fewer_matches_than_k_are_not_padded() {
        let index = build(&[("a", "apple"), ("b", "apple pie"), ("c", "cherry")]);
        let top = run(&index, Similarity::default(), "apple", 3);
        assert_eq!(top.hits.len(), 2);
        assert_eq!(top.total_hits, 2);
    }

    #[test]
    fn k_zero_is_empty() {
        let index = build(&[("a", "apple")]);
        let top = run(&index, Similarity::default(), "apple", 0);
        assert!(top.hits.is_empty());
        assert_eq!(top.total_hits, 1);
    }

    #[test]
    fn top_k_keeps_the_best() {
        let index = build(&[("a", "w"), ("b", "w w w"), ("c", "w w"), ("d", "w w w w")]);
        let top = run(&index, Similarity::default(), "w", 2);
        assert_eq!(ids(&top), vec!["d", "b"]);
        assert_eq!(top.total_hits, 4);
    }

    #[test]
    fn non_matching_documents_are_excluded() {
        let index = build(&[("a", "apple"), ("b", "banana")]);
        let top = run(&index, Similarity::default(), "apple kiwi", 10);
        assert_eq!(ids(&top), vec!["a"]);
    }

    #[test]
    fn required_and_prohibited_clauses_filter() {
        let index = build(&[("a", "apple banana"), ("b", "apple"), ("c", "banana cherry")]);
        assert_eq!(ids(&run(&index, Similarity::default(), "+apple +banana", 10)), vec!["a"]);
        assert_eq!(ids(&run(&index, Similarity::default(), "banana -cherry", 10)), vec!["a"]);
        assert!(run(&index, Similarity::default(), "+kiwi apple", 10).hits.is_empty());
    }

    #[test]
    fn boost_scales_contribution() {
        let index = build(&[("a", "apple"), ("b", "banana"), ("c", "cherry")]);
        let top = run(&index, Similarity::default(), "apple banana^3", 10);
        assert_eq!(ids(&top), vec!["b", "a"]);
    }

    #[test]
    fn bm25_prefers_shorter_documents() {
        let index = build(&[("long", "apple one two three four five six"), ("short", "apple seven")]);
        let top = run(&index, Similarity::bm25(), "apple", 10);
        assert_eq!(ids(&top), vec!["short", "long"]);
        assert!(top.hits.iter().all(|h| h.score > 0.0));
    }

    #[test]
    fn query_likelihood_follows_jelinek_mercer() {
        let index = build(&[("long", "apple one two three four five six"), ("short", "apple seven"), ("none", "pear")]);
        let top = run(&index, Similarity::query_likelihood(), "apple", 10);
        assert_eq!(ids(&top), vec!["short", "long"]);

        // two apples among ten collection tokens, lambda 0.35
        let collection = 0.35 * 2.0 / 10.0;
        let expected = |tf: f32, len: f32| (1.0f32 + 0.65 * tf / len / collection).ln();
        assert!((top.hits[0].score - expected(1.0, 2.0)).abs() < 1e-4);
        assert!((top.hits[1].score - expected(1.0, 7.0)).abs() < 1e-4);
    }

    #[test]
    fn query_likelihood_ranks_like_the_full_log_likelihood() {
        let index = build(&[("a", "cat cat dog"), ("b", "cat dog dog dog"), ("c", "dog bird")]);
        let top = run(&index, Similarity::query_likelihood(), "cat dog", 10);

        // sum over query terms of ln((1-l) tf/|D| + l cf/|C|), computed for every document
        let full = |tfs: [f32; 2], len: f32| {
            let cf = [3.0f32, 5.0];
            (0..2).map(|i| (0.65 * tfs[i] / len + 0.35 * cf[i] / 9.0).ln()).sum::<f32>()
        };
        let mut reference = vec![("a", full([2.0, 1.0], 3.0)), ("b", full([1.0, 3.0], 4.0)), ("c", full([0.0, 1.0], 2.0))];
        reference.sort_by(|x, y| y.1.total_cmp(&x.1));
        let expected: Vec<&str> = reference.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids(&top), expected);
    }
}
