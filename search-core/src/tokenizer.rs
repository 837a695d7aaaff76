use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use crate::config::AnalyzerConfig;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{M}\p{N}]+").expect("valid regex");
    // The English stop set used by Lucene's StandardAnalyzer.
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","an","and","are","as","at","be","but","by","for","if","in","into","is","it",
            "no","not","of","on","or","such","that","the","their","then","there","these",
            "they","this","to","was","will","with",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// A normalized term and its position among all raw tokens of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Turns raw text into normalized terms according to an [`AnalyzerConfig`].
pub struct Analyzer {
    config: AnalyzerConfig,
    stemmer: Option<Stemmer>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer").field("config", &self.config).finish()
    }
}

impl Default for Analyzer {
    fn default() -> Self { Self::new(AnalyzerConfig::default()) }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));
        Self { config, stemmer }
    }

    pub fn config(&self) -> &AnalyzerConfig { &self.config }

    /// Lazily split `text` on non-alphanumeric boundaries and normalize each piece
    /// (NFKC, lowercase, optional stopword removal and stemming).
    ///
    /// Positions count every raw token, so removed stopwords leave gaps.
    pub fn tokenize<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Token> + 'a {
        RE.find_iter(text).enumerate().filter_map(move |(pos, mat)| {
            self.normalize(mat.as_str()).map(|term| Token { term, position: pos as u32 })
        })
    }

    /// Normalize a single raw token, or `None` if it should not be indexed.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let token: String = raw.nfkc().flat_map(char::to_lowercase).collect();
        if token.is_empty() || token.chars().count() > self.config.max_token_len {
            return None;
        }
        if self.config.remove_stopwords && is_stopword(&token) {
            return None;
        }
        match &self.stemmer {
            Some(stemmer) => Some(stemmer.stem(&token).into_owned()),
            None => Some(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(analyzer: &Analyzer, text: &str) -> Vec<String> {
        analyzer.tokenize(text).map(|t| t.term).collect()
    }

    #[test]
    fn basic_tokenize() {
        let a = Analyzer::default();
        assert_eq!(terms(&a, "Hello, World! x86-64"), vec!["hello", "world", "x86", "64"]);
    }

    #[test]
    fn positions_skip_stopwords() {
        let a = Analyzer::default();
        let toks: Vec<Token> = a.tokenize("the apple of my eye").collect();
        assert_eq!(toks[0], Token { term: "apple".into(), position: 1 });
        assert_eq!(toks[1], Token { term: "my".into(), position: 3 });
    }

    #[test]
    fn stopwords_can_be_kept() {
        let a = Analyzer::new(AnalyzerConfig { remove_stopwords: false, ..Default::default() });
        assert_eq!(terms(&a, "The End"), vec!["the", "end"]);
    }

    #[test]
    fn stemming_is_optional() {
        let a = Analyzer::new(AnalyzerConfig { stem: true, ..Default::default() });
        assert_eq!(terms(&a, "Running runs"), vec!["run", "run"]);
        assert_eq!(terms(&Analyzer::default(), "Running"), vec!["running"]);
    }

    #[test]
    fn long_tokens_are_dropped() {
        let a = Analyzer::new(AnalyzerConfig { max_token_len: 4, ..Default::default() });
        assert_eq!(terms(&a, "tiny enormous"), vec!["tiny"]);
    }

    #[test]
    fn garbage_degrades_to_empty() {
        let a = Analyzer::default();
        assert!(terms(&a, "").is_empty());
        assert!(terms(&a, "!!! --- \u{0}\u{1}").is_empty());
    }

    #[test]
    fn tokenize_is_restartable() {
        let a = Analyzer::default();
        let text = "Fish, chips & mushy peas";
        assert_eq!(terms(&a, text), terms(&a, text));
    }
}
