//! Parser for the small query language accepted by the searcher.
//!
//! - whitespace separates clauses; `OR` is the default operator
//! - `+term` is required, `-term` and `NOT term` are prohibited
//! - `a AND b` makes both sides required
//! - `contents:term` names the field explicitly (it is the only field)
//! - `term^2.5` boosts a clause
//!
//! Each clause's text goes through the index analyzer, so one clause can yield several
//! terms (`e-mail` -> `e`, `mail`) or none (stopwords).

use crate::error::{Error, Result};
use crate::tokenizer::Analyzer;

pub const DEFAULT_FIELD: &str = "contents";

const RESERVED: &[char] = &['(', ')', '[', ']', '{', '}', '"', '~', '*', '\\', ':', '^'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub term: String,
    pub field: Option<String>,
    pub boost: f32,
    pub occur: Occur,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn required(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.occur == Occur::Must)
    }

    pub fn prohibited(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.occur == Occur::MustNot)
    }

    /// Clauses that contribute to the score.
    pub fn scoring(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.occur != Occur::MustNot)
    }
}

/// One whitespace-delimited word before analysis.
struct RawClause<'a> {
    word: &'a str,
    text: &'a str,
    field: Option<String>,
    boost: f32,
    occur: Occur,
    explicit: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Conjunction {
    And,
    Or,
}

#[derive(Debug)]
pub struct QueryParser {
    analyzer: Analyzer,
}

impl QueryParser {
    pub fn new(analyzer: Analyzer) -> Self { Self { analyzer } }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn parse(&self, text: &str) -> Result<Query> {
        if text.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let mut raw: Vec<RawClause<'_>> = Vec::new();
        let mut pending: Option<(Conjunction, &str)> = None;
        let mut negate: Option<&str> = None;
        for word in text.split_whitespace() {
            match word {
                "AND" | "OR" => {
                    if raw.is_empty() || pending.is_some() || negate.is_some() {
                        return Err(Error::syntax(word, "operator needs a term on both sides"));
                    }
                    if word == "AND" {
                        if let Some(last) = raw.last_mut() {
                            if last.occur == Occur::Should {
                                last.occur = Occur::Must;
                            }
                        }
                        pending = Some((Conjunction::And, word));
                    } else {
                        pending = Some((Conjunction::Or, word));
                    }
                }
                "NOT" => {
                    if negate.is_some() {
                        return Err(Error::syntax(word, "repeated NOT"));
                    }
                    negate = Some(word);
                }
                _ => {
                    let mut clause = parse_word(word)?;
                    if negate.is_some() {
                        if clause.explicit {
                            return Err(Error::syntax(word, "conflicting operators"));
                        }
                        clause.occur = Occur::MustNot;
                    } else if matches!(pending, Some((Conjunction::And, _))) && clause.occur == Occur::Should {
                        clause.occur = Occur::Must;
                    }
                    raw.push(clause);
                    pending = None;
                    negate = None;
                }
            }
        }
        if let Some((_, op)) = pending {
            return Err(Error::syntax(op, "operator needs a term on both sides"));
        }
        if let Some(op) = negate {
            return Err(Error::syntax(op, "NOT needs a term to exclude"));
        }

        let mut clauses = Vec::new();
        for rc in raw {
            let before = clauses.len();
            for token in self.analyzer.tokenize(rc.text) {
                clauses.push(Clause { term: token.term, field: rc.field.clone(), boost: rc.boost, occur: rc.occur });
            }
            if clauses.len() == before {
                tracing::debug!(word = rc.word, "query word analyzed to nothing");
            }
        }

        let query = Query { clauses };
        if query.scoring().next().is_none() {
            return Err(Error::EmptyQuery);
        }
        Ok(query)
    }
}

fn parse_word(word: &str) -> Result<RawClause<'_>> {
    let (occur, explicit, rest) = match word.as_bytes()[0] {
        b'+' => (Occur::Must, true, &word[1..]),
        b'-' => (Occur::MustNot, true, &word[1..]),
        _ => (Occur::Should, false, word),
    };
    if rest.is_empty() {
        return Err(Error::syntax(word, "operator without a term"));
    }
    if rest.starts_with('+') || rest.starts_with('-') {
        return Err(Error::syntax(word, "stacked operators"));
    }

    let (field, rest) = match rest.split_once(':') {
        Some((field, term)) => {
            if field.is_empty() || term.is_empty() {
                return Err(Error::syntax(word, "field and term must both be present"));
            }
            if field != DEFAULT_FIELD {
                return Err(Error::syntax(word, format!("unknown field {field:?}")));
            }
            (Some(field.to_string()), term)
        }
        None => (None, rest),
    };

    let (text, boost) = match rest.rsplit_once('^') {
        Some((text, boost)) => {
            let boost: f32 = boost
                .parse()
                .ok()
                .filter(|b: &f32| b.is_finite() && *b > 0.0)
                .ok_or_else(|| Error::syntax(word, "boost must be a positive number"))?;
            if text.is_empty() {
                return Err(Error::syntax(word, "boost without a term"));
            }
            (text, boost)
        }
        None => (rest, 1.0),
    };

    if let Some(c) = text.chars().find(|c| RESERVED.contains(c)) {
        return Err(Error::syntax(word, format!("unsupported syntax {c:?}")));
    }
    Ok(RawClause { word, text, field, boost, occur, explicit })
}
