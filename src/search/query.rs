//! Free-text query translation
//!
//! Turns a search box string such as `timeout OR refused NOT healthcheck` into
//! an Elasticsearch `bool` query. Precedence is positional rather than
//! boolean:
//!
//! 1. Every ` NOT ` splits the query. Text before the first one is the working
//!    query; each later fragment is negated up to its first ` AND `/` OR `,
//!    and anything after that boundary in the fragment is dropped.
//! 2. The working query is split on ` AND `/` OR `. The first part is always
//!    MUST; later parts are MUST after `AND` and SHOULD after `OR`.
//! 3. SHOULD clauses require at least one match alongside all MUST clauses.
//!
//! Saved searches rely on this ordering; it is not standard boolean precedence.
//!
//! Keywords are case-insensitive and only count when surrounded by whitespace.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

pub const MESSAGE_FIELD: &str = "message";
pub const SOURCE_FIELD: &str = "source";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Errors raised by [`BoolClauses::parse`]. Never surfaced to API callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryParseError {
    #[error("query contains no searchable terms: {0:?}")]
    NoTerms(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    fn from_word(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("AND") {
            Some(Operator::And)
        } else if word.eq_ignore_ascii_case("OR") {
            Some(Operator::Or)
        } else if word.eq_ignore_ascii_case("NOT") {
            Some(Operator::Not)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Space,
}

/// Byte span of a whitespace run or a run of non-whitespace characters
#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (idx, ch) in input.char_indices() {
        let kind = if ch.is_whitespace() {
            TokenKind::Space
        } else {
            TokenKind::Word
        };
        let end = idx + ch.len_utf8();

        match tokens.last_mut() {
            Some(last) if last.kind == kind => last.end = end,
            _ => tokens.push(Token {
                kind,
                start: idx,
                end,
            }),
        }
    }

    tokens
}

/// An operator keyword together with the whitespace it consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Separator {
    op: Operator,
    start: usize,
    end: usize,
}

/// Scan `input` left to right for `accepted` keywords flanked by whitespace.
///
/// A separator owns the whitespace on both sides, so in `a AND OR b` the `OR`
/// has no leading whitespace left and stays part of the text.
fn separators(input: &str, accepted: &[Operator]) -> Vec<Separator> {
    let tokens = tokenize(input);
    let mut found = Vec::new();
    let mut i = 0;

    while i + 2 < tokens.len() {
        let (before, word, after) = (tokens[i], tokens[i + 1], tokens[i + 2]);

        if before.kind == TokenKind::Space
            && word.kind == TokenKind::Word
            && after.kind == TokenKind::Space
        {
            let op = Operator::from_word(&input[word.start..word.end])
                .filter(|op| accepted.contains(op));
            if let Some(op) = op {
                found.push(Separator {
                    op,
                    start: before.start,
                    end: after.end,
                });
                i += 3;
                continue;
            }
        }

        i += 1;
    }

    found
}

/// Split `input` at separators, returning the leading part and each following
/// part with the operator that introduced it.
fn split<'a>(input: &'a str, accepted: &[Operator]) -> (&'a str, Vec<(Operator, &'a str)>) {
    let seps = separators(input, accepted);
    let head_end = seps.first().map_or(input.len(), |sep| sep.start);

    let parts = seps
        .iter()
        .enumerate()
        .map(|(i, sep)| {
            let end = seps.get(i + 1).map_or(input.len(), |next| next.start);
            (sep.op, &input[sep.end..end])
        })
        .collect();

    (&input[..head_end], parts)
}

fn push_term(terms: &mut Vec<String>, raw: &str) {
    let term = raw.trim();
    if !term.is_empty() {
        terms.push(term.to_string());
    }
}

/// True for queries that should return every document
pub fn is_match_all(query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || query == "*"
}

/// The MUST / SHOULD / MUST_NOT term lists extracted from a query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoolClauses {
    pub must: Vec<String>,
    pub should: Vec<String>,
    pub must_not: Vec<String>,
}

impl BoolClauses {
    pub fn parse(input: &str) -> Result<Self, QueryParseError> {
        let mut clauses = BoolClauses::default();

        let (working, negated) = split(input, &[Operator::Not]);
        for (_, fragment) in negated {
            let term = match separators(fragment, &[Operator::And, Operator::Or]).first() {
                Some(boundary) => &fragment[..boundary.start],
                None => fragment,
            };
            push_term(&mut clauses.must_not, term);
        }

        let (first, rest) = split(working, &[Operator::And, Operator::Or]);
        push_term(&mut clauses.must, first);
        for (op, part) in rest {
            match op {
                Operator::And => push_term(&mut clauses.must, part),
                _ => push_term(&mut clauses.should, part),
            }
        }

        if clauses.is_empty() {
            return Err(QueryParseError::NoTerms(input.to_string()));
        }

        Ok(clauses)
    }

    /// The whole, unmodified input as a single MUST term
    pub fn fallback(input: &str) -> Self {
        Self {
            must: vec![input.to_string()],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    /// Render into an engine query, adding `filter` as an extra MUST clause.
    pub fn render(self, filter: Option<EngineQuery>) -> EngineQuery {
        if filter.is_none() && self.should.is_empty() && self.must_not.is_empty() {
            if let [term] = self.must.as_slice() {
                return EngineQuery::matches(MESSAGE_FIELD, term.clone());
            }
        }

        let minimum_should_match = (!self.should.is_empty()).then_some(1);
        let to_matches = |terms: Vec<String>| -> Vec<EngineQuery> {
            terms
                .into_iter()
                .map(|term| EngineQuery::matches(MESSAGE_FIELD, term))
                .collect()
        };

        let mut must = to_matches(self.must);
        must.extend(filter);

        EngineQuery::Bool(BoolQuery {
            must,
            should: to_matches(self.should),
            must_not: to_matches(self.must_not),
            minimum_should_match,
        })
    }
}

/// Subset of the Elasticsearch query DSL produced by the translator
#[derive(Debug, Clone, PartialEq)]
pub enum EngineQuery {
    MatchAll,
    /// Analyzed full-text match
    Match { field: String, text: String },
    /// Exact keyword equality
    Term { field: String, value: String },
    Bool(BoolQuery),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<EngineQuery>,
    pub should: Vec<EngineQuery>,
    pub must_not: Vec<EngineQuery>,
    pub minimum_should_match: Option<u32>,
}

impl EngineQuery {
    pub fn matches(field: impl Into<String>, text: impl Into<String>) -> Self {
        EngineQuery::Match {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        EngineQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EngineQuery::MatchAll => json!({ "match_all": {} }),
            EngineQuery::Match { field, text } => {
                let mut inner = Map::new();
                inner.insert(field.clone(), Value::String(text.clone()));
                json!({ "match": inner })
            }
            EngineQuery::Term { field, value } => {
                let mut inner = Map::new();
                inner.insert(field.clone(), Value::String(value.clone()));
                json!({ "term": inner })
            }
            EngineQuery::Bool(bool_query) => {
                let mut inner = Map::new();
                for (key, clauses) in [
                    ("must", &bool_query.must),
                    ("should", &bool_query.should),
                    ("must_not", &bool_query.must_not),
                ] {
                    if !clauses.is_empty() {
                        inner.insert(
                            key.to_string(),
                            Value::Array(clauses.iter().map(EngineQuery::to_json).collect()),
                        );
                    }
                }
                if let Some(minimum) = bool_query.minimum_should_match {
                    inner.insert("minimum_should_match".to_string(), json!(minimum));
                }
                json!({ "bool": inner })
            }
        }
    }
}

impl Serialize for EngineQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Build the engine query for a free-text search and optional exact source.
///
/// Never fails: unparseable text degrades to a single match on the raw input.
pub fn translate(query: Option<&str>, source: Option<&str>) -> EngineQuery {
    let source_clause = source
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| EngineQuery::term(SOURCE_FIELD, s));

    let Some(text) = query.filter(|q| !is_match_all(q)) else {
        return match source_clause {
            Some(term) => EngineQuery::Bool(BoolQuery {
                must: vec![term],
                ..Default::default()
            }),
            None => EngineQuery::MatchAll,
        };
    };

    let clauses = BoolClauses::parse(text).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "Query fell back to a single match clause");
        BoolClauses::fallback(text)
    });

    clauses.render(source_clause)
}
