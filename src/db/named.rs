//! Named-parameter statements.
//!
//! PostgreSQL only understands positional `$n` placeholders. A
//! [`NamedStatement`] takes SQL written with `:name` placeholders, rewrites it
//! to positional form once, and remembers which name feeds which position so
//! values can be pulled from any [`ParamSource`] at execution time.

use std::collections::HashMap;

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use crate::db::error::{ DbError, DbResult };
use crate::models::{ Country, CountryQuery };

/// A value that can be bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i32),
    BigInt(i64),
    Text(String),
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::BigInt(value)
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Anything that can supply values by parameter name
pub trait ParamSource {
    fn value(&self, name: &str) -> Option<ParamValue>;
}

/// Ad-hoc parameters collected by name
#[derive(Debug, Clone, Default)]
pub struct MapParamSource {
    values: HashMap<String, ParamValue>,
}

impl MapParamSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl ParamSource for MapParamSource {
    fn value(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).cloned()
    }
}

impl ParamSource for CountryQuery {
    fn value(&self, name: &str) -> Option<ParamValue> {
        match name {
            "min_population" => Some(ParamValue::Int(self.min_population())),
            "max_population" => Some(ParamValue::Int(self.max_population())),
            _ => None,
        }
    }
}

impl ParamSource for Country {
    fn value(&self, name: &str) -> Option<ParamValue> {
        match name {
            "id" => self.id.map(ParamValue::BigInt),
            "name" => Some(ParamValue::Text(self.name.clone())),
            "population" => Some(ParamValue::Int(self.population)),
            _ => None,
        }
    }
}

/// SQL rewritten from `:name` to `$n` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStatement {
    sql: String,
    names: Vec<String>,
}

impl NamedStatement {
    /// Rewrite placeholders. Casts (`::int`), quoted text, `--` and `/* */`
    /// comments and dollar-quoted bodies are left alone, and a name used
    /// twice maps to the same position.
    pub fn parse(sql: &str) -> Self {
        let chars: Vec<char> = sql.chars().collect();
        let mut out = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if let Some(q) = quote {
                out.push(c);
                if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                    i += 1;
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    let end = chars[i..]
                        .iter()
                        .position(|c| *c == '\n')
                        .map_or(chars.len(), |n| i + n);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                '/' if chars.get(i + 1) == Some(&'*') => {
                    let end = find(&chars, i + 2, &['*', '/']).map_or(chars.len(), |n| n + 2);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                '$' =>
                    match dollar_tag(&chars, i) {
                        Some(tag) => {
                            let body = i + tag.len();
                            let end = find(&chars, body, &tag).map_or(chars.len(), |n| n + tag.len());
                            out.extend(&chars[i..end]);
                            i = end;
                        }
                        None => {
                            out.push(c);
                            i += 1;
                        }
                    }
                ':' if chars.get(i + 1) == Some(&':') => {
                    out.push_str("::");
                    i += 2;
                }
                ':' if chars.get(i + 1).map_or(false, |n| is_ident_start(*n)) => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_ident_char(chars[end]) {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    let position = match names.iter().position(|n| *n == name) {
                        Some(existing) => existing,
                        None => {
                            names.push(name);
                            names.len() - 1
                        }
                    };
                    out.push('$');
                    out.push_str(&(position + 1).to_string());
                    i = end;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        Self { sql: out, names }
    }

    /// The positional SQL handed to the driver
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in positional order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve every placeholder against a source, in positional order
    pub fn values(&self, source: &dyn ParamSource) -> DbResult<Vec<ParamValue>> {
        self.names
            .iter()
            .map(|name| source.value(name).ok_or_else(|| DbError::MissingParameter(name.clone())))
            .collect()
    }

    /// Build a ready-to-run query with values bound from `source`
    pub fn bind<'q>(
        &'q self,
        source: &dyn ParamSource
    ) -> DbResult<Query<'q, Postgres, PgArguments>> {
        let values = self.values(source)?;
        Ok(bind_values(sqlx::query(&self.sql), values))
    }
}

/// Bind resolved values onto a positional query
pub fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: Vec<ParamValue>
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            ParamValue::Int(v) => query.bind(v),
            ParamValue::BigInt(v) => query.bind(v),
            ParamValue::Text(v) => query.bind(v),
        };
    }
    query
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `$$` or `$tag$` opening at `start`; `$1` is a positional placeholder, not a tag
fn dollar_tag(chars: &[char], start: usize) -> Option<Vec<char>> {
    let mut end = start + 1;
    if chars.get(end).map_or(false, |c| c.is_ascii_digit()) {
        return None;
    }
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    match chars.get(end) {
        Some('$') => Some(chars[start..=end].to_vec()),
        _ => None,
    }
}

/// Index of the first occurrence of `needle` at or after `from`
fn find(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|n| from + n)
}
