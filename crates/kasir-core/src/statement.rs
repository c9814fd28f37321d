//! # Statement Building
//!
//! Turns structured insert/update/delete requests and raw SQL with
//! parameters into a [`Statement`]: final SQL text plus an ordered bind list.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Structured request → Statement                      │
//! │                                                                         │
//! │  update("users", {role: "admin"}, {name: "Ned"})                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate identifiers ("users", "role", "name")                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Binder (dialect aware)                                                │
//! │   MySQL / SQLite:  UPDATE users SET role = ? WHERE name = ?            │
//! │   Postgres:        UPDATE users SET role = $1 WHERE name = $2          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  binds = ["admin", "Ned"]   (SET values first, then WHERE values)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Raw SQL
//! Callers write `?` (positional) or `:name` (named) references. Both are
//! rewritten into the dialect's native placeholders. Quoted strings,
//! quoted identifiers, comments and Postgres `::` casts are left alone.

use serde::{Deserialize, Serialize};

use crate::error::{StatementError, StatementResult};
use crate::types::{Fields, SqlValue};

/// Most OR-joined groups in one `delete_many` statement.
///
/// Each group nests the WHERE expression one level deeper; SQLite refuses
/// trees deeper than 1000.
pub const MAX_DELETE_GROUPS: usize = 500;

// =============================================================================
// Dialect
// =============================================================================

/// SQL dialect of the connected engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// MySQL / MariaDB: `?` placeholders, backslash escapes in strings.
    MySql,
    /// PostgreSQL: `$n` placeholders.
    Postgres,
    /// SQLite: `?` placeholders.
    Sqlite,
}

impl Dialect {
    /// Placeholder for the bind at 1-based position `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Most bind parameters one statement may carry.
    ///
    /// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` is 32766; MySQL and
    /// Postgres count parameters in a 16-bit field.
    pub fn max_binds(&self) -> usize {
        match self {
            Dialect::Sqlite => 32_766,
            Dialect::MySql | Dialect::Postgres => 65_535,
        }
    }

    fn backslash_escapes(&self) -> bool {
        matches!(self, Dialect::MySql)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

// =============================================================================
// Statement
// =============================================================================

/// SQL text ready for the driver plus the values to bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Accumulates binds and hands out the matching placeholder text.
struct Binder {
    dialect: Dialect,
    binds: Vec<SqlValue>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Binder {
            dialect,
            binds: Vec::new(),
        }
    }

    fn push(&mut self, value: SqlValue) -> String {
        self.binds.push(value);
        self.dialect.placeholder(self.binds.len())
    }

    /// `col = ?` for a value, `col IS NULL` for NULL.
    fn condition(&mut self, column: &str, value: &SqlValue) -> String {
        if value.is_null() {
            format!("{column} IS NULL")
        } else {
            format!("{column} = {}", self.push(value.clone()))
        }
    }

    fn and_group(&mut self, conditions: &Fields) -> String {
        conditions
            .iter()
            .map(|(column, value)| self.condition(column, value))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            binds: self.binds,
        }
    }
}

impl Statement {
    /// `INSERT INTO table (cols…) VALUES (?…)` in field order.
    pub fn insert(dialect: Dialect, table: &str, fields: &Fields) -> StatementResult<Statement> {
        validate_identifier(table)?;
        validate_columns(fields, "INSERT")?;

        let mut binder = Binder::new(dialect);
        let placeholders: Vec<String> = fields
            .iter()
            .map(|(_, value)| binder.push(value.clone()))
            .collect();

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            fields.columns().join(", "),
            placeholders.join(", ")
        );
        Ok(binder.finish(sql))
    }

    /// Multi-row INSERTs for a batch, one per chunk.
    ///
    /// The column list comes from the first row. Every later row must carry
    /// the same column set; its values are looked up by column name, so key
    /// order inside a row does not matter. Rows are split so that no
    /// statement exceeds [`Dialect::max_binds`].
    ///
    /// Returns an empty list for an empty batch.
    pub fn insert_many(
        dialect: Dialect,
        table: &str,
        rows: &[Fields],
    ) -> StatementResult<Vec<Statement>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        validate_identifier(table)?;
        validate_columns(first, "INSERT")?;
        ensure_same_columns(first, rows)?;

        let columns = first.columns();
        let per_chunk = (dialect.max_binds() / columns.len()).max(1);

        let statements = rows
            .chunks(per_chunk)
            .map(|chunk| {
                let mut binder = Binder::new(dialect);
                let tuples: Vec<String> = chunk
                    .iter()
                    .map(|row| {
                        let placeholders: Vec<String> = columns
                            .iter()
                            .map(|column| {
                                binder.push(row.get(column).cloned().unwrap_or(SqlValue::Null))
                            })
                            .collect();
                        format!("({})", placeholders.join(", "))
                    })
                    .collect();

                let sql = format!(
                    "INSERT INTO {table} ({}) VALUES {}",
                    columns.join(", "),
                    tuples.join(", ")
                );
                binder.finish(sql)
            })
            .collect();
        Ok(statements)
    }

    /// `UPDATE table SET … WHERE … AND …`; SET binds come first.
    pub fn update(
        dialect: Dialect,
        table: &str,
        set: &Fields,
        conditions: &Fields,
    ) -> StatementResult<Statement> {
        validate_identifier(table)?;
        validate_columns(set, "SET")?;
        validate_columns(conditions, "WHERE")?;

        let mut binder = Binder::new(dialect);
        let assignments: Vec<String> = set
            .iter()
            .map(|(column, value)| format!("{column} = {}", binder.push(value.clone())))
            .collect();
        let filter = binder.and_group(conditions);

        let sql = format!("UPDATE {table} SET {} WHERE {filter}", assignments.join(", "));
        Ok(binder.finish(sql))
    }

    /// `DELETE FROM table WHERE … AND …`.
    pub fn delete(dialect: Dialect, table: &str, conditions: &Fields) -> StatementResult<Statement> {
        validate_identifier(table)?;
        validate_columns(conditions, "WHERE")?;

        let mut binder = Binder::new(dialect);
        let filter = binder.and_group(conditions);
        let sql = format!("DELETE FROM {table} WHERE {filter}");
        Ok(binder.finish(sql))
    }

    /// `DELETE FROM table WHERE (… AND …) OR (… AND …)`, one per chunk.
    ///
    /// Every group must use the first group's column set. A statement holds
    /// at most [`MAX_DELETE_GROUPS`] groups and [`Dialect::max_binds`]
    /// binds. Returns an empty list for an empty batch.
    pub fn delete_many(
        dialect: Dialect,
        table: &str,
        groups: &[Fields],
    ) -> StatementResult<Vec<Statement>> {
        let Some(first) = groups.first() else {
            return Ok(Vec::new());
        };
        validate_identifier(table)?;
        validate_columns(first, "WHERE")?;
        ensure_same_columns(first, groups)?;

        let per_chunk = (dialect.max_binds() / first.len())
            .clamp(1, MAX_DELETE_GROUPS);

        let statements = groups
            .chunks(per_chunk)
            .map(|chunk| {
                let mut binder = Binder::new(dialect);
                let filter = chunk
                    .iter()
                    .map(|group| format!("({})", binder.and_group(group)))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                let sql = format!("DELETE FROM {table} WHERE {filter}");
                binder.finish(sql)
            })
            .collect();
        Ok(statements)
    }

    /// Raw SQL with `?` placeholders.
    ///
    /// If the SQL contains `?` placeholders, their count must equal the
    /// number of values. SQL already written with the dialect's native
    /// placeholders (e.g. `$1`) passes through untouched.
    pub fn positional(
        dialect: Dialect,
        sql: &str,
        values: Vec<SqlValue>,
    ) -> StatementResult<Statement> {
        let mut count = 0usize;
        let rewritten = rewrite(sql, dialect, |token| match token {
            Token::Positional => {
                count += 1;
                Ok(dialect.placeholder(count))
            }
            Token::Named(name) => Ok(format!(":{name}")),
        })?;

        if count > 0 && count != values.len() {
            return Err(StatementError::ParameterCount {
                expected: count,
                actual: values.len(),
            });
        }

        Ok(Statement {
            sql: rewritten,
            binds: values,
        })
    }

    /// Raw SQL with `:name` references.
    ///
    /// A name may be referenced more than once; the value is bound at each
    /// occurrence. Keys may be given with or without the leading colon.
    pub fn named(
        dialect: Dialect,
        sql: &str,
        values: &[(String, SqlValue)],
    ) -> StatementResult<Statement> {
        let lookup: Vec<(&str, &SqlValue)> = values
            .iter()
            .map(|(name, value)| (name.trim_start_matches(':'), value))
            .collect();
        let mut used = vec![false; lookup.len()];
        let mut binder = Binder::new(dialect);

        let rewritten = rewrite(sql, dialect, |token| match token {
            Token::Positional => Ok("?".to_string()),
            Token::Named(name) => {
                let position = lookup
                    .iter()
                    .position(|(key, _)| *key == name)
                    .ok_or_else(|| StatementError::MissingParameter(name.to_string()))?;
                used[position] = true;
                Ok(binder.push(lookup[position].1.clone()))
            }
        })?;

        if let Some(unused) = used.iter().position(|was_used| !was_used) {
            return Err(StatementError::UnusedParameter(lookup[unused].0.to_string()));
        }

        Ok(binder.finish(rewritten))
    }
}

// =============================================================================
// Identifier Validation
// =============================================================================

/// Validates a table or column name.
///
/// ## Rules
/// - One or two dot-separated parts (`table` or `schema.table`)
/// - Each part starts with a letter or underscore
/// - Remaining characters are letters, digits or underscores
pub fn validate_identifier(name: &str) -> StatementResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(StatementError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

fn validate_columns(fields: &Fields, clause: &'static str) -> StatementResult<()> {
    if fields.is_empty() {
        return Err(StatementError::EmptyFields { clause });
    }
    fields.columns().into_iter().try_for_each(validate_identifier)
}

fn ensure_same_columns(first: &Fields, rows: &[Fields]) -> StatementResult<()> {
    for (index, row) in rows.iter().enumerate().skip(1) {
        if !first.same_columns(row) {
            return Err(StatementError::MismatchedColumns {
                index,
                expected: first.columns().iter().map(|c| c.to_string()).collect(),
                found: row.columns().iter().map(|c| c.to_string()).collect(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Literal Escaping (legacy)
// =============================================================================

/// Escapes a value for embedding inside a quoted SQL string literal.
///
/// The surrounding quotes are NOT included. Prefer parameter binding: a
/// literal spliced into hand-built SQL can still be broken by whatever the
/// caller puts next to it. This exists for old call sites only.
///
/// ## Per Dialect
/// - MySQL: backslash-escapes `\0 \n \r \\ ' "` and `\x1a`
/// - Postgres / SQLite: doubles single quotes
pub fn escape_literal(dialect: Dialect, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    match dialect {
        Dialect::MySql => {
            for c in value.chars() {
                match c {
                    '\0' => escaped.push_str("\\0"),
                    '\n' => escaped.push_str("\\n"),
                    '\r' => escaped.push_str("\\r"),
                    '\\' => escaped.push_str("\\\\"),
                    '\'' => escaped.push_str("\\'"),
                    '"' => escaped.push_str("\\\""),
                    '\x1a' => escaped.push_str("\\Z"),
                    other => escaped.push(other),
                }
            }
        }
        Dialect::Postgres | Dialect::Sqlite => {
            for c in value.chars() {
                if c == '\'' {
                    escaped.push('\'');
                }
                escaped.push(c);
            }
        }
    }
    escaped
}

// =============================================================================
// Placeholder Scanner
// =============================================================================

enum Token<'a> {
    Positional,
    Named(&'a str),
}

/// Copies `sql`, replacing placeholders outside quotes and comments.
///
/// All characters the scanner reacts to are ASCII, so every slice boundary
/// below falls on a char boundary.
fn rewrite<F>(sql: &str, dialect: Dialect, mut replace: F) -> StatementResult<String>
where
    F: FnMut(Token<'_>) -> StatementResult<String>,
{
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => i = skip_quoted(bytes, i, quote, dialect),
            b'-' if next == Some(b'-') => i = skip_line(bytes, i),
            b'#' if dialect == Dialect::MySql => i = skip_line(bytes, i),
            b'/' if next == Some(b'*') => i = skip_block(bytes, i),
            b'?' => {
                out.push_str(&sql[copied..i]);
                out.push_str(&replace(Token::Positional)?);
                i += 1;
                copied = i;
            }
            b':' if next == Some(b':') => i += 2,
            b':' if next.is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                out.push_str(&sql[copied..i]);
                out.push_str(&replace(Token::Named(&sql[start..end]))?);
                i = end;
                copied = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied..]);
    Ok(out)
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8, dialect: Dialect) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == b'\\' && quote != b'`' && dialect.backslash_escapes() {
            j += 2;
            continue;
        }
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 1)
}

fn skip_block(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

// =============================================================================
// Unit Tests
// =============================================================================
