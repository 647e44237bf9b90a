//! Executes generated SQL scripts against PostgreSQL.
//!
//! # Atomicity
//!
//! All statements of one script run on one connection inside one
//! transaction, committed once at the end. PostgreSQL DDL is transactional,
//! so a failing statement leaves nothing behind, the `CREATE TABLE` included.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use sqlx::Connection;

use crate::db;

/// Longest statement excerpt kept in error reports.
const STATEMENT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("SQL script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to read SQL script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Statement {index} failed: {source} ({statement})")]
    Statement {
        /// 1-based position in the script
        index: usize,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Commit failed: {0}")]
    Commit(#[source] sqlx::Error),
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Statements executed, DDL included
    pub statements: usize,
}

/// Runs a script file against a database.
#[async_trait]
pub trait ScriptImporter: Send + Sync {
    async fn import(&self, script_path: &Path) -> Result<ImportSummary, ImportError>;

    /// Check that the database is reachable.
    async fn ping(&self) -> Result<(), ImportError>;
}

/// PostgreSQL importer opening a fresh connection per script.
#[derive(Debug, Clone)]
pub struct PgScriptImporter {
    database_url: String,
}

impl PgScriptImporter {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl ScriptImporter for PgScriptImporter {
    async fn import(&self, script_path: &Path) -> Result<ImportSummary, ImportError> {
        let script = read_script(script_path).await?;
        let statements = split_statements(&script);

        let mut conn = db::connect(&self.database_url)
            .await
            .map_err(ImportError::Connection)?;
        let mut tx = conn.begin().await.map_err(ImportError::Connection)?;

        for (i, statement) in statements.iter().enumerate() {
            let result = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(statement.as_str())).await;
            if let Err(source) = result {
                let index = i + 1;
                let statement = preview(statement);
                tracing::error!(
                    script = %script_path.display(),
                    index,
                    statement = %statement,
                    error = %source,
                    "SQL statement failed, rolling back import"
                );
                // Dropping `tx` rolls back everything executed so far.
                return Err(ImportError::Statement {
                    index,
                    statement,
                    source,
                });
            }
        }

        tx.commit().await.map_err(ImportError::Commit)?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "closing import connection failed");
        }

        tracing::info!(
            script = %script_path.display(),
            statements = statements.len(),
            "SQL script imported"
        );
        Ok(ImportSummary {
            statements: statements.len(),
        })
    }

    async fn ping(&self) -> Result<(), ImportError> {
        db::ping(&self.database_url)
            .await
            .map_err(ImportError::Connection)
    }
}

/// Read a script, distinguishing a missing file from other I/O failures.
pub async fn read_script(path: &Path) -> Result<String, ImportError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ImportError::ScriptNotFound(path.to_path_buf())
        } else {
            ImportError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

fn preview(statement: &str) -> String {
    let mut chars = statement.chars();
    let head: String = chars.by_ref().take(STATEMENT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted { escapes: bool },
    Identifier,
    LineComment,
    BlockComment,
}

/// Split a script into statements on `;`.
///
/// Semicolons inside string literals (plain and `E'...'`), quoted
/// identifiers and comments do not split. Comments are dropped and blank
/// statements are skipped. Dollar quoting is not recognised.
pub fn split_statements(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = Scan::Code;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match state {
            Scan::Code => match c {
                '-' if next == Some('-') => {
                    state = Scan::LineComment;
                    i += 1;
                }
                '/' if next == Some('*') => {
                    state = Scan::BlockComment;
                    i += 1;
                }
                '\'' => {
                    state = Scan::Quoted {
                        escapes: is_escape_prefix(&chars, i),
                    };
                    current.push(c);
                }
                '"' => {
                    state = Scan::Identifier;
                    current.push(c);
                }
                ';' => {
                    push_statement(&mut statements, &mut current);
                }
                _ => current.push(c),
            },
            Scan::Quoted { escapes } => {
                current.push(c);
                if escapes && c == '\\' {
                    if let Some(n) = next {
                        current.push(n);
                        i += 1;
                    }
                } else if c == '\'' {
                    if next == Some('\'') {
                        current.push('\'');
                        i += 1;
                    } else {
                        state = Scan::Code;
                    }
                }
            }
            Scan::Identifier => {
                current.push(c);
                if c == '"' {
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if c == '*' && next == Some('/') {
                    current.push(' ');
                    state = Scan::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }

    push_statement(&mut statements, &mut current);
    statements
}

/// Whether the quote at `quote_at` opens an `E'...'` literal.
fn is_escape_prefix(chars: &[char], quote_at: usize) -> bool {
    if quote_at == 0 || !matches!(chars[quote_at - 1], 'E' | 'e') {
        return false;
    }
    quote_at < 2 || !is_ident_char(chars[quote_at - 2])
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_semicolons() {
        let script = "CREATE TABLE t (a TEXT);\nINSERT INTO t VALUES ('x');\n\n;  \nSELECT 1";
        assert_eq!(
            split_statements(script),
            vec![
                "CREATE TABLE t (a TEXT)",
                "INSERT INTO t VALUES ('x')",
                "SELECT 1"
            ]
        );
    }

    #[test]
    fn semicolons_inside_literals_do_not_split() {
        let script = r#"INSERT INTO t VALUES (E'a;b', 'it''s; fine', E'back\; \'q\'; x');
INSERT INTO "odd;name" VALUES ('done');"#;
        let statements = split_statements(script);

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            r#"INSERT INTO t VALUES (E'a;b', 'it''s; fine', E'back\; \'q\'; x')"#
        );
        assert_eq!(statements[1], r#"INSERT INTO "odd;name" VALUES ('done')"#);
    }

    #[test]
    fn backslash_is_literal_outside_escape_strings() {
        // In a standard string a backslash does not escape the closing quote.
        let script = r"SELECT 'C:\'; SELECT TYPE'x;y'";
        assert_eq!(split_statements(script), vec![r"SELECT 'C:\'", "SELECT TYPE'x;y'"]);
    }

    #[test]
    fn comments_are_dropped() {
        let script = "-- header; with semicolon\nCREATE TABLE t (a INT); /* block; */ SELECT 1;";
        assert_eq!(
            split_statements(script),
            vec!["CREATE TABLE t (a INT)", "SELECT 1"]
        );
    }

    #[test]
    fn converter_output_splits_into_ddl_plus_inserts() {
        let csv = "name,address,phone,rating,opening_hours,review_author,review_rating,review_text\n\
                   \"A; B\",x,y,1,z,w,2,\"semi; colon \\\\ and 'quote'\"\n";
        let script = crate::services::csv_converter::render_script(
            csv.as_bytes(),
            "in.csv",
            chrono::Utc::now(),
        )
        .unwrap();

        let statements = split_statements(&script.sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS"));
        assert!(statements[1].starts_with("INSERT INTO places_reviews"));
        assert!(statements[1].ends_with(')'));
    }

    #[test]
    fn long_statements_are_shortened_in_reports() {
        let long = "x".repeat(STATEMENT_PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).chars().count(), STATEMENT_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn missing_script_is_reported_before_connecting() {
        let importer = PgScriptImporter::new("postgres://nobody@127.0.0.1:1/none");
        let path = std::env::temp_dir().join(format!("absent-{}.sql", uuid::Uuid::new_v4()));

        assert!(matches!(
            importer.import(&path).await,
            Err(ImportError::ScriptNotFound(p)) if p == path
        ));
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connection_error() {
        let importer = PgScriptImporter::new("postgres://nobody@127.0.0.1:1/none");
        let path = std::env::temp_dir().join(format!("script-{}.sql", uuid::Uuid::new_v4()));
        std::fs::write(&path, "CREATE TABLE t (a TEXT);\nINSERT INTO t VALUES ('x');\n").unwrap();

        let result = importer.import(&path).await;
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ImportError::Connection(_))));
    }

    #[test]
    fn statement_failures_name_the_statement() {
        let err = ImportError::Statement {
            index: 2,
            statement: "INSERT INTO places_reviews (name) VALUES (E'x')".to_string(),
            source: sqlx::Error::PoolTimedOut,
        };

        let message = err.to_string();
        assert!(message.starts_with("Statement 2 failed: "));
        assert!(message.contains("INSERT INTO places_reviews (name) VALUES (E'x')"));
    }
}
