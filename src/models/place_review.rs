//! Row model for the fixed `places_reviews` import table.
//!
//! Every uploaded CSV maps 1:1 onto this table. There is no schema
//! inference: the eight columns below must all be present in the header.

/// Target table for every import.
pub const TABLE_NAME: &str = "places_reviews";

/// Kind of SQL literal a column is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Escaped string literal
    Text,
    /// Bare number, or `NULL` when the cell is empty
    Numeric,
}

/// Required CSV columns in table order.
pub const COLUMNS: [(&str, ColumnKind); 8] = [
    ("name", ColumnKind::Text),
    ("address", ColumnKind::Text),
    ("phone", ColumnKind::Text),
    ("rating", ColumnKind::Numeric),
    ("opening_hours", ColumnKind::Text),
    ("review_author", ColumnKind::Text),
    ("review_rating", ColumnKind::Numeric),
    ("review_text", ColumnKind::Text),
];

/// Names of the required columns in table order.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    COLUMNS.iter().map(|(name, _)| *name)
}

/// DDL emitted at the top of every generated script.
pub fn create_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (\n    \
         id BIGSERIAL PRIMARY KEY,\n    \
         name TEXT,\n    \
         address TEXT,\n    \
         phone TEXT,\n    \
         rating DOUBLE PRECISION,\n    \
         opening_hours TEXT,\n    \
         review_author TEXT,\n    \
         review_rating DOUBLE PRECISION,\n    \
         review_text TEXT,\n    \
         imported_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n);"
    )
}
