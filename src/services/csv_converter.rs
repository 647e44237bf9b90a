//! CSV → SQL script conversion for the `places_reviews` table.
//!
//! # Output
//!
//! One script per upload, named `places_reviews_<timestamp>_<suffix>.sql`:
//!
//! ```sql
//! -- places_reviews import generated from reviews.csv at 2026-10-16T10:15:00Z
//! CREATE TABLE IF NOT EXISTS places_reviews (...);
//! INSERT INTO places_reviews (name, ...) VALUES (E'Joe''s Diner', ...);
//! ```
//!
//! String cells become PostgreSQL escape-string literals (`E'...'`) so that
//! quotes, backslashes and line breaks survive verbatim. Numeric cells are
//! checked and emitted bare, or as `NULL` when empty.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};

use crate::models::place_review::{COLUMNS, ColumnKind, TABLE_NAME, column_names, create_table_sql};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid number {value:?} in column {column} on line {line}")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A script written to disk.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub sql_path: PathBuf,
    pub rows: usize,
}

/// Rendered script text plus the number of INSERT statements in it.
#[derive(Debug, Clone)]
pub struct Script {
    pub sql: String,
    pub rows: usize,
}

/// Convert the CSV at `csv_path` into a script file inside `output_dir`.
///
/// # Errors
///
/// - `NotFound`: `csv_path` does not exist
/// - `MissingColumns`: header lacks one or more required columns
/// - `InvalidNumber`: a numeric cell is not a finite number
/// - `Csv` / `Io`: the file could not be read or the script written
pub fn convert(csv_path: &Path, output_dir: &Path) -> Result<Conversion, ConvertError> {
    let file = fs::File::open(csv_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ConvertError::NotFound(csv_path.to_path_buf())
        } else {
            ConvertError::Io {
                path: csv_path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let label = csv_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let script = render_script(file, &label, Utc::now())?;

    fs::create_dir_all(output_dir).map_err(|e| ConvertError::Io {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let sql_path = output_dir.join(script_file_name(Utc::now()));
    fs::write(&sql_path, &script.sql).map_err(|e| ConvertError::Io {
        path: sql_path.clone(),
        source: e,
    })?;

    tracing::debug!(csv = %csv_path.display(), sql = %sql_path.display(), rows = script.rows, "converted CSV");
    Ok(Conversion {
        sql_path,
        rows: script.rows,
    })
}

/// Render the full script for CSV data read from `reader`.
///
/// `source` is only used in the leading comment.
pub fn render_script<R: Read>(
    reader: R,
    source: &str,
    generated_at: DateTime<Utc>,
) -> Result<Script, ConvertError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let positions = column_positions(rdr.headers()?)?;

    let source: String = source.chars().filter(|c| !c.is_control()).collect();
    let mut sql = format!(
        "-- {TABLE_NAME} import generated from {source} at {}\n{}\n",
        generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        create_table_sql()
    );
    let column_list = column_names().collect::<Vec<_>>().join(", ");

    let mut rows = 0;
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let values = COLUMNS
            .iter()
            .zip(&positions)
            .map(|((column, kind), &idx)| {
                let cell = record.get(idx).unwrap_or("");
                match kind {
                    ColumnKind::Text => Ok(sql_string_literal(cell)),
                    ColumnKind::Numeric => numeric_literal(cell).ok_or_else(|| {
                        ConvertError::InvalidNumber {
                            line,
                            column: *column,
                            value: cell.to_string(),
                        }
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        sql.push_str(&format!(
            "INSERT INTO {TABLE_NAME} ({column_list}) VALUES ({});\n",
            values.join(", ")
        ));
        rows += 1;
    }

    Ok(Script { sql, rows })
}

/// Index of every required column in the header, or the list of missing ones.
fn column_positions(headers: &StringRecord) -> Result<Vec<usize>, ConvertError> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut positions = Vec::with_capacity(COLUMNS.len());
    let mut missing = Vec::new();
    for name in column_names() {
        match normalized.iter().position(|h| h == name) {
            Some(idx) => positions.push(idx),
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(ConvertError::MissingColumns(missing))
    }
}

/// Escape-string literal for arbitrary text.
pub fn sql_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 3);
    out.push_str("E'");
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// `NULL` for blank cells, the trimmed text for finite numbers, `None` otherwise.
fn numeric_literal(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some("NULL".to_string());
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(cell.to_string()),
        _ => None,
    }
}

/// Timestamped script name; the random suffix separates uploads in the same millisecond.
pub fn script_file_name(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{TABLE_NAME}_{}_{}.sql",
        now.format("%Y%m%d_%H%M%S_%3f"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "name,address,phone,rating,opening_hours,review_author,review_rating,review_text";

    fn render(csv: &str) -> Result<Script, ConvertError> {
        render_script(csv.as_bytes(), "test.csv", Utc::now())
    }

    /// Pull the literal values back out of an INSERT statement.
    fn parse_values(insert: &str) -> Vec<Option<String>> {
        let start = insert.find("VALUES (").unwrap() + "VALUES (".len();
        let mut chars = insert[start..].chars().peekable();
        let mut values = Vec::new();

        loop {
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            match chars.peek() {
                Some('E') => {
                    chars.next();
                    assert_eq!(chars.next(), Some('\''));
                    let mut s = String::new();
                    loop {
                        match chars.next().unwrap() {
                            '\\' => match chars.next().unwrap() {
                                'n' => s.push('\n'),
                                'r' => s.push('\r'),
                                't' => s.push('\t'),
                                other => s.push(other),
                            },
                            '\'' if chars.peek() == Some(&'\'') => {
                                chars.next();
                                s.push('\'');
                            }
                            '\'' => break,
                            c => s.push(c),
                        }
                    }
                    values.push(Some(s));
                }
                _ => {
                    let raw: String = chars.by_ref().take_while(|c| *c != ',' && *c != ')').collect();
                    values.push(if raw == "NULL" { None } else { Some(raw) });
                    if values.len() == COLUMNS.len() {
                        break;
                    }
                    continue;
                }
            }
            match chars.next() {
                Some(',') => continue,
                _ => break,
            }
        }
        values
    }

    #[test]
    fn apostrophes_survive_a_round_trip() {
        let csv = format!(
            "{HEADER}\n\"Joe's Diner\",1 Main St,555-0100,4.5,9-5,O'Brien,5,\"It's \"\"great\"\" \\back\\slash\nreally, it's\"\n"
        );
        let script = render(&csv).unwrap();
        assert_eq!(script.rows, 1);

        let insert = script.sql.lines().find(|l| l.starts_with("INSERT")).unwrap();
        let values = parse_values(insert);

        assert_eq!(values[0].as_deref(), Some("Joe's Diner"));
        assert_eq!(values[3].as_deref(), Some("4.5"));
        assert_eq!(values[5].as_deref(), Some("O'Brien"));
        assert_eq!(values[7].as_deref(), Some("It's \"great\" \\back\\slash\nreally, it's"));
    }

    #[test]
    fn missing_phone_is_named_exactly() {
        let csv = "name,address,rating,opening_hours,review_author,review_rating,review_text\n";
        match render(csv) {
            Err(ConvertError::MissingColumns(cols)) => assert_eq!(cols, vec!["phone".to_string()]),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn missing_columns_are_listed_in_table_order() {
        let csv = "review_text,name\nx,y\n";
        match render(csv) {
            Err(ConvertError::MissingColumns(cols)) => assert_eq!(
                cols,
                vec![
                    "address",
                    "phone",
                    "rating",
                    "opening_hours",
                    "review_author",
                    "review_rating"
                ]
            ),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn empty_numbers_become_null_and_columns_may_be_reordered() {
        let csv = "\u{feff}review_text, rating ,name,address,phone,opening_hours,review_author,review_rating,extra\n\
                   ok,,Cafe,Addr,123,,Ann,3,ignored\n";
        let script = render(csv).unwrap();
        let insert = script.sql.lines().find(|l| l.starts_with("INSERT")).unwrap();
        let values = parse_values(insert);

        assert_eq!(values[0].as_deref(), Some("Cafe"));
        assert_eq!(values[3], None);
        assert_eq!(values[4].as_deref(), Some(""));
        assert_eq!(values[6].as_deref(), Some("3"));
        assert_eq!(values[7].as_deref(), Some("ok"));
        assert!(!insert.contains("ignored"));
    }

    #[test]
    fn non_numeric_rating_is_rejected() {
        let csv = format!("{HEADER}\nA,B,C,4.5,D,E,5,F\nA,B,C,1); DROP TABLE x; --,D,E,5,F\n");
        match render(&csv) {
            Err(ConvertError::InvalidNumber { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "rating");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
    }

    #[test]
    fn script_starts_with_ddl_and_has_one_insert_per_row() {
        let csv = format!("{HEADER}\na,b,c,1,d,e,2,f\ng,h,i,,j,k,,l\n");
        let script = render(&csv).unwrap();

        assert_eq!(script.rows, 2);
        assert!(script.sql.starts_with("-- places_reviews import generated from test.csv"));
        assert!(script.sql.contains("CREATE TABLE IF NOT EXISTS places_reviews"));
        assert_eq!(script.sql.matches("INSERT INTO places_reviews").count(), 2);
    }

    #[test]
    fn header_only_file_yields_ddl_only() {
        let script = render(&format!("{HEADER}\n")).unwrap();
        assert_eq!(script.rows, 0);
        assert!(!script.sql.contains("INSERT"));
    }

    #[test]
    fn convert_writes_timestamped_file() {
        let dir = std::env::temp_dir().join(format!("convert-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("in.csv");
        fs::write(&csv_path, format!("{HEADER}\na,b,c,1,d,e,2,f\n")).unwrap();

        let conversion = convert(&csv_path, &dir.join("sql")).unwrap();
        let name = conversion.sql_path.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(conversion.rows, 1);
        assert!(name.starts_with("places_reviews_"));
        assert!(name.ends_with(".sql"));
        assert!(fs::read_to_string(&conversion.sql_path).unwrap().contains("INSERT"));

        assert!(matches!(
            convert(&dir.join("absent.csv"), &dir),
            Err(ConvertError::NotFound(_))
        ));

        fs::remove_dir_all(dir).ok();
    }
}
