//! Database connection management.
//!
//! Imports hold exactly one PostgreSQL connection for their whole duration;
//! there is no pool.

use sqlx::{Connection, PgConnection};

/// Open a single PostgreSQL connection.
///
/// # Arguments
///
/// * `database_url` - PostgreSQL connection string
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn connect(database_url: &str) -> Result<PgConnection, sqlx::Error> {
    PgConnection::connect(database_url).await
}

/// Open a connection and run a trivial query.
pub async fn ping(database_url: &str) -> Result<(), sqlx::Error> {
    let mut conn = connect(database_url).await?;
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&mut conn)
        .await?;
    conn.close().await
}
