//! Schema migrations tracked in SQLite's `user_version` header field.
//!
//! Migration `n` (1-based) is applied when `user_version < n`, inside its own
//! transaction together with the version bump.

use tokio_rusqlite::Connection;

use super::Error;

const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/001_favicon_meta.sql"),
    include_str!("../../migrations/002_response_cache.sql"),
];

/// Bring the schema up to date.
///
/// Fails if the database was written by a build with more migrations than this one.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let applied: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let known = MIGRATIONS.len() as i64;
        if applied > known {
            return Err(Error::MigrationFailed(format!("schema version {applied} is newer than supported version {known}")));
        }

        for (version, sql) in (1..).zip(MIGRATIONS).skip(applied as usize) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
            tracing::debug!(version, "applied store migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user_version(conn: &Connection) -> i64 {
        conn.call(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_create_tables_once() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type='table' AND name IN ('favicon_meta', 'response_cache')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert_eq!(tables, 2);
        assert_eq!(user_version(&conn).await, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| conn.pragma_update(None, "user_version", 99)).await.unwrap();

        let err = run(&conn).await.unwrap_err();
        assert!(matches!(err, Error::MigrationFailed(msg) if msg.contains("99")));
    }
}
