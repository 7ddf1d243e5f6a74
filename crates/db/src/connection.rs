use std::str::FromStr;
use std::time::Duration;

use movely_core::config::DraftsConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Opens the device-local draft database described by `[drafts]`.
pub async fn connect_drafts(config: &DraftsConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.database_url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use movely_core::config::DraftsConfig;
    use sqlx::Row;

    use super::{connect_drafts, connect_with_settings};

    #[tokio::test]
    async fn in_memory_pool_enforces_foreign_keys() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        let enabled = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("read pragma")
            .get::<i64, _>(0);

        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn drafts_config_creates_missing_database_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("drafts.db");

        let config = DraftsConfig {
            database_url: format!("sqlite://{}", path.display()),
            max_connections: 1,
            timeout_secs: 5,
            autosave_debounce_ms: 1000,
        };
        let pool = connect_drafts(&config).await.expect("connect");
        pool.close().await;

        assert!(path.exists());
    }
}
