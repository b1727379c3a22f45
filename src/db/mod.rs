//! Local storage for CIMI entities the providers cannot hold themselves.
//!
//! SQLite by default, under the configured storage directory. Schema
//! changes ship as embedded migrations; the server refuses to start on an
//! outdated schema and `deltacloud-db-upgrade` applies them.

pub mod address_templates;

use crate::utils::error::Result;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

pub use address_templates::{AddressTemplateRow, NewAddressTemplate};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub const UPGRADE_HINT: &str =
    "The database needs to be upgraded. Run: 'deltacloud-db-upgrade' command.";

/// `sqlite://<base_dir>/db.sqlite`
pub fn default_location(base_storage_dir: &Path) -> String {
    format!("sqlite://{}", base_storage_dir.join("db.sqlite").display())
}

/// Which driver/provider pair stored entities belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub driver: String,
    pub provider: String,
}

impl Scope {
    pub fn new(driver: &str, provider: Option<&str>) -> Self {
        Self {
            driver: driver.to_string(),
            provider: provider.unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database gets its own copy, so
        // keep exactly one alive.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        tracing::debug!("Opened database {}", url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Versions of embedded migrations that have not been applied.
    pub async fn pending_migrations(&self) -> Result<Vec<i64>> {
        let table: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_optional(&self.pool)
        .await?;

        let applied: HashSet<i64> = if table.is_some() {
            sqlx::query_as::<_, (i64,)>("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|(version,)| version)
                .collect()
        } else {
            HashSet::new()
        };

        Ok(MIGRATOR
            .iter()
            .map(|m| m.version)
            .filter(|version| !applied.contains(version))
            .collect())
    }

    pub async fn is_current(&self) -> Result<bool> {
        Ok(self.pending_migrations().await?.is_empty())
    }

    pub async fn upgrade(&self) -> Result<()> {
        let pending = self.pending_migrations().await?;
        tracing::info!("Applying {} pending migration(s)", pending.len());
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }
}
