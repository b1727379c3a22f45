use crate::collections::{self, AppState};
use crate::config::ServerConfig;
use crate::db::Database;
use crate::drivers::build_driver;
use crate::utils::error::{DeltacloudError, Result};
use axum::Router;
use tokio::net::TcpListener;

/// Environment flag that lets an outdated database through.
pub const DB_UPGRADE_ENV: &str = "DB_UPGRADE";

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Opens local storage, refusing an outdated schema unless
    /// `allow_outdated` is set.
    pub async fn open_database(&self, allow_outdated: bool) -> Result<Option<Database>> {
        if !self.config.storage_enabled {
            tracing::info!("Local storage disabled");
            return Ok(None);
        }

        let url = self.config.database_url();
        if url.starts_with("sqlite://") && !url.contains(":memory:") {
            std::fs::create_dir_all(self.config.storage_dir())?;
        }
        let db = Database::connect(&url).await?;

        let pending = db.pending_migrations().await?;
        if !pending.is_empty() {
            if !allow_outdated {
                return Err(DeltacloudError::DatabaseOutdated {
                    pending: pending.len(),
                });
            }
            tracing::warn!(
                "⚠️ {} pending migration(s), continuing because {} is set",
                pending.len(),
                DB_UPGRADE_ENV
            );
        }
        Ok(Some(db))
    }

    pub async fn router(&self) -> Result<Router> {
        let driver = build_driver(&self.config.driver)?;
        let allow_outdated = std::env::var_os(DB_UPGRADE_ENV).is_some();
        let db = self.open_database(allow_outdated).await?;

        let mut state = AppState::new(driver, db, self.config.driver.provider.as_deref());
        if let Some(url) = &self.config.public_url {
            state = state.with_public_url(url);
        }
        Ok(collections::router(state))
    }

    pub async fn run(&self) -> Result<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(self.config.bind_address()).await?;

        tracing::info!(
            "🚀 Deltacloud ({} driver) listening on http://{}/api",
            self.config.driver.name,
            listener.local_addr()?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
