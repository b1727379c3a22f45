#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{ServerArgs, UpgradeArgs};
pub use toml_config::TomlConfig;

use crate::db;
use crate::drivers::DriverConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3001;

/// Effective settings: CLI flags over the config file over defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: Option<String>,
    pub driver: DriverConfig,
    pub storage_enabled: bool,
    pub base_storage_dir: PathBuf,
    /// Explicit database URL; `DATABASE_LOCATION` wins over it.
    pub database_location: Option<String>,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            driver: DriverConfig::new("mock"),
            storage_enabled: true,
            base_storage_dir: default_storage_dir(),
            database_location: None,
            verbose: false,
            json_logs: false,
        }
    }
}

/// `$HOME/.deltacloud`, or `./.deltacloud` without a home directory.
pub fn default_storage_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deltacloud")
}

impl ServerConfig {
    pub fn from_toml(file: TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            host: file.server.host.clone().unwrap_or(defaults.host),
            port: file.server.port.unwrap_or(defaults.port),
            public_url: file.server.public_url.clone(),
            verbose: file.verbose(),
            json_logs: file.json_logs(),
            storage_enabled: file.storage.enabled,
            base_storage_dir: file
                .storage
                .base_dir
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or(defaults.base_storage_dir),
            database_location: file.storage.database_location,
            driver: file.driver,
        }
    }

    #[cfg(feature = "cli")]
    pub fn from_args(args: &ServerArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                Self::from_toml(file)
            }
            None => Self::default(),
        };

        if let Some(driver) = &args.driver {
            config.driver.name = driver.clone();
        }
        if let Some(provider) = &args.provider {
            config.driver.provider = Some(provider.clone());
        }
        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        config.verbose |= args.verbose;
        config.json_logs |= args.json_logs;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `DATABASE_LOCATION`, then the configured location, then the
    /// default file under the storage directory.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_LOCATION")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.database_location.clone())
            .unwrap_or_else(|| db::default_location(&self.base_storage_dir))
    }

    pub fn storage_dir(&self) -> &Path {
        &self.base_storage_dir
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_non_empty_string("server.host", &self.host)?;
        validate_range("server.port", self.port, 1, u16::MAX)?;
        if let Some(url) = &self.public_url {
            validate_url("server.public_url", url)?;
        }
        self.driver.validate()?;
        if self.driver.name != "mock" {
            validate_required_field("driver.provider", &self.driver.provider)?;
        }
        if self.storage_enabled {
            validate_database_url("storage.database_location", &self.database_url())?;
        }
        Ok(())
    }
}
