pub mod cimi;
pub mod collections;
pub mod config;
pub mod core;
pub mod db;
pub mod domain;
pub mod drivers;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{ServerArgs, UpgradeArgs};

pub use config::{ServerConfig, TomlConfig};
pub use core::{context::UrlBuilder, server::Server};
pub use domain::ports::{Credentials, Driver};
pub use drivers::{build_driver, Deltacloud, DriverConfig};
pub use utils::error::{DeltacloudError, Result};
