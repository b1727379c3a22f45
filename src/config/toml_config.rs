use crate::drivers::DriverConfig;
use crate::utils::error::{DeltacloudError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub driver: DriverConfig,
    #[serde(default)]
    pub storage: StorageSection,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Base URL used in hrefs when the server sits behind a proxy.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,
    pub base_dir: Option<String>,
    pub database_location: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: None,
            database_location: None,
        }
    }
}

fn default_storage_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| DeltacloudError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RHEVM_URL})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn verbose(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.verbose).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.driver.validate()?;
        if let Some(port) = self.server.port {
            validation::validate_range("server.port", port, 1, u16::MAX)?;
        }
        if let Some(url) = &self.server.public_url {
            validation::validate_url("server.public_url", url)?;
        }
        if let Some(dir) = &self.storage.base_dir {
            validation::validate_path("storage.base_dir", dir)?;
        }
        if let Some(location) = &self.storage.database_location {
            validation::validate_database_url("storage.database_location", location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 3002

[driver]
name = "openstack"
provider = "http://keystone.example.com:5000/v2.0"
region = "RegionOne"

[storage]
base_dir = "/var/lib/deltacloud"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.server.port, Some(3002));
        assert_eq!(config.driver.name, "openstack");
        assert_eq!(config.driver.region.as_deref(), Some("RegionOne"));
        assert!(config.storage.enabled);
        assert!(!config.verbose());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DELTACLOUD_TEST_RHEVM_URL", "https://rhevm.example.com/api");

        let toml_content = r#"
[driver]
name = "rhevm"
provider = "${DELTACLOUD_TEST_RHEVM_URL}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.driver.provider.as_deref(),
            Some("https://rhevm.example.com/api")
        );

        std::env::remove_var("DELTACLOUD_TEST_RHEVM_URL");
    }

    #[test]
    fn test_unset_variable_is_left_alone() {
        let toml_content = r#"
[driver]
name = "mock"
region = "${DELTACLOUD_TEST_NOT_SET}"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.driver.region.as_deref(), Some("${DELTACLOUD_TEST_NOT_SET}"));
    }

    #[test]
    fn test_config_validation() {
        let unknown_driver = TomlConfig::from_toml_str("[driver]\nname = \"ec2\"\n").unwrap();
        assert!(unknown_driver.validate().is_err());

        let bad_provider = TomlConfig::from_toml_str(
            "[driver]\nname = \"openstack\"\nprovider = \"keystone\"\n",
        )
        .unwrap();
        assert!(bad_provider.validate().is_err());

        let bad_database = TomlConfig::from_toml_str(
            "[driver]\nname = \"mock\"\n[storage]\ndatabase_location = \"postgres://db\"\n",
        )
        .unwrap();
        assert!(bad_database.validate().is_err());

        let zero_timeout = TomlConfig::from_toml_str(
            "[driver]\nname = \"mock\"\ntimeout_seconds = 0\n",
        )
        .unwrap();
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = TomlConfig::from_toml_str("[driver\nname = 1").unwrap_err();
        assert!(matches!(err, DeltacloudError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[driver]
name = "mock"

[storage]
enabled = false

[logging]
verbose = true
json = true
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.driver.name, "mock");
        assert!(!config.storage.enabled);
        assert!(config.verbose());
        assert!(config.json_logs());
    }
}
