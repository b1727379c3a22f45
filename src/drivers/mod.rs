// Adapters layer: one module per cloud provider, each translating the
// provider's API into the unified model behind the `Driver` port.

pub mod mock;
pub mod openstack;
pub mod rhevm;

use crate::domain::filter::Filter;
use crate::domain::model::{
    AddressTemplate, HardwareProfile, Image, Instance, InstanceRequest, Network, NetworkRequest,
    Port, Realm,
};
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use mock::MockDriver;
pub use openstack::OpenStackDriver;
pub use rhevm::RhevmDriver;

pub const DRIVER_NAMES: &[&str] = &["mock", "openstack", "rhevm"];

/// Provider request timeout bounds, in seconds. Zero would fail every call.
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub name: String,
    /// Provider API endpoint (Keystone URL, RHEV-M API root).
    pub provider: Option<String>,
    pub region: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl DriverConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }

    fn provider_url(&self) -> Result<&str> {
        self.provider
            .as_deref()
            .ok_or_else(|| DeltacloudError::MissingConfigError {
                field: "driver.provider".to_string(),
            })
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        let timeout = std::time::Duration::from_secs(self.timeout_seconds.unwrap_or(30));
        Ok(reqwest::Client::builder().timeout(timeout).build()?)
    }
}

impl Validate for DriverConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_one_of("driver.name", &self.name, DRIVER_NAMES)?;
        if let Some(provider) = &self.provider {
            validation::validate_url("driver.provider", provider)?;
        }
        if let Some(timeout) = self.timeout_seconds {
            validation::validate_range(
                "driver.timeout_seconds",
                timeout,
                MIN_TIMEOUT_SECS,
                MAX_TIMEOUT_SECS,
            )?;
        }
        Ok(())
    }
}

/// 依名稱建立驅動程式
pub fn build_driver(config: &DriverConfig) -> Result<Arc<dyn Driver>> {
    tracing::debug!("Building '{}' driver", config.name);
    match config.name.as_str() {
        "mock" => Ok(Arc::new(MockDriver::new())),
        "openstack" => Ok(Arc::new(OpenStackDriver::new(
            config.provider_url()?,
            config.region.clone(),
            config.http_client()?,
        ))),
        "rhevm" => Ok(Arc::new(RhevmDriver::new(
            config.provider_url()?,
            config.http_client()?,
        ))),
        other => Err(DeltacloudError::InvalidConfigValueError {
            field: "driver.name".to_string(),
            value: other.to_string(),
            reason: format!("Unknown driver. Valid drivers: {}", DRIVER_NAMES.join(", ")),
        }),
    }
}

/// Maps provider HTTP failures onto driver errors.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(DeltacloudError::AuthenticationFailure);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::debug!("Provider responded {}: {}", status, message);
    Err(DeltacloudError::BackendError {
        status: status.as_u16(),
        message,
    })
}

/// Appends `segments` to `base`, each percent-encoded as exactly one path
/// segment, so `/` or `?` inside an id never reach another resource.
pub(crate) fn join_url(base: &str, segments: &[&str]) -> Result<String> {
    let invalid = |reason: &str| DeltacloudError::BackendError {
        status: 500,
        message: format!("Invalid provider URL '{}': {}", base, reason),
    };
    let mut url = url::Url::parse(base).map_err(|e| invalid(&e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

/// `.` and `..` are resolved away by URL parsing and an empty id names the
/// collection itself, so none of them can identify a provider resource.
pub(crate) fn is_addressable(id: &str) -> bool {
    !matches!(id, "" | "." | "..")
}

/// A 404 on a collection URL means a wrong endpoint, not an empty list.
pub(crate) fn missing_collection(url: &str) -> DeltacloudError {
    DeltacloudError::BackendError {
        status: 404,
        message: format!("Provider collection not found at {}", url),
    }
}

/// A driver with credentials bound, for callers that act as a single user.
pub struct Deltacloud {
    driver: Arc<dyn Driver>,
    credentials: Credentials,
}

impl Deltacloud {
    pub fn new(config: &DriverConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self::with_driver(build_driver(config)?, credentials))
    }

    pub fn with_driver(driver: Arc<dyn Driver>, credentials: Credentials) -> Self {
        Self {
            driver,
            credentials,
        }
    }

    /// The raw driver, for calls with other credentials.
    pub fn backend(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub async fn realms(&self, filter: &Filter) -> Result<Vec<Realm>> {
        self.driver.realms(&self.credentials, filter).await
    }

    pub async fn realm(&self, id: &str) -> Result<Option<Realm>> {
        self.driver.realm(&self.credentials, id).await
    }

    pub async fn images(&self, filter: &Filter) -> Result<Vec<Image>> {
        self.driver.images(&self.credentials, filter).await
    }

    pub async fn image(&self, id: &str) -> Result<Option<Image>> {
        self.driver.image(&self.credentials, id).await
    }

    pub async fn hardware_profiles(&self, filter: &Filter) -> Result<Vec<HardwareProfile>> {
        self.driver.hardware_profiles(&self.credentials, filter).await
    }

    pub async fn hardware_profile(&self, id: &str) -> Result<Option<HardwareProfile>> {
        self.driver.hardware_profile(&self.credentials, id).await
    }

    pub async fn instances(&self, filter: &Filter) -> Result<Vec<Instance>> {
        self.driver.instances(&self.credentials, filter).await
    }

    pub async fn instance(&self, id: &str) -> Result<Option<Instance>> {
        self.driver.instance(&self.credentials, id).await
    }

    pub async fn create_instance(&self, request: &InstanceRequest) -> Result<Instance> {
        self.driver.create_instance(&self.credentials, request).await
    }

    pub async fn destroy_instance(&self, id: &str) -> Result<()> {
        self.driver.destroy_instance(&self.credentials, id).await
    }

    pub async fn start_instance(&self, id: &str) -> Result<Instance> {
        self.driver.start_instance(&self.credentials, id).await
    }

    pub async fn stop_instance(&self, id: &str) -> Result<Instance> {
        self.driver.stop_instance(&self.credentials, id).await
    }

    pub async fn reboot_instance(&self, id: &str) -> Result<Instance> {
        self.driver.reboot_instance(&self.credentials, id).await
    }

    pub async fn networks(&self, filter: &Filter) -> Result<Vec<Network>> {
        self.driver.networks(&self.credentials, filter).await
    }

    pub async fn network(&self, id: &str) -> Result<Option<Network>> {
        self.driver.network(&self.credentials, id).await
    }

    pub async fn create_network(&self, request: &NetworkRequest) -> Result<Network> {
        self.driver.create_network(&self.credentials, request).await
    }

    pub async fn destroy_network(&self, id: &str) -> Result<()> {
        self.driver.destroy_network(&self.credentials, id).await
    }

    pub async fn ports(&self, filter: &Filter) -> Result<Vec<Port>> {
        self.driver.ports(&self.credentials, filter).await
    }

    pub async fn port(&self, id: &str) -> Result<Option<Port>> {
        self.driver.port(&self.credentials, id).await
    }

    pub async fn create_port(&self, network_id: &str) -> Result<Port> {
        self.driver.create_port(&self.credentials, network_id).await
    }

    pub async fn destroy_port(&self, id: &str) -> Result<()> {
        self.driver.destroy_port(&self.credentials, id).await
    }

    pub async fn address_templates(&self) -> Result<Vec<AddressTemplate>> {
        self.driver.address_templates(&self.credentials).await
    }

    pub async fn address_template(&self, id: &str) -> Result<Option<AddressTemplate>> {
        self.driver.address_template(&self.credentials, id).await
    }
}
