use crate::domain::capability::{Capability, CapabilitySet, Feature, FeatureList};
use crate::domain::filter::Filter;
use crate::domain::model::{
    AddressTemplate, HardwareProfile, Image, Instance, InstanceRequest, Network, NetworkRequest,
    Port, Realm,
};
use crate::domain::state::StateMachine;
use crate::utils::error::{DeltacloudError, Result};
use async_trait::async_trait;

/// Provider credentials as received from the client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A cloud backend. Every operation defaults to `NotSupported`; a driver
/// overrides what its provider offers and lists it in `capabilities()`.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> CapabilitySet;

    fn features(&self) -> FeatureList {
        &[]
    }

    fn supports(&self, cap: Capability) -> bool {
        self.capabilities().supports(cap)
    }

    fn has_feature(&self, collection: &str, feature: Feature) -> bool {
        crate::domain::capability::has_feature(self.features(), collection, feature)
    }

    fn instance_state_machine(&self) -> StateMachine {
        StateMachine::standard()
    }

    async fn realms(&self, _credentials: &Credentials, _filter: &Filter) -> Result<Vec<Realm>> {
        Err(DeltacloudError::not_supported("realms"))
    }

    async fn realm(&self, credentials: &Credentials, id: &str) -> Result<Option<Realm>> {
        Ok(self
            .realms(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn images(&self, _credentials: &Credentials, _filter: &Filter) -> Result<Vec<Image>> {
        Err(DeltacloudError::not_supported("images"))
    }

    async fn image(&self, credentials: &Credentials, id: &str) -> Result<Option<Image>> {
        Ok(self
            .images(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn hardware_profiles(
        &self,
        _credentials: &Credentials,
        _filter: &Filter,
    ) -> Result<Vec<HardwareProfile>> {
        Err(DeltacloudError::not_supported("hardware_profiles"))
    }

    async fn hardware_profile(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<Option<HardwareProfile>> {
        Ok(self
            .hardware_profiles(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn instances(
        &self,
        _credentials: &Credentials,
        _filter: &Filter,
    ) -> Result<Vec<Instance>> {
        Err(DeltacloudError::not_supported("instances"))
    }

    async fn instance(&self, credentials: &Credentials, id: &str) -> Result<Option<Instance>> {
        Ok(self
            .instances(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn create_instance(
        &self,
        _credentials: &Credentials,
        _request: &InstanceRequest,
    ) -> Result<Instance> {
        Err(DeltacloudError::not_supported("create_instance"))
    }

    async fn destroy_instance(&self, _credentials: &Credentials, _id: &str) -> Result<()> {
        Err(DeltacloudError::not_supported("destroy_instance"))
    }

    async fn start_instance(&self, _credentials: &Credentials, _id: &str) -> Result<Instance> {
        Err(DeltacloudError::not_supported("start_instance"))
    }

    async fn stop_instance(&self, _credentials: &Credentials, _id: &str) -> Result<Instance> {
        Err(DeltacloudError::not_supported("stop_instance"))
    }

    async fn reboot_instance(&self, _credentials: &Credentials, _id: &str) -> Result<Instance> {
        Err(DeltacloudError::not_supported("reboot_instance"))
    }

    async fn networks(&self, _credentials: &Credentials, _filter: &Filter) -> Result<Vec<Network>> {
        Err(DeltacloudError::not_supported("networks"))
    }

    async fn network(&self, credentials: &Credentials, id: &str) -> Result<Option<Network>> {
        Ok(self
            .networks(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn create_network(
        &self,
        _credentials: &Credentials,
        _request: &NetworkRequest,
    ) -> Result<Network> {
        Err(DeltacloudError::not_supported("create_network"))
    }

    async fn destroy_network(&self, _credentials: &Credentials, _id: &str) -> Result<()> {
        Err(DeltacloudError::not_supported("destroy_network"))
    }

    async fn ports(&self, _credentials: &Credentials, _filter: &Filter) -> Result<Vec<Port>> {
        Err(DeltacloudError::not_supported("ports"))
    }

    async fn port(&self, credentials: &Credentials, id: &str) -> Result<Option<Port>> {
        Ok(self
            .ports(credentials, &Filter::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    async fn create_port(&self, _credentials: &Credentials, _network_id: &str) -> Result<Port> {
        Err(DeltacloudError::not_supported("create_port"))
    }

    async fn destroy_port(&self, _credentials: &Credentials, _id: &str) -> Result<()> {
        Err(DeltacloudError::not_supported("destroy_port"))
    }

    async fn address_templates(&self, _credentials: &Credentials) -> Result<Vec<AddressTemplate>> {
        Err(DeltacloudError::not_supported("address_templates"))
    }

    /// Address template ids are hrefs; a bare id matches the last segment.
    async fn address_template(
        &self,
        credentials: &Credentials,
        id: &str,
    ) -> Result<Option<AddressTemplate>> {
        let suffix = format!("/{}", id);
        Ok(self
            .address_templates(credentials)
            .await?
            .into_iter()
            .find(|t| t.id == id || t.id.ends_with(&suffix)))
    }
}
