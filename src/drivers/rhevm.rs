//! RHEV-M / oVirt driver using the REST API's JSON representation.

use crate::domain::capability::{Capability, CapabilitySet, Feature, FeatureList};
use crate::domain::filter::{filter_on, Filter};
use crate::domain::model::{
    HardwareProfile, Image, Instance, InstanceRequest, InstanceState, Network, Realm,
};
use crate::domain::ports::{Credentials, Driver};
use crate::domain::state::{Action, StateMachine};
use crate::drivers::{check_response, is_addressable, join_url, missing_collection};
use crate::utils::error::{DeltacloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

const FEATURES: FeatureList = &[("instances", Feature::UserName)];

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

/// Older API versions nest the state (`{"state": "up"}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Status {
    Plain(String),
    Nested { state: String },
}

impl Status {
    fn as_str(&self) -> &str {
        match self {
            Status::Plain(s) => s.as_str(),
            Status::Nested { state } => state.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataCenters {
    #[serde(default)]
    data_center: Vec<DataCenter>,
}

#[derive(Debug, Deserialize)]
struct DataCenter {
    id: String,
    name: String,
    status: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Clusters {
    #[serde(default)]
    cluster: Vec<Cluster>,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    id: String,
    data_center: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct Networks {
    #[serde(default)]
    network: Vec<RhevmNetwork>,
}

#[derive(Debug, Deserialize)]
struct RhevmNetwork {
    id: String,
    name: String,
    status: Option<Status>,
    data_center: Option<IdRef>,
    ip: Option<NetworkIp>,
}

#[derive(Debug, Deserialize)]
struct NetworkIp {
    address: Option<String>,
    netmask: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Templates {
    #[serde(default)]
    template: Vec<Template>,
}

#[derive(Debug, Deserialize)]
struct Template {
    id: String,
    name: String,
    description: Option<String>,
    status: Option<Status>,
    cpu: Option<Cpu>,
}

#[derive(Debug, Deserialize)]
struct Cpu {
    architecture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Vms {
    #[serde(default)]
    vm: Vec<Vm>,
}

#[derive(Debug, Deserialize)]
struct Vm {
    id: String,
    #[serde(default)]
    name: String,
    status: Option<Status>,
    template: Option<IdRef>,
    cluster: Option<IdRef>,
    /// Milliseconds since the epoch.
    creation_time: Option<i64>,
}

fn instance_state(status: &str) -> InstanceState {
    match status.to_ascii_lowercase().as_str() {
        "up" => InstanceState::Running,
        "down" | "suspended" | "paused" => InstanceState::Stopped,
        "powering_down" => InstanceState::Stopping,
        "powering_up" | "wait_for_launch" | "reboot_in_progress" | "image_locked"
        | "migrating" | "restoring_state" | "saving_state" => InstanceState::Pending,
        _ => InstanceState::Error,
    }
}

fn address_block(ip: &NetworkIp) -> Option<String> {
    match (&ip.address, &ip.netmask) {
        (Some(address), Some(netmask)) => Some(format!("{}/{}", address, netmask)),
        (Some(address), None) => Some(address.clone()),
        _ => None,
    }
}

pub struct RhevmDriver {
    api_url: String,
    client: Client,
    machine: StateMachine,
}

impl RhevmDriver {
    pub fn new(api_url: &str, client: Client) -> Self {
        // VMs are created powered off.
        let machine = StateMachine::new()
            .on(InstanceState::Start, Action::Create, InstanceState::Stopped)
            .on(InstanceState::Stopped, Action::Start, InstanceState::Pending)
            .automatically(InstanceState::Pending, InstanceState::Running)
            .on(InstanceState::Running, Action::Reboot, InstanceState::Running)
            .on(InstanceState::Running, Action::Stop, InstanceState::Stopping)
            .automatically(InstanceState::Stopping, InstanceState::Stopped)
            .on(InstanceState::Stopped, Action::Destroy, InstanceState::Finished);

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
            machine,
        }
    }

    /// `Ok(None)` means the resource does not exist.
    async fn call(
        &self,
        credentials: &Credentials,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> Result<Option<reqwest::Response>> {
        let url = join_url(&self.api_url, segments)?;
        tracing::debug!("rhevm: {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&credentials.user, Some(&credentials.password))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check_response(response).await?))
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        collection: &str,
    ) -> Result<T> {
        match self.call(credentials, Method::GET, &[collection], None).await? {
            Some(response) => Ok(response.json().await?),
            None => Err(missing_collection(&format!("{}/{}", self.api_url, collection))),
        }
    }

    /// The API root answers any authenticated user.
    async fn check_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.call(credentials, Method::GET, &[], None)
            .await?
            .ok_or_else(|| missing_collection(&self.api_url))?;
        Ok(())
    }

    async fn clusters(&self, credentials: &Credentials) -> Result<Vec<Cluster>> {
        Ok(self.get_collection::<Clusters>(credentials, "clusters").await?.cluster)
    }

    fn to_instance(&self, vm: Vm, clusters: &[Cluster]) -> Instance {
        let realm_id = vm.cluster.as_ref().and_then(|c| {
            clusters
                .iter()
                .find(|cluster| cluster.id == c.id)
                .and_then(|cluster| cluster.data_center.as_ref())
                .map(|dc| dc.id.clone())
        });

        Instance {
            id: vm.id,
            name: vm.name,
            owner_id: None,
            image_id: vm.template.map(|t| t.id),
            realm_id,
            hardware_profile_id: None,
            state: vm
                .status
                .as_ref()
                .map(|s| instance_state(s.as_str()))
                .unwrap_or(InstanceState::Pending),
            actions: Vec::new(),
            public_addresses: Vec::new(),
            private_addresses: Vec::new(),
            keyname: None,
            launch_time: vm.creation_time.and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }

    async fn vm_action(&self, credentials: &Credentials, id: &str, action: &str) -> Result<Instance> {
        if !is_addressable(id) {
            self.check_credentials(credentials).await?;
            return Err(DeltacloudError::not_found("instance", id));
        }
        self.call(credentials, Method::POST, &["vms", id, action], Some(json!({})))
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", id))?;
        self.instance(credentials, id)
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", id))
    }
}

#[async_trait]
impl Driver for RhevmDriver {
    fn name(&self) -> &'static str {
        "rhevm"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&[
            Capability::Realms,
            Capability::Images,
            Capability::HardwareProfiles,
            Capability::Instances,
            Capability::CreateInstance,
            Capability::DestroyInstance,
            Capability::StartInstance,
            Capability::StopInstance,
            Capability::RebootInstance,
            Capability::Networks,
        ])
    }

    fn features(&self) -> FeatureList {
        FEATURES
    }

    fn instance_state_machine(&self) -> StateMachine {
        self.machine.clone()
    }

    async fn realms(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Realm>> {
        let dcs: DataCenters = self.get_collection(credentials, "datacenters").await?;
        let realms = dcs
            .data_center
            .into_iter()
            .map(|dc| Realm {
                state: match dc.status.as_ref().map(Status::as_str) {
                    Some("up") => Realm::AVAILABLE.to_string(),
                    _ => Realm::UNAVAILABLE.to_string(),
                },
                id: dc.id,
                name: dc.name,
                limit: None,
            })
            .collect();
        Ok(filter_on(realms, filter))
    }

    async fn images(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Image>> {
        let templates: Templates = self.get_collection(credentials, "templates").await?;
        let images = templates
            .template
            .into_iter()
            .map(|t| Image {
                state: match t.status.as_ref().map(Status::as_str) {
                    Some("ok") | None => "AVAILABLE".to_string(),
                    Some(other) => other.to_ascii_uppercase(),
                },
                architecture: t.cpu.and_then(|c| c.architecture),
                id: t.id,
                name: t.name,
                description: t.description,
                owner_id: None,
            })
            .collect();
        Ok(filter_on(images, filter))
    }

    async fn hardware_profiles(
        &self,
        credentials: &Credentials,
        filter: &Filter,
    ) -> Result<Vec<HardwareProfile>> {
        // RHEV-M has no flavors; sizing comes from the template.
        self.check_credentials(credentials).await?;
        let profiles = vec![
            HardwareProfile {
                id: "SERVER".to_string(),
                name: "SERVER".to_string(),
                memory_mb: None,
                cpus: None,
                storage_gb: None,
                architecture: None,
            },
            HardwareProfile {
                id: "DESKTOP".to_string(),
                name: "DESKTOP".to_string(),
                memory_mb: None,
                cpus: None,
                storage_gb: None,
                architecture: None,
            },
        ];
        Ok(filter_on(profiles, filter))
    }

    async fn instances(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Instance>> {
        let vms: Vms = self.get_collection(credentials, "vms").await?;
        let clusters = self.clusters(credentials).await?;
        let instances = vms
            .vm
            .into_iter()
            .map(|vm| self.to_instance(vm, &clusters))
            .collect();
        Ok(filter_on(instances, filter))
    }

    async fn instance(&self, credentials: &Credentials, id: &str) -> Result<Option<Instance>> {
        if !is_addressable(id) {
            self.check_credentials(credentials).await?;
            return Ok(None);
        }
        let vm: Vm = match self.call(credentials, Method::GET, &["vms", id], None).await? {
            Some(response) => response.json().await?,
            None => return Ok(None),
        };
        let clusters = self.clusters(credentials).await?;
        Ok(Some(self.to_instance(vm, &clusters)))
    }

    async fn create_instance(
        &self,
        credentials: &Credentials,
        request: &InstanceRequest,
    ) -> Result<Instance> {
        let clusters = self.clusters(credentials).await?;
        let cluster = clusters
            .iter()
            .find(|c| match &request.realm_id {
                Some(realm) => c.data_center.as_ref().is_some_and(|dc| &dc.id == realm),
                None => true,
            })
            .ok_or_else(|| {
                DeltacloudError::validation("No cluster available in the requested realm")
            })?;

        let mut body = json!({
            "name": request.name.clone().unwrap_or_else(|| format!("dc-{}", Utc::now().timestamp())),
            "template": { "id": request.image_id },
            "cluster": { "id": cluster.id },
        });
        if let Some(hwp) = &request.hwp_id {
            body["type"] = json!(hwp.to_ascii_lowercase());
        }

        let response = self
            .call(credentials, Method::POST, &["vms"], Some(body))
            .await?
            .ok_or_else(|| DeltacloudError::not_found("image", &request.image_id))?;
        let vm: Vm = response.json().await?;
        tracing::info!("rhevm: created vm {}", vm.id);
        Ok(self.to_instance(vm, &clusters))
    }

    async fn destroy_instance(&self, credentials: &Credentials, id: &str) -> Result<()> {
        if !is_addressable(id) {
            self.check_credentials(credentials).await?;
            return Err(DeltacloudError::not_found("instance", id));
        }
        self.call(credentials, Method::DELETE, &["vms", id], None)
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", id))?;
        Ok(())
    }

    async fn start_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.vm_action(credentials, id, "start").await
    }

    async fn stop_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.vm_action(credentials, id, "stop").await
    }

    async fn reboot_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.vm_action(credentials, id, "reboot").await
    }

    async fn networks(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Network>> {
        let networks: Networks = self.get_collection(credentials, "networks").await?;
        let networks = networks
            .network
            .into_iter()
            .map(|net| Network {
                state: net
                    .status
                    .as_ref()
                    .map(|s| s.as_str().to_ascii_uppercase())
                    .unwrap_or_else(|| "UP".to_string()),
                address_blocks: net.ip.as_ref().and_then(address_block).into_iter().collect(),
                realm_id: net.data_center.map(|dc| dc.id),
                id: net.id,
                name: net.name,
            })
            .collect();
        Ok(filter_on(networks, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_instance_state_mapping() {
        assert_eq!(instance_state("up"), InstanceState::Running);
        assert_eq!(instance_state("down"), InstanceState::Stopped);
        assert_eq!(instance_state("powering_up"), InstanceState::Pending);
        assert_eq!(instance_state("powering_down"), InstanceState::Stopping);
    }

    #[test]
    fn test_created_vms_start_stopped() {
        let driver = RhevmDriver::new("https://rhevm.example.com/api", Client::new());
        let machine = driver.instance_state_machine();
        assert_eq!(
            machine.next(InstanceState::Start, Action::Create),
            Some(InstanceState::Stopped)
        );
        assert_eq!(
            machine.next(InstanceState::Stopped, Action::Start),
            Some(InstanceState::Running)
        );
    }

    #[tokio::test]
    async fn test_instances_resolve_realm_through_cluster() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/vms");
            then.status(200).json_body(json!({
                "vm": [{
                    "id": "vm-1",
                    "name": "db",
                    "status": "up",
                    "template": { "id": "tpl-1" },
                    "cluster": { "id": "cl-1" },
                    "creation_time": 1_356_998_400_000i64
                }]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/clusters");
            then.status(200).json_body(json!({
                "cluster": [{ "id": "cl-1", "data_center": { "id": "dc-1" } }]
            }));
        });

        let driver = RhevmDriver::new(&server.url("/api"), Client::new());
        let instances = driver
            .instances(&Credentials::new("admin@internal", "secret"), &Filter::default())
            .await
            .unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].realm_id.as_deref(), Some("dc-1"));
        assert_eq!(instances[0].image_id.as_deref(), Some("tpl-1"));
        assert_eq!(instances[0].state, InstanceState::Running);
        assert!(instances[0].launch_time.is_some());
    }

    #[tokio::test]
    async fn test_empty_collection_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/templates");
            then.status(200).json_body(json!({}));
        });

        let driver = RhevmDriver::new(&server.url("/api"), Client::new());
        let images = driver
            .images(&Credentials::new("admin@internal", "secret"), &Filter::default())
            .await
            .unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn test_nested_status_is_understood() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/datacenters");
            then.status(200).json_body(json!({
                "data_center": [
                    { "id": "dc-1", "name": "Default", "status": { "state": "up" } },
                    { "id": "dc-2", "name": "Lab", "status": "maintenance" }
                ]
            }));
        });

        let driver = RhevmDriver::new(&server.url("/api"), Client::new());
        let realms = driver
            .realms(&Credentials::new("admin@internal", "secret"), &Filter::default())
            .await
            .unwrap();
        assert_eq!(realms[0].state, "AVAILABLE");
        assert_eq!(realms[1].state, "UNAVAILABLE");
    }
}
