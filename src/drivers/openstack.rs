//! OpenStack driver: Keystone v2.0 for authentication, Nova for compute and
//! Neutron for networks and ports.
//!
//! Credentials follow the `user+tenant` convention; the tenant part scopes
//! the Keystone token.

use crate::domain::capability::{Capability, CapabilitySet, Feature, FeatureList};
use crate::domain::filter::{filter_on, Filter};
use crate::domain::model::{
    HardwareProfile, Image, Instance, InstanceRequest, InstanceState, Network, NetworkRequest,
    Port, Realm,
};
use crate::domain::ports::{Credentials, Driver};
use crate::drivers::{check_response, is_addressable, join_url, missing_collection};
use crate::utils::error::{DeltacloudError, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;

const FEATURES: FeatureList = &[
    ("instances", Feature::UserName),
    ("instances", Feature::UserData),
    ("instances", Feature::AuthenticationKey),
];

/// Tokens this close to expiry are renewed before use.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    expires: Option<DateTime<Utc>>,
    catalog: Vec<CatalogEntry>,
}

impl Session {
    fn is_fresh(&self) -> bool {
        match self.expires {
            Some(expires) => expires - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > Utc::now(),
            None => true,
        }
    }
}

// Keystone v2.0 wire types

#[derive(Debug, Deserialize)]
struct AccessResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct Endpoint {
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

// Nova wire types

#[derive(Debug, Deserialize)]
struct AvailabilityZones {
    #[serde(rename = "availabilityZoneInfo")]
    zones: Vec<AvailabilityZone>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityZone {
    #[serde(rename = "zoneName")]
    name: String,
    #[serde(rename = "zoneState")]
    state: ZoneState,
}

#[derive(Debug, Deserialize)]
struct ZoneState {
    available: bool,
}

#[derive(Debug, Deserialize)]
struct NovaImages {
    images: Vec<NovaImage>,
}

#[derive(Debug, Deserialize)]
struct NovaImage {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Flavors {
    flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
struct Flavor {
    id: String,
    name: String,
    ram: Option<u64>,
    vcpus: Option<u32>,
    disk: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Servers {
    servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: Server,
}

#[derive(Debug, Deserialize)]
struct Server {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    tenant_id: Option<String>,
    user_id: Option<String>,
    image: Option<ResourceRef>,
    flavor: Option<ResourceRef>,
    #[serde(rename = "OS-EXT-AZ:availability_zone")]
    availability_zone: Option<String>,
    #[serde(default)]
    addresses: HashMap<String, Vec<ServerAddress>>,
    key_name: Option<String>,
    created: Option<DateTime<Utc>>,
}

/// Nova reports `"image": ""` for volume-backed servers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResourceRef {
    Object { id: String },
    Other(serde_json::Value),
}

impl ResourceRef {
    fn id(&self) -> Option<String> {
        match self {
            ResourceRef::Object { id } => Some(id.clone()),
            ResourceRef::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerAddress {
    addr: String,
    #[serde(rename = "OS-EXT-IPS:type")]
    kind: Option<String>,
}

// Neutron wire types

#[derive(Debug, Deserialize)]
struct NeutronNetworks {
    networks: Vec<NeutronNetwork>,
}

#[derive(Debug, Deserialize)]
struct NeutronNetworkEnvelope {
    network: NeutronNetwork,
}

#[derive(Debug, Deserialize)]
struct NeutronNetwork {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct Subnets {
    subnets: Vec<Subnet>,
}

#[derive(Debug, Deserialize)]
struct Subnet {
    network_id: String,
    cidr: String,
}

#[derive(Debug, Deserialize)]
struct NeutronPorts {
    ports: Vec<NeutronPort>,
}

#[derive(Debug, Deserialize)]
struct NeutronPortEnvelope {
    port: NeutronPort,
}

#[derive(Debug, Deserialize)]
struct NeutronPort {
    id: String,
    network_id: String,
    device_id: Option<String>,
    mac_address: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    fixed_ips: Vec<FixedIp>,
}

#[derive(Debug, Deserialize)]
struct FixedIp {
    ip_address: String,
}

fn instance_state(status: &str) -> InstanceState {
    match status.to_ascii_uppercase().as_str() {
        "ACTIVE" => InstanceState::Running,
        "BUILD" | "REBUILD" | "REBOOT" | "HARD_REBOOT" | "RESIZE" | "VERIFY_RESIZE"
        | "MIGRATING" | "PASSWORD" => InstanceState::Pending,
        "SHUTOFF" | "SUSPENDED" | "PAUSED" | "SHELVED" | "SHELVED_OFFLOADED" | "STOPPED" => {
            InstanceState::Stopped
        }
        "DELETED" | "SOFT_DELETED" => InstanceState::Finished,
        _ => InstanceState::Error,
    }
}

fn image_state(status: &str) -> String {
    match status.to_ascii_uppercase().as_str() {
        "ACTIVE" => "AVAILABLE".to_string(),
        other => other.to_string(),
    }
}

fn split_user(user: &str) -> (&str, Option<&str>) {
    match user.split_once('+') {
        Some((name, tenant)) if !tenant.is_empty() => (name, Some(tenant)),
        _ => (user, None),
    }
}

impl From<Server> for Instance {
    fn from(server: Server) -> Self {
        let mut public_addresses = Vec::new();
        let mut private_addresses = Vec::new();
        for addr in server.addresses.into_values().flatten() {
            match addr.kind.as_deref() {
                Some("floating") => public_addresses.push(addr.addr),
                _ => private_addresses.push(addr.addr),
            }
        }

        Instance {
            id: server.id,
            name: server.name,
            owner_id: server.user_id.or(server.tenant_id),
            image_id: server.image.as_ref().and_then(ResourceRef::id),
            realm_id: server.availability_zone,
            hardware_profile_id: server.flavor.as_ref().and_then(ResourceRef::id),
            state: instance_state(&server.status),
            actions: Vec::new(),
            public_addresses,
            private_addresses,
            keyname: server.key_name,
            launch_time: server.created,
        }
    }
}

impl From<NeutronPort> for Port {
    fn from(port: NeutronPort) -> Self {
        Port {
            id: port.id,
            network_id: port.network_id,
            device_id: port.device_id.filter(|d| !d.is_empty()),
            mac_address: port.mac_address,
            state: port.status,
            addresses: port.fixed_ips.into_iter().map(|ip| ip.ip_address).collect(),
        }
    }
}

pub struct OpenStackDriver {
    auth_url: String,
    region: Option<String>,
    client: Client,
    sessions: RwLock<HashMap<(String, String), Session>>,
}

impl OpenStackDriver {
    pub fn new(auth_url: &str, region: Option<String>, client: Client) -> Self {
        Self {
            auth_url: auth_url.trim_end_matches('/').to_string(),
            region,
            client,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn session(&self, credentials: &Credentials) -> Result<Session> {
        let key = (credentials.user.clone(), credentials.password.clone());
        if let Some(session) = self.sessions.read().await.get(&key) {
            if session.is_fresh() {
                return Ok(session.clone());
            }
        }

        let session = self.authenticate(credentials).await?;
        self.sessions.write().await.insert(key, session.clone());
        Ok(session)
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let (username, tenant) = split_user(&credentials.user);
        let mut auth = json!({
            "passwordCredentials": {
                "username": username,
                "password": credentials.password,
            }
        });
        if let Some(tenant) = tenant {
            auth["tenantName"] = json!(tenant);
        }

        tracing::debug!("openstack: authenticating '{}' against {}", username, self.auth_url);
        let response = self
            .client
            .post(format!("{}/tokens", self.auth_url))
            .json(&json!({ "auth": auth }))
            .send()
            .await?;

        // Keystone v2.0 answers bad credentials with 401, some deployments with 400.
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(DeltacloudError::AuthenticationFailure);
        }
        let access: AccessResponse = check_response(response).await?.json().await?;

        Ok(Session {
            token: access.access.token.id,
            expires: access.access.token.expires,
            catalog: access.access.service_catalog,
        })
    }

    async fn forget_session(&self, credentials: &Credentials) {
        let key = (credentials.user.clone(), credentials.password.clone());
        self.sessions.write().await.remove(&key);
    }

    fn endpoint(&self, session: &Session, service_type: &str) -> Result<String> {
        session
            .catalog
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|ep| match (&self.region, &ep.region) {
                (Some(wanted), Some(region)) => wanted == region,
                _ => true,
            })
            .map(|ep| ep.public_url.trim_end_matches('/').to_string())
            .ok_or_else(|| DeltacloudError::BackendError {
                status: 404,
                message: format!("No '{}' endpoint in the service catalog", service_type),
            })
    }

    fn network_endpoint(&self, session: &Session) -> Result<String> {
        let base = self.endpoint(session, "network")?;
        if base.ends_with("/v2.0") {
            Ok(base)
        } else {
            Ok(format!("{}/v2.0", base))
        }
    }

    /// Sends an authenticated request. `Ok(None)` means the resource does
    /// not exist.
    async fn call(
        &self,
        credentials: &Credentials,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<reqwest::Response>> {
        let session = self.session(credentials).await?;
        self.call_with(&session, credentials, method, url, body).await
    }

    async fn call_with(
        &self,
        session: &Session,
        credentials: &Credentials,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<reqwest::Response>> {
        tracing::debug!("openstack: {} {}", method, url);
        let mut request = self
            .client
            .request(method, url)
            .header("X-Auth-Token", &session.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => {
                self.forget_session(credentials).await;
                Err(DeltacloudError::AuthenticationFailure)
            }
            _ => Ok(Some(check_response(response).await?)),
        }
    }

    /// A single resource; `None` when it does not exist.
    async fn get_json<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        url: &str,
    ) -> Result<Option<T>> {
        match self.call(credentials, Method::GET, url, None).await? {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        url: &str,
    ) -> Result<T> {
        self.get_json(credentials, url)
            .await?
            .ok_or_else(|| missing_collection(url))
    }

    async fn compute_url(&self, credentials: &Credentials, segments: &[&str]) -> Result<String> {
        let session = self.session(credentials).await?;
        join_url(&self.endpoint(&session, "compute")?, segments)
    }

    async fn network_url(&self, credentials: &Credentials, segments: &[&str]) -> Result<String> {
        let session = self.session(credentials).await?;
        join_url(&self.network_endpoint(&session)?, segments)
    }

    async fn server_action(
        &self,
        credentials: &Credentials,
        id: &str,
        action: serde_json::Value,
    ) -> Result<Instance> {
        let url = self
            .compute_url(credentials, &["servers", id, "action"])
            .await?;
        if !is_addressable(id) {
            return Err(DeltacloudError::not_found("instance", id));
        }
        self.call(credentials, Method::POST, &url, Some(action))
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", id))?;
        self.instance(credentials, id)
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", id))
    }

    async fn delete(&self, credentials: &Credentials, url: &str, kind: &str, id: &str) -> Result<()> {
        self.call(credentials, Method::DELETE, url, None)
            .await?
            .ok_or_else(|| DeltacloudError::not_found(kind, id))?;
        Ok(())
    }

    async fn create_subnet(&self, credentials: &Credentials, network_id: &str, cidr: &str) -> Result<()> {
        let url = self.network_url(credentials, &["subnets"]).await?;
        let subnet = json!({
            "subnet": { "network_id": network_id, "cidr": cidr, "ip_version": 4 }
        });
        self.call(credentials, Method::POST, &url, Some(subnet))
            .await?
            .ok_or_else(|| missing_collection(&url))?;
        Ok(())
    }
}

#[async_trait]
impl Driver for OpenStackDriver {
    fn name(&self) -> &'static str {
        "openstack"
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
            Capability::CreateNetwork,
            Capability::DestroyNetwork,
            Capability::Ports,
            Capability::CreatePort,
            Capability::DestroyPort,
        ])
    }

    fn features(&self) -> FeatureList {
        FEATURES
    }

    async fn realms(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Realm>> {
        let url = self.compute_url(credentials, &["os-availability-zone"]).await?;
        let zones: AvailabilityZones = self.get_collection(credentials, &url).await?;

        let realms = zones
            .zones
            .into_iter()
            .map(|zone| Realm {
                id: zone.name.clone(),
                name: zone.name,
                state: if zone.state.available {
                    Realm::AVAILABLE.to_string()
                } else {
                    Realm::UNAVAILABLE.to_string()
                },
                limit: None,
            })
            .collect();
        Ok(filter_on(realms, filter))
    }

    async fn images(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Image>> {
        let url = self.compute_url(credentials, &["images", "detail"]).await?;
        let images: NovaImages = self.get_collection(credentials, &url).await?;

        let owner = split_user(&credentials.user).1.map(str::to_string);
        let images = images
            .images
            .into_iter()
            .map(|image| Image {
                description: image
                    .metadata
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                architecture: image
                    .metadata
                    .get("architecture")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                owner_id: owner.clone(),
                state: image_state(&image.status),
                id: image.id,
                name: image.name,
            })
            .collect();
        Ok(filter_on(images, filter))
    }

    async fn hardware_profiles(
        &self,
        credentials: &Credentials,
        filter: &Filter,
    ) -> Result<Vec<HardwareProfile>> {
        let url = self.compute_url(credentials, &["flavors", "detail"]).await?;
        let flavors: Flavors = self.get_collection(credentials, &url).await?;

        let profiles = flavors
            .flavors
            .into_iter()
            .map(|flavor| HardwareProfile {
                id: flavor.id,
                name: flavor.name,
                memory_mb: flavor.ram,
                cpus: flavor.vcpus,
                storage_gb: flavor.disk,
                architecture: None,
            })
            .collect();
        Ok(filter_on(profiles, filter))
    }

    async fn instances(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Instance>> {
        let url = self.compute_url(credentials, &["servers", "detail"]).await?;
        let servers: Servers = self.get_collection(credentials, &url).await?;
        let instances = servers.servers.into_iter().map(Instance::from).collect();
        Ok(filter_on(instances, filter))
    }

    async fn instance(&self, credentials: &Credentials, id: &str) -> Result<Option<Instance>> {
        let url = self.compute_url(credentials, &["servers", id]).await?;
        if !is_addressable(id) {
            return Ok(None);
        }
        let server: Option<ServerEnvelope> = self.get_json(credentials, &url).await?;
        Ok(server.map(|s| Instance::from(s.server)))
    }

    async fn create_instance(
        &self,
        credentials: &Credentials,
        request: &InstanceRequest,
    ) -> Result<Instance> {
        let mut server = json!({
            "name": request.name.clone().unwrap_or_else(|| format!("dc-{}", Utc::now().timestamp())),
            "imageRef": request.image_id,
            "flavorRef": request.hwp_id.clone().unwrap_or_else(|| "1".to_string()),
        });
        if let Some(realm) = &request.realm_id {
            server["availability_zone"] = json!(realm);
        }
        if let Some(keyname) = &request.keyname {
            server["key_name"] = json!(keyname);
        }
        if let Some(user_data) = &request.user_data {
            server["user_data"] =
                json!(base64::engine::general_purpose::STANDARD.encode(user_data.as_bytes()));
        }

        let url = self.compute_url(credentials, &["servers"]).await?;
        let response = self
            .call(credentials, Method::POST, &url, Some(json!({ "server": server })))
            .await?
            .ok_or_else(|| DeltacloudError::not_found("image", &request.image_id))?;

        #[derive(Deserialize)]
        struct Created {
            server: CreatedServer,
        }
        #[derive(Deserialize)]
        struct CreatedServer {
            id: String,
        }
        let created: Created = response.json().await?;
        tracing::info!("openstack: created server {}", created.server.id);

        self.instance(credentials, &created.server.id)
            .await?
            .ok_or_else(|| DeltacloudError::not_found("instance", &created.server.id))
    }

    async fn destroy_instance(&self, credentials: &Credentials, id: &str) -> Result<()> {
        let url = self.compute_url(credentials, &["servers", id]).await?;
        if !is_addressable(id) {
            return Err(DeltacloudError::not_found("instance", id));
        }
        self.delete(credentials, &url, "instance", id).await
    }

    async fn start_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.server_action(credentials, id, json!({ "os-start": null })).await
    }

    async fn stop_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.server_action(credentials, id, json!({ "os-stop": null })).await
    }

    async fn reboot_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.server_action(credentials, id, json!({ "reboot": { "type": "SOFT" } }))
            .await
    }

    async fn networks(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Network>> {
        let networks: NeutronNetworks = self
            .get_collection(credentials, &self.network_url(credentials, &["networks"]).await?)
            .await?;
        let subnets: Subnets = self
            .get_collection(credentials, &self.network_url(credentials, &["subnets"]).await?)
            .await?;

        let networks = networks
            .networks
            .into_iter()
            .map(|net| Network {
                address_blocks: subnets
                    .subnets
                    .iter()
                    .filter(|s| s.network_id == net.id)
                    .map(|s| s.cidr.clone())
                    .collect(),
                id: net.id,
                name: net.name,
                state: net.status,
                realm_id: None,
            })
            .collect();
        Ok(filter_on(networks, filter))
    }

    async fn create_network(
        &self,
        credentials: &Credentials,
        request: &NetworkRequest,
    ) -> Result<Network> {
        let mut body = json!({ "admin_state_up": true });
        if let Some(name) = &request.name {
            body["name"] = json!(name);
        }
        let url = self.network_url(credentials, &["networks"]).await?;
        let response = self
            .call(credentials, Method::POST, &url, Some(json!({ "network": body })))
            .await?
            .ok_or_else(|| missing_collection(&url))?;
        let created: NeutronNetworkEnvelope = response.json().await?;

        let mut address_blocks = Vec::new();
        if let Some(cidr) = &request.address_block {
            let network_id = &created.network.id;
            if let Err(e) = self.create_subnet(credentials, network_id, cidr).await {
                tracing::warn!(
                    "openstack: subnet {} failed, removing network {}: {}",
                    cidr,
                    network_id,
                    e
                );
                if let Err(cleanup) = self.destroy_network(credentials, network_id).await {
                    tracing::error!("openstack: network {} left behind: {}", network_id, cleanup);
                }
                return Err(e);
            }
            address_blocks.push(cidr.clone());
        }

        Ok(Network {
            id: created.network.id,
            name: created.network.name,
            state: created.network.status,
            address_blocks,
            realm_id: None,
        })
    }

    async fn destroy_network(&self, credentials: &Credentials, id: &str) -> Result<()> {
        let url = self.network_url(credentials, &["networks", id]).await?;
        if !is_addressable(id) {
            return Err(DeltacloudError::not_found("network", id));
        }
        self.delete(credentials, &url, "network", id).await
    }

    async fn ports(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Port>> {
        let ports: NeutronPorts = self
            .get_collection(credentials, &self.network_url(credentials, &["ports"]).await?)
            .await?;
        let ports = ports.ports.into_iter().map(Port::from).collect();
        Ok(filter_on(ports, filter))
    }

    async fn create_port(&self, credentials: &Credentials, network_id: &str) -> Result<Port> {
        let url = self.network_url(credentials, &["ports"]).await?;
        let body = json!({ "port": { "network_id": network_id, "admin_state_up": true } });
        let response = self
            .call(credentials, Method::POST, &url, Some(body))
            .await?
            .ok_or_else(|| DeltacloudError::not_found("network", network_id))?;
        let created: NeutronPortEnvelope = response.json().await?;
        Ok(Port::from(created.port))
    }

    async fn destroy_port(&self, credentials: &Credentials, id: &str) -> Result<()> {
        let url = self.network_url(credentials, &["ports", id]).await?;
        if !is_addressable(id) {
            return Err(DeltacloudError::not_found("port", id));
        }
        self.delete(credentials, &url, "port", id).await
    }
}
