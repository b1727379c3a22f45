use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Start,
    Pending,
    Running,
    Stopping,
    Stopped,
    Finished,
    Error,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Start => "START",
            InstanceState::Pending => "PENDING",
            InstanceState::Running => "RUNNING",
            InstanceState::Stopping => "STOPPING",
            InstanceState::Stopped => "STOPPED",
            InstanceState::Finished => "FINISHED",
            InstanceState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realm {
    pub id: String,
    pub name: String,
    pub state: String,
    pub limit: Option<String>,
}

impl Realm {
    pub const AVAILABLE: &'static str = "AVAILABLE";
    pub const UNAVAILABLE: &'static str = "UNAVAILABLE";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub architecture: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub id: String,
    pub name: String,
    pub memory_mb: Option<u64>,
    pub cpus: Option<u32>,
    pub storage_gb: Option<u64>,
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    pub image_id: Option<String>,
    pub realm_id: Option<String>,
    pub hardware_profile_id: Option<String>,
    pub state: InstanceState,
    /// Filled from the driver's state machine before rendering.
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub public_addresses: Vec<String>,
    #[serde(default)]
    pub private_addresses: Vec<String>,
    pub keyname: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub address_blocks: Vec<String>,
    pub realm_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    pub device_id: Option<String>,
    pub mac_address: Option<String>,
    pub state: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Parameters accepted by `create_instance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub image_id: String,
    pub realm_id: Option<String>,
    pub hwp_id: Option<String>,
    pub name: Option<String>,
    pub keyname: Option<String>,
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub name: Option<String>,
    pub address_block: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLink {
    pub rel: String,
    pub href: String,
}

/// CIMI address template. `id` and `network` are hrefs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressTemplate {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: String,
    pub hostname: Option<String>,
    pub allocation: Option<String>,
    pub default_gateway: Option<String>,
    pub dns: Option<String>,
    pub protocol: Option<String>,
    pub mask: Option<String>,
    pub network: Option<String>,
    pub property: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub operations: Vec<OperationLink>,
}
