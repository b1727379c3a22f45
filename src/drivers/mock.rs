use crate::domain::capability::{Capability, CapabilitySet, Feature, FeatureList};
use crate::domain::filter::{filter_on, Filter};
use crate::domain::model::{
    HardwareProfile, Image, Instance, InstanceRequest, InstanceState, Network, NetworkRequest,
    Port, Realm,
};
use crate::domain::ports::{Credentials, Driver};
use crate::domain::state::{Action, StateMachine};
use crate::utils::error::{DeltacloudError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

const MOCK_USER: &str = "mockuser";
const MOCK_PASSWORD: &str = "mockpassword";

const FEATURES: FeatureList = &[
    ("instances", Feature::UserName),
    ("instances", Feature::UserData),
    ("instances", Feature::AuthenticationKey),
];

struct MockState {
    instances: Vec<Instance>,
    networks: Vec<Network>,
    ports: Vec<Port>,
    next_id: u32,
}

/// In-memory provider used for development and tests.
pub struct MockDriver {
    realms: Vec<Realm>,
    images: Vec<Image>,
    hardware_profiles: Vec<HardwareProfile>,
    state: Mutex<MockState>,
    machine: StateMachine,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        let realm = |id: &str, name: &str| Realm {
            id: id.to_string(),
            name: name.to_string(),
            state: Realm::AVAILABLE.to_string(),
            limit: None,
        };
        let image = |id: &str, name: &str, owner: &str, arch: &str| Image {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(name.to_string()),
            owner_id: Some(owner.to_string()),
            architecture: Some(arch.to_string()),
            state: "AVAILABLE".to_string(),
        };
        let profile = |id: &str, memory_mb: u64, cpus: u32, storage_gb: u64, arch: &str| {
            HardwareProfile {
                id: id.to_string(),
                name: id.to_string(),
                memory_mb: Some(memory_mb),
                cpus: Some(cpus),
                storage_gb: Some(storage_gb),
                architecture: Some(arch.to_string()),
            }
        };

        let instances = vec![
            Instance {
                id: "inst0".to_string(),
                name: "Mock Instance With Profile Change".to_string(),
                owner_id: Some(MOCK_USER.to_string()),
                image_id: Some("img1".to_string()),
                realm_id: Some("us".to_string()),
                hardware_profile_id: Some("m1-large".to_string()),
                state: InstanceState::Running,
                actions: Vec::new(),
                public_addresses: vec!["img1.inst0.public.com".to_string()],
                private_addresses: vec!["img1.inst0.private.com".to_string()],
                keyname: None,
                launch_time: Some(Utc::now()),
            },
            Instance {
                id: "inst1".to_string(),
                name: "MockUserInstance".to_string(),
                owner_id: Some(MOCK_USER.to_string()),
                image_id: Some("img3".to_string()),
                realm_id: Some("eu".to_string()),
                hardware_profile_id: Some("m1-small".to_string()),
                state: InstanceState::Stopped,
                actions: Vec::new(),
                public_addresses: vec!["img3.inst1.public.com".to_string()],
                private_addresses: vec!["img3.inst1.private.com".to_string()],
                keyname: None,
                launch_time: Some(Utc::now()),
            },
        ];

        let networks = vec![
            Network {
                id: "net1".to_string(),
                name: "default".to_string(),
                state: "UP".to_string(),
                address_blocks: vec!["10.0.0.0/24".to_string()],
                realm_id: Some("us".to_string()),
            },
            Network {
                id: "net2".to_string(),
                name: "storage".to_string(),
                state: "UP".to_string(),
                address_blocks: vec!["192.168.10.0/24".to_string()],
                realm_id: Some("eu".to_string()),
            },
        ];

        let ports = vec![Port {
            id: "port1".to_string(),
            network_id: "net1".to_string(),
            device_id: Some("inst0".to_string()),
            mac_address: Some("52:54:00:00:00:01".to_string()),
            state: "ACTIVE".to_string(),
            addresses: vec!["10.0.0.2".to_string()],
        }];

        Self {
            realms: vec![realm("us", "United States"), realm("eu", "Europe")],
            images: vec![
                image("img1", "Fedora 10", "fedoraproject", "x86_64"),
                image("img2", "Fedora 10", "fedoraproject", "i386"),
                image("img3", "JBoss", MOCK_USER, "i386"),
            ],
            hardware_profiles: vec![
                profile("m1-small", 1740, 1, 160, "i386"),
                profile("m1-large", 7680, 2, 850, "x86_64"),
                profile("m1-xlarge", 15360, 4, 1690, "x86_64"),
            ],
            state: Mutex::new(MockState {
                instances,
                networks,
                ports,
                next_id: 2,
            }),
            machine: StateMachine::standard(),
        }
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        if credentials.user == MOCK_USER && credentials.password == MOCK_PASSWORD {
            Ok(())
        } else {
            Err(DeltacloudError::AuthenticationFailure)
        }
    }

    async fn apply_action(
        &self,
        credentials: &Credentials,
        id: &str,
        action: Action,
    ) -> Result<Instance> {
        self.authenticate(credentials)?;
        let mut state = self.state.lock().await;
        let instance = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| DeltacloudError::not_found("instance", id))?;

        let next = self.machine.next(instance.state, action).ok_or_else(|| {
            DeltacloudError::InvalidState {
                action: action.as_str().to_string(),
                state: instance.state.to_string(),
            }
        })?;
        tracing::debug!("mock: {} {} -> {}", id, instance.state, next);
        instance.state = next;
        Ok(instance.clone())
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
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

    fn instance_state_machine(&self) -> StateMachine {
        self.machine.clone()
    }

    async fn realms(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Realm>> {
        self.authenticate(credentials)?;
        Ok(filter_on(self.realms.clone(), filter))
    }

    async fn images(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Image>> {
        self.authenticate(credentials)?;
        Ok(filter_on(self.images.clone(), filter))
    }

    async fn hardware_profiles(
        &self,
        credentials: &Credentials,
        filter: &Filter,
    ) -> Result<Vec<HardwareProfile>> {
        self.authenticate(credentials)?;
        Ok(filter_on(self.hardware_profiles.clone(), filter))
    }

    async fn instances(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Instance>> {
        self.authenticate(credentials)?;
        let state = self.state.lock().await;
        Ok(filter_on(state.instances.clone(), filter))
    }

    async fn create_instance(
        &self,
        credentials: &Credentials,
        request: &InstanceRequest,
    ) -> Result<Instance> {
        self.authenticate(credentials)?;
        if !self.images.iter().any(|i| i.id == request.image_id) {
            return Err(DeltacloudError::validation(format!(
                "Image '{}' does not exist",
                request.image_id
            )));
        }
        let realm_id = request.realm_id.clone().unwrap_or_else(|| "us".to_string());
        if !self.realms.iter().any(|r| r.id == realm_id) {
            return Err(DeltacloudError::validation(format!(
                "Realm '{}' does not exist",
                realm_id
            )));
        }
        let hwp_id = request.hwp_id.clone().unwrap_or_else(|| "m1-small".to_string());
        if !self.hardware_profiles.iter().any(|h| h.id == hwp_id) {
            return Err(DeltacloudError::validation(format!(
                "Hardware profile '{}' does not exist",
                hwp_id
            )));
        }

        let state = self
            .machine
            .next(InstanceState::Start, Action::Create)
            .unwrap_or(InstanceState::Pending);

        let mut store = self.state.lock().await;
        let id = format!("inst{}", store.next_id);
        store.next_id += 1;
        let instance = Instance {
            name: request.name.clone().unwrap_or_else(|| id.clone()),
            owner_id: Some(credentials.user.clone()),
            image_id: Some(request.image_id.clone()),
            realm_id: Some(realm_id),
            hardware_profile_id: Some(hwp_id),
            state,
            actions: Vec::new(),
            public_addresses: vec![format!("{}.{}.public.com", request.image_id, id)],
            private_addresses: vec![format!("{}.{}.private.com", request.image_id, id)],
            keyname: request.keyname.clone(),
            launch_time: Some(Utc::now()),
            id,
        };
        store.instances.push(instance.clone());
        tracing::info!("mock: created instance {}", instance.id);
        Ok(instance)
    }

    async fn destroy_instance(&self, credentials: &Credentials, id: &str) -> Result<()> {
        self.apply_action(credentials, id, Action::Destroy).await?;
        let mut state = self.state.lock().await;
        state.instances.retain(|i| i.id != id);
        Ok(())
    }

    async fn start_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.apply_action(credentials, id, Action::Start).await
    }

    async fn stop_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.apply_action(credentials, id, Action::Stop).await
    }

    async fn reboot_instance(&self, credentials: &Credentials, id: &str) -> Result<Instance> {
        self.apply_action(credentials, id, Action::Reboot).await
    }

    async fn networks(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Network>> {
        self.authenticate(credentials)?;
        let state = self.state.lock().await;
        Ok(filter_on(state.networks.clone(), filter))
    }

    async fn create_network(
        &self,
        credentials: &Credentials,
        request: &NetworkRequest,
    ) -> Result<Network> {
        self.authenticate(credentials)?;
        let mut state = self.state.lock().await;
        let id = format!("net{}", state.next_id);
        state.next_id += 1;
        let network = Network {
            name: request.name.clone().unwrap_or_else(|| id.clone()),
            state: "UP".to_string(),
            address_blocks: request.address_block.iter().cloned().collect(),
            realm_id: Some("us".to_string()),
            id,
        };
        state.networks.push(network.clone());
        Ok(network)
    }

    async fn destroy_network(&self, credentials: &Credentials, id: &str) -> Result<()> {
        self.authenticate(credentials)?;
        let mut state = self.state.lock().await;
        let before = state.networks.len();
        state.networks.retain(|n| n.id != id);
        if state.networks.len() == before {
            return Err(DeltacloudError::not_found("network", id));
        }
        state.ports.retain(|p| p.network_id != id);
        Ok(())
    }

    async fn ports(&self, credentials: &Credentials, filter: &Filter) -> Result<Vec<Port>> {
        self.authenticate(credentials)?;
        let state = self.state.lock().await;
        Ok(filter_on(state.ports.clone(), filter))
    }

    async fn create_port(&self, credentials: &Credentials, network_id: &str) -> Result<Port> {
        self.authenticate(credentials)?;
        let mut state = self.state.lock().await;
        if !state.networks.iter().any(|n| n.id == network_id) {
            return Err(DeltacloudError::not_found("network", network_id));
        }
        let n = state.next_id;
        state.next_id += 1;
        let port = Port {
            id: format!("port{}", n),
            network_id: network_id.to_string(),
            device_id: None,
            mac_address: Some(format!("52:54:00:00:{:02x}:{:02x}", (n >> 8) & 0xff, n & 0xff)),
            state: "DOWN".to_string(),
            addresses: Vec::new(),
        };
        state.ports.push(port.clone());
        Ok(port)
    }

    async fn destroy_port(&self, credentials: &Credentials, id: &str) -> Result<()> {
        self.authenticate(credentials)?;
        let mut state = self.state.lock().await;
        let before = state.ports.len();
        state.ports.retain(|p| p.id != id);
        if state.ports.len() == before {
            return Err(DeltacloudError::not_found("port", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new(MOCK_USER, MOCK_PASSWORD)
    }

    #[tokio::test]
    async fn test_wrong_credentials() {
        let driver = MockDriver::new();
        let result = driver
            .realms(&Credentials::new("unknown", "wrong"), &Filter::default())
            .await;
        assert!(matches!(result, Err(DeltacloudError::AuthenticationFailure)));
    }

    #[tokio::test]
    async fn test_realm_lookup() {
        let driver = MockDriver::new();
        let realm = driver.realm(&credentials(), "us").await.unwrap().unwrap();
        assert_eq!(realm.state, "AVAILABLE");
        assert!(driver.realm(&credentials(), "unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_instance_lifecycle() {
        let driver = MockDriver::new();
        let request = InstanceRequest {
            image_id: "img1".to_string(),
            ..InstanceRequest::default()
        };
        let instance = driver.create_instance(&credentials(), &request).await.unwrap();
        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(instance.realm_id.as_deref(), Some("us"));

        let err = driver
            .destroy_instance(&credentials(), &instance.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeltacloudError::InvalidState { .. }));

        let stopped = driver.stop_instance(&credentials(), &instance.id).await.unwrap();
        assert_eq!(stopped.state, InstanceState::Stopped);

        driver.destroy_instance(&credentials(), &instance.id).await.unwrap();
        assert!(driver
            .instance(&credentials(), &instance.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_instance_with_unknown_image() {
        let driver = MockDriver::new();
        let request = InstanceRequest {
            image_id: "nope".to_string(),
            ..InstanceRequest::default()
        };
        let err = driver.create_instance(&credentials(), &request).await.unwrap_err();
        assert!(matches!(err, DeltacloudError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_port_create_and_destroy() {
        let driver = MockDriver::new();
        let port = driver.create_port(&credentials(), "net2").await.unwrap();
        assert_eq!(port.network_id, "net2");

        let filter = Filter {
            network_id: Some("net2".to_string()),
            ..Filter::default()
        };
        assert_eq!(driver.ports(&credentials(), &filter).await.unwrap().len(), 1);

        driver.destroy_port(&credentials(), &port.id).await.unwrap();
        let err = driver.destroy_port(&credentials(), &port.id).await.unwrap_err();
        assert!(matches!(err, DeltacloudError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_port_on_missing_network() {
        let driver = MockDriver::new();
        let err = driver.create_port(&credentials(), "missing").await.unwrap_err();
        assert!(matches!(err, DeltacloudError::NotFound { .. }));
    }

    #[test]
    fn test_address_templates_not_advertised() {
        let driver = MockDriver::new();
        assert!(!driver.supports(Capability::AddressTemplates));
        assert!(driver.supports(Capability::Port));
        assert!(driver.has_feature("instances", Feature::UserData));
    }
}
