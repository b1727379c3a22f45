use serde::Serialize;
use std::collections::BTreeSet;

/// A driver operation. Drivers advertise the ones they override so the
/// HTTP layer only exposes what the backend can actually do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Realms,
    Realm,
    Images,
    Image,
    HardwareProfiles,
    HardwareProfile,
    Instances,
    Instance,
    CreateInstance,
    DestroyInstance,
    StartInstance,
    StopInstance,
    RebootInstance,
    Networks,
    Network,
    CreateNetwork,
    DestroyNetwork,
    Ports,
    Port,
    CreatePort,
    DestroyPort,
    AddressTemplates,
    AddressTemplate,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Realms => "realms",
            Capability::Realm => "realm",
            Capability::Images => "images",
            Capability::Image => "image",
            Capability::HardwareProfiles => "hardware_profiles",
            Capability::HardwareProfile => "hardware_profile",
            Capability::Instances => "instances",
            Capability::Instance => "instance",
            Capability::CreateInstance => "create_instance",
            Capability::DestroyInstance => "destroy_instance",
            Capability::StartInstance => "start_instance",
            Capability::StopInstance => "stop_instance",
            Capability::RebootInstance => "reboot_instance",
            Capability::Networks => "networks",
            Capability::Network => "network",
            Capability::CreateNetwork => "create_network",
            Capability::DestroyNetwork => "destroy_network",
            Capability::Ports => "ports",
            Capability::Port => "port",
            Capability::CreatePort => "create_port",
            Capability::DestroyPort => "destroy_port",
            Capability::AddressTemplates => "address_templates",
            Capability::AddressTemplate => "address_template",
        }
    }

    /// Single-entity lookups fall back to the list operation, so supporting
    /// the list implies supporting the lookup.
    pub fn implied_by(&self) -> Option<Capability> {
        match self {
            Capability::Realm => Some(Capability::Realms),
            Capability::Image => Some(Capability::Images),
            Capability::HardwareProfile => Some(Capability::HardwareProfiles),
            Capability::Instance => Some(Capability::Instances),
            Capability::Network => Some(Capability::Networks),
            Capability::Port => Some(Capability::Ports),
            Capability::AddressTemplate => Some(Capability::AddressTemplates),
            _ => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new(caps: &[Capability]) -> Self {
        Self(caps.iter().copied().collect())
    }

    pub fn supports(&self, cap: Capability) -> bool {
        self.0.contains(&cap) || cap.implied_by().is_some_and(|list| self.0.contains(&list))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

/// Optional parameter support inside a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    UserName,
    UserData,
    AuthenticationKey,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::UserName => "user_name",
            Feature::UserData => "user_data",
            Feature::AuthenticationKey => "authentication_key",
        }
    }
}

/// `(collection, feature)` pairs a driver declares.
pub type FeatureList = &'static [(&'static str, Feature)];

pub fn has_feature(features: FeatureList, collection: &str, feature: Feature) -> bool {
    features
        .iter()
        .any(|(c, f)| *c == collection && *f == feature)
}

pub fn features_for(features: FeatureList, collection: &str) -> Vec<Feature> {
    features
        .iter()
        .filter(|(c, _)| *c == collection)
        .map(|(_, f)| *f)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_capability_implies_lookup() {
        let caps = CapabilitySet::new(&[Capability::Realms, Capability::CreatePort]);
        assert!(caps.supports(Capability::Realms));
        assert!(caps.supports(Capability::Realm));
        assert!(caps.supports(Capability::CreatePort));
        assert!(!caps.supports(Capability::DestroyPort));
        assert!(!caps.supports(Capability::Network));
    }

    #[test]
    fn test_has_feature() {
        const FEATURES: FeatureList = &[
            ("instances", Feature::UserData),
            ("instances", Feature::AuthenticationKey),
        ];
        assert!(has_feature(FEATURES, "instances", Feature::UserData));
        assert!(!has_feature(FEATURES, "instances", Feature::UserName));
        assert!(!has_feature(FEATURES, "images", Feature::UserData));
        assert_eq!(features_for(FEATURES, "instances").len(), 2);
    }

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::CreatePort.as_str(), "create_port");
        assert_eq!(
            serde_json::to_string(&Capability::HardwareProfiles).unwrap(),
            "\"hardware_profiles\""
        );
    }
}
