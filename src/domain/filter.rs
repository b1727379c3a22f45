use crate::domain::model::{HardwareProfile, Image, Instance, Network, Port, Realm};
use serde::Deserialize;

/// Query criteria shared by every collection. Criteria that an entity does
/// not carry are ignored for that entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Filter {
    pub id: Option<String>,
    pub state: Option<String>,
    pub realm_id: Option<String>,
    pub architecture: Option<String>,
    pub owner_id: Option<String>,
    pub network_id: Option<String>,
}

impl Filter {
    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Id,
    State,
    RealmId,
    Architecture,
    OwnerId,
    NetworkId,
}

pub trait Filterable {
    /// `None` means the entity has no such attribute; `Some(None)` means it
    /// has one but it is unset.
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>>;
}

pub fn filter_on<T: Filterable>(items: Vec<T>, filter: &Filter) -> Vec<T> {
    let criteria = [
        (Attribute::Id, filter.id.as_deref()),
        (Attribute::State, filter.state.as_deref()),
        (Attribute::RealmId, filter.realm_id.as_deref()),
        (Attribute::Architecture, filter.architecture.as_deref()),
        (Attribute::OwnerId, filter.owner_id.as_deref()),
        (Attribute::NetworkId, filter.network_id.as_deref()),
    ];

    items
        .into_iter()
        .filter(|item| {
            criteria.iter().all(|(attr, wanted)| match (wanted, item.attribute(*attr)) {
                (None, _) | (Some(_), None) => true,
                (Some(wanted), Some(value)) => value == Some(*wanted),
            })
        })
        .collect()
}

impl Filterable for Realm {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::State => Some(Some(self.state.as_str())),
            _ => None,
        }
    }
}

impl Filterable for Image {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::State => Some(Some(self.state.as_str())),
            Attribute::Architecture => Some(self.architecture.as_deref()),
            Attribute::OwnerId => Some(self.owner_id.as_deref()),
            _ => None,
        }
    }
}

impl Filterable for HardwareProfile {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::Architecture => Some(self.architecture.as_deref()),
            _ => None,
        }
    }
}

impl Filterable for Instance {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::State => Some(Some(self.state.as_str())),
            Attribute::RealmId => Some(self.realm_id.as_deref()),
            Attribute::OwnerId => Some(self.owner_id.as_deref()),
            _ => None,
        }
    }
}

impl Filterable for Network {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::State => Some(Some(self.state.as_str())),
            Attribute::RealmId => Some(self.realm_id.as_deref()),
            _ => None,
        }
    }
}

impl Filterable for Port {
    fn attribute(&self, attr: Attribute) -> Option<Option<&str>> {
        match attr {
            Attribute::Id => Some(Some(self.id.as_str())),
            Attribute::State => Some(Some(self.state.as_str())),
            Attribute::NetworkId => Some(Some(self.network_id.as_str())),
            _ => None,
        }
    }
}
