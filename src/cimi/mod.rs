// CIMI entities that live partly in the local store.

pub mod address_template;

pub use address_template::{AddressTemplateCreate, CimiContext};
