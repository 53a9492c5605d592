//! Inventory access
//!
//! Reads devices and secrets-groups from the source of truth. The gateway
//! applies the lookup rules; the source trait is the transport seam.

mod gateway;
pub mod model;
mod nautobot;
mod source;

pub use gateway::InventoryGateway;
pub use model::{
    DeviceRecord, NestedRef, SecretAssociation, SecretDescriptor, SecretParameters, SecretsGroup,
};
pub use nautobot::{NautobotClient, SECRETS_GROUP_QUERY};
pub use source::InventorySource;

#[cfg(test)]
pub(crate) use gateway::tests as test_support;
