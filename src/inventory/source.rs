use anyhow::Result;

use super::model::{DeviceRecord, NestedRef, SecretsGroup};

/// Read access to an inventory system holding devices and secrets-groups
///
/// `Ok(None)` means the object does not exist; `Err` is reserved for
/// transport and query failures.
#[async_trait::async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch a secrets-group with its full association set
    async fn secrets_group(&self, group_id: &str) -> Result<Option<SecretsGroup>>;

    /// Look up a device by exact name
    async fn device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>>;

    /// Resolve the master device of a virtual chassis, if it declares one
    async fn virtual_chassis_master(&self, chassis: &NestedRef) -> Result<Option<DeviceRecord>>;

    /// Get the inventory type name for display purposes
    fn source_type(&self) -> &'static str;
}
