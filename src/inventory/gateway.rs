use tracing::{debug, error, info, warn};

use super::model::SecretsGroup;
use super::source::InventorySource;

/// Resolves secrets-groups from the inventory
///
/// Not found is a normal outcome here. Transport and query failures are
/// logged and reported as absence, so callers only ever see `Option`.
pub struct InventoryGateway {
    source: Box<dyn InventorySource>,
}

impl InventoryGateway {
    pub fn new(source: Box<dyn InventorySource>) -> Self {
        Self { source }
    }

    /// Fetch a secrets-group with its associations by group id
    pub async fn group_info_by_id(&self, group_id: &str) -> Option<SecretsGroup> {
        match self.source.secrets_group(group_id).await {
            Ok(Some(group)) => Some(group),
            Ok(None) => {
                warn!("Secrets group {} not found in {}", group_id, self.source.source_type());
                None
            }
            Err(e) => {
                error!("Error querying {}: {:#}", self.source.source_type(), e);
                None
            }
        }
    }

    /// Resolve the secrets-group assigned to a device
    ///
    /// A device without its own group inherits the group of its virtual
    /// chassis master, when the chassis declares one.
    pub async fn group_info_from_device(&self, device_name: &str) -> Option<SecretsGroup> {
        let mut device = match self.source.device_by_name(device_name).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!("Device {} not found in {}", device_name, self.source.source_type());
                return None;
            }
            Err(e) => {
                error!("Error looking up device {}: {:#}", device_name, e);
                return None;
            }
        };

        if device.secrets_group.is_none() {
            if let Some(chassis) = &device.virtual_chassis {
                match self.source.virtual_chassis_master(chassis).await {
                    Ok(Some(master)) => {
                        debug!(
                            "Device {} has no secrets group, using virtual chassis master {}",
                            device_name,
                            master.name.as_deref().unwrap_or(&master.id)
                        );
                        device = master;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            "Error resolving virtual chassis master for {}: {:#}",
                            device_name, e
                        );
                        return None;
                    }
                }
            }
        }

        let Some(group) = device.secrets_group else {
            info!("Device {} has no secrets group", device_name);
            return None;
        };

        self.group_info_by_id(&group.id).await
    }
}
