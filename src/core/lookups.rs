use crate::core::{InventoryApi, LookupEntry, LookupTables};
use crate::utils::error::Result;

fn loaded_or_empty(kind: &str, fetched: Result<Vec<LookupEntry>>) -> Vec<LookupEntry> {
    match fetched {
        Ok(entries) => {
            tracing::debug!("Loaded {} {}", entries.len(), kind);
            entries
        }
        Err(e) => {
            tracing::warn!("⚠️ Could not load {}, existence checks skipped: {}", kind, e);
            Vec::new()
        }
    }
}

impl LookupTables {
    /// 同時抓三張對照表；抓不到的表留空 (視為未載入)
    pub async fn fetch<A: InventoryApi + ?Sized>(api: &A) -> Self {
        let (roles, locations, device_types) =
            tokio::join!(api.list_roles(), api.list_locations(), api.list_device_types());

        Self {
            roles: loaded_or_empty("roles", roles),
            locations: loaded_or_empty("locations", locations),
            device_types: loaded_or_empty("device types", device_types),
        }
    }
}
