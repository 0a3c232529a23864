use crate::core::{CsvParseResult, InventoryApi, IpConflict, ParsedDevice};
use crate::utils::error::ImportError;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    #[default]
    Off,
    Remove,
    Flag,
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictMode::Off => "off",
            ConflictMode::Remove => "remove",
            ConflictMode::Flag => "flag",
        })
    }
}

impl FromStr for ConflictMode {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" => Ok(ConflictMode::Off),
            "remove" => Ok(ConflictMode::Remove),
            "flag" => Ok(ConflictMode::Flag),
            _ => Err(ImportError::InvalidConfigValueError {
                field: "import.check_ip".to_string(),
                value: s.to_string(),
                reason: "Expected one of: off, remove, flag".to_string(),
            }),
        }
    }
}

/// 去掉前綴長度，查詢只接受純 IP
pub fn bare_ip(ip: &str) -> &str {
    let ip = ip.trim();
    ip.split_once('/').map(|(address, _)| address).unwrap_or(ip).trim()
}

struct OwnerLookup {
    device_index: usize,
    ip: String,
    owner: Option<String>,
}

/// 依裝置與介面順序查詢每個 IP 的擁有者；結果順序不受完成先後影響
async fn lookup_owners<A>(devices: &[ParsedDevice], api: &A, concurrency: usize) -> Vec<OwnerLookup>
where
    A: InventoryApi + ?Sized,
{
    let queries: Vec<(usize, String)> = devices
        .iter()
        .enumerate()
        .flat_map(|(index, device)| {
            device
                .addressed_interfaces()
                .map(move |(_, ip)| (index, ip.to_string()))
        })
        .collect();

    tracing::info!(
        "🔎 Checking {} IP address(es) on {} device(s)",
        queries.len(),
        devices.len()
    );

    stream::iter(queries)
        .map(|(device_index, ip)| async move {
            let owner = match api.find_ip_owner(bare_ip(&ip)).await {
                Ok(owner) => owner,
                Err(e) => {
                    tracing::warn!("⚠️ IP lookup for {} failed, treating as free: {}", ip, e);
                    None
                }
            };
            OwnerLookup {
                device_index,
                ip,
                owner,
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// 找出已被佔用的 IP，回傳移除這些裝置後的新結果
///
/// 只要 IP 已有擁有者就移除，不論擁有者是否與匯入裝置同名。
pub async fn check_and_remove<A>(
    result: &CsvParseResult,
    api: &A,
    concurrency: usize,
) -> (CsvParseResult, Vec<IpConflict>)
where
    A: InventoryApi + ?Sized,
{
    let lookups = lookup_owners(&result.devices, api, concurrency).await;

    let mut conflicts = Vec::new();
    let mut removed: HashSet<usize> = HashSet::new();
    for lookup in lookups {
        if let Some(owner) = lookup.owner {
            let device = &result.devices[lookup.device_index];
            tracing::info!(
                "🚫 {} uses {} which belongs to {}, removing",
                device.name,
                lookup.ip,
                owner
            );
            conflicts.push(IpConflict {
                device: device.name.clone(),
                ip: lookup.ip,
                assigned_to: owner,
            });
            removed.insert(lookup.device_index);
        }
    }

    let removed_names: HashSet<&str> = removed
        .iter()
        .map(|index| result.devices[*index].name.as_str())
        .collect();

    let filtered = CsvParseResult {
        devices: result
            .devices
            .iter()
            .enumerate()
            .filter(|(index, _)| !removed.contains(index))
            .map(|(_, device)| device.clone())
            .collect(),
        headers: result.headers.clone(),
        mapping: result.mapping.clone(),
        validation_errors: result
            .validation_errors
            .iter()
            .filter(|issue| !removed_names.contains(issue.device_name.as_str()))
            .cloned()
            .collect(),
        row_count: result.row_count,
    };

    (filtered, conflicts)
}

/// 只標記 IP 屬於其他裝置的情況，裝置保留在匯入清單中
pub async fn check_and_flag<A>(
    result: &CsvParseResult,
    api: &A,
    concurrency: usize,
) -> Vec<IpConflict>
where
    A: InventoryApi + ?Sized,
{
    let lookups = lookup_owners(&result.devices, api, concurrency).await;

    lookups
        .into_iter()
        .filter_map(|lookup| {
            let device = &result.devices[lookup.device_index];
            match lookup.owner {
                Some(owner) if !owner.eq_ignore_ascii_case(&device.name) => {
                    tracing::info!("🚩 {} uses {} which belongs to {}", device.name, lookup.ip, owner);
                    Some(IpConflict {
                        device: device.name.clone(),
                        ip: lookup.ip,
                        assigned_to: owner,
                    })
                }
                _ => None,
            }
        })
        .collect()
}
