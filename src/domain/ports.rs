use crate::domain::model::{AddDeviceRequest, AddDeviceResponse, CsvDefaults, LookupEntry};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn api_token(&self) -> Option<&str>;
    fn timeout_seconds(&self) -> u64;
    fn concurrent_requests(&self) -> usize;
}

/// 後端盤點系統 API
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// 查詢 IP (不含前綴長度) 目前綁定的裝置名稱
    async fn find_ip_owner(&self, ip: &str) -> Result<Option<String>>;
    async fn add_device(&self, request: &AddDeviceRequest) -> Result<AddDeviceResponse>;
    async fn list_roles(&self) -> Result<Vec<LookupEntry>>;
    async fn list_locations(&self) -> Result<Vec<LookupEntry>>;
    async fn list_device_types(&self) -> Result<Vec<LookupEntry>>;
    async fn csv_defaults(&self) -> Result<CsvDefaults>;
}
