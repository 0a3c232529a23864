use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 本機檔案系統；相對路徑以 base_path 為準，絕對路徑直接使用
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(Path::new(path))
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directories_and_reads_back() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage
            .write_file("reports/run.json", b"{\"ok\":true}")
            .await
            .unwrap();
        let data = storage.read_file("reports/run.json").await.unwrap();

        assert_eq!(data, b"{\"ok\":true}");
        assert!(temp_dir.path().join("reports/run.json").exists());
    }

    #[tokio::test]
    async fn test_absolute_paths_ignore_base() {
        let temp_dir = TempDir::new().unwrap();
        let absolute = temp_dir.path().join("devices.csv");
        std::fs::write(&absolute, "name\nsw-1\n").unwrap();

        let storage = LocalStorage::new("/does/not/matter");
        let data = storage.read_file(absolute.to_str().unwrap()).await.unwrap();
        assert_eq!(data, b"name\nsw-1\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let err = storage.read_file("nope.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::ImportError::IoError(_)));
    }
}
