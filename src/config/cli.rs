use crate::core::Storage;
use crate::utils::error::Result;
use std::path::PathBuf;

/// Writes the CSV under a local directory instead of blob storage.
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

    fn full_path(&self, path: &str) -> PathBuf {
        // Blob paths always use '/', whatever the host separator is.
        path.split('/')
            .fold(self.base_path.clone(), |acc, segment| acc.join(segment))
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.full_path(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn destination(&self, path: &str) -> String {
        self.full_path(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_folders_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage
            .write_file("Quick Stats/hemp_nass_data.csv", b"old")
            .await
            .unwrap();
        storage
            .write_file("Quick Stats/hemp_nass_data.csv", b"new")
            .await
            .unwrap();

        let on_disk = temp_dir.path().join("Quick Stats").join("hemp_nass_data.csv");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"new");
        assert_eq!(
            storage.read_file("Quick Stats/hemp_nass_data.csv").await.unwrap(),
            b"new"
        );
        assert_eq!(
            storage.destination("Quick Stats/hemp_nass_data.csv"),
            on_disk.display().to_string()
        );
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        let err = storage.read_file("missing.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::EtlError::IoError(_)));
    }
}
