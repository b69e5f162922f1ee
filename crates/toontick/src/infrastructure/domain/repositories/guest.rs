use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{
        entities::library::GuestEntry,
        repositories::guest::{GuestLibraryError, GuestLibraryRepository},
    },
    infrastructure::utils,
};

/// Guest slot kept as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct GuestLibraryRepositoryImpl {
    path: PathBuf,
}

impl GuestLibraryRepositoryImpl {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl GuestLibraryRepository for GuestLibraryRepositoryImpl {
    async fn load(&self) -> Result<Vec<GuestEntry>, GuestLibraryError> {
        Ok(utils::read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, entries: &[GuestEntry]) -> Result<(), GuestLibraryError> {
        utils::write_json(&self.path, entries).await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), GuestLibraryError> {
        utils::remove_if_exists(&self.path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_missing_slot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = GuestLibraryRepositoryImpl::new(dir.path().join("guest_library.json"));

        assert!(repo.load().await.unwrap().is_empty());
        repo.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guest_library.json");
        let repo = GuestLibraryRepositoryImpl::new(&path);

        let entries: Vec<GuestEntry> = serde_json::from_str(
            r#"[{"id": 1, "title": "Solo Leveling", "status": "PLANNING"}, {"id": "x2", "title": "Lore Olympus"}]"#,
        )
        .unwrap();
        repo.save(&entries).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), entries);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"id\": \"1\""));

        repo.clear().await.unwrap();
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guest_library.json");
        std::fs::write(&path, "{not json").unwrap();

        let repo = GuestLibraryRepositoryImpl::new(&path);
        match repo.load().await {
            Err(GuestLibraryError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("expected malformed slot error, got {other:?}"),
        }
    }
}
