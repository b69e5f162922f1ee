use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{
        entities::session::Session,
        repositories::session::{SessionRepository, SessionRepositoryError},
    },
    infrastructure::utils,
};

#[derive(Debug, Clone)]
pub struct SessionRepositoryImpl {
    path: PathBuf,
}

impl SessionRepositoryImpl {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn load(&self) -> Result<Option<Session>, SessionRepositoryError> {
        Ok(utils::read_json(&self.path).await?)
    }

    async fn save(&self, session: &Session) -> Result<(), SessionRepositoryError> {
        utils::write_json(&self.path, session).await?;

        Ok(())
    }

    async fn delete(&self) -> Result<(), SessionRepositoryError> {
        utils::remove_if_exists(&self.path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn test_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SessionRepositoryImpl::new(dir.path().join("session.json"));

        assert!(repo.load().await.unwrap().is_none());

        let session = Session {
            user_id: "reader-1".to_string(),
            token: "abc".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        repo.save(&session).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), Some(session));

        repo.delete().await.unwrap();
        assert!(repo.load().await.unwrap().is_none());
    }
}
