use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;

use crate::domain::{
    entities::session::{Session, SessionEvent},
    repositories::session::{SessionRepository, SessionRepositoryError},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("user id is required")]
    InvalidUserId,
    #[error("not signed in")]
    NotSignedIn,
    #[error("repository error: {0}")]
    RepositoryError(#[from] SessionRepositoryError),
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Issues and tracks the opaque session of the local user.
pub struct SessionService<R>
where
    R: SessionRepository,
{
    repo: R,
    ttl: Duration,
}

impl<R> SessionService<R>
where
    R: SessionRepository,
{
    pub fn new(repo: R, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    /// The live session, if any. Expired sessions count as signed out.
    pub async fn current(&self) -> Result<Option<Session>, SessionError> {
        let session = self.repo.load().await?;

        Ok(session.filter(|session| {
            let expired = session.is_expired(Utc::now());
            if expired {
                debug!("session of {} expired", session.user_id);
            }
            !expired
        }))
    }

    pub async fn current_user_id(&self) -> Result<Option<String>, SessionError> {
        Ok(self.current().await?.map(|session| session.user_id))
    }

    pub async fn sign_in(&self, user_id: &str) -> Result<(Session, SessionEvent), SessionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SessionError::InvalidUserId);
        }

        let session = Session {
            user_id: user_id.to_string(),
            token: generate_token(),
            expires_at: Utc::now() + self.ttl,
        };
        self.repo.save(&session).await?;

        info!("signed in as {user_id}");

        Ok((session, SessionEvent::SignedIn(user_id.to_string())))
    }

    pub async fn sign_out(&self) -> Result<SessionEvent, SessionError> {
        self.repo.delete().await?;

        info!("signed out");

        Ok(SessionEvent::SignedOut)
    }

    /// Rotates the token of the current session and extends its expiry.
    pub async fn refresh(&self) -> Result<SessionEvent, SessionError> {
        let mut session = self.current().await?.ok_or(SessionError::NotSignedIn)?;

        session.token = generate_token();
        session.expires_at = Utc::now() + self.ttl;
        self.repo.save(&session).await?;

        Ok(SessionEvent::TokenRefreshed(session))
    }
}
