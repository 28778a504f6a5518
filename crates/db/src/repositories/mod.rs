use async_trait::async_trait;
use thiserror::Error;

use curator_core::domain::user::{UserId, UserRecord};

pub mod memory;
pub mod user;

pub use memory::InMemoryUserRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// The user-record store. An absent row is `Ok(None)`, never an error, so a
/// first-time user simply reads back as unknown.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError>;
    async fn save(&self, record: UserRecord) -> Result<UserId, RepositoryError>;
}
