use std::collections::HashMap;

use tokio::sync::RwLock;

use curator_core::domain::user::{UserId, UserRecord};

use super::{RepositoryError, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, UserRecord>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn save(&self, record: UserRecord) -> Result<UserId, RepositoryError> {
        let mut users = self.users.write().await;
        let id = record.id.clone();
        users.insert(id.0.clone(), record);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use curator_core::domain::user::{UserId, UserRecord};

    use crate::repositories::{InMemoryUserRepository, UserRepository};

    #[tokio::test]
    async fn in_memory_user_repo_round_trip() {
        let repo = InMemoryUserRepository::default();
        let record = UserRecord::new("U1").with_name("tester");

        repo.save(record.clone()).await.expect("save user");
        let found = repo.find_by_id(&record.id).await.expect("find user");

        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn unknown_user_is_none_not_an_error() {
        let repo = InMemoryUserRepository::default();
        let found = repo.find_by_id(&UserId("U-unknown".to_owned())).await.expect("find");
        assert_eq!(found, None);
    }
}
