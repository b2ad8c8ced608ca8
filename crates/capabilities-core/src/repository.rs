//! Generic CRUD contract for per-industry policies (§6): campaign/contact
//! entities the outbound conversation policy may need to read or update.
//! The core treats this as an opaque collaborator; no persistence or ORM
//! concerns live in this crate.

use async_trait::async_trait;

use crate::error::Result;

/// Marker for a type the repository can store and fetch by string id.
pub trait Entity: Send + Sync + Clone {
    fn id(&self) -> &str;
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<T>>;
    async fn save(&self, entity: &T) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<T>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Campaign {
        id: String,
        name: String,
    }

    impl Entity for Campaign {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Default)]
    struct InMemoryRepo(Arc<Mutex<HashMap<String, Campaign>>>);

    #[async_trait]
    impl Repository<Campaign> for InMemoryRepo {
        async fn get(&self, id: &str) -> Result<Option<Campaign>> {
            Ok(self.0.lock().get(id).cloned())
        }

        async fn save(&self, entity: &Campaign) -> Result<()> {
            self.0.lock().insert(entity.id().to_string(), entity.clone());
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.0.lock().remove(id);
            Ok(())
        }

        async fn list(&self) -> Result<Vec<Campaign>> {
            Ok(self.0.lock().values().cloned().collect())
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let repo = InMemoryRepo::default();
        let campaign = Campaign { id: "c1".into(), name: "Reminder".into() };
        repo.save(&campaign).await.unwrap();
        let fetched = repo.get("c1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Reminder");
    }

    #[tokio::test]
    async fn delete_removes_entity() {
        let repo = InMemoryRepo::default();
        let campaign = Campaign { id: "c1".into(), name: "Reminder".into() };
        repo.save(&campaign).await.unwrap();
        repo.delete("c1").await.unwrap();
        assert!(repo.get("c1").await.unwrap().is_none());
    }
}
