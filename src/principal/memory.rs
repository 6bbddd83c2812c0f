//! In-process principal store for tests and `--in-memory` mode.

use super::{Allowances, Principal, PrincipalStore};
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Row {
    principal: Principal,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    rows: RwLock<HashMap<Uuid, Row>>,
}

impl MemoryPrincipalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn get(&self, id: Uuid) -> AuthResult<Option<Principal>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .map(|row| row.principal.clone()))
    }

    async fn get_by_email(&self, email: &str) -> AuthResult<Option<Principal>> {
        let email = email.trim();
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|row| row.principal.email.eq_ignore_ascii_case(email))
            .map(|row| row.principal.clone()))
    }

    async fn list(&self) -> AuthResult<Vec<Principal>> {
        let mut principals: Vec<Principal> = self
            .rows
            .read()
            .await
            .values()
            .filter(|row| !row.principal.admin)
            .map(|row| row.principal.clone())
            .collect();
        principals.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(principals)
    }

    async fn password_hash(&self, id: Uuid) -> AuthResult<Option<String>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .map(|row| row.password_hash.clone()))
    }

    async fn create(&self, principal: &Principal, password_hash: &str) -> AuthResult<()> {
        let mut rows = self.rows.write().await;
        let duplicate = rows.contains_key(&principal.id)
            || rows
                .values()
                .any(|row| row.principal.email.eq_ignore_ascii_case(&principal.email));
        if duplicate {
            return Err(AuthError::invalid_input("principal already exists"));
        }
        rows.insert(
            principal.id,
            Row {
                principal: principal.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn update_allowances(&self, id: Uuid, allowances: Allowances) -> AuthResult<bool> {
        Ok(self
            .rows
            .write()
            .await
            .get_mut(&id)
            .map(|row| row.principal.allowances = allowances)
            .is_some())
    }

    async fn set_blocked(&self, id: Uuid, blocked: bool) -> AuthResult<bool> {
        Ok(self
            .rows
            .write()
            .await
            .get_mut(&id)
            .map(|row| row.principal.blocked = blocked)
            .is_some())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<bool> {
        Ok(self
            .rows
            .write()
            .await
            .get_mut(&id)
            .map(|row| row.password_hash = password_hash.to_string())
            .is_some())
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryPrincipalStore::new();
        let first = Principal::new(Uuid::new_v4(), "Ada", "ada@example.com");
        store.create(&first, "hash").await.unwrap();

        let second = Principal::new(Uuid::new_v4(), "Ada Two", "ADA@example.com");
        let result = store.create(&second, "hash").await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn list_hides_the_administrator() {
        let store = MemoryPrincipalStore::new();
        let root = Principal::new(Uuid::new_v4(), "root", "root@example.com").as_admin();
        let user = Principal::new(Uuid::new_v4(), "Ada", "ada@example.com");
        store.create(&root, "hash").await.unwrap();
        store.create(&user, "hash").await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![user]);
    }

    #[tokio::test]
    async fn updates_report_missing_rows() {
        let store = MemoryPrincipalStore::new();
        let id = Uuid::new_v4();
        assert!(!store.set_blocked(id, true).await.unwrap());
        assert!(!store.delete(id).await.unwrap());

        let principal = Principal::new(id, "Ada", "ada@example.com");
        store.create(&principal, "hash").await.unwrap();
        assert!(store.set_blocked(id, true).await.unwrap());
        assert!(store.get(id).await.unwrap().unwrap().blocked);
        assert!(store.update_password(id, "other").await.unwrap());
        assert_eq!(
            store.password_hash(id).await.unwrap().as_deref(),
            Some("other")
        );
    }
}
