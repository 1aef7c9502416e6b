use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{BoxFuture, DirectoryError, UserDirectory, UserRecord};
use crate::permissions::Role;

/// One user entry of a JSON seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub email_verified: bool,
    pub role_id: Uuid,
    // Static second-factor code for fixture users
    #[serde(default)]
    pub two_factor_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Seed {
    roles: Vec<Role>,
    users: Vec<SeedUser>,
}

/// In-process directory used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: HashMap<Uuid, UserRecord>,
    by_email: HashMap<String, Uuid>,
    roles: HashMap<Uuid, Role>,
    second_factor: HashMap<Uuid, String>,
}

impl MemoryDirectory {
    pub fn new(roles: Vec<Role>, users: Vec<SeedUser>) -> Result<Self, DirectoryError> {
        let mut dir = MemoryDirectory {
            roles: roles.into_iter().map(|r| (r.id, r)).collect(),
            ..Default::default()
        };

        for user in users {
            let role = dir.roles.get(&user.role_id).cloned().ok_or_else(|| {
                DirectoryError::Seed(format!("user {} references unknown role", user.id))
            })?;
            if let Some(code) = user.two_factor_code {
                dir.second_factor.insert(user.id, code);
            }
            dir.by_email.insert(user.email.to_lowercase(), user.id);
            dir.users.insert(
                user.id,
                UserRecord {
                    id: user.id,
                    two_factor_enabled: dir.second_factor.contains_key(&user.id),
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    password_hash: user.password_hash,
                    email_verified: user.email_verified,
                    role,
                },
            );
        }

        Ok(dir)
    }

    /// Load `{"roles": [...], "users": [...]}` from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DirectoryError::Seed(e.to_string()))?;
        let seed: Seed =
            serde_json::from_str(&raw).map_err(|e| DirectoryError::Seed(e.to_string()))?;
        Self::new(seed.roles, seed.users)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for MemoryDirectory {
    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DirectoryError>> {
        Box::pin(async move {
            Ok(self
                .by_email
                .get(&email.trim().to_lowercase())
                .and_then(|id| self.users.get(id))
                .cloned())
        })
    }

    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRecord>, DirectoryError>> {
        Box::pin(async move { Ok(self.users.get(&id).cloned()) })
    }

    fn find_role(&self, role_id: Uuid) -> BoxFuture<'_, Result<Option<Role>, DirectoryError>> {
        Box::pin(async move { Ok(self.roles.get(&role_id).cloned()) })
    }

    fn verify_second_factor<'a>(
        &'a self,
        user_id: Uuid,
        code: &'a str,
    ) -> BoxFuture<'a, Result<bool, DirectoryError>> {
        Box::pin(async move {
            Ok(self
                .second_factor
                .get(&user_id)
                .is_some_and(|expected| {
                    expected.len() == code.len() && bool::from(expected.as_bytes().ct_eq(code.as_bytes()))
                }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"{
        "roles": [{"id": "11111111-1111-1111-1111-111111111111", "roleName": "admin",
                   "permissions": [{"resource": "users", "actions": ["read"]}]}],
        "users": [{"id": "22222222-2222-2222-2222-222222222222", "email": "Ada@Example.com",
                   "firstName": "Ada", "lastName": "L", "passwordHash": "x",
                   "emailVerified": true, "roleId": "11111111-1111-1111-1111-111111111111",
                   "twoFactorCode": "123456"}]
    }"#;

    fn directory() -> MemoryDirectory {
        let seed: Seed = serde_json::from_str(SEED).unwrap();
        MemoryDirectory::new(seed.roles, seed.users).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_by_email_is_case_insensitive() {
        let dir = directory();
        let user = dir.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(user.role.role_name, "admin");
        assert!(user.two_factor_enabled);
    }

    #[tokio::test]
    async fn test_second_factor_check() {
        let dir = directory();
        let id: Uuid = "22222222-2222-2222-2222-222222222222".parse().unwrap();
        assert!(dir.verify_second_factor(id, "123456").await.unwrap());
        assert!(!dir.verify_second_factor(id, "654321").await.unwrap());
        assert!(!dir.verify_second_factor(Uuid::nil(), "123456").await.unwrap());
    }

    #[test]
    fn test_unknown_role_is_a_seed_error() {
        let mut seed: Seed = serde_json::from_str(SEED).unwrap();
        seed.roles.clear();
        assert!(MemoryDirectory::new(seed.roles, seed.users).is_err());
    }
}
