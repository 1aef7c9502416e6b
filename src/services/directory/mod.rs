//! Read-only view of users and roles.
//!
//! Storage is owned elsewhere; the auth core only reaches it through
//! [`UserDirectory`].

mod memory;

pub use memory::{MemoryDirectory, SeedUser};

use std::{future::Future, pin::Pin};
use thiserror::Error;
use uuid::Uuid;

use crate::permissions::Role;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory backend error: {0}")]
    Backend(String),
    #[error("directory seed error: {0}")]
    Seed(String),
}

/// A user as the directory stores it.
#[derive(Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    // PHC string (argon2id)
    pub password_hash: String,
    pub email_verified: bool,
    pub two_factor_enabled: bool,
    pub role: Role,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the password hash
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role.role_name)
            .finish_non_exhaustive()
    }
}

pub trait UserDirectory: Send + Sync {
    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DirectoryError>>;

    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Result<Option<UserRecord>, DirectoryError>>;

    fn find_role(&self, role_id: Uuid) -> BoxFuture<'_, Result<Option<Role>, DirectoryError>>;

    /// Check a second-factor code for a user that has two-factor enabled.
    fn verify_second_factor<'a>(
        &'a self,
        user_id: Uuid,
        code: &'a str,
    ) -> BoxFuture<'a, Result<bool, DirectoryError>>;
}
