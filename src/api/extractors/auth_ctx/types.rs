use uuid::Uuid;

use crate::services::auth::Principal;

/// Identity attached to a request by the auth guard.
///
/// - `principal` comes from a verified access token
/// - `jti` is kept for log correlation
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub principal: Principal,
    pub jti: String,
}

impl AuthCtx {
    pub fn new(principal: Principal, jti: String) -> Self {
        Self { principal, jti }
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.id
    }
}
