use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Action, Resource};

/// A grant of a set of actions on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub actions: BTreeSet<Action>,
}

impl Permission {
    pub fn new(resource: Resource, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            resource,
            actions: actions.into_iter().collect(),
        }
    }
}

/// A role as owned by the user directory. The core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub role_name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// One `{resource, action}` pair to check, kept as raw strings so callers can
/// pass anything and still get a fail-closed answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub resource: String,
    pub action: String,
}

impl PermissionCheck {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// Can `role` perform `action` on `resource`?
///
/// - No IO
/// - No panics
/// - Unknown or malformed resource/action evaluates to `false`
pub fn can_perform(role: &Role, resource: &str, action: &str) -> bool {
    let Ok(resource) = resource.parse::<Resource>() else {
        return false;
    };
    let Ok(action) = action.parse::<Action>() else {
        return false;
    };

    role.permissions
        .iter()
        .any(|p| p.resource == resource && p.actions.contains(&action))
}

/// AND over `checks`. An empty list is vacuously satisfied.
pub fn all(role: &Role, checks: &[PermissionCheck]) -> bool {
    checks
        .iter()
        .all(|c| can_perform(role, &c.resource, &c.action))
}

/// OR over `checks`. An empty list is never satisfied.
pub fn any(role: &Role, checks: &[PermissionCheck]) -> bool {
    checks
        .iter()
        .any(|c| can_perform(role, &c.resource, &c.action))
}

/// Coarse role gate, independent of permissions. Exact name match.
pub fn has_role(role: &Role, name: &str) -> bool {
    role.role_name == name
}
