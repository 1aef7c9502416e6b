use serde::{Deserialize, Serialize};

use super::model::{self, PermissionCheck, Role};

/// How the checks of a [`Requirement`] are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    All,
    Any,
}

/// A permission declaration attached to a route or a UI action.
///
/// The server guard and the client rendering gate both evaluate the same value
/// through [`Requirement::is_satisfied_by`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    #[serde(default)]
    pub checks: Vec<PermissionCheck>,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Requirement {
    pub fn single(resource: &str, action: &str) -> Self {
        Self::all_of([(resource, action)])
    }

    pub fn all_of<'a>(checks: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            checks: checks
                .into_iter()
                .map(|(r, a)| PermissionCheck::new(r, a))
                .collect(),
            combinator: Combinator::All,
            role: None,
        }
    }

    pub fn any_of<'a>(checks: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            combinator: Combinator::Any,
            ..Self::all_of(checks)
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// The role gate is applied first; a requirement with no checks only
    /// constrains the role.
    pub fn is_satisfied_by(&self, role: &Role) -> bool {
        if let Some(name) = &self.role
            && !model::has_role(role, name)
        {
            return false;
        }

        if self.checks.is_empty() {
            return true;
        }

        match self.combinator {
            Combinator::All => model::all(role, &self.checks),
            Combinator::Any => model::any(role, &self.checks),
        }
    }
}
