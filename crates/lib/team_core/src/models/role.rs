//! Account-scoped roles.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Permission;

/// Named bundle of permissions belonging to exactly one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Name of the role every new account starts with.
pub const ADMIN_ROLE: &str = "Admin";

impl Role {
    pub fn new(account_id: Uuid, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            name: name.to_string(),
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.name == name)
    }

    pub fn permission_names(&self) -> Vec<&str> {
        self.permissions.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Update to a role. `permissions`, when given, replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Grants to detach and attach to turn the current set into the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    pub detach: Vec<Uuid>,
    pub attach: Vec<Uuid>,
}

impl PermissionDiff {
    pub fn between(current: &[Uuid], desired: &[Uuid]) -> Self {
        let current_set: HashSet<&Uuid> = current.iter().collect();
        let desired_set: HashSet<&Uuid> = desired.iter().collect();
        let mut diff = Self::default();
        for id in current {
            if !desired_set.contains(id) && !diff.detach.contains(id) {
                diff.detach.push(*id);
            }
        }
        for id in desired {
            if !current_set.contains(id) && !diff.attach.contains(id) {
                diff.attach.push(*id);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_detaches_stale_and_attaches_missing() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let diff = PermissionDiff::between(&[a, b], &[b, c]);
        assert_eq!(diff.detach, vec![a]);
        assert_eq!(diff.attach, vec![c]);
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(PermissionDiff::between(&[a, b], &[b, a]).is_empty());
    }

    #[test]
    fn diff_to_empty_set_detaches_everything() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let diff = PermissionDiff::between(&[a, b], &[]);
        assert_eq!(diff.detach, vec![a, b]);
        assert!(diff.attach.is_empty());
    }

    #[test]
    fn has_permission_matches_by_name() {
        let mut role = Role::new(Uuid::new_v4(), ADMIN_ROLE);
        role.permissions.push(Permission::new("account-edit"));
        assert!(role.has_permission("account-edit"));
        assert!(!role.has_permission("account-destroy"));
        assert_eq!(role.permission_names(), vec!["account-edit"]);
    }
}
