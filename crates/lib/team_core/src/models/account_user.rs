//! Membership edge between a user and an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binds a user (referenced by id only) to an account through exactly one role.
///
/// At most one edge exists per `(account_id, user_id)`; attaching again
/// replaces the role instead of adding a second edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountUser {
    #[serde(skip)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<Uuid>,
}

impl AccountUser {
    /// Edge for the creator of an account; confirmed immediately.
    pub fn creator(account_id: Uuid, user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            user_id,
            role_id,
            confirmed_at: Some(Utc::now()),
            invited_at: None,
            invited_by: None,
        }
    }

    /// Edge created by another member's invitation.
    pub fn invited(account_id: Uuid, user_id: Uuid, role_id: Uuid, invited_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            user_id,
            role_id,
            confirmed_at: None,
            invited_at: Some(Utc::now()),
            invited_by: Some(invited_by),
        }
    }
}
