//! Authenticated caller identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller record returned by the identity service's `GET /user`.
///
/// Only the fields this service relies on are kept; anything else in the
/// response body is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub is_super_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Regular (non super-admin) identity.
    pub fn user(id: Uuid) -> Self {
        Self {
            id,
            is_super_admin: false,
            email: None,
        }
    }

    /// Super-admin identity.
    pub fn super_admin(id: Uuid) -> Self {
        Self {
            id,
            is_super_admin: true,
            email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_identity_response_ignoring_unknown_fields() {
        let body = r#"{
            "id": "5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001",
            "is_super_admin": true,
            "email": "root@delivc.com",
            "aud": "app.delivc.com",
            "app_metadata": {"provider": "email"}
        }"#;
        let identity: Identity = serde_json::from_str(body).unwrap();
        assert!(identity.is_super_admin);
        assert_eq!(identity.email.as_deref(), Some("root@delivc.com"));
    }

    #[test]
    fn super_admin_flag_defaults_to_false() {
        let identity: Identity =
            serde_json::from_str(r#"{"id": "5f0c9a52-8d1b-4d67-9a43-2a1f3bb0c001"}"#).unwrap();
        assert!(!identity.is_super_admin);
    }
}
