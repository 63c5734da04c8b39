//! Accounts (teams) and their editable fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TeamError};
use crate::validation;

/// A team or company. Unit of ownership and billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    #[serde(skip)]
    pub instance_id: Uuid,
    pub id: Uuid,
    pub aud: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    /// Owner ids in the order they were granted; the creator comes first.
    pub owner_ids: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_metadata: Option<serde_json::Value>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Builds a new, not yet persisted account owned by `creator`.
    pub fn new(instance_id: Uuid, name: &str, aud: &str, creator: Uuid) -> Self {
        let now = Utc::now();
        Self {
            instance_id,
            id: Uuid::new_v4(),
            aud: aud.to_string(),
            name: name.to_string(),
            billing_name: None,
            billing_email: None,
            billing_details: None,
            billing_period: None,
            payment_method_id: None,
            owner_ids: vec![creator],
            account_metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` is one of the account owners.
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

/// Partial update of an account. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_details: Option<String>,
    pub billing_period: Option<String>,
    pub payment_method_id: Option<String>,
    pub account_metadata: Option<serde_json::Value>,
}

impl AccountChanges {
    /// Checks the input without touching storage.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(TeamError::Validation("name must not be empty".into()));
        }
        if let Some(email) = &self.billing_email
            && !validation::is_valid_email(email)
        {
            return Err(TeamError::Validation(format!(
                "billing_email '{email}' is not a valid email address"
            )));
        }
        if let Some(metadata) = &self.account_metadata
            && !metadata.is_object()
        {
            return Err(TeamError::Validation(
                "account_metadata must be a JSON object".into(),
            ));
        }
        Ok(())
    }

    /// Metadata changes need super-admin rights.
    pub fn touches_metadata(&self) -> bool {
        self.account_metadata.is_some()
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(name) = &self.name {
            account.name = name.trim().to_string();
        }
        if let Some(v) = &self.billing_name {
            account.billing_name = Some(v.clone());
        }
        if let Some(v) = &self.billing_email {
            account.billing_email = Some(v.clone());
        }
        if let Some(v) = &self.billing_details {
            account.billing_details = Some(v.clone());
        }
        if let Some(v) = &self.billing_period {
            account.billing_period = Some(v.clone());
        }
        if let Some(v) = &self.payment_method_id {
            account.payment_method_id = Some(v.clone());
        }
        if let Some(v) = &self.account_metadata {
            account.account_metadata = Some(v.clone());
        }
        account.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_is_first_owner() {
        let creator = Uuid::new_v4();
        let account = Account::new(Uuid::nil(), "Acme", "app.delivc.com", creator);
        assert_eq!(account.owner_ids, vec![creator]);
        assert!(account.is_owner(creator));
        assert!(!account.is_owner(Uuid::new_v4()));
    }

    #[test]
    fn owner_ids_serialize_as_a_list() {
        let creator = Uuid::new_v4();
        let account = Account::new(Uuid::nil(), "Acme", "app.delivc.com", creator);
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["owner_ids"][0], creator.to_string());
        assert!(json.get("instance_id").is_none());
    }

    #[test]
    fn rejects_invalid_billing_email() {
        let changes = AccountChanges {
            billing_email: Some("not-an-email".into()),
            ..Default::default()
        };
        let err = changes.validate().unwrap_err();
        assert!(matches!(err, TeamError::Validation(msg) if msg.contains("billing_email")));
    }

    #[test]
    fn rejects_blank_name_and_non_object_metadata() {
        let blank = AccountChanges {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let metadata = AccountChanges {
            account_metadata: Some(serde_json::json!([1, 2])),
            ..Default::default()
        };
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn apply_only_touches_given_fields() {
        let mut account = Account::new(Uuid::nil(), "Acme", "app.delivc.com", Uuid::new_v4());
        account.billing_name = Some("Acme Inc.".into());
        let changes = AccountChanges {
            billing_email: Some("billing@acme.test".into()),
            ..Default::default()
        };
        changes.validate().unwrap();
        changes.apply(&mut account);
        assert_eq!(account.name, "Acme");
        assert_eq!(account.billing_name.as_deref(), Some("Acme Inc."));
        assert_eq!(account.billing_email.as_deref(), Some("billing@acme.test"));
        assert!(!changes.touches_metadata());
    }
}
