//! Per-request context passed explicitly through handlers and services.

use uuid::Uuid;

use crate::models::Identity;

/// Who is calling, for which audience, and under which request id.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub aud: String,
    pub instance_id: Uuid,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(identity: Identity, aud: impl Into<String>) -> Self {
        Self {
            identity,
            aud: aud.into(),
            instance_id: Uuid::nil(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }

    pub fn is_super_admin(&self) -> bool {
        self.identity.is_super_admin
    }
}
