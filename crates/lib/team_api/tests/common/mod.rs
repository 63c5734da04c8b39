//! Shared harness: router over an in-memory store, identity service mocked
//! with wiremock.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use team_api::{AppState, config::ApiConfig};
use team_core::cache::{AuthCache, EntityCache};
use team_core::models::{
    Account, AccountUser, Identity, Pagination, Permission, Role, RoleChanges, SortParams,
};
use team_core::store::{AccountStore, MemoryStore};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identity: MockServer,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub fn mint_token(sub: Uuid, exp: i64) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(b"identity-service-secret"),
    )
    .expect("encode token")
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut ApiConfig)) -> Self {
        Self::build(Arc::new(MemoryStore::new()), tweak).await
    }

    pub async fn with_store(store: Arc<dyn AccountStore>) -> Self {
        Self::build(store, |_| {}).await
    }

    async fn build(store: Arc<dyn AccountStore>, tweak: impl FnOnce(&mut ApiConfig)) -> Self {
        let identity = MockServer::start().await;
        let mut config = ApiConfig::with_identity_endpoint(identity.uri());
        tweak(&mut config);
        let state = AppState::new(
            store,
            config,
            Arc::new(AuthCache::new()),
            Arc::new(EntityCache::new()),
        );
        Self {
            router: team_api::router(state.clone()),
            state,
            identity,
        }
    }

    /// Registers `who` with the mocked identity service and returns a token
    /// for it.
    pub async fn login(&self, who: &Identity) -> String {
        let token = mint_token(who.id, chrono::Utc::now().timestamp() + 3600);
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": who.id,
                "is_super_admin": who.is_super_admin,
                "email": "someone@acme.test"
            })))
            .mount(&self.identity)
            .await;
        token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Response {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Response {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates an account named `name` as the holder of `token`, returning its id.
    pub async fn create_account(&self, token: &str, name: &str) -> String {
        let resp = self.post("/accounts", token, json!({ "name": name })).await;
        assert_eq!(resp.status, StatusCode::OK, "{}", resp.body);
        resp.body["id"].as_str().expect("account id").to_string()
    }
}

/// Store whose first committed role update and first committed account
/// update answer only after `delay`. A concurrent later update then finishes
/// first, so callers see the two commits reported in reverse order.
pub struct DelayedFirstUpdate {
    inner: MemoryStore,
    delay: Duration,
    role_delayed: AtomicBool,
    account_delayed: AtomicBool,
}

impl DelayedFirstUpdate {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            role_delayed: AtomicBool::new(false),
            account_delayed: AtomicBool::new(false),
        }
    }

    async fn hold(&self, flag: &AtomicBool) {
        if !flag.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl AccountStore for DelayedFirstUpdate {
    async fn seed_permissions(&self, names: &[&str]) -> team_core::Result<()> {
        self.inner.seed_permissions(names).await
    }

    async fn list_permissions(&self) -> team_core::Result<Vec<Permission>> {
        self.inner.list_permissions().await
    }

    async fn find_account(&self, id: Uuid) -> team_core::Result<Account> {
        self.inner.find_account(id).await
    }

    async fn list_accounts(
        &self,
        member: Option<Uuid>,
        page: &mut Pagination,
        sort: &SortParams,
    ) -> team_core::Result<Vec<Account>> {
        self.inner.list_accounts(member, page, sort).await
    }

    async fn create_account(
        &self,
        account: &Account,
        creator: Uuid,
    ) -> team_core::Result<(Account, Role)> {
        self.inner.create_account(account, creator).await
    }

    async fn update_account(&self, account: &Account) -> team_core::Result<Account> {
        let updated = self.inner.update_account(account).await?;
        self.hold(&self.account_delayed).await;
        Ok(updated)
    }

    async fn delete_account(&self, id: Uuid) -> team_core::Result<Vec<Uuid>> {
        self.inner.delete_account(id).await
    }

    async fn find_role(&self, account_id: Uuid, role_id: Uuid) -> team_core::Result<Role> {
        self.inner.find_role(account_id, role_id).await
    }

    async fn list_roles(&self, account_id: Uuid) -> team_core::Result<Vec<Role>> {
        self.inner.list_roles(account_id).await
    }

    async fn create_role(&self, role: &Role, permissions: &[String]) -> team_core::Result<Role> {
        self.inner.create_role(role, permissions).await
    }

    async fn update_role(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        changes: &RoleChanges,
    ) -> team_core::Result<Role> {
        let updated = self.inner.update_role(account_id, role_id, changes).await?;
        self.hold(&self.role_delayed).await;
        Ok(updated)
    }

    async fn delete_role(&self, account_id: Uuid, role_id: Uuid) -> team_core::Result<()> {
        self.inner.delete_role(account_id, role_id).await
    }

    async fn find_membership(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> team_core::Result<Option<AccountUser>> {
        self.inner.find_membership(account_id, user_id).await
    }

    async fn list_memberships(&self, account_id: Uuid) -> team_core::Result<Vec<AccountUser>> {
        self.inner.list_memberships(account_id).await
    }

    async fn attach_user(&self, edge: &AccountUser) -> team_core::Result<AccountUser> {
        self.inner.attach_user(edge).await
    }

    async fn detach_user(&self, account_id: Uuid, user_id: Uuid) -> team_core::Result<()> {
        self.inner.detach_user(account_id, user_id).await
    }
}
