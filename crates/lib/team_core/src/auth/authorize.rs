//! Permission decisions.
//!
//! Checks run in order and stop at the first grant: super-admin flag,
//! account ownership, then the permission set of the caller's role in the
//! account.

use tracing::debug;
use uuid::Uuid;

use crate::cache::EntityCache;
use crate::error::{Entity, Result, TeamError};
use crate::lookup;
use crate::models::{Account, Identity, Role};
use crate::store::AccountStore;

/// How a caller relates to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    SuperAdmin,
    Owner,
    Member(Role),
    Outsider,
}

pub struct Authorizer<'a> {
    store: &'a dyn AccountStore,
    cache: &'a EntityCache,
}

impl<'a> Authorizer<'a> {
    pub fn new(store: &'a dyn AccountStore, cache: &'a EntityCache) -> Self {
        Self { store, cache }
    }

    /// Role binding `user_id` to `account`, if any. A dangling edge counts
    /// as no membership.
    pub async fn member_role(&self, account: &Account, user_id: Uuid) -> Result<Option<Role>> {
        let Some(edge) = self.store.find_membership(account.id, user_id).await? else {
            return Ok(None);
        };
        match lookup::role(self.store, self.cache, account.id, edge.role_id).await {
            Ok(role) => Ok(Some(role)),
            Err(TeamError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn has_permission_to(
        &self,
        account: &Account,
        permission: &str,
        user_id: Uuid,
    ) -> Result<bool> {
        Ok(self
            .member_role(account, user_id)
            .await?
            .is_some_and(|role| role.has_permission(permission)))
    }

    pub async fn can_access(
        &self,
        identity: &Identity,
        account: &Account,
        permission: &str,
    ) -> Result<bool> {
        if identity.is_super_admin || account.is_owner(identity.id) {
            return Ok(true);
        }
        self.has_permission_to(account, permission, identity.id).await
    }

    /// Write-path gate: fails with `Denied` when `can_access` is false.
    pub async fn require(
        &self,
        identity: &Identity,
        account: &Account,
        permission: &str,
    ) -> Result<()> {
        if self.can_access(identity, account, permission).await? {
            return Ok(());
        }
        debug!(
            user_id = %identity.id,
            account_id = %account.id,
            permission,
            "permission denied"
        );
        Err(TeamError::Denied(permission.to_string()))
    }

    pub async fn resolve(&self, identity: &Identity, account: &Account) -> Result<Access> {
        if identity.is_super_admin {
            return Ok(Access::SuperAdmin);
        }
        if account.is_owner(identity.id) {
            return Ok(Access::Owner);
        }
        Ok(match self.member_role(account, identity.id).await? {
            Some(role) => Access::Member(role),
            None => Access::Outsider,
        })
    }

    /// Read-path gate. Outsiders get the same `NotFound(Account)` as a
    /// missing id.
    pub async fn readable_account(&self, identity: &Identity, account_id: Uuid) -> Result<Account> {
        let account = lookup::account(self.store, self.cache, account_id).await?;
        match self.resolve(identity, &account).await? {
            Access::Outsider => {
                debug!(user_id = %identity.id, account_id = %account_id, "hiding account");
                Err(TeamError::NotFound(Entity::Account))
            }
            _ => Ok(account),
        }
    }

    /// Deletion is reserved to super-admins and owners.
    pub fn can_delete(identity: &Identity, account: &Account) -> bool {
        identity.is_super_admin || account.is_owner(identity.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::{
        ACCOUNT_DESTROY, ACCOUNT_EDIT, DEFAULT_PERMISSIONS, SPACES_CREATE,
    };
    use crate::models::{AccountUser, RoleChanges};
    use crate::store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        cache: EntityCache,
        account: Account,
        owner: Identity,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let owner = Identity::user(Uuid::new_v4());
            let account = Account::new(Uuid::nil(), "Acme", "app.delivc.com", owner.id);
            let (account, _) = store.create_account(&account, owner.id).await.unwrap();
            Self {
                store,
                cache: EntityCache::new(),
                account,
                owner,
            }
        }

        fn authorizer(&self) -> Authorizer<'_> {
            Authorizer::new(&self.store, &self.cache)
        }

        async fn member_with(&self, permissions: &[&str]) -> Identity {
            let names: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
            let role = self
                .store
                .create_role(&Role::new(self.account.id, "Custom"), &names)
                .await
                .unwrap();
            let member = Identity::user(Uuid::new_v4());
            self.store
                .attach_user(&AccountUser::invited(
                    self.account.id,
                    member.id,
                    role.id,
                    self.owner.id,
                ))
                .await
                .unwrap();
            member
        }
    }

    #[tokio::test]
    async fn super_admin_can_do_anything() {
        let fx = Fixture::new().await;
        let root = Identity::super_admin(Uuid::new_v4());
        for permission in DEFAULT_PERMISSIONS.iter().copied().chain(["made-up"]) {
            assert!(fx.authorizer().can_access(&root, &fx.account, permission).await.unwrap());
        }
        assert_eq!(
            fx.authorizer().resolve(&root, &fx.account).await.unwrap(),
            Access::SuperAdmin
        );
    }

    #[tokio::test]
    async fn owner_is_granted_without_role_lookup() {
        let fx = Fixture::new().await;
        assert!(
            fx.authorizer()
                .can_access(&fx.owner, &fx.account, "made-up")
                .await
                .unwrap()
        );
        assert_eq!(
            fx.authorizer().resolve(&fx.owner, &fx.account).await.unwrap(),
            Access::Owner
        );
    }

    #[tokio::test]
    async fn member_needs_the_permission_in_their_role() {
        let fx = Fixture::new().await;
        let member = fx.member_with(&[SPACES_CREATE]).await;
        let auth = fx.authorizer();
        assert!(auth.can_access(&member, &fx.account, SPACES_CREATE).await.unwrap());
        assert!(!auth.can_access(&member, &fx.account, ACCOUNT_EDIT).await.unwrap());
        assert!(matches!(
            auth.require(&member, &fx.account, ACCOUNT_EDIT).await,
            Err(TeamError::Denied(p)) if p == ACCOUNT_EDIT
        ));
    }

    #[tokio::test]
    async fn outsider_has_no_permissions() {
        let fx = Fixture::new().await;
        let stranger = Identity::user(Uuid::new_v4());
        assert!(
            !fx.authorizer()
                .can_access(&stranger, &fx.account, SPACES_CREATE)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn outsider_read_looks_like_missing_account() {
        let fx = Fixture::new().await;
        let stranger = Identity::user(Uuid::new_v4());
        let auth = fx.authorizer();

        let hidden = auth.readable_account(&stranger, fx.account.id).await.unwrap_err();
        let missing = auth.readable_account(&stranger, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(hidden.to_string(), missing.to_string());
        assert!(matches!(hidden, TeamError::NotFound(Entity::Account)));
    }

    #[tokio::test]
    async fn member_without_permissions_can_still_read() {
        let fx = Fixture::new().await;
        let member = fx.member_with(&[]).await;
        let account = fx
            .authorizer()
            .readable_account(&member, fx.account.id)
            .await
            .unwrap();
        assert_eq!(account.id, fx.account.id);
    }

    #[tokio::test]
    async fn role_update_through_cache_is_seen_by_next_check() {
        let fx = Fixture::new().await;
        let member = fx.member_with(&[SPACES_CREATE]).await;
        let auth = fx.authorizer();
        assert!(!auth.can_access(&member, &fx.account, ACCOUNT_DESTROY).await.unwrap());

        let edge = fx
            .store
            .find_membership(fx.account.id, member.id)
            .await
            .unwrap()
            .unwrap();
        let updated = fx
            .store
            .update_role(
                fx.account.id,
                edge.role_id,
                &RoleChanges {
                    name: None,
                    permissions: Some(vec![ACCOUNT_DESTROY.into()]),
                },
            )
            .await
            .unwrap();
        fx.cache.set(
            crate::cache::CacheKey::Role(updated.id),
            crate::cache::CachedEntity::Role(updated),
        );

        assert!(auth.can_access(&member, &fx.account, ACCOUNT_DESTROY).await.unwrap());
        assert!(!auth.can_access(&member, &fx.account, SPACES_CREATE).await.unwrap());
    }

    #[tokio::test]
    async fn only_super_admin_and_owners_may_delete() {
        let fx = Fixture::new().await;
        let member = fx.member_with(&[ACCOUNT_DESTROY]).await;
        assert!(Authorizer::can_delete(&fx.owner, &fx.account));
        assert!(Authorizer::can_delete(
            &Identity::super_admin(Uuid::new_v4()),
            &fx.account
        ));
        assert!(!Authorizer::can_delete(&member, &fx.account));
    }
}
