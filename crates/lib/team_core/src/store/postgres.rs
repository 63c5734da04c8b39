//! PostgreSQL-backed [`AccountStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{AccountStore, unique_names};
use crate::error::{Entity, Result, TeamError};
use crate::models::role::ADMIN_ROLE;
use crate::models::{
    Account, AccountUser, Pagination, Permission, PermissionDiff, Role, RoleChanges, SortParams,
};

const ACCOUNT_COLUMNS: &str = "instance_id, id, aud, name, billing_name, billing_email, \
     billing_details, billing_period, payment_method_id, owner_ids, account_metadata, \
     created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str =
    "id, account_id, user_id, role_id, confirmed_at, invited_at, invited_by";

/// Account filter shared by the list and count queries. `$1` is the member
/// id, or NULL for every account.
const MEMBER_FILTER: &str = "($1::uuid IS NULL \
     OR $1 = ANY(a.owner_ids) \
     OR EXISTS (SELECT 1 FROM accounts_users au WHERE au.account_id = a.id AND au.user_id = $1))";

/// Commit timestamp of an update: wall-clock time at the write, strictly after
/// the row's previous `updated_at`. Later commits carry later timestamps.
const NEXT_UPDATED_AT: &str =
    "GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')";

type RoleRow = (Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>);
type GrantRow = (Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>);

fn role_from_row((id, account_id, name, created_at, updated_at): RoleRow) -> Role {
    Role {
        id,
        account_id,
        name,
        permissions: Vec::new(),
        created_at,
        updated_at,
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn load_permissions<'e, E: PgExecutor<'e>>(
    executor: E,
    role_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Permission>>> {
    let rows = sqlx::query_as::<_, GrantRow>(
        r#"
        SELECT rp.role_id, p.id, p.name, p.created_at, p.updated_at
        FROM roles_permissions rp
        JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role_id = ANY($1)
        ORDER BY p.name
        "#,
    )
    .bind(role_ids)
    .fetch_all(executor)
    .await?;

    let mut grants: HashMap<Uuid, Vec<Permission>> = HashMap::new();
    for (role_id, id, name, created_at, updated_at) in rows {
        grants.entry(role_id).or_default().push(Permission {
            id,
            name,
            created_at,
            updated_at,
        });
    }
    Ok(grants)
}

async fn fetch_role<'e, E: PgExecutor<'e>>(
    executor: E,
    account_id: Uuid,
    role_id: Uuid,
    lock: bool,
) -> Result<Role> {
    let sql = if lock {
        "SELECT id, account_id, name, created_at, updated_at FROM roles \
         WHERE id = $1 AND account_id = $2 FOR UPDATE"
    } else {
        "SELECT id, account_id, name, created_at, updated_at FROM roles \
         WHERE id = $1 AND account_id = $2"
    };
    sqlx::query_as::<_, RoleRow>(sql)
        .bind(role_id)
        .bind(account_id)
        .fetch_optional(executor)
        .await?
        .map(role_from_row)
        .ok_or(TeamError::NotFound(Entity::Role))
}

/// Maps permission names to ids, failing on the first unknown name.
async fn resolve_permission_ids<'e, E: PgExecutor<'e>>(
    executor: E,
    names: &[String],
) -> Result<Vec<Uuid>> {
    let wanted: Vec<String> = unique_names(names).into_iter().map(String::from).collect();
    let rows = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, name FROM permissions WHERE name = ANY($1)",
    )
    .bind(&wanted)
    .fetch_all(executor)
    .await?;

    let by_name: HashMap<String, Uuid> = rows.into_iter().map(|(id, name)| (name, id)).collect();
    wanted
        .iter()
        .map(|name| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| TeamError::Validation(format!("unknown permission '{name}'")))
        })
        .collect()
}

async fn grant<'e, E: PgExecutor<'e>>(
    executor: E,
    role_id: Uuid,
    permission_ids: &[Uuid],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO roles_permissions (role_id, permission_id)
        SELECT $1::uuid, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl AccountStore for PgStore {
    async fn seed_permissions(&self, names: &[&str]) -> Result<()> {
        let ids: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let inserted = sqlx::query(
            r#"
            INSERT INTO permissions (id, name)
            SELECT * FROM UNNEST($1::uuid[], $2::text[])
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .execute(&self.pool)
        .await?
        .rows_affected();
        debug!(inserted, "seeded permissions");
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT id, name, created_at, updated_at FROM permissions ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_account(&self, id: Uuid) -> Result<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TeamError::NotFound(Entity::Account))
    }

    async fn list_accounts(
        &self,
        member: Option<Uuid>,
        page: &mut Pagination,
        sort: &SortParams,
    ) -> Result<Vec<Account>> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM accounts a WHERE {MEMBER_FILTER}"
        ))
        .bind(member)
        .fetch_one(&self.pool)
        .await?;
        page.count = count.max(0) as u64;

        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE {MEMBER_FILTER} \
             ORDER BY {}, a.id LIMIT $2 OFFSET $3",
            sort.order_clause("a.")
        );
        Ok(sqlx::query_as::<_, Account>(&sql)
            .bind(member)
            .bind(page.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_account(&self, account: &Account, creator: Uuid) -> Result<(Account, Role)> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts ({ACCOUNT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.instance_id)
        .bind(account.id)
        .bind(&account.aud)
        .bind(&account.name)
        .bind(&account.billing_name)
        .bind(&account.billing_email)
        .bind(&account.billing_details)
        .bind(&account.billing_period)
        .bind(&account.payment_method_id)
        .bind(&account.owner_ids)
        .bind(&account.account_metadata)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let admin = Role::new(stored.id, ADMIN_ROLE);
        sqlx::query(
            "INSERT INTO roles (id, account_id, name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(admin.id)
        .bind(admin.account_id)
        .bind(&admin.name)
        .bind(admin.created_at)
        .bind(admin.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO roles_permissions (role_id, permission_id) SELECT $1, id FROM permissions",
        )
        .bind(admin.id)
        .execute(&mut *tx)
        .await?;

        let edge = AccountUser::creator(stored.id, creator, admin.id);
        sqlx::query(&format!(
            "INSERT INTO accounts_users ({MEMBERSHIP_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(edge.id)
        .bind(edge.account_id)
        .bind(edge.user_id)
        .bind(edge.role_id)
        .bind(edge.confirmed_at)
        .bind(edge.invited_at)
        .bind(edge.invited_by)
        .execute(&mut *tx)
        .await?;

        let mut role = admin;
        role.permissions = load_permissions(&mut *tx, &[role.id])
            .await?
            .remove(&role.id)
            .unwrap_or_default();

        tx.commit().await?;
        Ok((stored, role))
    }

    async fn update_account(&self, account: &Account) -> Result<Account> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET name = $2, billing_name = $3, billing_email = $4, billing_details = $5,
                billing_period = $6, payment_method_id = $7, account_metadata = $8,
                updated_at = {NEXT_UPDATED_AT}
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.billing_name)
        .bind(&account.billing_email)
        .bind(&account.billing_details)
        .bind(&account.billing_period)
        .bind(&account.payment_method_id)
        .bind(&account.account_metadata)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TeamError::NotFound(Entity::Account))
    }

    async fn delete_account(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let role_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM roles WHERE account_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        // Roles, grants and memberships go with the account via ON DELETE CASCADE.
        let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(TeamError::NotFound(Entity::Account));
        }

        tx.commit().await?;
        Ok(role_ids)
    }

    async fn find_role(&self, account_id: Uuid, role_id: Uuid) -> Result<Role> {
        let mut role = fetch_role(&self.pool, account_id, role_id, false).await?;
        role.permissions = load_permissions(&self.pool, &[role.id])
            .await?
            .remove(&role.id)
            .unwrap_or_default();
        Ok(role)
    }

    async fn list_roles(&self, account_id: Uuid) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = sqlx::query_as::<_, RoleRow>(
            "SELECT id, account_id, name, created_at, updated_at FROM roles \
             WHERE account_id = $1 ORDER BY created_at, name",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(role_from_row)
        .collect();

        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let mut grants = load_permissions(&self.pool, &ids).await?;
        for role in &mut roles {
            role.permissions = grants.remove(&role.id).unwrap_or_default();
        }
        Ok(roles)
    }

    async fn create_role(&self, role: &Role, permissions: &[String]) -> Result<Role> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = $1")
            .bind(role.account_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(TeamError::NotFound(Entity::Account));
        }

        let permission_ids = resolve_permission_ids(&mut *tx, permissions).await?;

        sqlx::query(
            "INSERT INTO roles (id, account_id, name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(role.id)
        .bind(role.account_id)
        .bind(&role.name)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&mut *tx)
        .await?;
        grant(&mut *tx, role.id, &permission_ids).await?;

        let mut created = role.clone();
        created.permissions = load_permissions(&mut *tx, &[role.id])
            .await?
            .remove(&role.id)
            .unwrap_or_default();

        tx.commit().await?;
        Ok(created)
    }

    async fn update_role(
        &self,
        account_id: Uuid,
        role_id: Uuid,
        changes: &RoleChanges,
    ) -> Result<Role> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent replacements of the same role.
        let mut role = fetch_role(&mut *tx, account_id, role_id, true).await?;

        if let Some(name) = &changes.name {
            sqlx::query("UPDATE roles SET name = $2 WHERE id = $1")
                .bind(role_id)
                .bind(name.trim())
                .execute(&mut *tx)
                .await?;
        }

        if let Some(names) = &changes.permissions {
            let desired = resolve_permission_ids(&mut *tx, names).await?;
            let current: Vec<Uuid> = sqlx::query_scalar(
                "SELECT permission_id FROM roles_permissions WHERE role_id = $1",
            )
            .bind(role_id)
            .fetch_all(&mut *tx)
            .await?;

            let diff = PermissionDiff::between(&current, &desired);
            if !diff.detach.is_empty() {
                sqlx::query(
                    "DELETE FROM roles_permissions WHERE role_id = $1 AND permission_id = ANY($2)",
                )
                .bind(role_id)
                .bind(&diff.detach)
                .execute(&mut *tx)
                .await?;
            }
            if !diff.attach.is_empty() {
                grant(&mut *tx, role_id, &diff.attach).await?;
            }
            debug!(
                role_id = %role_id,
                detached = diff.detach.len(),
                attached = diff.attach.len(),
                "replaced role permissions"
            );
        }

        let touch = format!(
            "UPDATE roles SET updated_at = {NEXT_UPDATED_AT} WHERE id = $1 \
             RETURNING name, updated_at"
        );
        let (name, updated_at): (String, DateTime<Utc>) = sqlx::query_as(&touch)
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;
        role.name = name;
        role.updated_at = updated_at;
        role.permissions = load_permissions(&mut *tx, &[role_id])
            .await?
            .remove(&role_id)
            .unwrap_or_default();

        tx.commit().await?;
        Ok(role)
    }

    async fn delete_role(&self, account_id: Uuid, role_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        fetch_role(&mut *tx, account_id, role_id, true).await?;

        sqlx::query("DELETE FROM roles_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM accounts_users WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_membership(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountUser>> {
        Ok(sqlx::query_as::<_, AccountUser>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM accounts_users WHERE account_id = $1 AND user_id = $2"
        ))
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_memberships(&self, account_id: Uuid) -> Result<Vec<AccountUser>> {
        Ok(sqlx::query_as::<_, AccountUser>(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM accounts_users WHERE account_id = $1 \
             ORDER BY confirmed_at NULLS LAST, invited_at"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn attach_user(&self, edge: &AccountUser) -> Result<AccountUser> {
        // The EXISTS guard keeps roles of other accounts out.
        sqlx::query_as::<_, AccountUser>(&format!(
            r#"
            INSERT INTO accounts_users ({MEMBERSHIP_COLUMNS})
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE EXISTS (SELECT 1 FROM roles WHERE id = $4 AND account_id = $2)
            ON CONFLICT (account_id, user_id) DO UPDATE
            SET role_id = EXCLUDED.role_id,
                invited_at = EXCLUDED.invited_at,
                invited_by = EXCLUDED.invited_by
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        ))
        .bind(edge.id)
        .bind(edge.account_id)
        .bind(edge.user_id)
        .bind(edge.role_id)
        .bind(edge.confirmed_at)
        .bind(edge.invited_at)
        .bind(edge.invited_by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TeamError::NotFound(Entity::Role))
    }

    async fn detach_user(&self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        let deleted =
            sqlx::query("DELETE FROM accounts_users WHERE account_id = $1 AND user_id = $2")
                .bind(account_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        if deleted == 0 {
            return Err(TeamError::NotFound(Entity::Membership));
        }
        Ok(())
    }
}
