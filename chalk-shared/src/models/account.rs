/// Accounts and their members
///
/// An account is an organisation that owns courses. Users join accounts
/// with one of three roles. The `owner` role is granted exactly once, to
/// the creating user, in the same transaction that creates the account.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE account_member_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE accounts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE account_members (
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role account_member_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (account_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use chalk_shared::models::account::{Account, MemberRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner: Uuid, instructor: Uuid) -> Result<(), chalk_shared::error::StoreError> {
/// let account = Account::create(&pool, "Springfield Elementary", owner).await?;
/// Account::add_member(&pool, account.id, instructor, MemberRole::Admin).await?;
///
/// let members = Account::members(&pool, account.id).await?;
/// assert_eq!(members.len(), 2);
/// # Ok(())
/// # }
/// ```

use crate::error::{violation, Entity, StoreError, Violation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const NAME_CONSTRAINT: &str = "accounts_name_key";
const MEMBER_PKEY: &str = "account_members_pkey";
const MEMBER_ACCOUNT_FKEY: &str = "account_members_account_id_fkey";
const MEMBER_USER_FKEY: &str = "account_members_user_id_fkey";

/// Role of a user within an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Created the account; exactly one per account
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    /// Owners and admins manage membership and content
    pub fn can_manage(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A member row joined with the user's profile
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Member {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// Maps membership insert violations
fn membership_error(err: sqlx::Error) -> StoreError {
    let mapped = match violation(&err) {
        Some(Violation::Unique(Some(MEMBER_PKEY))) => Some(StoreError::AlreadyMember),
        Some(Violation::ForeignKey(Some(MEMBER_ACCOUNT_FKEY))) => {
            Some(StoreError::NotFound(Entity::Account))
        }
        Some(Violation::ForeignKey(Some(MEMBER_USER_FKEY))) => {
            Some(StoreError::NotFound(Entity::User))
        }
        _ => None,
    };

    mapped.unwrap_or_else(|| StoreError::Database(err))
}

impl Account {
    /// Creates an account and makes `owner_id` its owner atomically
    ///
    /// # Errors
    ///
    /// - [`StoreError::AccountNameTaken`] if the name is in use
    /// - [`StoreError::NotFound`] with [`Entity::User`] if the owner does not exist
    pub async fn create(pool: &PgPool, name: &str, owner_id: Uuid) -> Result<Self, StoreError> {
        let mut tx = pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(Some(NAME_CONSTRAINT))) => StoreError::AccountNameTaken,
            _ => StoreError::Database(e),
        })?;

        sqlx::query("INSERT INTO account_members (account_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(account.id)
            .bind(owner_id)
            .bind(MemberRole::Owner)
            .execute(&mut *tx)
            .await
            .map_err(membership_error)?;

        tx.commit().await?;

        info!(account_id = %account.id, %owner_id, "Account created");
        Ok(account)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, name, created_at FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, name, created_at FROM accounts WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(account)
    }

    /// Accounts `user_id` belongs to, oldest membership first
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::User`] if the user does not exist
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, StoreError> {
        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        if !user_exists {
            return Err(StoreError::NotFound(Entity::User));
        }

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.name, a.created_at
              FROM accounts a
              JOIN account_members am ON am.account_id = a.id
             WHERE am.user_id = $1
             ORDER BY am.created_at, a.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(accounts)
    }

    /// Members of an account with their profile, owner first
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::Account`] if the account does not exist
    pub async fn members(pool: &PgPool, account_id: Uuid) -> Result<Vec<Member>, StoreError> {
        if Self::find_by_id(pool, account_id).await?.is_none() {
            return Err(StoreError::NotFound(Entity::Account));
        }

        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT am.account_id, am.user_id, u.name, u.email, am.role, am.created_at
              FROM account_members am
              JOIN users u ON u.id = am.user_id
             WHERE am.account_id = $1
             ORDER BY am.role, am.created_at
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Role of `user_id` in the account, `None` if not a member
    pub async fn role_of(
        pool: &PgPool,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, StoreError> {
        let role = sqlx::query_scalar::<_, MemberRole>(
            "SELECT role FROM account_members WHERE account_id = $1 AND user_id = $2",
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Adds a user to the account
    ///
    /// # Errors
    ///
    /// - [`StoreError::OwnerRoleReserved`] if `role` is [`MemberRole::Owner`]
    /// - [`StoreError::AlreadyMember`] if the user is already a member
    /// - [`StoreError::NotFound`] if the account or user does not exist
    pub async fn add_member(
        pool: &PgPool,
        account_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), StoreError> {
        if role == MemberRole::Owner {
            return Err(StoreError::OwnerRoleReserved);
        }

        sqlx::query("INSERT INTO account_members (account_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(account_id)
            .bind(user_id)
            .bind(role)
            .execute(pool)
            .await
            .map_err(membership_error)?;

        info!(%account_id, %user_id, role = role.as_str(), "Member added");
        Ok(())
    }

    /// Removes a user from the account
    ///
    /// Their course enrollments in the account cascade away with the row.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] with [`Entity::AccountMember`] if not a member
    pub async fn remove_member(pool: &PgPool, account_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM account_members WHERE account_id = $1 AND user_id = $2")
            .bind(account_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::AccountMember));
        }

        info!(%account_id, %user_id, "Member removed");
        Ok(())
    }

    /// Changes a member's role
    ///
    /// # Errors
    ///
    /// - [`StoreError::OwnerRoleReserved`] if `role` is [`MemberRole::Owner`]
    /// - [`StoreError::NotFound`] with [`Entity::AccountMember`] if not a member
    pub async fn update_member_role(
        pool: &PgPool,
        account_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), StoreError> {
        if role == MemberRole::Owner {
            return Err(StoreError::OwnerRoleReserved);
        }

        let result = sqlx::query(
            "UPDATE account_members SET role = $1 WHERE account_id = $2 AND user_id = $3",
        )
        .bind(role)
        .bind(account_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::AccountMember));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&MemberRole::Admin).unwrap(), "\"admin\"");
        let role: MemberRole = serde_json::from_str("\"member\"").unwrap();
        assert_eq!(role, MemberRole::Member);
        assert!(serde_json::from_str::<MemberRole>("\"viewer\"").is_err());
    }

    #[test]
    fn test_role_management() {
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Admin.can_manage());
        assert!(!MemberRole::Member.can_manage());
        assert_eq!(MemberRole::Owner.as_str(), "owner");
    }

    #[tokio::test]
    async fn test_owner_role_is_never_granted_later() {
        // Rejected before any query is issued
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://nobody@127.0.0.1:1/nothing")
            .unwrap();
        let (account_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        let added = Account::add_member(&pool, account_id, user_id, MemberRole::Owner).await;
        assert!(matches!(added, Err(StoreError::OwnerRoleReserved)));

        let updated = Account::update_member_role(&pool, account_id, user_id, MemberRole::Owner).await;
        assert!(matches!(updated, Err(StoreError::OwnerRoleReserved)));
    }
}
