/// Account and membership endpoints
///
/// All endpoints require a bearer token. Reading an account requires
/// membership; changing membership requires the owner or admin role.
///
/// # Endpoints
///
/// - `POST /v1/accounts` - Create an account owned by the caller
/// - `GET /v1/accounts` - Accounts the caller belongs to
/// - `GET /v1/accounts/:account_id` - Get an account
/// - `GET /v1/accounts/:account_id/members` - List members
/// - `POST /v1/accounts/:account_id/members` - Add a member
/// - `PATCH /v1/accounts/:account_id/members/:user_id` - Change a member's role
/// - `DELETE /v1/accounts/:account_id/members/:user_id` - Remove a member

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use chalk_shared::error::{Entity, StoreError, UserError};
use chalk_shared::models::account::{Account, Member, MemberRole};
use chalk_shared::models::session::Session;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,

    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

/// A change to someone's membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    Remove,
    ChangeRole,
}

/// Checks that `caller` may apply `change` to `target`
///
/// `target_role` is `None` when the target is not a member; the store
/// reports that case.
pub fn check_member_change(
    caller_id: Uuid,
    caller_role: MemberRole,
    target_id: Uuid,
    target_role: Option<MemberRole>,
    change: MemberChange,
) -> Result<(), UserError> {
    if !caller_role.can_manage() {
        return Err(UserError::PermissionDenied);
    }
    if caller_id == target_id {
        return Err(match change {
            MemberChange::Remove => UserError::CannotRemoveYourself,
            MemberChange::ChangeRole => UserError::CannotChangeOwnRole,
        });
    }
    if target_role == Some(MemberRole::Owner) {
        return Err(UserError::CannotModifyOwner);
    }

    Ok(())
}

/// The caller's role in the account
///
/// # Errors
///
/// - `404` if the account does not exist
/// - `400` with code 41 if the caller is not a member
async fn require_member(pool: &PgPool, account_id: Uuid, user_id: Uuid) -> ApiResult<MemberRole> {
    if let Some(role) = Account::role_of(pool, account_id, user_id).await? {
        return Ok(role);
    }
    if Account::find_by_id(pool, account_id).await?.is_none() {
        return Err(StoreError::NotFound(Entity::Account).into());
    }

    Err(UserError::PermissionDenied.into())
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let Json(req) = payload?;
    req.validate()?;

    let account = Account::create(&state.db, req.name.trim(), session.user_id).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Account>>> {
    let accounts = Account::list_for_user(&state.db, session.user_id).await?;

    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Account>> {
    require_member(&state.db, account_id, session.user_id).await?;

    let account = Account::find_by_id(&state.db, account_id)
        .await?
        .ok_or(StoreError::NotFound(Entity::Account))?;

    Ok(Json(account))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
    require_member(&state.db, account_id, session.user_id).await?;

    let members = Account::members(&state.db, account_id).await?;

    Ok(Json(members))
}

/// Add a user to the account
///
/// # Errors
///
/// - `400` with code 41: Caller is not an owner or admin
/// - `400` with code 31: No such user
/// - `400` with code 42: Already a member
/// - `400`: Role `owner` requested
pub async fn add_member(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(account_id): Path<Uuid>,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;

    let caller_role = require_member(&state.db, account_id, session.user_id).await?;
    if !caller_role.can_manage() {
        return Err(UserError::PermissionDenied.into());
    }

    Account::add_member(&state.db, account_id, req.user_id, req.role)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(Entity::User) => ApiError::User(UserError::UserNotFound),
            other => ApiError::from(other),
        })?;

    Ok(StatusCode::CREATED)
}

/// Change a member's role
///
/// # Errors
///
/// - `400` with code 41, 44 or 45
/// - `404`: Target is not a member
pub async fn update_member(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((account_id, user_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateMemberRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;

    let caller_role = require_member(&state.db, account_id, session.user_id).await?;
    let target_role = Account::role_of(&state.db, account_id, user_id).await?;
    check_member_change(
        session.user_id,
        caller_role,
        user_id,
        target_role,
        MemberChange::ChangeRole,
    )?;

    Account::update_member_role(&state.db, account_id, user_id, req.role).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove a member
///
/// # Errors
///
/// - `400` with code 41, 43 or 45
/// - `404`: Target is not a member
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((account_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let caller_role = require_member(&state.db, account_id, session.user_id).await?;
    let target_role = Account::role_of(&state.db, account_id, user_id).await?;
    check_member_change(
        session.user_id,
        caller_role,
        user_id,
        target_role,
        MemberChange::Remove,
    )?;

    Account::remove_member(&state.db, account_id, user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_cannot_manage() {
        let result = check_member_change(
            Uuid::new_v4(),
            MemberRole::Member,
            Uuid::new_v4(),
            Some(MemberRole::Member),
            MemberChange::Remove,
        );

        assert_eq!(result, Err(UserError::PermissionDenied));
    }

    #[test]
    fn test_self_changes_are_refused() {
        let me = Uuid::new_v4();

        assert_eq!(
            check_member_change(me, MemberRole::Admin, me, Some(MemberRole::Admin), MemberChange::Remove),
            Err(UserError::CannotRemoveYourself)
        );
        assert_eq!(
            check_member_change(me, MemberRole::Owner, me, Some(MemberRole::Owner), MemberChange::ChangeRole),
            Err(UserError::CannotChangeOwnRole)
        );
    }

    #[test]
    fn test_owner_is_untouchable() {
        for change in [MemberChange::Remove, MemberChange::ChangeRole] {
            assert_eq!(
                check_member_change(
                    Uuid::new_v4(),
                    MemberRole::Admin,
                    Uuid::new_v4(),
                    Some(MemberRole::Owner),
                    change,
                ),
                Err(UserError::CannotModifyOwner)
            );
        }
    }

    #[test]
    fn test_admin_may_change_member() {
        assert!(check_member_change(
            Uuid::new_v4(),
            MemberRole::Admin,
            Uuid::new_v4(),
            Some(MemberRole::Member),
            MemberChange::ChangeRole,
        )
        .is_ok());

        // Missing targets are reported by the store
        assert!(check_member_change(
            Uuid::new_v4(),
            MemberRole::Owner,
            Uuid::new_v4(),
            None,
            MemberChange::Remove,
        )
        .is_ok());
    }

    #[test]
    fn test_add_member_role_defaults_to_member() {
        let req: AddMemberRequest =
            serde_json::from_str(&format!(r#"{{"user_id": "{}"}}"#, Uuid::new_v4())).unwrap();

        assert_eq!(req.role, MemberRole::Member);
    }
}
