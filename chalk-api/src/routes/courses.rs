/// Course endpoints
///
/// # Endpoints
///
/// - `POST /v1/accounts/:account_id/courses` - Create a course
/// - `GET /v1/accounts/:account_id/courses` - List an account's courses
/// - `GET /v1/courses/:course_id` - Get a course
/// - `PATCH /v1/courses/:course_id` - Rename a course
/// - `DELETE /v1/courses/:course_id` - Delete a course and all its content
/// - `GET /v1/courses/:course_id/outline` - Modules and lessons in order
/// - `GET /v1/courses/:course_id/participants` - List participants
/// - `POST /v1/courses/:course_id/participants` - Enroll an account member
/// - `DELETE /v1/courses/:course_id/participants/:user_id` - Unenroll

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chalk_shared::models::course::{Course, Outline};
use chalk_shared::models::enrollment::{Enrollment, Participant};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Body of course create and rename
#[derive(Debug, Deserialize, Validate)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub user_id: Uuid,
}

pub async fn create_course(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let Json(req) = payload?;
    req.validate()?;

    let course = Course::create(&state.db, account_id, &req.name).await?;

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_courses(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(Course::list_by_account(&state.db, account_id).await?))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Course>> {
    Ok(Json(Course::get(&state.db, course_id).await?))
}

pub async fn rename_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<Json<Course>> {
    let Json(req) = payload?;
    req.validate()?;

    Ok(Json(Course::rename(&state.db, course_id, &req.name).await?))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Course::delete(&state.db, course_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Course outline
///
/// # Response
///
/// ```json
/// {
///   "course": { "id": "...", "account_id": "...", "name": "Rust", "created_at": "..." },
///   "modules": [
///     { "id": "...", "course_id": "...", "name": "Basics", "order_idx": 1,
///       "lessons": [ { "id": "...", "module_id": "...", "name": "Ownership", "order_idx": 1 } ] }
///   ]
/// }
/// ```
pub async fn outline(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Outline>> {
    Ok(Json(Course::outline(&state.db, course_id).await?))
}

pub async fn list_participants(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Participant>>> {
    Ok(Json(Enrollment::participants(&state.db, course_id).await?))
}

/// Enroll a member of the course's account
///
/// # Errors
///
/// - `400`: User is not a member of the course's account
/// - `404`: Course not found
/// - `409`: Already enrolled
pub async fn enroll(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(req) = payload?;
    Enrollment::enroll(&state.db, req.user_id, course_id).await?;

    Ok(StatusCode::CREATED)
}

pub async fn unenroll(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    Enrollment::unenroll(&state.db, user_id, course_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
