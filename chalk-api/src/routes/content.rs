/// Module, lesson and block endpoints
///
/// Modules, lessons and blocks are ordered within their parent starting
/// at 1. Creating with an `order_idx` inserts there and shifts the items
/// after it; omitting it appends. Moving renumbers the items in between.
/// Deleting leaves a gap until the scope is compacted with `?compact=true`.
///
/// # Endpoints
///
/// - `POST/GET /v1/courses/:course_id/modules`
/// - `PATCH/DELETE /v1/modules/:module_id`, `POST /v1/modules/:module_id/move`
/// - `POST/GET /v1/modules/:module_id/lessons`
/// - `PATCH/DELETE /v1/lessons/:lesson_id`, `POST /v1/lessons/:lesson_id/move`
/// - `POST/GET /v1/lessons/:lesson_id/blocks`
/// - `PATCH/DELETE /v1/blocks/:block_id`, `POST /v1/blocks/:block_id/move`
///
/// # Example
///
/// ```text
/// POST /v1/lessons/:lesson_id/blocks
/// { "type": "text", "content": "Welcome", "order_idx": 1 }
///
/// POST /v1/blocks/:block_id/move
/// { "order_idx": 3 }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chalk_shared::db::ordering::Placement;
use chalk_shared::models::block::{Block, BlockContent};
use chalk_shared::models::lesson::Lesson;
use chalk_shared::models::module::Module;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Body of module and lesson create
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,

    /// Position to insert at; appends when absent
    pub order_idx: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1 to 255 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// Clamped into the valid range
    pub order_idx: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    #[serde(flatten)]
    pub content: BlockContent,

    pub order_idx: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlockRequest {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Renumber the remaining siblings to 1..N in the same transaction
    #[serde(default)]
    pub compact: bool,
}

// Modules

pub async fn create_module(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Module>)> {
    let Json(req) = payload?;
    req.validate()?;

    let module = Module::create(&state.db, course_id, &req.name, req.order_idx).await?;

    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn list_modules(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Module>>> {
    Ok(Json(Module::list_by_course(&state.db, course_id).await?))
}

pub async fn rename_module(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Json<Module>> {
    let Json(req) = payload?;
    req.validate()?;

    Ok(Json(Module::rename(&state.db, module_id, &req.name).await?))
}

pub async fn move_module(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<Json<Placement>> {
    let Json(req) = payload?;

    Ok(Json(Module::move_to(&state.db, module_id, req.order_idx).await?))
}

pub async fn delete_module(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<StatusCode> {
    if query.compact {
        Module::delete_compacted(&state.db, module_id).await?;
    } else {
        Module::delete(&state.db, module_id).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

// Lessons

pub async fn create_lesson(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    let Json(req) = payload?;
    req.validate()?;

    let lesson = Lesson::create(&state.db, module_id, &req.name, req.order_idx).await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn list_lessons(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Lesson>>> {
    Ok(Json(Lesson::list_by_module(&state.db, module_id).await?))
}

pub async fn rename_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Json<Lesson>> {
    let Json(req) = payload?;
    req.validate()?;

    Ok(Json(Lesson::rename(&state.db, lesson_id, &req.name).await?))
}

pub async fn move_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<Json<Placement>> {
    let Json(req) = payload?;

    Ok(Json(Lesson::move_to(&state.db, lesson_id, req.order_idx).await?))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<StatusCode> {
    if query.compact {
        Lesson::delete_compacted(&state.db, lesson_id).await?;
    } else {
        Lesson::delete(&state.db, lesson_id).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

// Blocks

/// Create a video or text block
///
/// # Errors
///
/// - `404`: Lesson not found, or a video block references an unknown file
pub async fn create_block(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
    payload: Result<Json<CreateBlockRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Block>)> {
    let Json(req) = payload?;

    let block = Block::create(&state.db, lesson_id, req.content, req.order_idx).await?;

    Ok((StatusCode::CREATED, Json(block)))
}

pub async fn list_blocks(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Block>>> {
    Ok(Json(Block::list_by_lesson(&state.db, lesson_id).await?))
}

/// Replace the content of a text block
pub async fn update_block(
    State(state): State<AppState>,
    Path(block_id): Path<Uuid>,
    payload: Result<Json<UpdateBlockRequest>, JsonRejection>,
) -> ApiResult<Json<Block>> {
    let Json(req) = payload?;

    Ok(Json(Block::update_text(&state.db, block_id, &req.content).await?))
}

pub async fn move_block(
    State(state): State<AppState>,
    Path(block_id): Path<Uuid>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<Json<Placement>> {
    let Json(req) = payload?;

    Ok(Json(Block::move_to(&state.db, block_id, req.order_idx).await?))
}

pub async fn delete_block(
    State(state): State<AppState>,
    Path(block_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<StatusCode> {
    if query.compact {
        Block::delete_compacted(&state.db, block_id).await?;
    } else {
        Block::delete(&state.db, block_id).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
