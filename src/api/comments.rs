//! Comment API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::AuthenticatedUser;
use crate::errors::AppError;
use crate::models::{Comment, CreateCommentRequest};
use crate::AppState;

/// GET /api/posts/:id/comments - Comments on a post, oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Comment>> {
    if state.repo.get_post(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Post {} not found", id)));
    }

    let comments = state.repo.list_comments(id).await?;
    success(comments)
}

/// POST /api/posts/:id/comments - Add a comment to a post.
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<CreateCommentRequest>,
) -> ApiResult<Comment> {
    let comment = state.repo.add_comment(id, user.id, &request.body).await?;
    success(comment)
}
