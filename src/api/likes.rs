//! Like API endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::auth::AuthenticatedUser;
use crate::models::LikeState;
use crate::AppState;

/// POST /api/posts/:id/like - Toggle the requester's like on a post.
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<LikeState> {
    let liked = state.repo.toggle_like(user.id, id).await?;
    let like_count = state.repo.like_count(id).await?;
    success(LikeState { liked, like_count })
}
