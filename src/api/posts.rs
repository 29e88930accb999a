//! Post API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::auth::{AuthenticatedUser, Viewer};
use crate::errors::AppError;
use crate::models::{
    CreatePostRequest, Post, PostPage, PostSource, PostView, UpdatePostRequest,
};
use crate::AppState;

/// Query parameters for the post listing.
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// GET /api/posts - List one page of posts, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<PostPage> {
    let page = state
        .repo
        .list_posts(viewer, query.page, state.config.page_size)
        .await?;
    success(page)
}

/// GET /api/posts/:id - Get a single post view.
pub async fn get_post(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<i64>,
) -> ApiResult<PostView> {
    match state.repo.get_post_view(id, viewer).await? {
        Some(view) => success(view),
        None => Err(AppError::NotFound(format!("Post {} not found", id))),
    }
}

/// POST /api/posts - Create a new post.
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<PostView> {
    let post_id = state.repo.create_post(&request, user.id).await?;

    let view = state
        .repo
        .get_post_view(post_id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
    success(view)
}

/// PUT /api/posts/:id - Update a post. Author only.
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePostRequest>,
) -> ApiResult<PostView> {
    let existing = require_author(&state, id, user.id).await?;

    state.repo.update_post(id, &request).await?;

    // A replaced image leaves its old blob behind; purge it best-effort
    if let Some(old) = existing.image_url {
        if request.image_url.as_deref() != Some(old.as_str()) {
            if let Err(e) = state.blobs.delete(&old).await {
                tracing::warn!("Failed to delete replaced image {}: {}", old, e);
            }
        }
    }

    let view = state
        .repo
        .get_post_view(id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
    success(view)
}

/// DELETE /api/posts/:id - Delete a post. Author only.
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    require_author(&state, id, user.id).await?;

    let image_url = state.repo.delete_post(id).await?;

    if let Some(locator) = image_url {
        if let Err(e) = state.blobs.delete(&locator).await {
            tracing::warn!("Failed to delete image {} for post {}: {}", locator, id, e);
        }
    }

    success(())
}

/// GET /api/posts/:id/source - Raw markdown and tag string for the edit form.
/// Author only.
pub async fn get_post_source(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<PostSource> {
    let post = require_author(&state, id, user.id).await?;
    let tags = state.repo.tags_for_post(id).await?;

    success(PostSource {
        title: post.title,
        body: post.body,
        tags: tags.join(", "),
    })
}

/// Fetch a post and fail with Forbidden unless `user_id` is its author.
async fn require_author(state: &AppState, post_id: i64, user_id: i64) -> Result<Post, AppError> {
    let post = state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    if post.author_id != user_id {
        return Err(AppError::Forbidden(
            "Only the author can modify this post".to_string(),
        ));
    }

    Ok(post)
}
