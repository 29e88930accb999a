//! Post models and the denormalized post read view.

use serde::{Deserialize, Serialize};

/// A post row as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: i64,
    /// Set once at creation, never changed by updates
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Denormalized view of a post for list and detail pages.
///
/// Carries the rendered body only; the raw markdown is exposed solely through
/// the edit-form source endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub like_count: i64,
    pub viewer_has_liked: bool,
    pub tags: Vec<String>,
    pub rendered_body: String,
}

/// One page of post views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub page: i64,
    pub total_pages: i64,
}

/// Raw markdown and comma-joined tag string for the edit form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSource {
    pub title: String,
    pub body: String,
    pub tags: String,
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
    /// Free-text tag input, comma separated
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Request body for updating an existing post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub image_url: Option<String>,
}
