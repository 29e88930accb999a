//! Like toggle response model.

use serde::{Deserialize, Serialize};

/// Result of toggling a like.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    /// True when the toggle ended with the requester liking the post
    pub liked: bool,
    pub like_count: i64,
}
