//! Database repository for posts, tags, likes and comments.
//!
//! Uses prepared statements and transactions for data integrity. Rows are
//! converted into typed records at this boundary; nothing above it sees raw
//! result rows.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{Comment, CreatePostRequest, Post, PostPage, PostView, UpdatePostRequest};
use crate::render;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== POST OPERATIONS ====================

    /// Create a post and sync its tags in one transaction.
    ///
    /// Returns the new post id.
    pub async fn create_post(
        &self,
        request: &CreatePostRequest,
        author_id: i64,
    ) -> Result<i64, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let created = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO post (title, body, author_id, created, image_url) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.title)
        .bind(&request.body)
        .bind(author_id)
        .bind(&created)
        .bind(&request.image_url)
        .execute(&mut *tx)
        .await?;

        let post_id = result.last_insert_rowid();
        sync_tags(&mut tx, post_id, &request.tags).await?;

        tx.commit().await?;

        Ok(post_id)
    }

    /// Update a post's title, body and image, and re-sync its tags, in one
    /// transaction. The created timestamp is never touched.
    pub async fn update_post(
        &self,
        post_id: i64,
        request: &UpdatePostRequest,
    ) -> Result<(), AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE post SET title = ?, body = ?, image_url = ? WHERE id = ?")
            .bind(&request.title)
            .bind(&request.body)
            .bind(&request.image_url)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        sync_tags(&mut tx, post_id, &request.tags).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Delete a post. Its tag associations, likes and comments go with it
    /// through the cascading foreign keys.
    ///
    /// Returns the prior image locator so the caller can purge the blob.
    pub async fn delete_post(&self, post_id: i64) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT image_url FROM post WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        };
        let image_url: Option<String> = row.get("image_url");

        sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(image_url)
    }

    /// Get a raw post row.
    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let row = sqlx::query(
            "SELECT id, title, body, author_id, created, image_url FROM post WHERE id = ?",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Count all posts.
    pub async fn count_posts(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(id) AS post_count FROM post")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("post_count"))
    }

    // ==================== READ MODEL ====================

    /// List one page of post views, newest first.
    pub async fn list_posts(
        &self,
        viewer_id: Option<i64>,
        page: i64,
        page_size: i64,
    ) -> Result<PostPage, AppError> {
        if page < 1 {
            return Err(AppError::Validation("Page must be at least 1".to_string()));
        }

        let offset = (page - 1) * page_size;

        let rows = sqlx::query(
            "SELECT id, title, body, author_id, created, image_url FROM post \
             ORDER BY created DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let posts: Vec<Post> = rows.iter().map(post_from_row).collect();
        let views = self.assemble_views(posts, viewer_id).await?;

        let total = self.count_posts().await?;
        let total_pages = if total == 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };

        Ok(PostPage {
            posts: views,
            page,
            total_pages,
        })
    }

    /// Build the view of a single post.
    pub async fn get_post_view(
        &self,
        post_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<Option<PostView>, AppError> {
        let Some(post) = self.get_post(post_id).await? else {
            return Ok(None);
        };

        let views = self.assemble_views(vec![post], viewer_id).await?;
        Ok(views.into_iter().next())
    }

    /// Join like counts, the viewer's like state and tag names onto post rows.
    /// Aggregation is an explicit join grouped in memory; tag names never pass
    /// through string concatenation.
    async fn assemble_views(
        &self,
        posts: Vec<Post>,
        viewer_id: Option<i64>,
    ) -> Result<Vec<PostView>, AppError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let params = placeholders(ids.len());

        let mut like_counts: HashMap<i64, i64> = HashMap::new();
        let count_sql = format!(
            "SELECT post_id, COUNT(user_id) AS like_count FROM post_like \
             WHERE post_id IN ({}) GROUP BY post_id",
            params
        );
        let mut count_query = sqlx::query(&count_sql);
        for id in &ids {
            count_query = count_query.bind(*id);
        }
        for row in count_query.fetch_all(&self.pool).await? {
            like_counts.insert(row.get("post_id"), row.get("like_count"));
        }

        let mut viewer_liked: HashSet<i64> = HashSet::new();
        if let Some(user_id) = viewer_id {
            let liked_sql = format!(
                "SELECT post_id FROM post_like WHERE user_id = ? AND post_id IN ({})",
                params
            );
            let mut liked_query = sqlx::query(&liked_sql).bind(user_id);
            for id in &ids {
                liked_query = liked_query.bind(*id);
            }
            for row in liked_query.fetch_all(&self.pool).await? {
                viewer_liked.insert(row.get("post_id"));
            }
        }

        let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
        let tags_sql = format!(
            "SELECT pt.post_id, t.name FROM post_tag pt \
             JOIN tag t ON t.id = pt.tag_id \
             WHERE pt.post_id IN ({}) ORDER BY t.name",
            params
        );
        let mut tags_query = sqlx::query(&tags_sql);
        for id in &ids {
            tags_query = tags_query.bind(*id);
        }
        for row in tags_query.fetch_all(&self.pool).await? {
            tags.entry(row.get("post_id"))
                .or_default()
                .push(row.get("name"));
        }

        Ok(posts
            .into_iter()
            .map(|post| PostView {
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                viewer_has_liked: viewer_liked.contains(&post.id),
                tags: tags.remove(&post.id).unwrap_or_default(),
                rendered_body: render::markdown_to_html(&post.body),
                id: post.id,
                title: post.title,
                author_id: post.author_id,
                created: post.created,
                image_url: post.image_url,
            })
            .collect())
    }

    // ==================== TAG OPERATIONS ====================

    /// Replace the whole tag association for a post from a free-text input.
    pub async fn sync_post_tags(&self, post_id: i64, raw_tags: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sync_tags(&mut tx, post_id, raw_tags).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Tag names for a post, alphabetical.
    pub async fn tags_for_post(&self, post_id: i64) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT t.name FROM tag t JOIN post_tag pt ON t.id = pt.tag_id \
             WHERE pt.post_id = ? ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    // ==================== LIKE OPERATIONS ====================

    /// Toggle the requester's like on a post.
    ///
    /// Returns true when the toggle ended in the liked state.
    pub async fn toggle_like(&self, user_id: i64, post_id: i64) -> Result<bool, AppError> {
        if self.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let existing = sqlx::query("SELECT 1 FROM post_like WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            sqlx::query("DELETE FROM post_like WHERE user_id = ? AND post_id = ?")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
            Ok(false)
        } else {
            sqlx::query("INSERT INTO post_like (user_id, post_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
            Ok(true)
        }
    }

    /// Count distinct users liking a post.
    pub async fn like_count(&self, post_id: i64) -> Result<i64, AppError> {
        let row =
            sqlx::query("SELECT COUNT(user_id) AS like_count FROM post_like WHERE post_id = ?")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.get("like_count"))
    }

    // ==================== COMMENT OPERATIONS ====================

    /// Add a comment to a post.
    pub async fn add_comment(
        &self,
        post_id: i64,
        author_id: i64,
        body: &str,
    ) -> Result<Comment, AppError> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".to_string()));
        }
        if self.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Post {} not found", post_id)));
        }

        let created = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO comment (post_id, author_id, body, created) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .bind(&created)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            post_id,
            author_id,
            body: body.to_string(),
            created,
        })
    }

    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query(
            "SELECT id, post_id, author_id, body, created FROM comment \
             WHERE post_id = ? ORDER BY created ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

/// Parse a free-text tag input into a normalized, de-duplicated name set.
///
/// Names are split on commas, trimmed and lower-cased; empties are dropped.
/// The output is sorted so the same input set always yields the same list.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let names: BTreeSet<String> = raw
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    names.into_iter().collect()
}

/// Replace a post's tag associations on an open transaction.
///
/// Tag rows are created on demand and never deleted; a tag left without
/// associations simply remains unreferenced.
async fn sync_tags(
    tx: &mut Transaction<'_, Sqlite>,
    post_id: i64,
    raw_tags: &str,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM post_tag WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    for name in parse_tag_list(raw_tags) {
        let existing = sqlx::query("SELECT id FROM tag WHERE name = ?")
            .bind(&name)
            .fetch_optional(&mut **tx)
            .await?;

        let tag_id: i64 = match existing {
            Some(row) => row.get("id"),
            None => sqlx::query("INSERT INTO tag (name) VALUES (?)")
                .bind(&name)
                .execute(&mut **tx)
                .await?
                .last_insert_rowid(),
        };

        sqlx::query("INSERT INTO post_tag (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Placeholder list for an IN clause.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// Helper functions for row conversion

fn post_from_row(row: &SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        author_id: row.get("author_id"),
        created: row.get("created"),
        image_url: row.get("image_url"),
    }
}

fn comment_from_row(row: &SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created: row.get("created"),
    }
}
