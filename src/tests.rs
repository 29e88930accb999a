//! Integration tests for the blog backend.

use std::sync::Arc;

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::blobs::BlobStore;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

/// Quiet tracing once for the whole test binary.
static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
});

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    state: AppState,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Lazy::force(&TRACING);

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let upload_dir = temp_dir.path().join("uploads");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Initialize blob storage
        let blobs = Arc::new(BlobStore::open(&upload_dir).expect("Failed to open blob store"));

        // Create config
        let config = Config {
            db_path,
            upload_dir,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            page_size: 5,
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            blobs,
            config: Arc::new(config),
        };

        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            state,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a post as the given user, returning its id.
    async fn create_post(&self, user_id: i64, title: &str, tags: &str) -> i64 {
        let resp = self
            .client
            .post(self.url("/api/posts"))
            .header("x-user-id", user_id)
            .json(&json!({
                "title": title,
                "body": format!("Body of {}", title),
                "tags": tags
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        body["data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_create_requires_login() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .json(&json!({ "title": "Anonymous", "body": "nope" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_malformed_user_header_is_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .header("x-user-id", "not-a-number")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_create_post_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .header("x-user-id", 1)
        .json(&json!({ "title": "", "body": "body without a title" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Nothing was written
    let list_resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .send()
        .await
        .unwrap();
    let list_body: Value = list_resp.json().await.unwrap();
    assert_eq!(list_body["data"]["totalPages"], 0);
    assert_eq!(list_body["data"]["posts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_post_crud_with_tags() {
    let fixture = TestFixture::new().await;

    // Create with a messy tag string
    let post_id = fixture.create_post(1, "Hello World", "Rust, rust , Web,,web").await;

    // The view carries normalized tags and a rendered body, never the raw one
    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 200);
    let get_body: Value = get_resp.json().await.unwrap();
    let data = &get_body["data"];
    assert_eq!(data["title"], "Hello World");
    assert_eq!(data["tags"], json!(["rust", "web"]));
    assert_eq!(data["likeCount"], 0);
    assert_eq!(data["viewerHasLiked"], false);
    assert!(data["renderedBody"].as_str().unwrap().contains("<p>"));
    assert!(data.get("body").is_none());

    // Update as a different user is forbidden
    let forbidden_resp = fixture
        .client
        .put(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 2)
        .json(&json!({ "title": "Stolen", "body": "mine now", "tags": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden_resp.status(), 403);
    let forbidden_body: Value = forbidden_resp.json().await.unwrap();
    assert_eq!(forbidden_body["error"]["code"], "FORBIDDEN");

    // Update as the author replaces title and tags but keeps created
    let created_before = data["created"].as_str().unwrap().to_string();
    let update_resp = fixture
        .client
        .put(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 1)
        .json(&json!({ "title": "Hello Again", "body": "fresh body", "tags": "rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_resp.status(), 200);
    let update_body: Value = update_resp.json().await.unwrap();
    assert_eq!(update_body["data"]["title"], "Hello Again");
    assert_eq!(update_body["data"]["tags"], json!(["rust"]));
    assert_eq!(update_body["data"]["created"], created_before.as_str());

    // Delete and verify it is gone
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 1)
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    let gone_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(gone_resp.status(), 404);
    let gone_body: Value = gone_resp.json().await.unwrap();
    assert_eq!(gone_body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_listing_pagination() {
    let fixture = TestFixture::new().await;

    for i in 1..=12 {
        fixture.create_post(1, &format!("Post {}", i), "").await;
    }

    // First page, newest first
    let page1_resp = fixture
        .client
        .get(fixture.url("/api/posts?page=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(page1_resp.status(), 200);
    let page1: Value = page1_resp.json().await.unwrap();
    assert_eq!(page1["data"]["totalPages"], 3);
    assert_eq!(page1["data"]["page"], 1);
    let posts = page1["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 5);
    assert_eq!(posts[0]["title"], "Post 12");

    // Last page holds the two oldest posts
    let page3_resp = fixture
        .client
        .get(fixture.url("/api/posts?page=3"))
        .send()
        .await
        .unwrap();
    let page3: Value = page3_resp.json().await.unwrap();
    let old_posts = page3["data"]["posts"].as_array().unwrap();
    assert_eq!(old_posts.len(), 2);
    assert_eq!(old_posts[0]["title"], "Post 2");
    assert_eq!(old_posts[1]["title"], "Post 1");

    // Page numbers start at 1
    let bad_resp = fixture
        .client
        .get(fixture.url("/api/posts?page=0"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_resp.status(), 400);
}

#[tokio::test]
async fn test_like_toggle() {
    let fixture = TestFixture::new().await;
    let post_id = fixture.create_post(1, "Likeable", "").await;

    // Anonymous likes are rejected
    let anon_resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/like", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anon_resp.status(), 401);

    // First toggle likes
    let like_resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/like", post_id)))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();
    assert_eq!(like_resp.status(), 200);
    let like_body: Value = like_resp.json().await.unwrap();
    assert_eq!(like_body["data"]["liked"], true);
    assert_eq!(like_body["data"]["likeCount"], 1);

    // Second toggle unlikes
    let unlike_resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/like", post_id)))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();
    let unlike_body: Value = unlike_resp.json().await.unwrap();
    assert_eq!(unlike_body["data"]["liked"], false);
    assert_eq!(unlike_body["data"]["likeCount"], 0);

    // Liking a missing post is a 404
    let missing_resp = fixture
        .client
        .post(fixture.url("/api/posts/9999/like"))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();
    assert_eq!(missing_resp.status(), 404);
}

#[tokio::test]
async fn test_viewer_like_state() {
    let fixture = TestFixture::new().await;
    let post_id = fixture.create_post(1, "Popular", "").await;

    fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/like", post_id)))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();

    // The liker sees their own state
    let mine_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();
    let mine: Value = mine_resp.json().await.unwrap();
    assert_eq!(mine["data"]["viewerHasLiked"], true);
    assert_eq!(mine["data"]["likeCount"], 1);

    // Another user sees the count but not the flag
    let theirs_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 8)
        .send()
        .await
        .unwrap();
    let theirs: Value = theirs_resp.json().await.unwrap();
    assert_eq!(theirs["data"]["viewerHasLiked"], false);
    assert_eq!(theirs["data"]["likeCount"], 1);

    // Anonymous viewers never have liked
    let anon_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post_id)))
        .send()
        .await
        .unwrap();
    let anon: Value = anon_resp.json().await.unwrap();
    assert_eq!(anon["data"]["viewerHasLiked"], false);
}

#[tokio::test]
async fn test_comments() {
    let fixture = TestFixture::new().await;
    let post_id = fixture.create_post(1, "Discussed", "").await;

    // Commenting requires login
    let anon_resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .json(&json!({ "body": "anonymous shout" }))
        .send()
        .await
        .unwrap();
    assert_eq!(anon_resp.status(), 401);

    // Empty bodies are rejected
    let empty_resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .header("x-user-id", 2)
        .json(&json!({ "body": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_resp.status(), 400);
    let empty_body: Value = empty_resp.json().await.unwrap();
    assert_eq!(empty_body["error"]["code"], "VALIDATION_ERROR");

    // Comments list oldest first
    for body in ["first", "second", "third"] {
        let resp = fixture
            .client
            .post(fixture.url(&format!("/api/posts/{}/comments", post_id)))
            .header("x-user-id", 2)
            .json(&json!({ "body": body }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let list_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(list_resp.status(), 200);
    let list_body: Value = list_resp.json().await.unwrap();
    let comments = list_body["data"].as_array().unwrap();
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[0]["body"], "first");
    assert_eq!(comments[2]["body"], "third");

    // Comments on a missing post are a 404
    let missing_resp = fixture
        .client
        .get(fixture.url("/api/posts/9999/comments"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_resp.status(), 404);
}

#[tokio::test]
async fn test_delete_removes_comments_and_likes() {
    let fixture = TestFixture::new().await;
    let post_id = fixture.create_post(1, "Doomed", "a, b").await;

    fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/like", post_id)))
        .header("x-user-id", 7)
        .send()
        .await
        .unwrap();
    fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .header("x-user-id", 8)
        .json(&json!({ "body": "so long" }))
        .send()
        .await
        .unwrap();

    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 1)
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    // Everything hanging off the post is unreachable now
    let comments_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(comments_resp.status(), 404);

    assert!(fixture
        .state
        .repo
        .list_comments(post_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_post_source_for_edit_form() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .header("x-user-id", 1)
        .json(&json!({
            "title": "Sourced",
            "body": "# Raw markdown",
            "tags": "b, a"
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let post_id = body["data"]["id"].as_i64().unwrap();

    // The author gets the raw body and a comma-joined tag string back
    let source_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}/source", post_id)))
        .header("x-user-id", 1)
        .send()
        .await
        .unwrap();
    assert_eq!(source_resp.status(), 200);
    let source: Value = source_resp.json().await.unwrap();
    assert_eq!(source["data"]["body"], "# Raw markdown");
    assert_eq!(source["data"]["tags"], "a, b");

    // Everyone else is turned away
    let other_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}/source", post_id)))
        .header("x-user-id", 2)
        .send()
        .await
        .unwrap();
    assert_eq!(other_resp.status(), 403);

    let anon_resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}/source", post_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anon_resp.status(), 401);
}

#[tokio::test]
async fn test_upload_and_purge_on_delete() {
    let fixture = TestFixture::new().await;

    // Upload an image
    let upload_resp = fixture
        .client
        .post(fixture.url("/api/uploads?filename=photo.png"))
        .header("x-user-id", 1)
        .body(b"fake image bytes".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(upload_resp.status(), 200);
    let upload_body: Value = upload_resp.json().await.unwrap();
    let locator = upload_body["data"]["imageUrl"].as_str().unwrap().to_string();
    assert!(fixture.state.blobs.exists(&locator).await);

    // It can be served back
    let serve_resp = fixture
        .client
        .get(fixture.url(&format!("/api/uploads/{}", locator)))
        .send()
        .await
        .unwrap();
    assert_eq!(serve_resp.status(), 200);
    assert_eq!(
        serve_resp.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    assert_eq!(serve_resp.bytes().await.unwrap().as_ref(), b"fake image bytes");

    // Attach it to a post
    let create_resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .header("x-user-id", 1)
        .json(&json!({
            "title": "Pictured",
            "body": "with image",
            "imageUrl": locator
        }))
        .send()
        .await
        .unwrap();
    let create_body: Value = create_resp.json().await.unwrap();
    let post_id = create_body["data"]["id"].as_i64().unwrap();
    assert_eq!(create_body["data"]["imageUrl"].as_str().unwrap(), locator);

    // Deleting the post purges the blob
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/posts/{}", post_id)))
        .header("x-user-id", 1)
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);
    assert!(!fixture.state.blobs.exists(&locator).await);
}

#[tokio::test]
async fn test_upload_rejects_bad_extension() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/uploads?filename=script.sh"))
        .header("x-user-id", 1)
        .body(b"#!/bin/sh".to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
