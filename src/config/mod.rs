//! Configuration module for the blog backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory for uploaded images
    pub upload_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Posts per page on the index
    pub page_size: i64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("BLOG_DB_PATH")
            .unwrap_or_else(|_| "./data/blog.sqlite".to_string())
            .into();

        let upload_dir = env::var("BLOG_UPLOAD_DIR")
            .unwrap_or_else(|_| "./data/uploads".to_string())
            .into();

        let bind_addr = env::var("BLOG_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid BLOG_BIND_ADDR format");

        let page_size = env::var("BLOG_PAGE_SIZE")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .expect("Invalid BLOG_PAGE_SIZE format");

        let log_level = env::var("BLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            db_path,
            upload_dir,
            bind_addr,
            page_size,
            log_level,
        }
    }
}
