use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use crate::ai::DEFAULT_MODEL;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Settings read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub api_url: String,
    pub webdriver_url: String,
    pub model: String,
    pub profile_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let db_path = match std::env::var("AUTOAPPLY_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_db_path(),
        };

        Ok(Config {
            db_path,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            api_url: std::env::var("AUTOAPPLY_API")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| DEFAULT_WEBDRIVER_URL.to_string()),
            model: std::env::var("AUTOAPPLY_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            profile_path: std::env::var("AUTOAPPLY_PROFILE").ok().map(PathBuf::from),
        })
    }
}

fn default_db_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "autoapply") {
        proj_dirs.data_dir().join("autoapply.db")
    } else {
        // Fallback to current directory
        PathBuf::from("autoapply.db")
    }
}
