use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub vision_model: String,
    pub image_model: String,
    pub database_path: PathBuf,
    pub static_dir: PathBuf,
    pub templates_glob: String,
    pub max_upload_bytes: usize,
    pub ai_timeout_secs: u64,
    pub pricing_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".into())
                .parse()
                .context("PORT must be a number")?,
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            vision_model: std::env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
            image_model: std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".into()),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/logs.db".into())
                .into(),
            static_dir: std::env::var("STATIC_DIR")
                .unwrap_or_else(|_| "static".into())
                .into(),
            templates_glob: std::env::var("TEMPLATES_GLOB")
                .unwrap_or_else(|_| "templates/**/*.html".into()),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (20 * 1024 * 1024).to_string())
                .parse()
                .context("MAX_UPLOAD_BYTES must be a number")?,
            ai_timeout_secs: std::env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .context("AI_TIMEOUT_SECS must be a number")?,
            pricing_file: std::env::var("PRICING_FILE").ok().map(PathBuf::from),
        })
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.static_dir.join("processed")
    }
}
