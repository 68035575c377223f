use crate::error::{Result, ScribeError};
use std::env;
use std::path::PathBuf;

const DEFAULT_DB_ROOT: &str = "data/databases";
const DEFAULT_MODEL: &str = "gemini-flash-latest";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MAX_ATTEMPTS: usize = 2;

/// connection details for the external generation service, supplied once
/// at startup and injected into the pipeline
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// root directory holding one sub-directory per tenant
    pub db_root: PathBuf,
    /// enable the deprecated tenant-less store lookup
    pub tenantless_fallback: bool,
    pub generation: GenerationConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let db_root = env::var("DB_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_ROOT));

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScribeError::Config("GEMINI_API_KEY environment variable is required".to_string())
            })?;

        let model = env::var("GEMINI_MODEL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = env::var("GEMINI_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let max_attempts = env::var("SQLSCRIBE_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let tenantless_fallback = env_flag("SQLSCRIBE_TENANTLESS_FALLBACK");

        Ok(Self {
            db_root,
            tenantless_fallback,
            generation: GenerationConfig {
                base_url,
                api_key,
                model,
                max_attempts,
            },
        })
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| {
            let v = v.to_lowercase();
            v == "1" || v == "true" || v == "yes"
        })
        .unwrap_or(false)
}
