//! Runtime configuration loaded from the environment
//!
//! Every credential and tunable is an explicitly named field, validated once
//! at startup. Nothing downstream reads the environment.

use crate::{Error, Result};
use std::time::Duration;

pub const MAX_IMAGE_COUNT: usize = 30;

const DEFAULT_UNSPLASH_BASE_URL: &str = "https://api.unsplash.com";
const DEFAULT_CDN_ENDPOINT: &str = "https://nyc3.digitaloceanspaces.com";
const DEFAULT_QUERY: &str = "motivational,inspiration,success,nature";

#[derive(Debug, Clone)]
pub struct Config {
    pub unsplash_access_key: String,
    pub unsplash_base_url: String,
    pub cdn_access_key_id: Option<String>,
    pub cdn_secret_access_key: Option<String>,
    pub cdn_endpoint: String,
    pub cdn_region: String,
    pub cdn_bucket: String,
    pub cdn_base_url: String,
    pub cdn_root_folder: String,
    pub metadata_db_url: Option<String>,
    pub metadata_db_secret: Option<String>,
    pub metadata_root: String,
    pub query: String,
    pub image_count: usize,
    pub upload_concurrency: usize,
    pub fetch_attempts: usize,
    pub fetch_retry_delay: Duration,
    pub http_timeout: Duration,
    pub run_timeout: Duration,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build and validate a config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| Error::Setup(format!("{} not set", key)));

        let dry_run = match get("DRY_RUN") {
            Some(value) => parse_bool("DRY_RUN", &value)?,
            None => false,
        };

        // Real stores need credentials; dry runs use in-memory ones.
        let required_unless_dry_run = |key: &str| -> Result<Option<String>> {
            if dry_run {
                Ok(get(key))
            } else {
                required(key).map(Some)
            }
        };

        let cdn_access_key_id = required_unless_dry_run("CDN_ACCESS_KEY_ID")?;
        let cdn_secret_access_key = required_unless_dry_run("CDN_SECRET_ACCESS_KEY")?;
        let cdn_base_url = required_unless_dry_run("CDN_BASE_URL")?
            .unwrap_or_else(|| "https://mock-cdn.example.com".to_string());
        let metadata_db_url = required_unless_dry_run("METADATA_DB_URL")?;

        let image_count = parse_number(&get, "IMAGE_COUNT", MAX_IMAGE_COUNT as u64)? as usize;
        if image_count == 0 || image_count > MAX_IMAGE_COUNT {
            return Err(Error::Setup(format!(
                "IMAGE_COUNT must be between 1 and {}, got {}",
                MAX_IMAGE_COUNT, image_count
            )));
        }

        let upload_concurrency = parse_number(&get, "UPLOAD_CONCURRENCY", 5)? as usize;
        if upload_concurrency == 0 {
            return Err(Error::Setup("UPLOAD_CONCURRENCY must be at least 1".to_string()));
        }

        let fetch_attempts = parse_number(&get, "FETCH_ATTEMPTS", 3)? as usize;
        if fetch_attempts == 0 {
            return Err(Error::Setup("FETCH_ATTEMPTS must be at least 1".to_string()));
        }

        let http_timeout_secs = parse_number(&get, "HTTP_TIMEOUT_SECS", 20)?;
        let run_timeout_secs = parse_number(&get, "RUN_TIMEOUT_SECS", 600)?;
        if http_timeout_secs == 0 || run_timeout_secs == 0 {
            return Err(Error::Setup("Timeouts must be greater than zero".to_string()));
        }

        Ok(Self {
            unsplash_access_key: required("UNSPLASH_ACCESS_KEY")?,
            unsplash_base_url: get("UNSPLASH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_UNSPLASH_BASE_URL.to_string()),
            cdn_access_key_id,
            cdn_secret_access_key,
            cdn_endpoint: get("CDN_ENDPOINT").unwrap_or_else(|| DEFAULT_CDN_ENDPOINT.to_string()),
            cdn_region: get("CDN_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            cdn_bucket: get("CDN_BUCKET").unwrap_or_else(|| "daily-images".to_string()),
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
            cdn_root_folder: get("CDN_ROOT_FOLDER").unwrap_or_else(|| "daily_images".to_string()),
            metadata_db_url,
            metadata_db_secret: get("METADATA_DB_SECRET"),
            metadata_root: get("METADATA_ROOT").unwrap_or_else(|| "daily_images".to_string()),
            query: get("IMAGE_QUERY").unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            image_count,
            upload_concurrency,
            fetch_attempts,
            fetch_retry_delay: Duration::from_millis(parse_number(
                &get,
                "FETCH_RETRY_DELAY_MS",
                2000,
            )?),
            http_timeout: Duration::from_secs(http_timeout_secs),
            run_timeout: Duration::from_secs(run_timeout_secs),
            dry_run,
        })
    }
}

fn parse_number<G>(get: &G, key: &str, default: u64) -> Result<u64>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::Setup(format!("{} must be a non-negative integer, got '{}'", key, value))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Setup(format!("{} must be a boolean, got '{}'", key, value))),
    }
}
