//! Environment-driven configuration
//!
//! Values are read from the process environment after loading an optional
//! `.env` file. The serving rules live in a separate JSON file because they
//! are structured lists.

use crate::models::ServingRules;
use crate::package::PackagingPolicy;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://firebasehosting.googleapis.com";
const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub site_id: Option<String>,
    pub api_url: String,
    pub access_token: Option<String>,
    pub serving_rules: ServingRules,
    pub upload_concurrency: usize,
    pub packaging_policy: PackagingPolicy,
    pub deploy_timeout: Option<Duration>,
    /// Prefix for sitemap entries; no sitemap is generated when unset.
    pub base_url: Option<String>,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dry_run = non_empty("DRY_RUN")
            .map(|v| parse_bool("DRY_RUN", &v))
            .transpose()?
            .unwrap_or(false);

        let site_id = non_empty("SITE_ID");
        let access_token = non_empty("HOSTING_ACCESS_TOKEN");

        let serving_rules = match non_empty("SERVING_CONFIG") {
            Some(path) => ServingRules::from_file(&PathBuf::from(path))?,
            None => ServingRules::default(),
        };

        let upload_concurrency = match non_empty("UPLOAD_CONCURRENCY") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(Error::Config(format!(
                        "UPLOAD_CONCURRENCY must be a positive integer, got '{}'",
                        v
                    )))
                }
            },
            None => DEFAULT_UPLOAD_CONCURRENCY,
        };

        let packaging_policy = match non_empty("ON_PACKAGING_ERROR") {
            Some(v) => v.parse()?,
            None => PackagingPolicy::default(),
        };

        let deploy_timeout = non_empty("DEPLOY_TIMEOUT_SECS")
            .map(|v| {
                v.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    Error::Config(format!(
                        "DEPLOY_TIMEOUT_SECS must be a number of seconds, got '{}'",
                        v
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            site_id,
            api_url: non_empty("HOSTING_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            access_token,
            serving_rules,
            upload_concurrency,
            packaging_policy,
            deploy_timeout,
            base_url: non_empty("SITE_BASE_URL"),
            dry_run,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}
