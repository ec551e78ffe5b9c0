//! Data models and structures
//!
//! Defines the artifact and blob types that flow through the pipeline, the
//! serving rules attached to a version, and the request/response bodies of
//! the hosting API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Site-relative path to raw content, as produced by an [`ArtifactSource`].
///
/// Iteration order carries no meaning.
///
/// [`ArtifactSource`]: crate::source::ArtifactSource
pub type ArtifactMap = HashMap<String, Vec<u8>>;

/// `/`-rooted path to content digest for the whole artifact set.
pub type DigestIndex = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub content: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// The path as submitted to the hosting service: exactly one leading `/`.
    pub fn site_path(&self) -> String {
        format!("/{}", self.path.trim_start_matches('/'))
    }
}

/// Gzip-compressed content keyed by the SHA-256 of the uncompressed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedBlob {
    pub digest: String,
    pub compressed: Vec<u8>,
}

// Serving rules as written in the SERVING_CONFIG file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServingRules {
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
    #[serde(default)]
    pub redirects: Vec<RedirectRule>,
}

impl ServingRules {
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRule {
    pub glob: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub glob: String,
    pub location: String,
    #[serde(rename = "code")]
    pub status_code: u16,
}

// Hosting API request/response models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServingConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<ApiHeader>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirects: Vec<ApiRedirect>,
    pub clean_urls: bool,
    pub trailing_slash_behavior: String,
}

impl ServingConfig {
    pub fn from_rules(rules: &ServingRules) -> Self {
        Self {
            headers: rules
                .headers
                .iter()
                .map(|h| ApiHeader {
                    glob: h.glob.clone(),
                    headers: h.headers.clone(),
                })
                .collect(),
            redirects: rules
                .redirects
                .iter()
                .map(|r| ApiRedirect {
                    glob: r.glob.clone(),
                    location: r.location.clone(),
                    status_code: r.status_code,
                })
                .collect(),
            clean_urls: true,
            trailing_slash_behavior: "ADD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiHeader {
    pub glob: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiRedirect {
    pub glob: String,
    pub location: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Created,
    Finalized,
    Deleted,
    Abandoned,
    Expired,
    #[serde(other)]
    VersionStatusUnspecified,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Created => "CREATED",
            VersionStatus::Finalized => "FINALIZED",
            VersionStatus::Deleted => "DELETED",
            VersionStatus::Abandoned => "ABANDONED",
            VersionStatus::Expired => "EXPIRED",
            VersionStatus::VersionStatusUnspecified => "VERSION_STATUS_UNSPECIFIED",
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Full resource name, `sites/{site}/versions/{id}`.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VersionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ServingConfig>,
}

#[derive(Debug, Serialize)]
pub struct CreateVersionRequest<'a> {
    pub config: &'a ServingConfig,
}

#[derive(Debug, Serialize)]
pub struct PopulateFilesRequest<'a> {
    pub files: &'a DigestIndex,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateFilesResponse {
    #[serde(default)]
    pub upload_required_hashes: Vec<String>,
    #[serde(default)]
    pub upload_url: String,
}

#[derive(Debug, Serialize)]
pub struct PatchVersionRequest {
    pub status: VersionStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default)]
    pub name: String,
}
