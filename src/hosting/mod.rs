//! Hosting service integration
//!
//! Talks to a content-addressed static hosting API (Firebase Hosting REST
//! surface): versions are created, populated with a path to digest map,
//! filled with any missing blobs, finalized and released.

pub mod client;
pub mod mock;

pub use client::HostingClient;
pub use mock::{HostingCall, MockHostingClient};

use crate::models::{
    DigestIndex, PopulateFilesResponse, Release, ServingConfig, Version, VersionStatus,
};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait HostingService: Send + Sync {
    /// Allocate a new version of `site` carrying the serving rules.
    async fn create_version(&self, site: &str, config: &ServingConfig) -> Result<Version>;

    /// Submit the full file map; the service answers with the digests it lacks.
    async fn populate_files(
        &self,
        version: &str,
        files: &DigestIndex,
    ) -> Result<PopulateFilesResponse>;

    /// Store one gzip blob. Only a 200 response counts as success.
    async fn upload_blob(&self, upload_url: &str, digest: &str, data: &[u8]) -> Result<()>;

    async fn patch_version_status(&self, version: &str, status: VersionStatus) -> Result<Version>;

    /// Make `version` the live content of `site`.
    async fn create_release(&self, site: &str, version: &str) -> Result<Release>;
}
