//! Incremental deployment pipeline
//!
//! Packages an artifact set, opens a new version, asks the hosting service
//! which blobs it is missing, uploads only those, finalizes the version and
//! releases it. Stages run strictly in that order; a failure at any stage
//! aborts the run and leaves the previously released version live.

mod finalize;
mod open;
mod populate;
mod release;
mod upload;

pub use finalize::finalize_version;
pub use open::open_version;
pub use populate::{resolve_required, RequiredUploads};
pub use release::release_version;
pub use upload::upload_required;

use crate::hosting::HostingService;
use crate::models::{ArtifactMap, ServingRules};
use crate::package::{self, PackagedSet, PackagingPolicy};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Per-site deployment settings.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub site: String,
    pub serving_rules: ServingRules,
    pub upload_concurrency: usize,
    pub packaging_policy: PackagingPolicy,
}

impl DeployOptions {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            serving_rules: ServingRules::default(),
            upload_concurrency: 8,
            packaging_policy: PackagingPolicy::default(),
        }
    }
}

/// Outcome of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub site: String,
    pub version: String,
    pub release: String,
    /// Paths in the submitted digest index.
    pub files: usize,
    /// Distinct digests among those paths.
    pub blobs: usize,
    pub uploaded: usize,
    pub skipped: Vec<String>,
}

pub struct Deployer {
    hosting: Box<dyn HostingService>,
    options: DeployOptions,
    cancel: CancellationToken,
}

impl Deployer {
    pub fn new(hosting: Box<dyn HostingService>, options: DeployOptions) -> Self {
        Self {
            hosting,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Package `artifacts` and run every remote stage.
    pub async fn deploy(&self, artifacts: ArtifactMap) -> Result<DeployReport> {
        let policy = self.options.packaging_policy;
        let packaged = tokio::task::spawn_blocking(move || {
            package::package_all(
                artifacts.iter().map(|(path, content)| (path, content.as_slice())),
                policy,
            )
        })
        .await
        .map_err(|e| Error::Invariant(format!("Packaging task join error: {}", e)))??;

        self.deploy_packaged(&packaged).await
    }

    /// Run the remote stages for an already packaged set.
    pub async fn deploy_packaged(&self, packaged: &PackagedSet) -> Result<DeployReport> {
        let site = self.options.site.as_str();
        let hosting = self.hosting.as_ref();

        self.check_cancelled()?;
        let version = open_version(hosting, site, &self.options.serving_rules).await?;

        self.check_cancelled()?;
        let required = resolve_required(hosting, &version, &packaged.index).await?;

        let uploaded = upload_required(
            hosting,
            &required,
            packaged,
            self.options.upload_concurrency,
            &self.cancel,
        )
        .await?;

        self.check_cancelled()?;
        finalize_version(hosting, &version).await?;

        self.check_cancelled()?;
        let release = release_version(hosting, site, &version).await?;

        info!(
            "Deployed {} files to site {} as {} ({} uploaded, {} already stored)",
            packaged.index.len(),
            site,
            version,
            uploaded,
            packaged.blobs.len().saturating_sub(uploaded)
        );

        Ok(DeployReport {
            site: site.to_string(),
            version,
            release,
            files: packaged.index.len(),
            blobs: packaged.blobs.len(),
            uploaded,
            skipped: packaged.skipped.clone(),
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
