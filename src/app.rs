//! Application orchestration: collect, optionally write locally, deploy.

use crate::config::Config;
use crate::deploy::{DeployOptions, DeployReport, Deployer};
use crate::hosting::{HostingClient, HostingService, MockHostingClient};
use crate::output::write_artifacts;
use crate::source::source_for;
use crate::{Error, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct App {
    config: Config,
    deployer: Option<Deployer>,
    cancel: CancellationToken,
}

impl App {
    /// Build an app whose deployments go through `hosting`.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_hosting(config: Config, hosting: Option<Box<dyn HostingService>>) -> Self {
        let cancel = CancellationToken::new();
        let deployer = match (&config.site_id, hosting) {
            (Some(site), Some(hosting)) => {
                let options = DeployOptions {
                    site: site.clone(),
                    serving_rules: config.serving_rules.clone(),
                    upload_concurrency: config.upload_concurrency,
                    packaging_policy: config.packaging_policy,
                };
                Some(Deployer::new(hosting, options).with_cancellation(cancel.clone()))
            }
            _ => None,
        };

        Self {
            config,
            deployer,
            cancel,
        }
    }

    pub fn new(config: Config) -> Result<Self> {
        let hosting: Option<Box<dyn HostingService>> = match &config.site_id {
            None => None,
            Some(_) if config.dry_run => {
                info!("DRY_RUN enabled - deploying to in-memory hosting service");
                Some(Box::new(MockHostingClient::new()))
            }
            Some(site) => {
                let token = config.access_token.clone().ok_or_else(|| {
                    Error::Config(
                        "HOSTING_ACCESS_TOKEN not set (required when SITE_ID is set)".to_string(),
                    )
                })?;
                info!("Deploying to site {} via {}", site, config.api_url);
                Some(Box::new(
                    HostingClient::new(token).with_base_url(config.api_url.clone()),
                ))
            }
        };

        Ok(Self::with_hosting(config, hosting))
    }

    /// Token that aborts an in-progress deployment when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, source: &Path, dst: Option<&Path>) -> Result<Option<DeployReport>> {
        if dst.is_none() && self.deployer.is_none() {
            return Err(Error::Config("no output (dst|site) given".to_string()));
        }

        let artifacts = source_for(source, self.config.base_url.clone())?.collect()?;

        if let Some(dst) = dst {
            write_artifacts(dst, &artifacts)?;
        }

        let Some(deployer) = &self.deployer else {
            return Ok(None);
        };

        let _deadline = self.config.deploy_timeout.map(|timeout| {
            let cancel = self.cancel.clone();
            DeadlineGuard(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("Deployment deadline of {:?} reached, cancelling", timeout);
                cancel.cancel();
            }))
        });

        let report = deployer.deploy(artifacts).await?;
        if !report.skipped.is_empty() {
            warn!(
                "{} files were not deployed: {}",
                report.skipped.len(),
                report.skipped.join(", ")
            );
        }
        Ok(Some(report))
    }
}

/// Stops the deadline timer once the deployment finishes.
struct DeadlineGuard(tokio::task::JoinHandle<()>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
