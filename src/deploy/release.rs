use crate::hosting::HostingService;
use crate::{Error, Result};
use tracing::{error, info};

/// Point the live alias of `site` at a finalized `version`.
///
/// A failure here leaves the version finalized but unreleased; releasing it
/// again later is safe.
pub async fn release_version(
    hosting: &dyn HostingService,
    site: &str,
    version: &str,
) -> Result<String> {
    let release = hosting.create_release(site, version).await.map_err(|e| {
        error!("Failed to release {} on site {}: {}", version, site, e);
        Error::Release {
            site: site.to_string(),
            version: version.to_string(),
            source: Box::new(e),
        }
    })?;

    info!("Released version {} on site {}", version, site);
    Ok(release.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::MockHostingClient;
    use crate::models::{DigestIndex, ServingConfig, ServingRules, VersionStatus};

    async fn finalized_version(hosting: &MockHostingClient) -> String {
        let version = hosting
            .create_version("blog", &ServingConfig::from_rules(&ServingRules::default()))
            .await
            .unwrap()
            .name;
        hosting
            .populate_files(&version, &DigestIndex::new())
            .await
            .unwrap();
        hosting
            .patch_version_status(&version, VersionStatus::Finalized)
            .await
            .unwrap();
        version
    }

    #[tokio::test]
    async fn test_release_switches_live_version() {
        let hosting = MockHostingClient::new();
        let version = finalized_version(&hosting).await;

        let release = release_version(&hosting, "blog", &version).await.unwrap();
        assert!(release.starts_with("sites/blog/releases/"));
        assert_eq!(hosting.live_version("blog"), Some(version));
    }

    #[tokio::test]
    async fn test_release_failure_keeps_previous_live_version() {
        let hosting = MockHostingClient::new();
        let first = finalized_version(&hosting).await;
        release_version(&hosting, "blog", &first).await.unwrap();

        let second = finalized_version(&hosting).await;
        let failing = hosting.clone().with_failing_release();
        let err = release_version(&failing, "blog", &second)
            .await
            .unwrap_err();

        match err {
            Error::Release { site, version, .. } => {
                assert_eq!(site, "blog");
                assert_eq!(version, second);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hosting.live_version("blog"), Some(first));
    }
}
