use crate::hosting::HostingService;
use crate::models::VersionStatus;
use crate::{Error, Result};
use tracing::{error, info};

/// Move a fully uploaded version to FINALIZED.
///
/// Anything other than a reported FINALIZED status is an error, including a
/// successful response carrying a different status.
pub async fn finalize_version(hosting: &dyn HostingService, version: &str) -> Result<()> {
    let patched = hosting
        .patch_version_status(version, VersionStatus::Finalized)
        .await
        .map_err(|e| {
            error!("Failed to finalize version {}: {}", version, e);
            Error::Finalize {
                version: version.to_string(),
                source: Box::new(e),
            }
        })?;

    match patched.status {
        Some(VersionStatus::Finalized) => {
            info!("Finalized version {}", version);
            Ok(())
        }
        other => {
            let actual = other
                .map(|s| s.to_string())
                .unwrap_or_else(|| "<missing>".to_string());
            error!("Version {} not finalized, status is {}", version, actual);
            Err(Error::UnexpectedStatus {
                version: version.to_string(),
                expected: VersionStatus::Finalized.to_string(),
                actual,
            })
        }
    }
}
