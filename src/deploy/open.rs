use crate::hosting::HostingService;
use crate::models::{ServingConfig, ServingRules};
use crate::{Error, Result};
use tracing::{error, info};

/// Create a new, not yet populated version of `site` carrying `rules`.
///
/// The version exists remotely from here on, even if later stages fail.
pub async fn open_version(
    hosting: &dyn HostingService,
    site: &str,
    rules: &ServingRules,
) -> Result<String> {
    let config = ServingConfig::from_rules(rules);

    let version = hosting
        .create_version(site, &config)
        .await
        .map_err(|e| {
            error!("Failed to create version for site {}: {}", site, e);
            Error::CreateVersion {
                site: site.to_string(),
                source: Box::new(e),
            }
        })?;

    if version.name.is_empty() {
        return Err(Error::CreateVersion {
            site: site.to_string(),
            source: Box::new(Error::Invariant(
                "hosting service returned a version without a name".to_string(),
            )),
        });
    }

    info!(
        "Created version {} for site {} ({} header rules, {} redirects)",
        version.name,
        site,
        config.headers.len(),
        config.redirects.len()
    );
    Ok(version.name)
}
