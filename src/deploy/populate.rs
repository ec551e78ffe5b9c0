use crate::hosting::HostingService;
use crate::models::DigestIndex;
use crate::{Error, Result};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Digests the hosting service still needs, and where to send them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredUploads {
    pub digests: Vec<String>,
    pub upload_url: String,
}

impl RequiredUploads {
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Submit the full digest index for `version` and collect the missing digests.
///
/// Each digest appears at most once in the result, and every returned digest
/// is one of the submitted ones.
pub async fn resolve_required(
    hosting: &dyn HostingService,
    version: &str,
    index: &DigestIndex,
) -> Result<RequiredUploads> {
    let wrap = |e: Error| Error::PopulateFiles {
        version: version.to_string(),
        source: Box::new(e),
    };

    let response = hosting.populate_files(version, index).await.map_err(|e| {
        error!("Failed to populate files for {}: {}", version, e);
        wrap(e)
    })?;

    let known: HashSet<&str> = index.values().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut digests = Vec::with_capacity(response.upload_required_hashes.len());

    for digest in response.upload_required_hashes {
        if !known.contains(digest.as_str()) {
            error!("Hosting service requested unknown digest {}", digest);
            return Err(wrap(Error::MissingBlob { digest }));
        }
        if seen.insert(digest.clone()) {
            digests.push(digest);
        } else {
            warn!("Hosting service requested digest {} more than once", digest);
        }
    }

    if !digests.is_empty() && response.upload_url.is_empty() {
        return Err(wrap(Error::Invariant(
            "uploads required but no upload URL returned".to_string(),
        )));
    }

    info!(
        "Version {} requires {} of {} files to be uploaded",
        version,
        digests.len(),
        index.len()
    );

    Ok(RequiredUploads {
        digests,
        upload_url: response.upload_url,
    })
}
