use super::populate::RequiredUploads;
use crate::hosting::HostingService;
use crate::package::PackagedSet;
use crate::{Error, Result};
use futures::stream::{self, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upload every required blob with at most `concurrency` requests in flight.
///
/// The first failed upload aborts the stage and drops the remaining in-flight
/// and queued uploads. Cancelling `cancel` does the same and yields
/// [`Error::Cancelled`]. Returns the number of blobs uploaded.
pub async fn upload_required(
    hosting: &dyn HostingService,
    required: &RequiredUploads,
    packaged: &PackagedSet,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<usize> {
    // Resolve every blob up front so a bad digest never leaves a partial upload.
    let mut blobs = Vec::with_capacity(required.digests.len());
    for digest in &required.digests {
        let blob = packaged.blob(digest).ok_or_else(|| {
            error!("No packaged blob for required digest {}", digest);
            Error::MissingBlob {
                digest: digest.clone(),
            }
        })?;
        blobs.push(blob);
    }

    info!(
        "Uploading {} required blobs ({} packaged, concurrency {})",
        blobs.len(),
        packaged.blobs.len(),
        concurrency
    );

    let upload_url = required.upload_url.as_str();
    let uploads = stream::iter(blobs.into_iter().map(Ok::<_, Error>)).try_for_each_concurrent(
        concurrency.max(1),
        |blob| async move {
            debug!(
                "Uploading blob {} ({} bytes)",
                blob.digest,
                blob.compressed.len()
            );
            hosting
                .upload_blob(upload_url, &blob.digest, &blob.compressed)
                .await
                .map_err(|e| {
                    error!("Upload of blob {} failed: {}", blob.digest, e);
                    Error::Upload {
                        digest: blob.digest.clone(),
                        source: Box::new(e),
                    }
                })
        },
    );

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            error!("Upload stage cancelled");
            Err(Error::Cancelled)
        }
        result = uploads => {
            result?;
            info!("Uploaded {} blobs", required.digests.len());
            Ok(required.digests.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::{HostingCall, MockHostingClient};
    use crate::models::{Artifact, ServingConfig, ServingRules};
    use crate::package::{package_artifacts, PackagingPolicy};
    use std::time::Duration;

    fn packaged(count: usize) -> PackagedSet {
        let artifacts: Vec<Artifact> = (0..count)
            .map(|i| Artifact::new(format!("page-{i}.html"), format!("content {i}")))
            .collect();
        package_artifacts(&artifacts, PackagingPolicy::FailFast).unwrap()
    }

    async fn populated(hosting: &MockHostingClient, set: &PackagedSet) -> RequiredUploads {
        let version = hosting
            .create_version("blog", &ServingConfig::from_rules(&ServingRules::default()))
            .await
            .unwrap()
            .name;
        let response = hosting.populate_files(&version, &set.index).await.unwrap();
        RequiredUploads {
            digests: response.upload_required_hashes,
            upload_url: response.upload_url,
        }
    }

    #[tokio::test]
    async fn test_uploads_every_required_blob() {
        let hosting = MockHostingClient::new();
        let set = packaged(5);
        let required = populated(&hosting, &set).await;

        let uploaded = upload_required(&hosting, &required, &set, 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(uploaded, 5);
        assert_eq!(hosting.upload_count(), 5);
        let expected: std::collections::BTreeSet<String> = set.blobs.keys().cloned().collect();
        assert_eq!(hosting.stored_digests(), expected);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let hosting = MockHostingClient::new().with_upload_delay(Duration::from_millis(20));
        let set = packaged(12);
        let required = populated(&hosting, &set).await;

        upload_required(&hosting, &required, &set, 3, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(hosting.upload_count(), 12);
        assert!(hosting.max_concurrent_uploads() <= 3);
        assert!(hosting.max_concurrent_uploads() >= 2);
    }

    #[tokio::test]
    async fn test_sequential_when_concurrency_is_one() {
        let hosting = MockHostingClient::new().with_upload_delay(Duration::from_millis(5));
        let set = packaged(4);
        let required = populated(&hosting, &set).await;

        upload_required(&hosting, &required, &set, 1, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(hosting.max_concurrent_uploads(), 1);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_stage() {
        let set = packaged(3);
        let bad = set.index["/page-1.html"].clone();
        let hosting = MockHostingClient::new().with_failing_upload(bad.clone());
        let required = populated(&hosting, &set).await;

        let err = upload_required(&hosting, &required, &set, 1, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::Upload { digest, source } => {
                assert_eq!(digest, bad);
                assert!(matches!(*source, Error::UploadRejected { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!hosting.stored_digests().contains(&bad));
    }

    #[tokio::test]
    async fn test_missing_blob_detected_before_any_upload() {
        let hosting = MockHostingClient::new();
        let set = packaged(2);
        let mut required = populated(&hosting, &set).await;
        required.digests.push("not-packaged".to_string());

        let err = upload_required(&hosting, &required, &set, 4, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingBlob { ref digest } if digest == "not-packaged"));
        assert!(!hosting
            .calls()
            .iter()
            .any(|c| matches!(c, HostingCall::UploadBlob { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_stops_uploads() {
        let hosting = MockHostingClient::new().with_upload_delay(Duration::from_secs(30));
        let set = packaged(6);
        let required = populated(&hosting, &set).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = upload_required(&hosting, &required, &set, 2, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(hosting.stored_digests().is_empty());
        assert_eq!(hosting.max_concurrent_uploads(), 2);
        assert_eq!(hosting.uploads_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_nothing_required() {
        let hosting = MockHostingClient::new();
        let set = packaged(2);

        let uploaded = upload_required(
            &hosting,
            &RequiredUploads::default(),
            &set,
            4,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(uploaded, 0);
        assert_eq!(hosting.upload_count(), 0);
    }
}
