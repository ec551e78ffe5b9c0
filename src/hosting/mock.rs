use super::HostingService;
use crate::models::{
    DigestIndex, PopulateFilesResponse, Release, ServingConfig, Version, VersionStatus,
};
use crate::{Error, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const UPLOAD_URL_PREFIX: &str = "mock://upload/";

/// One recorded call against the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostingCall {
    CreateVersion { site: String },
    PopulateFiles { version: String, files: usize },
    UploadBlob { digest: String },
    PatchVersionStatus { version: String, status: VersionStatus },
    CreateRelease { site: String, version: String },
}

#[derive(Debug, Clone)]
struct MockVersion {
    site: String,
    status: VersionStatus,
    config: ServingConfig,
    files: DigestIndex,
    outstanding: HashSet<String>,
}

#[derive(Default)]
struct MockState {
    blobs: HashMap<String, Vec<u8>>,
    versions: HashMap<String, MockVersion>,
    live: HashMap<String, String>,
    calls: Vec<HostingCall>,
    next_version: usize,
    in_flight: usize,
    max_in_flight: usize,
    failing_uploads: HashSet<String>,
    finalize_status: Option<VersionStatus>,
    fail_create_version: bool,
    fail_populate: bool,
    fail_release: bool,
    upload_delay: Option<Duration>,
}

/// In-memory hosting service.
///
/// Dedups blobs by digest across versions and sites, enforces the version
/// lifecycle the way the real service does, and tracks which version is live
/// per site. Used for dry runs and tests.
#[derive(Clone, Default)]
pub struct MockHostingClient {
    state: Arc<Mutex<MockState>>,
}

impl MockHostingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the service already stores `content` from an earlier deployment.
    pub fn with_stored_blob(self, digest: String, compressed: Vec<u8>) -> Self {
        self.state.lock().unwrap().blobs.insert(digest, compressed);
        self
    }

    /// Answer uploads of `digest` with a 500.
    pub fn with_failing_upload(self, digest: String) -> Self {
        self.state.lock().unwrap().failing_uploads.insert(digest);
        self
    }

    /// Report `status` from the finalize patch instead of the real outcome.
    pub fn with_finalize_status(self, status: VersionStatus) -> Self {
        self.state.lock().unwrap().finalize_status = Some(status);
        self
    }

    pub fn with_failing_create_version(self) -> Self {
        self.state.lock().unwrap().fail_create_version = true;
        self
    }

    pub fn with_failing_populate(self) -> Self {
        self.state.lock().unwrap().fail_populate = true;
        self
    }

    pub fn with_failing_release(self) -> Self {
        self.state.lock().unwrap().fail_release = true;
        self
    }

    pub fn with_upload_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().upload_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<HostingCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostingCall::UploadBlob { .. }))
            .count()
    }

    pub fn max_concurrent_uploads(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Uploads started but not yet finished or dropped.
    pub fn uploads_in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }

    pub fn stored_digests(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().blobs.keys().cloned().collect()
    }

    pub fn version_status(&self, version: &str) -> Option<VersionStatus> {
        self.state
            .lock()
            .unwrap()
            .versions
            .get(version)
            .map(|v| v.status)
    }

    pub fn live_version(&self, site: &str) -> Option<String> {
        self.state.lock().unwrap().live.get(site).cloned()
    }

    pub fn live_config(&self, site: &str) -> Option<ServingConfig> {
        let state = self.state.lock().unwrap();
        let version = state.live.get(site)?;
        state.versions.get(version).map(|v| v.config.clone())
    }

    /// Uncompressed content the live version of `site` serves at `path`.
    pub fn served(&self, site: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let version = state.versions.get(state.live.get(site)?)?;
        let digest = version.files.get(path)?;
        let compressed = state.blobs.get(digest)?;

        let mut content = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut content)
            .ok()?;
        Some(content)
    }

    fn record(&self, call: HostingCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

/// Counts one upload as in flight until dropped, so uploads abandoned by
/// cancellation or fail-fast are released too.
struct InFlight<'a> {
    state: &'a Mutex<MockState>,
    delay: Option<Duration>,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a Mutex<MockState>) -> Self {
        let mut guard = state.lock().unwrap();
        guard.in_flight += 1;
        guard.max_in_flight = guard.max_in_flight.max(guard.in_flight);
        let delay = guard.upload_delay;
        drop(guard);
        Self { state, delay }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.in_flight -= 1;
        }
    }
}

#[async_trait]
impl HostingService for MockHostingClient {
    async fn create_version(&self, site: &str, config: &ServingConfig) -> Result<Version> {
        self.record(HostingCall::CreateVersion {
            site: site.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if state.fail_create_version {
            return Err(Error::Api {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        state.next_version += 1;
        let name = format!("sites/{}/versions/mock-{}", site, state.next_version);
        state.versions.insert(
            name.clone(),
            MockVersion {
                site: site.to_string(),
                status: VersionStatus::Created,
                config: config.clone(),
                files: DigestIndex::new(),
                outstanding: HashSet::new(),
            },
        );

        Ok(Version {
            name,
            status: Some(VersionStatus::Created),
            config: Some(config.clone()),
        })
    }

    async fn populate_files(
        &self,
        version: &str,
        files: &DigestIndex,
    ) -> Result<PopulateFilesResponse> {
        self.record(HostingCall::PopulateFiles {
            version: version.to_string(),
            files: files.len(),
        });

        let mut state = self.state.lock().unwrap();
        if state.fail_populate {
            return Err(Error::Api {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let required: BTreeSet<String> = files
            .values()
            .filter(|digest| !state.blobs.contains_key(*digest))
            .cloned()
            .collect();

        let entry = state.versions.get_mut(version).ok_or_else(|| Error::Api {
            status: 404,
            body: format!("version {} not found", version),
        })?;
        if entry.status != VersionStatus::Created {
            return Err(Error::Api {
                status: 400,
                body: format!("version {} is {}", version, entry.status),
            });
        }
        entry.files.extend(files.clone());
        entry.outstanding.extend(required.iter().cloned());

        Ok(PopulateFilesResponse {
            upload_required_hashes: required.into_iter().collect(),
            upload_url: format!("{}{}", UPLOAD_URL_PREFIX, version),
        })
    }

    async fn upload_blob(&self, upload_url: &str, digest: &str, data: &[u8]) -> Result<()> {
        self.record(HostingCall::UploadBlob {
            digest: digest.to_string(),
        });

        let guard = InFlight::enter(&self.state);
        if let Some(delay) = guard.delay {
            tokio::time::sleep(delay).await;
        }
        drop(guard);

        let mut state = self.state.lock().unwrap();

        if state.failing_uploads.contains(digest) {
            return Err(Error::UploadRejected {
                digest: digest.to_string(),
                status: 500,
            });
        }

        state.blobs.insert(digest.to_string(), data.to_vec());
        if let Some(version) = upload_url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .and_then(|name| state.versions.get_mut(name))
        {
            version.outstanding.remove(digest);
        }
        Ok(())
    }

    async fn patch_version_status(&self, version: &str, status: VersionStatus) -> Result<Version> {
        self.record(HostingCall::PatchVersionStatus {
            version: version.to_string(),
            status,
        });

        let mut state = self.state.lock().unwrap();
        let reported = state.finalize_status;
        let entry = state.versions.get_mut(version).ok_or_else(|| Error::Api {
            status: 404,
            body: format!("version {} not found", version),
        })?;

        if status == VersionStatus::Finalized && !entry.outstanding.is_empty() {
            return Err(Error::Api {
                status: 400,
                body: format!(
                    "version {} still has {} files awaiting upload",
                    version,
                    entry.outstanding.len()
                ),
            });
        }

        let effective = reported.unwrap_or(status);
        entry.status = effective;

        Ok(Version {
            name: version.to_string(),
            status: Some(effective),
            config: Some(entry.config.clone()),
        })
    }

    async fn create_release(&self, site: &str, version: &str) -> Result<Release> {
        self.record(HostingCall::CreateRelease {
            site: site.to_string(),
            version: version.to_string(),
        });

        let mut state = self.state.lock().unwrap();
        if state.fail_release {
            return Err(Error::Api {
                status: 500,
                body: "internal error".to_string(),
            });
        }

        match state.versions.get(version) {
            Some(v) if v.site == site && v.status == VersionStatus::Finalized => {}
            Some(v) => {
                return Err(Error::Api {
                    status: 400,
                    body: format!("version {} of {} is {}", version, v.site, v.status),
                })
            }
            None => {
                return Err(Error::Api {
                    status: 404,
                    body: format!("version {} not found", version),
                })
            }
        }

        state.live.insert(site.to_string(), version.to_string());
        Ok(Release {
            name: format!("sites/{}/releases/{}", site, state.calls.len()),
        })
    }
}
