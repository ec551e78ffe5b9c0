use super::HostingService;
use crate::models::{
    CreateVersionRequest, DigestIndex, PatchVersionRequest, PopulateFilesRequest,
    PopulateFilesResponse, Release, ServingConfig, Version, VersionStatus,
};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

const DEFAULT_BASE_URL: &str = "https://firebasehosting.googleapis.com";

/// REST client for the hosting API.
pub struct HostingClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl HostingClient {
    pub fn new(access_token: String) -> Self {
        Self::new_with_client(access_token, Client::new())
    }

    pub fn new_with_client(access_token: String, client: Client) -> Self {
        Self {
            client,
            access_token,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/v1beta1/{}", self.base_url, resource)
    }

    async fn send_json<Resp: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Resp> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to hosting API: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("Hosting API error (status {}): {}", status, error_text);
            return Err(Error::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse hosting API response: {}\nBody: {}", e, body);
            Error::Serialization(e)
        })
    }
}

#[async_trait]
impl HostingService for HostingClient {
    async fn create_version(&self, site: &str, config: &ServingConfig) -> Result<Version> {
        let url = self.api_url(&format!("sites/{}/versions", site));
        self.send_json(
            self.client
                .post(&url)
                .json(&CreateVersionRequest { config }),
        )
        .await
    }

    async fn populate_files(
        &self,
        version: &str,
        files: &DigestIndex,
    ) -> Result<PopulateFilesResponse> {
        let url = self.api_url(&format!("{}:populateFiles", version));
        self.send_json(self.client.post(&url).json(&PopulateFilesRequest { files }))
            .await
    }

    async fn upload_blob(&self, upload_url: &str, digest: &str, data: &[u8]) -> Result<()> {
        let url = format!("{}/{}", upload_url.trim_end_matches('/'), digest);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await?;

        let status = response.status();
        // Drain so the connection can be reused.
        let _ = response.bytes().await;

        if status != StatusCode::OK {
            return Err(Error::UploadRejected {
                digest: digest.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn patch_version_status(&self, version: &str, status: VersionStatus) -> Result<Version> {
        let url = self.api_url(version);
        self.send_json(
            self.client
                .patch(&url)
                .query(&[("updateMask", "status")])
                .json(&PatchVersionRequest { status }),
        )
        .await
    }

    async fn create_release(&self, site: &str, version: &str) -> Result<Release> {
        let url = self.api_url(&format!("sites/{}/releases", site));
        self.send_json(
            self.client
                .post(&url)
                .query(&[("versionName", version)])
                .json(&serde_json::json!({})),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServingRules;
    use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HostingClient {
        HostingClient::new("test-token".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_create_version_sends_serving_config() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta1/sites/blog/versions"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "config": { "cleanUrls": true, "trailingSlashBehavior": "ADD" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "sites/blog/versions/v1",
                "status": "CREATED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let version = client_for(&server)
            .create_version("blog", &ServingConfig::from_rules(&ServingRules::default()))
            .await
            .unwrap();

        assert_eq!(version.name, "sites/blog/versions/v1");
        assert_eq!(version.status, Some(VersionStatus::Created));
    }

    #[tokio::test]
    async fn test_populate_files_returns_required_hashes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta1/sites/blog/versions/v1:populateFiles"))
            .and(body_json(serde_json::json!({
                "files": { "/index.html": "aaa", "/about.html": "bbb" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "uploadRequiredHashes": ["bbb"],
                "uploadUrl": "https://upload.example.com/upload/sites/blog/versions/v1/files"
            })))
            .mount(&server)
            .await;

        let mut files = DigestIndex::new();
        files.insert("/index.html".to_string(), "aaa".to_string());
        files.insert("/about.html".to_string(), "bbb".to_string());

        let response = client_for(&server)
            .populate_files("sites/blog/versions/v1", &files)
            .await
            .unwrap();

        assert_eq!(response.upload_required_hashes, vec!["bbb".to_string()]);
        assert!(response.upload_url.ends_with("/files"));
    }

    #[tokio::test]
    async fn test_populate_files_nothing_required() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta1/sites/blog/versions/v1:populateFiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .populate_files("sites/blog/versions/v1", &DigestIndex::new())
            .await
            .unwrap();
        assert!(response.upload_required_hashes.is_empty());
    }

    #[tokio::test]
    async fn test_upload_blob_posts_octet_stream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/files/abc123"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(vec![1u8, 2, 3]))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let upload_url = format!("{}/upload/files", server.uri());
        client_for(&server)
            .upload_blob(&upload_url, "abc123", &[1, 2, 3])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_blob_rejects_non_200() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/files/abc123"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created?"))
            .mount(&server)
            .await;

        let upload_url = format!("{}/upload/files", server.uri());
        let err = client_for(&server)
            .upload_blob(&upload_url, "abc123", &[1, 2, 3])
            .await
            .unwrap_err();

        match err {
            Error::UploadRejected { digest, status } => {
                assert_eq!(digest, "abc123");
                assert_eq!(status, 201);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_patch_version_status() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1beta1/sites/blog/versions/v1"))
            .and(query_param("updateMask", "status"))
            .and(body_json(serde_json::json!({ "status": "FINALIZED" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "sites/blog/versions/v1",
                "status": "FINALIZED"
            })))
            .mount(&server)
            .await;

        let version = client_for(&server)
            .patch_version_status("sites/blog/versions/v1", VersionStatus::Finalized)
            .await
            .unwrap();
        assert_eq!(version.status, Some(VersionStatus::Finalized));
    }

    #[tokio::test]
    async fn test_create_release_passes_version_name() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta1/sites/blog/releases"))
            .and(query_param("versionName", "sites/blog/versions/v1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "sites/blog/releases/r1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let release = client_for(&server)
            .create_release("blog", "sites/blog/versions/v1")
            .await
            .unwrap();
        assert_eq!(release.name, "sites/blog/releases/r1");
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta1/sites/blog/versions"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_version("blog", &ServingConfig::from_rules(&ServingRules::default()))
            .await
            .unwrap_err();

        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "permission denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
