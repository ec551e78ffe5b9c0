//! Error handling and custom error types
//!
//! Provides unified error handling across the deployment pipeline using thiserror.
//! Stage errors wrap their cause together with the site, version, digest or
//! path they were working on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Hosting API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to package {path}: {source}")]
    Packaging {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Two artifacts map to the same site path {path}")]
    DuplicatePath { path: String },

    #[error("Failed to create version for {site}: {source}")]
    CreateVersion {
        site: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to populate files for {version}: {source}")]
    PopulateFiles {
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to upload blob {digest}: {source}")]
    Upload {
        digest: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Upload of blob {digest} rejected with status {status}")]
    UploadRejected { digest: String, status: u16 },

    #[error("Hosting service requested unknown blob {digest}")]
    MissingBlob { digest: String },

    #[error("Failed to finalize {version}: {source}")]
    Finalize {
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Version {version} reported status {actual}, expected {expected}")]
    UnexpectedStatus {
        version: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to release {version} on {site}: {source}")]
    Release {
        site: String,
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
