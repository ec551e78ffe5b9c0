//! Incremental deployer for statically hosted sites
//!
//! Collects a generated site into a `path -> content` map, packages each file
//! as a gzip blob keyed by the SHA-256 of its content, uploads only the blobs
//! the hosting service does not already hold, and atomically releases the new
//! version.

pub mod app;
pub mod config;
pub mod deploy;
pub mod error;
pub mod hosting;
pub mod models;
pub mod output;
pub mod package;
pub mod source;

pub use error::{Error, Result};
