//! Content packaging
//!
//! Streams each artifact through gzip while hashing the uncompressed bytes,
//! producing the digest index submitted to the hosting service and the
//! compressed blobs uploaded for any digest it is missing.

use crate::models::{Artifact, DigestIndex, PackagedBlob};
use crate::{Error, Result};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// What to do when one artifact cannot be packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PackagingPolicy {
    /// Abort packaging on the first failure.
    #[default]
    FailFast,
    /// Log the failure, leave the artifact out and keep going.
    SkipAndContinue,
}

impl FromStr for PackagingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" | "fail-fast" => Ok(PackagingPolicy::FailFast),
            "skip" | "skip-and-continue" => Ok(PackagingPolicy::SkipAndContinue),
            other => Err(Error::Config(format!(
                "unknown packaging policy '{}', expected 'fail' or 'skip'",
                other
            ))),
        }
    }
}

/// Everything the remote stages need from packaging.
#[derive(Debug, Default)]
pub struct PackagedSet {
    pub index: DigestIndex,
    pub blobs: HashMap<String, PackagedBlob>,
    /// Site paths left out under [`PackagingPolicy::SkipAndContinue`].
    pub skipped: Vec<String>,
}

impl PackagedSet {
    pub fn blob(&self, digest: &str) -> Option<&PackagedBlob> {
        self.blobs.get(digest)
    }
}

/// Forwards writes to the compressor and feeds the same bytes to the hasher.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Package one source stream.
///
/// The gzip header carries no name or mtime, so equal content always yields
/// equal compressed bytes.
pub fn package_reader<R: Read>(mut reader: R) -> io::Result<PackagedBlob> {
    let encoder: GzEncoder<Vec<u8>> = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());
    let mut writer = HashingWriter {
        inner: encoder,
        hasher: Sha256::new(),
    };

    io::copy(&mut reader, &mut writer)?;

    let HashingWriter { inner, hasher } = writer;
    let compressed = inner.finish()?;

    Ok(PackagedBlob {
        digest: hex::encode(hasher.finalize()),
        compressed,
    })
}

pub fn package_artifact(artifact: &Artifact) -> Result<PackagedBlob> {
    package_reader(artifact.content.as_slice()).map_err(|source| Error::Packaging {
        path: artifact.site_path(),
        source,
    })
}

/// Package every source, keyed by site path.
///
/// Two paths with the same content share one blob. Paths that differ only by
/// a leading `/` name the same site path and are rejected, whatever order
/// they arrive in.
pub fn package_all<I, P, R>(sources: I, policy: PackagingPolicy) -> Result<PackagedSet>
where
    I: IntoIterator<Item = (P, R)>,
    P: AsRef<str>,
    R: Read,
{
    let mut set = PackagedSet::default();
    let mut seen = HashSet::new();

    for (path, reader) in sources {
        let site_path = format!("/{}", path.as_ref().trim_start_matches('/'));
        if !seen.insert(site_path.clone()) {
            error!("More than one artifact maps to {}", site_path);
            return Err(Error::DuplicatePath { path: site_path });
        }

        let blob = match package_reader(reader) {
            Ok(blob) => blob,
            Err(source) => match policy {
                PackagingPolicy::FailFast => {
                    error!("Failed to package {}: {}", site_path, source);
                    return Err(Error::Packaging {
                        path: site_path,
                        source,
                    });
                }
                PackagingPolicy::SkipAndContinue => {
                    warn!("Skipping {} after packaging failure: {}", site_path, source);
                    set.skipped.push(site_path);
                    continue;
                }
            },
        };

        debug!(
            "Packaged {} ({} bytes compressed, digest {})",
            site_path,
            blob.compressed.len(),
            blob.digest
        );
        set.index.insert(site_path, blob.digest.clone());
        set.blobs.entry(blob.digest.clone()).or_insert(blob);
    }

    set.skipped.sort();
    info!(
        "Packaged {} files into {} distinct blobs ({} skipped)",
        set.index.len(),
        set.blobs.len(),
        set.skipped.len()
    );
    Ok(set)
}

pub fn package_artifacts(artifacts: &[Artifact], policy: PackagingPolicy) -> Result<PackagedSet> {
    package_all(
        artifacts
            .iter()
            .map(|a| (a.path.as_str(), a.content.as_slice())),
        policy,
    )
}
