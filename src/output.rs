//! Local output of collected artifacts.

use crate::models::ArtifactMap;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Write every artifact below `dst`, creating parent directories as needed.
///
/// Nothing is written when two keys name the same file.
pub fn write_artifacts(dst: &Path, artifacts: &ArtifactMap) -> Result<usize> {
    let mut seen = HashSet::new();
    for rel in artifacts.keys() {
        let rel = rel.trim_start_matches('/');
        if !seen.insert(rel) {
            return Err(Error::DuplicatePath {
                path: format!("/{}", rel),
            });
        }
    }

    for (rel, content) in artifacts {
        let target = dst.join(rel.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Writing {}", target.display());
        fs::write(&target, content)?;
    }

    info!("Wrote {} files to {}", artifacts.len(), dst.display());
    Ok(artifacts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_artifacts_creates_directories() {
        let dir = tempdir().unwrap();
        let mut artifacts = ArtifactMap::new();
        artifacts.insert("index.html".to_string(), b"home".to_vec());
        artifacts.insert("a/b/c.css".to_string(), b"css".to_vec());

        let written = write_artifacts(dir.path(), &artifacts).unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read(dir.path().join("index.html")).unwrap(), b"home");
        assert_eq!(fs::read(dir.path().join("a/b/c.css")).unwrap(), b"css");
    }

    #[test]
    fn test_write_artifacts_overwrites() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "old").unwrap();

        let mut artifacts = ArtifactMap::new();
        artifacts.insert("/index.html".to_string(), b"new".to_vec());
        tokio_test::assert_ok!(write_artifacts(dir.path(), &artifacts));

        assert_eq!(fs::read(dir.path().join("index.html")).unwrap(), b"new");
    }

    #[test]
    fn test_write_artifacts_rejects_colliding_keys() {
        let dir = tempdir().unwrap();
        let mut artifacts = ArtifactMap::new();
        artifacts.insert("a.html".to_string(), b"X".to_vec());
        artifacts.insert("/a.html".to_string(), b"Y".to_vec());

        let err = write_artifacts(dir.path(), &artifacts).unwrap_err();

        assert!(matches!(err, Error::DuplicatePath { ref path } if path == "/a.html"));
        assert!(!dir.path().join("a.html").exists());
    }
}
