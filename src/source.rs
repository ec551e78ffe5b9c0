//! Artifact collection
//!
//! A single file and a directory tree both produce the same `path -> content`
//! map; the rest of the pipeline does not care which one was used.

use crate::models::ArtifactMap;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SITEMAP_PATH: &str = "sitemap.txt";

pub trait ArtifactSource: Send + Sync {
    fn collect(&self) -> Result<ArtifactMap>;
}

/// One file, published under its own file name.
pub struct SingleFile {
    path: PathBuf,
}

impl SingleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactSource for SingleFile {
    fn collect(&self) -> Result<ArtifactMap> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::Config(format!("source {} has no file name", self.path.display()))
            })?;

        debug!("Collecting single file {}", self.path.display());
        let content = fs::read(&self.path)?;

        let mut artifacts = ArtifactMap::new();
        artifacts.insert(name, content);
        Ok(artifacts)
    }
}

/// Every regular file below `root`, keyed by its `/`-separated relative path.
///
/// With a base URL, a `sitemap.txt` listing the canonical URL of every HTML
/// page is added.
pub struct DirectoryTree {
    root: PathBuf,
    base_url: Option<String>,
}

impl DirectoryTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    fn sitemap(base_url: &str, artifacts: &ArtifactMap) -> Vec<u8> {
        let mut pages: Vec<String> = artifacts
            .keys()
            .filter(|p| p.ends_with(".html"))
            .map(|p| format!("{}{}\n", base_url, canonical_path(p)))
            .collect();
        pages.sort();
        pages.concat().into_bytes()
    }
}

impl ArtifactSource for DirectoryTree {
    fn collect(&self) -> Result<ArtifactMap> {
        let mut files = Vec::new();
        walk(&self.root, &mut files)?;

        let mut artifacts = ArtifactMap::with_capacity(files.len() + 1);
        for file in files {
            let rel = relative_key(&self.root, &file)?;
            debug!("Collecting {}", rel);
            artifacts.insert(rel, fs::read(&file)?);
        }

        if let Some(base_url) = &self.base_url {
            if artifacts.contains_key(SITEMAP_PATH) {
                warn!("Replacing existing {} with generated sitemap", SITEMAP_PATH);
            }
            let sitemap = Self::sitemap(base_url, &artifacts);
            artifacts.insert(SITEMAP_PATH.to_string(), sitemap);
        }

        info!(
            "Collected {} files from {}",
            artifacts.len(),
            self.root.display()
        );
        Ok(artifacts)
    }
}

/// Pick the source kind for `path` from what is on disk.
pub fn source_for(path: &Path, base_url: Option<String>) -> Result<Box<dyn ArtifactSource>> {
    let meta = fs::metadata(path)?;
    if meta.is_dir() {
        let tree = DirectoryTree::new(path);
        Ok(Box::new(match base_url {
            Some(url) => tree.with_base_url(url),
            None => tree,
        }))
    } else {
        Ok(Box::new(SingleFile::new(path)))
    }
}

/// URL path a page is served at once clean URLs and trailing slashes apply.
///
/// `index.html` -> `/`, `a/index.html` -> `/a/`, `a/b.html` -> `/a/b/`.
pub fn canonical_path(rel: &str) -> String {
    let trimmed = rel.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix(".html").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("index").unwrap_or(trimmed);

    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.ends_with('/') {
        format!("/{}", trimmed)
    } else {
        format!("/{}/", trimmed)
    }
}

fn walk(dir: &Path, acc: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, acc)?;
        } else if path.is_file() {
            acc.push(path);
        }
    }
    Ok(())
}

fn relative_key(root: &Path, file: &Path) -> Result<String> {
    let rel = file.strip_prefix(root).map_err(|_| {
        Error::Invariant(format!(
            "{} is not below {}",
            file.display(),
            root.display()
        ))
    })?;

    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
