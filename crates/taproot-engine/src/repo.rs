//! Repository file access and ingestion filters
//!
//! Cloning and checkout belong to the surrounding platform; the engine only
//! needs a directory per feature. Files are filtered by extension, a
//! repo-configurable glob blocklist, and a per-file size cap before they
//! reach the analyzer.

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use taproot_analyzer::LanguageKind;

/// Files at or above this size are never indexed.
pub const MAX_FILE_BYTES: usize = 1_000_000;

/// Where a feature's working tree comes from.
#[async_trait::async_trait]
pub trait RepoProvider: Send + Sync {
    async fn fetch(&self, feature_id: i64) -> Result<PathBuf>;
}

/// Features laid out as `<root>/<feature_id>` on local disk.
pub struct LocalRepoProvider {
    root: PathBuf,
}

impl LocalRepoProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalRepoProvider { root: root.into() }
    }
}

#[async_trait::async_trait]
impl RepoProvider for LocalRepoProvider {
    async fn fetch(&self, feature_id: i64) -> Result<PathBuf> {
        let path = self.root.join(feature_id.to_string());
        if !path.is_dir() {
            bail!("no repository for feature {} at {}", feature_id, path.display());
        }
        Ok(path)
    }
}

/// Repo-local configuration, read from `taproot.toml` when present.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RepoToml {
    #[serde(default)]
    pub chat: ChatToml,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatToml {
    #[serde(default = "default_block_globs")]
    pub block_globs: Vec<String>,
}

impl Default for ChatToml {
    fn default() -> Self {
        ChatToml {
            block_globs: default_block_globs(),
        }
    }
}

pub fn default_block_globs() -> Vec<String> {
    [
        "**/.*/**",
        "venv/**",
        "**/__pycache__/**",
        "*.pyc",
        "**/node_modules/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        ".git/*",
        ".git/**/*",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Read every recognized source file under `repo`, keyed by repo-relative
/// path. Unknown extensions, non-UTF-8 content, and anything under `.git/`
/// are skipped.
pub fn read_repo_files(repo: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let walker = ignore::WalkBuilder::new(repo)
        .standard_filters(false)
        .hidden(false)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(repo)
            .context("walk produced a path outside the repo")?
            .to_string_lossy()
            .replace('\\', "/");
        if relative.starts_with(".git/") {
            continue;
        }
        if LanguageKind::from_file_name(&relative).is_none() {
            continue;
        }
        match std::fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(contents) => {
                    files.insert(relative, contents);
                }
                Err(_) => {
                    tracing::info!("decode error on {}", relative);
                }
            },
            Err(e) => {
                tracing::warn!("cannot read {}: {}", relative, e);
            }
        }
    }

    Ok(files)
}

/// Block globs for a file set: `taproot.toml` when the repo carries one,
/// defaults otherwise.
pub fn block_globs_for(files: &BTreeMap<String, String>) -> Vec<String> {
    match files.get("taproot.toml") {
        Some(raw) => match toml::from_str::<RepoToml>(raw) {
            Ok(config) => config.chat.block_globs,
            Err(e) => {
                tracing::warn!("invalid taproot.toml: {}", e);
                default_block_globs()
            }
        },
        None => default_block_globs(),
    }
}

pub fn build_blockset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).with_context(|| format!("bad glob {glob:?}"))?);
    }
    builder.build().context("building glob set")
}

/// Drop blocked and oversized files before analysis.
pub fn filter_files(
    files: BTreeMap<String, String>,
    blockset: &GlobSet,
) -> BTreeMap<String, String> {
    files
        .into_iter()
        .filter(|(name, contents)| !blockset.is_match(name) && contents.len() < MAX_FILE_BYTES)
        .collect()
}
