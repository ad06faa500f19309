//! Vault directory helpers

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("vault root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Directories inside a vault whose files are never counted
const IGNORED_DIRS: &[&str] = &[".obsidian", ".trash", ".git"];

/// A markdown vault on disk
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    name: String,
}

impl Vault {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(VaultError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string());
        Ok(Self { root, name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vault-relative path with `/` separators, or `None` outside the vault
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    /// Whether changes to this file count towards the day total
    pub fn is_tracked(&self, path: &Path) -> bool {
        let is_markdown = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !is_markdown {
            return false;
        }

        match path.strip_prefix(&self.root) {
            Ok(rel) => !rel.components().any(|c| {
                matches!(c, Component::Normal(part) if IGNORED_DIRS.iter().any(|d| part == *d))
            }),
            Err(_) => false,
        }
    }

    /// Ids of the community plugins enabled in this vault
    pub fn enabled_plugins(&self) -> Result<Vec<String>> {
        let path = self.root.join(".obsidian").join("community-plugins.json");
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
