use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs::Metadata;
use std::path::PathBuf;
use time::OffsetDateTime;
use crate::utils::parser::ObjectLocation;

pub mod google_cloud_storage;
pub mod webhdfs;

/// Result of `stat` for both local files and remote objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatistics {
    pub size: u64,
    pub modified: Option<OffsetDateTime>,
    pub is_dir: bool,
    /// Backend-defined extras (content type, generation, owner, permission, ...).
    pub metadata: BTreeMap<String, String>,
}

impl FileStatistics {
    pub fn file(size: u64) -> Self {
        Self {
            size,
            modified: None,
            is_dir: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn dir() -> Self {
        Self {
            is_dir: true,
            ..Self::file(0)
        }
    }

    pub fn with_modified(mut self, modified: Option<OffsetDateTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

impl From<&Metadata> for FileStatistics {
    fn from(value: &Metadata) -> Self {
        let stat = if value.is_dir() {
            Self::dir()
        } else {
            Self::file(value.len())
        };
        stat.with_modified(value.modified().ok().map(OffsetDateTime::from))
            .with_metadata("readonly", value.permissions().readonly())
    }
}

impl Display for FileStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "size: {}, is_dir: {}, modified: {:?}", self.size, self.is_dir, self.modified)?;
        for (key, value) in &self.metadata {
            write!(f, ", {}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Immediate child reported by an object store listing. `name` is the bare name,
/// never the full key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
}

impl ListEntry {
    pub fn file(name: &str) -> Self {
        Self { name: name.to_string(), is_dir: false }
    }

    pub fn dir(name: &str) -> Self {
        Self { name: name.to_string(), is_dir: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobOptions {
    /// Return plain strings instead of the backend-native path values.
    pub string_cast: bool,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self { string_cast: true }
    }
}

/// Paths matched by a glob, no ordering is promised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobMatches {
    Strings(Vec<String>),
    LocalPaths(Vec<PathBuf>),
    Objects(Vec<ObjectLocation>),
}

impl GlobMatches {
    pub fn len(&self) -> usize {
        match self {
            Self::Strings(paths) => paths.len(),
            Self::LocalPaths(paths) => paths.len(),
            Self::Objects(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every match as a string regardless of the variant.
    pub fn into_strings(self) -> Vec<String> {
        match self {
            Self::Strings(paths) => paths,
            Self::LocalPaths(paths) => paths.iter().map(|p| p.display().to_string()).collect(),
            Self::Objects(paths) => paths.iter().map(ToString::to_string).collect(),
        }
    }
}
