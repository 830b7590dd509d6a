use async_trait::async_trait;
use crate::errors::MichiResult;
use crate::types::{FileStatistics, ListEntry};
use crate::utils::parser::{ObjectLocation, Scheme};

pub mod file_system;
pub mod google_cloud_storage;
pub mod memory;
pub mod webhdfs;

/// Remote object store client behind a remote scheme.
///
/// Object stores have no real directories: a location "is a directory" when objects
/// live under `key/`, each client applies its own convention for that.
/// Authentication, retries and network error classification are the client's business,
/// callers get its errors unchanged.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Scheme this store serves.
    fn scheme(&self) -> Scheme;

    /// True for an object or a directory.
    async fn exists(&self, location: &ObjectLocation) -> MichiResult<bool>;

    async fn is_dir(&self, location: &ObjectLocation) -> MichiResult<bool>;

    /// Immediate children of a directory with bare names.
    /// A missing directory is `NotFoundError`, never an empty list.
    async fn list(&self, location: &ObjectLocation) -> MichiResult<Vec<ListEntry>>;

    /// Every object key that starts with `location.key()`, at any depth.
    async fn list_recursive(&self, location: &ObjectLocation) -> MichiResult<Vec<String>>;

    async fn stat(&self, location: &ObjectLocation) -> MichiResult<FileStatistics>;

    /// Whole object content.
    async fn get(&self, location: &ObjectLocation) -> MichiResult<Vec<u8>>;

    /// Create or replace the object.
    async fn put(&self, location: &ObjectLocation, data: Vec<u8>) -> MichiResult<()>;
}

/// Bare child entry of `key` below `prefix`. Keys in deeper levels collapse into their
/// first directory, the prefix marker object itself yields nothing.
pub(crate) fn child_entry(prefix: &str, key: &str) -> Option<ListEntry> {
    let rest = key.strip_prefix(prefix)?;
    match rest.split_once('/') {
        Some(("", _)) => None,
        Some((dir, _)) => Some(ListEntry::dir(dir)),
        None if rest.is_empty() => None,
        None => Some(ListEntry::file(rest)),
    }
}
