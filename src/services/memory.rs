//! In-memory object store.
//!
//! Keeps objects in a map keyed by namespace and key, with the same "directory is a
//! key prefix" convention as Google Cloud Storage. Useful as the fake backend in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use async_trait::async_trait;
use log::debug;
use time::OffsetDateTime;
use crate::errors::MichiError::{BackendError, NotFoundError};
use crate::errors::MichiResult;
use crate::services::{child_entry, ObjectStore};
use crate::types::{FileStatistics, ListEntry};
use crate::utils::parser::{parse_object_location, ObjectLocation, Scheme};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: OffsetDateTime,
}

type ObjectMap = BTreeMap<(String, String), StoredObject>;

pub struct MemoryStore {
    scheme: Scheme,
    objects: RwLock<ObjectMap>,
}

impl MemoryStore {
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Store `data` under a full remote path such as `gs://bucket/key`.
    pub fn insert(&self, path: &str, data: &[u8]) -> MichiResult<()> {
        let location = parse_object_location(path)?;
        self.insert_object(&location, data.to_vec())
    }

    /// Delete the object at a full remote path. Returns false when nothing was stored there.
    pub fn remove(&self, path: &str) -> MichiResult<bool> {
        let location = parse_object_location(path)?;
        let removed = self.write()?
            .remove(&(location.namespace().to_string(), location.object_key().to_string()))
            .is_some();
        debug!("Removed {}: {}", location, removed);
        Ok(removed)
    }

    /// Number of stored objects over all namespaces.
    pub fn len(&self) -> usize {
        self.read().map(|objects| objects.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_object(&self, location: &ObjectLocation, data: Vec<u8>) -> MichiResult<()> {
        if location.object_key().is_empty() {
            return Err(BackendError(format!("{} does not name an object", location)));
        }
        let object = StoredObject {
            data,
            modified: OffsetDateTime::now_utc(),
        };
        self.write()?.insert(
            (location.namespace().to_string(), location.object_key().to_string()),
            object);
        Ok(())
    }

    fn read(&self) -> MichiResult<RwLockReadGuard<'_, ObjectMap>> {
        self.objects.read().map_err(|_| BackendError("Lock poisoned".to_string()))
    }

    fn write(&self) -> MichiResult<RwLockWriteGuard<'_, ObjectMap>> {
        self.objects.write().map_err(|_| BackendError("Lock poisoned".to_string()))
    }

    fn keys_with_prefix<'a>(objects: &'a ObjectMap, namespace: &'a str, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        objects
            .keys()
            .filter(move |(ns, key)| ns == namespace && key.starts_with(prefix))
            .map(|(_, key)| key.as_str())
    }

    fn object<'a>(objects: &'a ObjectMap, location: &ObjectLocation) -> Option<&'a StoredObject> {
        objects.get(&(location.namespace().to_string(), location.object_key().to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn scheme(&self) -> Scheme {
        self.scheme
    }

    async fn exists(&self, location: &ObjectLocation) -> MichiResult<bool> {
        let found = Self::object(&*self.read()?, location).is_some();
        Ok(found || self.is_dir(location).await?)
    }

    async fn is_dir(&self, location: &ObjectLocation) -> MichiResult<bool> {
        let objects = self.read()?;
        let prefix = location.dir_prefix();
        let mut keys = Self::keys_with_prefix(&objects, location.namespace(), &prefix);
        Ok(keys.next().is_some())
    }

    async fn list(&self, location: &ObjectLocation) -> MichiResult<Vec<ListEntry>> {
        let objects = self.read()?;
        let prefix = location.dir_prefix();

        let mut has_marker = false;
        let mut entries = BTreeSet::new();
        for key in Self::keys_with_prefix(&objects, location.namespace(), &prefix) {
            match child_entry(&prefix, key) {
                Some(entry) => {
                    entries.insert(entry);
                }
                None => has_marker = true,
            }
        }

        if entries.is_empty() && !has_marker {
            return match Self::object(&objects, location) {
                Some(_) => Err(BackendError(format!("{} is not a directory", location))),
                None => Err(NotFoundError(location.to_string())),
            };
        }

        debug!("Listed {} entries in {}", entries.len(), location);
        Ok(entries.into_iter().collect())
    }

    async fn list_recursive(&self, location: &ObjectLocation) -> MichiResult<Vec<String>> {
        let objects = self.read()?;
        let keys = Self::keys_with_prefix(&objects, location.namespace(), location.key())
            .filter(|key| !key.ends_with('/'))
            .map(String::from)
            .collect();
        Ok(keys)
    }

    async fn stat(&self, location: &ObjectLocation) -> MichiResult<FileStatistics> {
        let found = Self::object(&*self.read()?, location)
            .map(|object| (object.data.len() as u64, object.modified));
        if let Some((size, modified)) = found {
            return Ok(FileStatistics::file(size).with_modified(Some(modified)));
        }
        if self.is_dir(location).await? {
            return Ok(FileStatistics::dir());
        }
        Err(NotFoundError(location.to_string()))
    }

    async fn get(&self, location: &ObjectLocation) -> MichiResult<Vec<u8>> {
        Self::object(&*self.read()?, location)
            .map(|object| object.data.clone())
            .ok_or_else(|| NotFoundError(location.to_string()))
    }

    async fn put(&self, location: &ObjectLocation, data: Vec<u8>) -> MichiResult<()> {
        debug!("Put {} bytes to {}", data.len(), location);
        self.insert_object(location, data)
    }
}
