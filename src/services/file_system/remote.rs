use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use log::{debug, error};
use tokio::runtime::Runtime;
use crate::errors::MichiError::{InvalidArgumentError, PatternError};
use crate::errors::MichiResult;
use crate::services::file_system::glob::{compile, escape_literal, shell_pattern};
use crate::services::file_system::handle::{FileHandle, RemoteStream};
use crate::services::file_system::options::FileOptions;
use crate::services::file_system::PathOps;
use crate::services::ObjectStore;
use crate::types::{FileStatistics, GlobMatches, GlobOptions, ListEntry};
use crate::utils::mode::OpenMode;
use crate::utils::parser::ObjectLocation;

/// Path inside a remote object store. Every operation blocks on the store client.
#[derive(Clone)]
pub struct RemoteObjectPath {
    raw: String,
    location: ObjectLocation,
    store: Arc<dyn ObjectStore>,
    runtime: Arc<Runtime>,
    buffer_size: usize,
}

impl RemoteObjectPath {
    pub(crate) fn new(
        raw: &str,
        location: ObjectLocation,
        store: Arc<dyn ObjectStore>,
        runtime: Arc<Runtime>,
        buffer_size: usize,
    ) -> Self {
        Self {
            raw: raw.to_string(),
            location,
            store,
            runtime,
            buffer_size,
        }
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }
}

impl Debug for RemoteObjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObjectPath")
            .field("raw", &self.raw)
            .field("location", &self.location)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl PathOps for RemoteObjectPath {
    fn as_str(&self) -> &str {
        &self.raw
    }

    fn exists(&self) -> MichiResult<bool> {
        self.runtime.block_on(self.store.exists(&self.location))
    }

    fn open(&self, mode: &OpenMode, options: &FileOptions) -> MichiResult<FileHandle> {
        let newline = options.text_settings(mode)?;
        let capacity = match options.buffering {
            Some(0) => {
                error!("Unbuffered remote open was requested for {}", self.raw);
                return Err(InvalidArgumentError(format!("{} cannot be opened unbuffered", self.raw)));
            }
            Some(size) => size,
            None => self.buffer_size,
        };
        if !options.closefd || options.opener.is_some() {
            debug!("closefd and opener are ignored for the remote path {}", self.raw);
        }

        let stream = RemoteStream::open(self.location.clone(), self.store.clone(), self.runtime.clone(), mode, capacity)?;
        debug!("Opened remote object {} with mode {}", self.raw, mode);
        Ok(FileHandle::remote(&self.raw, mode.clone(), newline, stream))
    }

    fn is_dir(&self) -> MichiResult<bool> {
        self.runtime.block_on(self.store.is_dir(&self.location))
    }

    fn list_entries(&self) -> MichiResult<Vec<ListEntry>> {
        self.runtime.block_on(self.store.list(&self.location))
    }

    fn stat(&self) -> MichiResult<FileStatistics> {
        self.runtime.block_on(self.store.stat(&self.location))
    }

    fn size(&self) -> MichiResult<u64> {
        Ok(self.stat()?.size)
    }

    /// The path is the directory to search, `sub_pattern` is matched below it.
    fn glob(&self, sub_pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches> {
        let after_prefix = self.location.scheme().prefix().and_then(|prefix| self.raw.strip_prefix(prefix));
        if !after_prefix.is_some_and(|rest| rest.contains('/')) {
            error!("Glob base {} ends inside the namespace", self.raw);
            return Err(PatternError(format!("the namespace of {}{} must be literal", self.raw, sub_pattern)));
        }

        let prefix = self.location.dir_prefix();
        let matcher = compile(&format!("{}{}", escape_literal(&prefix), shell_pattern(sub_pattern)))?;
        let keys = self.runtime.block_on(self.store.list_recursive(&self.location.with_key(&prefix)))?;

        let matches = with_directories(&prefix, keys)
            .into_iter()
            .filter(|key| matcher.is_match(key))
            .map(|key| self.location.with_key(&key))
            .collect::<Vec<_>>();
        debug!("Remote glob {}{} matched {} objects", self.raw, sub_pattern, matches.len());

        if options.string_cast {
            Ok(GlobMatches::Strings(matches.iter().map(ToString::to_string).collect()))
        } else {
            Ok(GlobMatches::Objects(matches))
        }
    }
}

/// Object keys below `prefix` plus every directory they imply, `a/b/c.txt` adds `a` and `a/b`.
fn with_directories(prefix: &str, keys: Vec<String>) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        for (index, _) in rest.match_indices('/').filter(|(index, _)| *index > 0) {
            paths.insert(format!("{}{}", prefix, &rest[..index]));
        }
        paths.insert(key);
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use crate::services::memory::MemoryStore;
    use crate::utils::parser::{parse_object_location, Scheme};

    fn remote(store: &Arc<MemoryStore>, path: &str) -> RemoteObjectPath {
        let runtime = Arc::new(tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap());
        RemoteObjectPath::new(path, parse_object_location(path).unwrap(), store.clone(), runtime, 8192)
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(Scheme::Gs));
        store.insert("gs://bucket/prefix/a.txt", b"a").unwrap();
        store.insert("gs://bucket/prefix/b.txt", b"b").unwrap();
        store.insert("gs://bucket/prefix/c.log", b"c").unwrap();
        store.insert("gs://bucket/prefix/sub/d.txt", b"d").unwrap();
        store
    }

    #[test]
    fn test_directory_operations() {
        let store = store();
        let prefix = remote(&store, "gs://bucket/prefix");
        assert!(prefix.exists().unwrap());
        assert!(prefix.is_dir().unwrap());
        assert_eq!(prefix.list_dir().unwrap(), vec!["a.txt", "b.txt", "c.log", "sub"]);
        assert!(prefix.list_entries().unwrap().iter().all(|entry| entry.is_dir == (entry.name == "sub")));

        let object = remote(&store, "gs://bucket/prefix/a.txt");
        assert!(!object.is_dir().unwrap());
        assert_eq!(object.size().unwrap(), 1);
        assert!(remote(&store, "gs://bucket/none").list_dir().unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_round_trip() {
        let store = store();
        let path = remote(&store, "gs://bucket/new.bin");

        let mut handle = path.open(&OpenMode::parse("wb").unwrap(), &FileOptions::new()).unwrap();
        handle.write_all(&[9; 100]).unwrap();
        handle.close().unwrap();
        assert_eq!(path.size().unwrap(), 100);

        let mut handle = path.open(&OpenMode::parse("rb").unwrap(), &FileOptions::new().buffering(16)).unwrap();
        let mut content = Vec::new();
        handle.read_to_end(&mut content).unwrap();
        assert_eq!(content, vec![9; 100]);

        let error = path.open(&OpenMode::parse("rb").unwrap(), &FileOptions::new().buffering(0)).err().unwrap();
        assert!(matches!(error, InvalidArgumentError(_)));
    }

    #[test]
    fn test_glob() {
        let store = store();
        let base = remote(&store, "gs://bucket/prefix/");

        let GlobMatches::Strings(mut strings) = base.glob("*.txt", GlobOptions::default()).unwrap() else {
            panic!("expected strings");
        };
        strings.sort();
        assert_eq!(strings, vec!["gs://bucket/prefix/a.txt", "gs://bucket/prefix/b.txt"]);

        let GlobMatches::Objects(objects) = base.glob("*.txt", GlobOptions { string_cast: false }).unwrap() else {
            panic!("expected objects");
        };
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|object| object.namespace() == "bucket"));

        assert_eq!(base.glob("*/*.txt", GlobOptions::default()).unwrap().into_strings(), vec!["gs://bucket/prefix/sub/d.txt"]);
        assert_eq!(base.glob("s*", GlobOptions::default()).unwrap().into_strings(), vec!["gs://bucket/prefix/sub"]);
        assert!(remote(&store, "gs://bucket/other/").glob("*", GlobOptions::default()).unwrap().is_empty());
        assert!(matches!(remote(&store, "gs://bucket").glob("*.txt", GlobOptions::default()), Err(PatternError(_))));
    }

    #[test]
    fn test_with_directories() {
        let keys = vec!["data/a/b/c.txt".to_string(), "data/a/d.txt".to_string(), "data/e.txt".to_string()];
        let paths = with_directories("data/", keys).into_iter().collect::<Vec<_>>();
        assert_eq!(paths, vec!["data/a", "data/a/b", "data/a/b/c.txt", "data/a/d.txt", "data/e.txt"]);
    }
}
