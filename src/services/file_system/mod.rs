mod glob;
mod handle;
mod local;
mod options;
mod remote;

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use log::{debug, error};
use tokio::runtime::Runtime;
use crate::config::MichiConfig;
use crate::errors::MichiError::BackendError;
use crate::errors::MichiResult;
use crate::services::google_cloud_storage::GcsStore;
use crate::services::webhdfs::WebHdfsStore;
use crate::services::ObjectStore;
use crate::types::{FileStatistics, GlobMatches, GlobOptions, ListEntry};
use crate::utils::mode::OpenMode;
use crate::utils::parser::{classify, parse_object_location, Scheme};

pub use handle::{FileHandle, DEFAULT_BUFFER_SIZE};
pub use local::LocalPath;
pub use options::{FileOptions, Opener};
pub use remote::RemoteObjectPath;

/// Operations every path kind supports.
pub trait PathOps {
    /// Path string as given by the caller.
    fn as_str(&self) -> &str;

    fn exists(&self) -> MichiResult<bool>;

    fn open(&self, mode: &OpenMode, options: &FileOptions) -> MichiResult<FileHandle>;

    fn is_dir(&self) -> MichiResult<bool>;

    /// Immediate children with their bare names.
    fn list_entries(&self) -> MichiResult<Vec<ListEntry>>;

    /// Names of the immediate children, without the parent path.
    fn list_dir(&self) -> MichiResult<Vec<String>> {
        Ok(self.list_entries()?.into_iter().map(|entry| entry.name).collect())
    }

    fn stat(&self) -> MichiResult<FileStatistics>;

    fn size(&self) -> MichiResult<u64>;

    /// Glob with this path as the part of the pattern before the first `*`.
    fn glob(&self, sub_pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches>;
}

/// Path classified once by its scheme.
#[derive(Debug, Clone)]
pub enum AnyPath {
    Local(LocalPath),
    Remote(RemoteObjectPath),
}

impl AnyPath {
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Local(_) => Scheme::Local,
            Self::Remote(path) => path.location().scheme(),
        }
    }

    fn inner(&self) -> &dyn PathOps {
        match self {
            Self::Local(path) => path,
            Self::Remote(path) => path,
        }
    }
}

impl PathOps for AnyPath {
    fn as_str(&self) -> &str {
        self.inner().as_str()
    }

    fn exists(&self) -> MichiResult<bool> {
        self.inner().exists()
    }

    fn open(&self, mode: &OpenMode, options: &FileOptions) -> MichiResult<FileHandle> {
        self.inner().open(mode, options)
    }

    fn is_dir(&self) -> MichiResult<bool> {
        self.inner().is_dir()
    }

    fn list_entries(&self) -> MichiResult<Vec<ListEntry>> {
        self.inner().list_entries()
    }

    fn stat(&self) -> MichiResult<FileStatistics> {
        self.inner().stat()
    }

    fn size(&self) -> MichiResult<u64> {
        self.inner().size()
    }

    fn glob(&self, sub_pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches> {
        self.inner().glob(sub_pattern, options)
    }
}

impl Display for AnyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "Local: {}", path.as_str()),
            Self::Remote(path) => write!(f, "{}: {}", path.location().scheme(), path.as_str()),
        }
    }
}

/// Entry point for file access on local and remote paths.
///
/// The API is blocking. Remote calls run on a runtime owned by this value, so it must
/// not be used from inside another tokio runtime (wrap it in `spawn_blocking`).
#[derive(Clone)]
pub struct FileAccess {
    stores: HashMap<Scheme, Arc<dyn ObjectStore>>,
    runtime: Arc<Runtime>,
    remote_buffer_size: usize,
}

impl FileAccess {
    /// Build the Google Cloud Storage and WebHDFS clients from `config`.
    pub fn new(config: &MichiConfig) -> MichiResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("michi-io")
            .enable_all()
            .build()
            .map_err(|e| {
                error!("Failed to start the I/O runtime: {:?}", e);
                BackendError(format!("Failed to start the I/O runtime: {}", e))
            })?;

        let access = Self {
            stores: HashMap::new(),
            runtime: Arc::new(runtime),
            remote_buffer_size: config.remote_buffer_size,
        };
        Ok(access
            .with_store(Arc::new(GcsStore::from_config(config)?))
            .with_store(Arc::new(WebHdfsStore::from_config(config)?)))
    }

    pub fn from_env() -> MichiResult<Self> {
        Self::new(&MichiConfig::from_env())
    }

    /// Serve the store's scheme with `store`, replacing the current client.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        debug!("Register the {} store", store.scheme());
        self.stores.insert(store.scheme(), store);
        self
    }

    /// Classify `path` and build the matching path value.
    pub fn path(&self, path: &str) -> MichiResult<AnyPath> {
        let scheme = classify(path);
        if !scheme.is_remote() {
            return Ok(AnyPath::Local(LocalPath::new(path)));
        }

        let store = self.stores.get(&scheme).ok_or_else(|| {
            error!("No store is registered for {}", scheme);
            BackendError(format!("No store for the scheme of {}", path))
        })?;
        let location = parse_object_location(path)?;
        Ok(AnyPath::Remote(RemoteObjectPath::new(
            path,
            location,
            store.clone(),
            self.runtime.clone(),
            self.remote_buffer_size,
        )))
    }

    pub fn path_exists(&self, path: &str) -> MichiResult<bool> {
        self.path(path)?.exists()
    }

    /// Open a file or an object. `mode` uses the `r w a x` / `+` / `b t` vocabulary.
    pub fn open_file(&self, path: &str, mode: &str, options: &FileOptions) -> MichiResult<FileHandle> {
        let mode = OpenMode::parse(mode)?;
        self.path(path)?.open(&mode, options)
    }

    /// Open `path`, run `f` with the handle and close it on every exit path.
    /// The error of `f` wins over the error of closing.
    pub fn with_file<T, F>(&self, path: &str, mode: &str, options: &FileOptions, f: F) -> MichiResult<T>
    where
        F: FnOnce(&mut FileHandle) -> MichiResult<T>,
    {
        let mut handle = self.open_file(path, mode, options)?;
        let result = f(&mut handle);
        let closed = handle.close();
        match (result, closed) {
            (Err(e), Err(close_error)) => {
                error!("Failed to close {} after an error: {}", path, close_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    pub fn is_directory(&self, path: &str) -> MichiResult<bool> {
        self.path(path)?.is_dir()
    }

    pub fn list_directory(&self, path: &str) -> MichiResult<Vec<String>> {
        self.path(path)?.list_dir()
    }

    /// Like [FileAccess::list_directory], telling directories apart from files.
    pub fn list_entries(&self, path: &str) -> MichiResult<Vec<ListEntry>> {
        self.path(path)?.list_entries()
    }

    pub fn stat(&self, path: &str) -> MichiResult<FileStatistics> {
        self.path(path)?.stat()
    }

    pub fn file_size(&self, path: &str) -> MichiResult<u64> {
        self.path(path)?.size()
    }

    /// Split `pattern` at its first `*`. The part before it decides the backend.
    pub fn glob(&self, pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches> {
        let (base, sub_pattern) = glob::split_pattern(pattern)?;
        debug!("Glob {} under {}", sub_pattern, base);
        self.path(base)?.glob(sub_pattern, options)
    }
}

impl Debug for FileAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAccess")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .field("remote_buffer_size", &self.remote_buffer_size)
            .finish()
    }
}
