//! File access that works the same on local paths and remote object stores
//! (`gs://bucket/key`, `hdfs://namenode/path`).
//!
//! The free functions here use a process-wide [FileAccess] configured from the
//! `MICHI_*` environment variables. Build your own [FileAccess] to pick the
//! configuration or to plug in another [ObjectStore].

pub mod config;
pub mod errors;
pub mod services;
pub mod types;
pub mod utils;

use std::sync::OnceLock;
use log::error;
use crate::errors::MichiError::BackendError;

pub use crate::config::MichiConfig;
pub use crate::errors::{MichiError, MichiResult};
pub use crate::services::file_system::{AnyPath, FileAccess, FileHandle, FileOptions, LocalPath, PathOps, RemoteObjectPath};
pub use crate::services::ObjectStore;
pub use crate::types::{FileStatistics, GlobMatches, GlobOptions, ListEntry};
pub use crate::utils::mode::OpenMode;
pub use crate::utils::parser::{classify, ObjectLocation, Scheme};

static DEFAULT_ACCESS: OnceLock<Result<FileAccess, String>> = OnceLock::new();

fn default_access() -> MichiResult<&'static FileAccess> {
    let access = DEFAULT_ACCESS.get_or_init(|| FileAccess::from_env().map_err(|e| e.to_string()));
    match access {
        Ok(access) => Ok(access),
        Err(e) => {
            error!("Default file access is unavailable: {}", e);
            Err(BackendError(e.clone()))
        }
    }
}

pub fn path_exists(path: &str) -> MichiResult<bool> {
    default_access()?.path_exists(path)
}

pub fn open_file(path: &str, mode: &str, options: &FileOptions) -> MichiResult<FileHandle> {
    default_access()?.open_file(path, mode, options)
}

pub fn is_directory(path: &str) -> MichiResult<bool> {
    default_access()?.is_directory(path)
}

pub fn list_directory(path: &str) -> MichiResult<Vec<String>> {
    default_access()?.list_directory(path)
}

pub fn list_entries(path: &str) -> MichiResult<Vec<ListEntry>> {
    default_access()?.list_entries(path)
}

pub fn stat(path: &str) -> MichiResult<FileStatistics> {
    default_access()?.stat(path)
}

pub fn file_size(path: &str) -> MichiResult<u64> {
    default_access()?.file_size(path)
}

pub fn glob(pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches> {
    default_access()?.glob(pattern, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_free_functions_on_local_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin").display().to_string();

        let mut handle = open_file(&path, "xb", &FileOptions::new()).unwrap();
        handle.write_all(&[0; 100]).unwrap();
        handle.close().unwrap();

        assert!(path_exists(&path).unwrap());
        assert!(!is_directory(&path).unwrap());
        assert_eq!(file_size(&path).unwrap(), 100);
        assert_eq!(stat(&path).unwrap().size, 100);
        assert_eq!(list_directory(&temp_dir.path().display().to_string()).unwrap(), vec!["data.bin"]);
        assert_eq!(glob(&format!("{}/*.bin", temp_dir.path().display()), GlobOptions::default()).unwrap().len(), 1);
        assert_eq!(classify(&path), Scheme::Local);
    }
}
