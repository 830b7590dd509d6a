use std::fs;
use std::path::PathBuf;
use log::{debug, error};
use crate::errors::MichiError::{BackendError, InvalidArgumentError};
use crate::errors::{MichiError, MichiResult};
use crate::services::file_system::glob::local_glob;
use crate::services::file_system::handle::FileHandle;
use crate::services::file_system::options::FileOptions;
use crate::services::file_system::PathOps;
use crate::types::{FileStatistics, GlobMatches, GlobOptions, ListEntry};
use crate::utils::mode::OpenMode;

/// Path on the local file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPath {
    raw: String,
    path: PathBuf,
}

impl LocalPath {
    pub(crate) fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            path: PathBuf::from(raw),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn metadata(&self) -> MichiResult<fs::Metadata> {
        fs::metadata(&self.path).map_err(|e| {
            error!("Failed to read the metadata of {}: {}", self.raw, e);
            MichiError::from_io(e, &self.raw)
        })
    }
}

impl PathOps for LocalPath {
    fn as_str(&self) -> &str {
        &self.raw
    }

    fn exists(&self) -> MichiResult<bool> {
        self.path
            .try_exists()
            .map_err(|e| MichiError::from_io(e, &self.raw))
    }

    fn open(&self, mode: &OpenMode, options: &FileOptions) -> MichiResult<FileHandle> {
        let newline = options.text_settings(mode)?;
        if options.buffering == Some(0) && !mode.is_binary() {
            error!("Unbuffered text mode was requested for {}", self.raw);
            return Err(InvalidArgumentError("can't have unbuffered text I/O".to_string()));
        }
        if !options.closefd {
            error!("closefd=false was requested for the path {}", self.raw);
            return Err(InvalidArgumentError("cannot use closefd=false with a path".to_string()));
        }

        let open_options = mode.to_open_options();
        let opened = match &options.opener {
            Some(opener) => opener(&self.path, &open_options),
            None => open_options.open(&self.path),
        };
        let file = opened.map_err(|e| {
            error!("Failed to open {} with mode {}: {}", self.raw, mode, e);
            MichiError::from_io(e, &self.raw)
        })?;

        if file.metadata().map(|metadata| metadata.is_dir()).unwrap_or(false) {
            error!("{} is a directory", self.raw);
            return Err(BackendError(format!("Is a directory: {}", self.raw)));
        }

        debug!("Opened local file {} with mode {}", self.raw, mode);
        Ok(FileHandle::local(&self.raw, mode.clone(), newline, file, options.buffering))
    }

    fn is_dir(&self) -> MichiResult<bool> {
        Ok(self.path.is_dir())
    }

    fn list_entries(&self) -> MichiResult<Vec<ListEntry>> {
        let read_dir = fs::read_dir(&self.path).map_err(|e| {
            error!("Failed to list {}: {}", self.raw, e);
            MichiError::from_io(e, &self.raw)
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| MichiError::from_io(e, &self.raw))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(if entry.path().is_dir() { ListEntry::dir(&name) } else { ListEntry::file(&name) });
        }
        Ok(entries)
    }

    fn stat(&self) -> MichiResult<FileStatistics> {
        Ok(FileStatistics::from(&self.metadata()?))
    }

    fn size(&self) -> MichiResult<u64> {
        Ok(self.metadata()?.len())
    }

    /// Local globs run over the whole pattern with shell semantics.
    fn glob(&self, sub_pattern: &str, options: GlobOptions) -> MichiResult<GlobMatches> {
        let paths = local_glob(&format!("{}{}", self.raw, sub_pattern))?;
        if options.string_cast {
            Ok(GlobMatches::Strings(paths.iter().map(|path| path.display().to_string()).collect()))
        } else {
            Ok(GlobMatches::LocalPaths(paths))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn local(temp_dir: &TempDir, name: &str) -> LocalPath {
        LocalPath::new(&temp_dir.path().join(name).display().to_string())
    }

    #[test]
    fn test_open_write_and_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = local(&temp_dir, "data.bin");
        assert!(!path.exists().unwrap());

        let mut handle = path.open(&OpenMode::parse("wb").unwrap(), &FileOptions::new()).unwrap();
        handle.write_all(&[0; 100]).unwrap();
        handle.close().unwrap();

        assert!(path.exists().unwrap());
        assert_eq!(path.size().unwrap(), 100);
        assert!(!path.stat().unwrap().is_dir);
    }

    #[test]
    fn test_open_rejections() {
        let temp_dir = TempDir::new().unwrap();
        let path = local(&temp_dir, "data.txt");
        fs::write(path.path(), "text").unwrap();
        let read = OpenMode::parse("r").unwrap();

        let error = path.open(&read, &FileOptions::new().buffering(0)).err().unwrap();
        assert!(matches!(error, InvalidArgumentError(_)));
        let error = path.open(&read, &FileOptions::new().closefd(false)).err().unwrap();
        assert!(matches!(error, InvalidArgumentError(_)));
        let error = path.open(&OpenMode::parse("x").unwrap(), &FileOptions::new()).err().unwrap();
        assert!(matches!(error, BackendError(_)));
        let error = local(&temp_dir, "missing.txt").open(&read, &FileOptions::new()).err().unwrap();
        assert!(error.is_not_found());
        let error = LocalPath::new(&temp_dir.path().display().to_string()).open(&read, &FileOptions::new()).err().unwrap();
        assert!(matches!(error, BackendError(_)));
    }

    #[test]
    fn test_opener_is_used() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("redirected.txt");
        let redirected = target.clone();
        let options = FileOptions::new().opener(move |_, open_options| open_options.open(&redirected));

        let mut handle = local(&temp_dir, "requested.txt").open(&OpenMode::parse("w").unwrap(), &options).unwrap();
        handle.write_text("hello").unwrap();
        handle.close().unwrap();

        assert_eq!(fs::read_to_string(target).unwrap(), "hello");
        assert!(!local(&temp_dir, "requested.txt").exists().unwrap());
    }

    #[test]
    fn test_list_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.txt"), "").unwrap();
        fs::create_dir(temp_dir.path().join("a")).unwrap();

        let root = LocalPath::new(&temp_dir.path().display().to_string());
        assert!(root.is_dir().unwrap());
        let mut names = root.list_dir().unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b.txt"]);
        let mut entries = root.list_entries().unwrap();
        entries.sort();
        assert_eq!(entries, vec![ListEntry::dir("a"), ListEntry::file("b.txt")]);
        assert!(root.stat().unwrap().is_dir);

        assert!(local(&temp_dir, "missing").list_dir().unwrap_err().is_not_found());
        assert!(matches!(local(&temp_dir, "b.txt").list_dir(), Err(BackendError(_))));
    }
}
