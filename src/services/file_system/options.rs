use std::fmt::{Debug, Formatter};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;
use log::error;
use crate::errors::MichiError::InvalidArgumentError;
use crate::errors::MichiResult;
use crate::utils::mode::OpenMode;
use crate::utils::text::{check_encoding, Newline};

/// Custom open hook for local files. It receives the path and the options derived
/// from the mode and must return the opened file.
pub type Opener = Arc<dyn Fn(&Path, &fs::OpenOptions) -> io::Result<File> + Send + Sync>;

/// Options of `open_file`.
///
/// `closefd` and `opener` only apply to local paths, remote paths ignore them.
#[derive(Clone)]
pub struct FileOptions {
    pub(crate) buffering: Option<usize>,
    pub(crate) encoding: Option<String>,
    pub(crate) newline: Option<String>,
    pub(crate) closefd: bool,
    pub(crate) opener: Option<Opener>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            buffering: None,
            encoding: None,
            newline: None,
            closefd: true,
            opener: None,
        }
    }
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `0` is unbuffered (binary only), `1` line buffers text writes,
    /// anything else is the buffer size.
    pub fn buffering(mut self, buffering: usize) -> Self {
        self.buffering = Some(buffering);
        self
    }

    pub fn encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_string());
        self
    }

    pub fn newline(mut self, newline: &str) -> Self {
        self.newline = Some(newline.to_string());
        self
    }

    pub fn closefd(mut self, closefd: bool) -> Self {
        self.closefd = closefd;
        self
    }

    pub fn opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&Path, &fs::OpenOptions) -> io::Result<File> + Send + Sync + 'static,
    {
        self.opener = Some(Arc::new(opener));
        self
    }

    /// Check the text settings against the mode and return the newline translation.
    pub(crate) fn text_settings(&self, mode: &OpenMode) -> MichiResult<Newline> {
        if mode.is_binary() {
            if self.encoding.is_some() {
                error!("Binary mode {} got an encoding", mode);
                return Err(InvalidArgumentError("binary mode doesn't take an encoding argument".to_string()));
            }
            if self.newline.is_some() {
                error!("Binary mode {} got a newline", mode);
                return Err(InvalidArgumentError("binary mode doesn't take a newline argument".to_string()));
            }
            return Ok(Newline::Untranslated);
        }

        check_encoding(self.encoding.as_deref())?;
        Newline::parse(self.newline.as_deref())
    }
}

impl Debug for FileOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOptions")
            .field("buffering", &self.buffering)
            .field("encoding", &self.encoding)
            .field("newline", &self.newline)
            .field("closefd", &self.closefd)
            .field("opener", &self.opener.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
