use std::io;

pub type MichiResult<T> = Result<T, MichiError>;

#[derive(thiserror::Error, Debug)]
pub enum MichiError {
    #[error("Path does not exist: {0}")]
    NotFoundError(String),
    #[error("Failed to the backend process: {0}")]
    BackendError(String),
    #[error("Unsupported open mode: {0}")]
    UnsupportedModeError(String),
    #[error("Invalid glob pattern: {0}")]
    PatternError(String),
    #[error("Get invalid argument error: {0}")]
    InvalidArgumentError(String),
}

impl MichiError {
    /// Wrap an io error raised while operating on `target`.
    /// `NotFound` keeps its meaning, every other kind is a backend fault.
    pub(crate) fn from_io(err: io::Error, target: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => MichiError::NotFoundError(target.to_string()),
            _ => MichiError::BackendError(format!("{}: {}", target, err)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MichiError::NotFoundError(_))
    }
}

impl From<MichiError> for io::Error {
    fn from(value: MichiError) -> Self {
        let kind = match &value {
            MichiError::NotFoundError(_) => io::ErrorKind::NotFound,
            MichiError::UnsupportedModeError(_)
            | MichiError::PatternError(_)
            | MichiError::InvalidArgumentError(_) => io::ErrorKind::InvalidInput,
            MichiError::BackendError(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, value)
    }
}
