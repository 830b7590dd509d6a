use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::str::FromStr;
use log::error;
use crate::errors::MichiError::UnsupportedModeError;
use crate::errors::{MichiError, MichiResult};

/// Primary action of an open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// `r`: the file must exist.
    Read,
    /// `w`: create or truncate.
    Write,
    /// `a`: create if missing, writes go to the end.
    Append,
    /// `x`: the file must not exist yet.
    CreateNew,
}

/// Parsed mode string (`r`, `w+`, `rb`, `ab+`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMode {
    raw: String,
    kind: ModeKind,
    update: bool,
    binary: bool,
}

impl OpenMode {
    /// Parse the mode vocabulary shared by every backend: exactly one of `r w a x`,
    /// an optional `+` and an optional `b` or `t`, each at most once and in any order.
    pub fn parse(mode: &str) -> MichiResult<Self> {
        let mut kind = None;
        let mut update = false;
        let mut binary = None;

        let invalid = || {
            error!("Open mode is not supported: {:?}", mode);
            UnsupportedModeError(format!("'{}' must be one of r, w, a, x with optional '+' and 'b' or 't'", mode))
        };

        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' => {
                    if kind.is_some() {
                        return Err(invalid());
                    }
                    kind = Some(match c {
                        'r' => ModeKind::Read,
                        'w' => ModeKind::Write,
                        'a' => ModeKind::Append,
                        _ => ModeKind::CreateNew,
                    });
                }
                '+' if !update => update = true,
                'b' | 't' if binary.is_none() => binary = Some(c == 'b'),
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            raw: mode.to_string(),
            kind: kind.ok_or_else(invalid)?,
            update,
            binary: binary.unwrap_or(false),
        })
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn is_update(&self) -> bool {
        self.update
    }

    pub fn readable(&self) -> bool {
        self.kind == ModeKind::Read || self.update
    }

    pub fn writable(&self) -> bool {
        self.kind != ModeKind::Read || self.update
    }

    /// Options for the local backend, matching open(2) for this mode.
    pub(crate) fn to_open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.readable());
        match self.kind {
            ModeKind::Read => {
                options.write(self.update);
            }
            ModeKind::Write => {
                options.write(true).create(true).truncate(true);
            }
            ModeKind::Append => {
                options.append(true).create(true);
            }
            ModeKind::CreateNew => {
                options.write(true).create_new(true);
            }
        }
        options
    }
}

impl FromStr for OpenMode {
    type Err = MichiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}
