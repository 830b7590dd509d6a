use log::error;
use crate::errors::MichiError::InvalidArgumentError;
use crate::errors::MichiResult;

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// Newline translation of a text mode handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    /// `newline=None`: `\r\n` and `\r` read as `\n`, `\n` written as the platform separator.
    Universal,
    /// `newline=""`: nothing is translated.
    Untranslated,
    /// `newline="\n" | "\r" | "\r\n"`: `\n` is written as this sequence, reads are untouched.
    Fixed(&'static str),
}

impl Newline {
    pub fn parse(newline: Option<&str>) -> MichiResult<Self> {
        match newline {
            None => Ok(Self::Universal),
            Some("") => Ok(Self::Untranslated),
            Some("\n") => Ok(Self::Fixed("\n")),
            Some("\r") => Ok(Self::Fixed("\r")),
            Some("\r\n") => Ok(Self::Fixed("\r\n")),
            Some(other) => {
                error!("Illegal newline value: {:?}", other);
                Err(InvalidArgumentError(format!("illegal newline value: {:?}", other)))
            }
        }
    }

    /// Translate text read from the file.
    pub fn decode(&self, text: &str) -> String {
        match self {
            Self::Universal => text.replace("\r\n", "\n").replace('\r', "\n"),
            Self::Untranslated | Self::Fixed(_) => text.to_string(),
        }
    }

    /// Translate text before it is written to the file.
    pub fn encode(&self, text: &str) -> String {
        match self {
            Self::Universal if LINE_SEPARATOR != "\n" => text.replace('\n', LINE_SEPARATOR),
            Self::Fixed(separator) if *separator != "\n" => text.replace('\n', separator),
            _ => text.to_string(),
        }
    }
}

/// Only UTF-8 text is decoded. `None` means the default encoding, which is UTF-8 too.
pub fn check_encoding(encoding: Option<&str>) -> MichiResult<()> {
    match encoding {
        None => Ok(()),
        Some(encoding) => {
            let normalized = encoding.to_ascii_lowercase().replace('_', "-");
            if normalized == "utf-8" || normalized == "utf8" {
                Ok(())
            } else {
                error!("Unsupported encoding: {}", encoding);
                Err(InvalidArgumentError(format!("unsupported encoding: {}", encoding)))
            }
        }
    }
}
