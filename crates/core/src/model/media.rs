use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaValidationError {
    #[error("Media URI cannot be empty.")]
    EmptyMediaUri,
}

//
// ─── MEDIA URI ─────────────────────────────────────────────────────────────────
//

/// Location of a prompt's audio: an absolute URL or a path relative to the
/// provider's media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUri {
    FilePath(PathBuf),
    Url(Url),
}

impl MediaUri {
    /// Classifies a raw media reference.
    ///
    /// Anything that parses as an absolute URL with a multi-letter scheme is a
    /// `Url`; everything else (including `C:\...` style paths) is a path.
    ///
    /// # Errors
    ///
    /// Returns `MediaValidationError::EmptyMediaUri` for blank input.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MediaValidationError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(MediaValidationError::EmptyMediaUri);
        }
        match Url::parse(s) {
            Ok(url) if url.scheme().len() > 1 => Ok(MediaUri::Url(url)),
            _ => Ok(MediaUri::FilePath(PathBuf::from(s))),
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            MediaUri::FilePath(p) => Some(p.as_path()),
            MediaUri::Url(_) => None,
        }
    }

    #[must_use]
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            MediaUri::Url(u) => Some(u),
            MediaUri::FilePath(_) => None,
        }
    }
}

impl fmt::Display for MediaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaUri::FilePath(p) => write!(f, "{}", p.display()),
            MediaUri::Url(u) => f.write_str(u.as_str()),
        }
    }
}

//
// ─── MEDIA REFERENCE ───────────────────────────────────────────────────────────
//

/// One prompt recording attached to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    uri: MediaUri,
    label: Option<String>,
}

impl MediaRef {
    #[must_use]
    pub fn new(uri: MediaUri) -> Self {
        Self { uri, label: None }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.trim().is_empty()).then_some(label);
        self
    }

    #[must_use]
    pub fn uri(&self) -> &MediaUri {
        &self.uri
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
