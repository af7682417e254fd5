//! Error types for corpus generation.
//!
//! Encoding and enumeration are total computations and never fail. Only the
//! filesystem side (writing a corpus, reading a manifest back) and
//! configuration validation produce a [`CorpusError`].

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for the corpus generator crates.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A filesystem operation failed. Fatal for a generation run.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest could not be serialized or parsed.
    #[error("manifest JSON error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The output location already exists and overwriting was not requested.
    #[error("output location already exists: {} (pass --force to replace it)", path.display())]
    OutputExists { path: PathBuf },

    /// Configuration rejected before any work started.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    /// The assembled corpus failed its structural self-check.
    #[error("corpus failed validation: {}", errors.join("; "))]
    InvalidCorpus { errors: Vec<String> },

    /// Files on disk disagree with the manifest that describes them.
    #[error("corpus does not match manifest: {detail}")]
    ManifestMismatch { detail: String },
}

impl CorpusError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON error with the manifest path it occurred on.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the filesystem rather than from corpus content.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::OutputExists { .. })
    }
}

/// Result alias using [`CorpusError`].
pub type Result<T> = std::result::Result<T, CorpusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = CorpusError::io(
            "/tmp/corpus/valid",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("/tmp/corpus/valid"), "{text}");
        assert!(text.contains("denied"), "{text}");
        assert!(err.is_io());
    }

    #[test]
    fn invalid_corpus_joins_every_error() {
        let err = CorpusError::InvalidCorpus {
            errors: vec!["duplicate id".to_owned(), "gap at 3".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "corpus failed validation: duplicate id; gap at 3"
        );
        assert!(!err.is_io());
    }
}
