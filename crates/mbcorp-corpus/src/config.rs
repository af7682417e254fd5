//! Generation run configuration.

use std::path::PathBuf;

use mbcorp_error::{CorpusError, Result};

use crate::enumerate::fuzz::{DEFAULT_FUZZ_CAP, DEFAULT_FUZZ_SEED};

/// Default output location, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "corpus";

/// Settings for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Corpus root; receives one directory per category plus the manifest.
    pub output_dir: PathBuf,
    /// Seed for the fuzz generator.
    pub seed: u64,
    /// Fuzz messages kept after generation.
    pub fuzz_cap: usize,
    /// Replace an existing output directory instead of failing.
    pub overwrite: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            seed: DEFAULT_FUZZ_SEED,
            fuzz_cap: DEFAULT_FUZZ_CAP,
            overwrite: false,
        }
    }
}

impl CorpusConfig {
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Reject settings that cannot produce a usable corpus.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(CorpusError::InvalidConfig {
                detail: "output directory must not be empty".to_owned(),
            });
        }
        // `.`, `..` and `/` have no name, so the staging sibling would land inside them.
        if self.output_dir.file_name().is_none() || self.output_dir.parent().is_none() {
            return Err(CorpusError::InvalidConfig {
                detail: format!(
                    "output directory {} must name a directory with a parent to stage into",
                    self.output_dir.display()
                ),
            });
        }
        if self.fuzz_cap == 0 {
            return Err(CorpusError::InvalidConfig {
                detail: "fuzz cap must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}
