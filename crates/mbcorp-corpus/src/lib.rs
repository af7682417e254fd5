//! Deterministic Modbus/TCP conformance corpus generator.
//!
//! Four enumerators walk the [`mbcorp_wire::ConstraintCatalog`] (or, for
//! fuzz, one seeded generator) and return owned message lists. The
//! assembler numbers them per category, builds the manifest and writes the
//! corpus:
//!
//! ```text
//!   <output>/
//!     valid/valid_0000.bin ...
//!     malformed/ attacks/ fuzz/
//!     manifest.json
//!     checksums.sha256
//! ```
//!
//! Every `valid` message satisfies every catalog constraint; every
//! `malformed` and `attacks` message names the constraint it violates in
//! its `violation` metadata. Two runs with the same seed produce
//! byte-identical output.

pub mod assembler;
pub mod config;
pub mod enumerate;
pub mod manifest;
pub mod message;

pub use assembler::{
    Corpus, WriteReport, assemble, build_corpus, build_validated_corpus, enumerate_all, generate,
    verify_corpus, write_corpus,
};
pub use config::CorpusConfig;
pub use manifest::{
    CategoryCounts, Manifest, ManifestRecord, load_manifest, render_summary, validate_manifest,
};
pub use mbcorp_error::{CorpusError, Result};
pub use message::{Category, ExpectedResult, MetaKey, MetaValue, Message, Metadata};
