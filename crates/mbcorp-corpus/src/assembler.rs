//! Corpus assembler and writer.
//!
//! Assembly is pure: enumerator output is grouped by category, numbered in
//! generation order and turned into manifest records. Writing goes to a
//! sibling staging directory that is renamed into place only once every
//! message file, the manifest and the checksum list are on disk, so a failed
//! run never leaves a partial corpus at the output location.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mbcorp_error::{CorpusError, Result};
use mbcorp_wire::ConstraintCatalog;
use tracing::{debug, error, info, warn};

use crate::config::CorpusConfig;
use crate::enumerate::attack::attack_messages;
use crate::enumerate::fuzz::fuzz_messages;
use crate::enumerate::malformed::malformed_messages;
use crate::enumerate::valid::valid_messages;
use crate::manifest::{
    CHECKSUM_FILE, MANIFEST_FILE, Manifest, ManifestRecord, hex_preview, load_manifest,
    sha256_hex, validate_manifest,
};
use crate::message::{Category, Message};

/// An assembled corpus: manifest records aligned with their messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    manifest: Manifest,
    messages: Vec<Message>,
}

impl Corpus {
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Records paired with the message each one describes.
    pub fn entries(&self) -> impl Iterator<Item = (&ManifestRecord, &Message)> {
        self.manifest.packets.iter().zip(&self.messages)
    }
}

/// What [`write_corpus`] put on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub root: PathBuf,
    pub files_written: usize,
    pub manifest_sha256: String,
}

/// Run every enumerator in category order.
#[must_use]
pub fn enumerate_all(catalog: &ConstraintCatalog, seed: u64, fuzz_cap: usize) -> Vec<Message> {
    let mut messages = valid_messages(catalog);
    messages.extend(malformed_messages(catalog));
    messages.extend(attack_messages(catalog));
    messages.extend(fuzz_messages(seed, fuzz_cap));
    messages
}

/// Number messages per category in generation order and build the manifest.
#[must_use]
pub fn assemble(mut messages: Vec<Message>) -> Corpus {
    // Stable: generation order survives within each category.
    messages.sort_by_key(Message::category);

    let mut next_index: BTreeMap<Category, usize> = BTreeMap::new();
    let records = messages
        .iter()
        .map(|message| {
            let slot = next_index.entry(message.category()).or_insert(0);
            let record = ManifestRecord::from_message(message, *slot);
            *slot += 1;
            record
        })
        .collect();

    Corpus {
        manifest: Manifest::from_records(records),
        messages,
    }
}

/// Enumerate and assemble the corpus described by `config`.
#[must_use]
pub fn build_corpus(config: &CorpusConfig) -> Corpus {
    let catalog = ConstraintCatalog::standard();
    let corpus = assemble(enumerate_all(&catalog, config.seed, config.fuzz_cap));
    for category in Category::ALL {
        debug!(
            category = %category,
            count = corpus.manifest.categories.get(category),
            "category assembled"
        );
    }
    corpus
}

/// Build the corpus and run its structural self-check.
pub fn build_validated_corpus(config: &CorpusConfig) -> Result<Corpus> {
    config.validate()?;
    let corpus = build_corpus(config);
    let mut errors = validate_manifest(&corpus.manifest);
    for (record, message) in corpus.entries() {
        if record.size != message.bytes().len() || record.name != message.mnemonic() {
            errors.push(format!("record {} does not describe its message", record.id));
        }
    }
    if errors.is_empty() {
        Ok(corpus)
    } else {
        Err(CorpusError::InvalidCorpus { errors })
    }
}

/// Write `corpus` to `config.output_dir` through a staging directory.
pub fn write_corpus(corpus: &Corpus, config: &CorpusConfig) -> Result<WriteReport> {
    let target = config.output_dir.as_path();
    let staging = staging_path(target);
    refuse_enclosing_target(target, &staging)?;
    if target.exists() && !config.overwrite {
        return Err(CorpusError::OutputExists {
            path: target.to_path_buf(),
        });
    }

    if staging.exists() {
        warn!(path = %staging.display(), "removing stale staging directory");
        fs::remove_dir_all(&staging).map_err(|source| CorpusError::io(&staging, source))?;
    }

    let staged = write_tree(corpus, &staging).and_then(|report| {
        if target.exists() {
            info!(path = %target.display(), "replacing existing corpus");
            fs::remove_dir_all(target).map_err(|source| CorpusError::io(target, source))?;
        }
        fs::rename(&staging, target).map_err(|source| CorpusError::io(target, source))?;
        Ok(report)
    });

    match staged {
        Ok((files_written, manifest_sha256)) => {
            info!(
                path = %target.display(),
                total_packets = corpus.manifest.total_packets,
                valid = corpus.manifest.categories.valid,
                malformed = corpus.manifest.categories.malformed,
                attacks = corpus.manifest.categories.attacks,
                fuzz = corpus.manifest.categories.fuzz,
                manifest_sha256 = %manifest_sha256,
                "corpus written"
            );
            Ok(WriteReport {
                root: target.to_path_buf(),
                files_written,
                manifest_sha256,
            })
        }
        Err(err) => {
            error!(path = %target.display(), error = %err, "corpus write failed");
            if staging.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "could not remove staging directory"
                    );
                }
            }
            Err(err)
        }
    }
}

/// Validate `config`, build the corpus and write it.
pub fn generate(config: &CorpusConfig) -> Result<WriteReport> {
    let corpus = build_validated_corpus(config)?;
    write_corpus(&corpus, config)
}

/// Hidden sibling of `target` used while writing.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "corpus".into(), |name| name.to_string_lossy());
    target.with_file_name(format!(".{name}.staging-{}", std::process::id()))
}

/// Reject targets that are, or resolve to, a directory holding the staging path.
fn refuse_enclosing_target(target: &Path, staging: &Path) -> Result<()> {
    let enclosing = || CorpusError::InvalidConfig {
        detail: format!(
            "output directory {} would contain its own staging directory",
            target.display()
        ),
    };
    if target.file_name().is_none() {
        return Err(enclosing());
    }
    if !target.exists() {
        return Ok(());
    }
    let staging_parent = staging
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let resolved_target =
        fs::canonicalize(target).map_err(|source| CorpusError::io(target, source))?;
    let resolved_parent = fs::canonicalize(staging_parent)
        .map_err(|source| CorpusError::io(staging_parent, source))?;
    if resolved_parent.starts_with(&resolved_target) {
        return Err(enclosing());
    }
    Ok(())
}

/// Write every file under `root`; returns the file count and manifest digest.
fn write_tree(corpus: &Corpus, root: &Path) -> Result<(usize, String)> {
    for category in Category::ALL {
        let dir = root.join(category.as_str());
        fs::create_dir_all(&dir).map_err(|source| CorpusError::io(&dir, source))?;
    }

    let mut checksums = String::new();
    for (record, message) in corpus.entries() {
        let relative = record.relative_path();
        let path = root.join(&relative);
        fs::write(&path, message.bytes()).map_err(|source| CorpusError::io(&path, source))?;
        checksums.push_str(&format!("{}  {relative}\n", sha256_hex(message.bytes())));
    }

    let manifest_path = root.join(MANIFEST_FILE);
    let manifest_bytes = corpus
        .manifest
        .to_json_bytes()
        .map_err(|source| CorpusError::json(&manifest_path, source))?;
    fs::write(&manifest_path, &manifest_bytes)
        .map_err(|source| CorpusError::io(&manifest_path, source))?;
    let manifest_sha256 = sha256_hex(&manifest_bytes);
    checksums.push_str(&format!("{manifest_sha256}  {MANIFEST_FILE}\n"));

    let checksum_path = root.join(CHECKSUM_FILE);
    fs::write(&checksum_path, checksums)
        .map_err(|source| CorpusError::io(&checksum_path, source))?;

    debug!(path = %root.display(), files = corpus.messages.len(), "staging tree complete");
    Ok((corpus.messages.len(), manifest_sha256))
}

/// Re-read a written corpus and check every file against its manifest.
pub fn verify_corpus(root: &Path) -> Result<Manifest> {
    let manifest_path = root.join(MANIFEST_FILE);
    let manifest = load_manifest(&manifest_path)?;
    let errors = validate_manifest(&manifest);
    if !errors.is_empty() {
        return Err(CorpusError::InvalidCorpus { errors });
    }

    let checksum_path = root.join(CHECKSUM_FILE);
    let listing =
        fs::read_to_string(&checksum_path).map_err(|source| CorpusError::io(&checksum_path, source))?;
    let checksums: BTreeMap<&str, &str> = listing
        .lines()
        .filter_map(|line| line.split_once("  "))
        .map(|(digest, path)| (path, digest))
        .collect();

    let mismatch = |detail: String| CorpusError::ManifestMismatch { detail };
    for record in &manifest.packets {
        let relative = record.relative_path();
        let path = root.join(&relative);
        let bytes = fs::read(&path).map_err(|source| CorpusError::io(&path, source))?;
        if bytes.len() != record.size {
            return Err(mismatch(format!(
                "{relative} is {} bytes, manifest says {}",
                bytes.len(),
                record.size
            )));
        }
        if hex_preview(&bytes) != record.hex_preview {
            return Err(mismatch(format!("{relative} does not match its hex_preview")));
        }
        if checksums.get(relative.as_str()).copied() != Some(sha256_hex(&bytes).as_str()) {
            return Err(mismatch(format!("{relative} fails its checksum")));
        }
    }

    let manifest_bytes =
        fs::read(&manifest_path).map_err(|source| CorpusError::io(&manifest_path, source))?;
    if checksums.get(MANIFEST_FILE).copied() != Some(sha256_hex(&manifest_bytes).as_str()) {
        return Err(mismatch(format!("{MANIFEST_FILE} fails its checksum")));
    }

    info!(
        path = %root.display(),
        total_packets = manifest.total_packets,
        "corpus verified"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MetaKey;

    fn tiny() -> Vec<Message> {
        vec![
            Message::new(Category::Fuzz, "f0", vec![1]),
            Message::new(Category::Valid, "v0", vec![2, 3]),
            Message::new(Category::Malformed, "m0", vec![4])
                .with(MetaKey::Violation, "empty_pdu"),
            Message::new(Category::Valid, "v1", vec![5]),
        ]
    }

    #[test]
    fn assemble_groups_by_category_and_keeps_order() {
        let corpus = assemble(tiny());
        let ids: Vec<(&str, &str)> = corpus
            .entries()
            .map(|(record, message)| (record.id.as_str(), message.mnemonic()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("valid_0000", "v0"),
                ("valid_0001", "v1"),
                ("malformed_0000", "m0"),
                ("fuzz_0000", "f0"),
            ]
        );
        assert_eq!(corpus.manifest().categories.valid, 2);
        assert!(validate_manifest(corpus.manifest()).is_empty());
    }

    #[test]
    fn staging_path_is_a_hidden_sibling() {
        let staging = staging_path(Path::new("/tmp/out/corpus"));
        assert_eq!(staging.parent(), Some(Path::new("/tmp/out")));
        let name = staging
            .file_name()
            .and_then(|n| n.to_str())
            .expect("utf-8 name");
        assert!(name.starts_with(".corpus.staging-"), "{name}");
    }

    #[test]
    fn write_then_verify_tiny_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CorpusConfig::default().with_output_dir(dir.path().join("out"));
        let corpus = assemble(tiny());
        let report = write_corpus(&corpus, &config).expect("write");
        assert_eq!(report.files_written, 4);
        assert!(dir.path().join("out/attacks").is_dir());
        let manifest = verify_corpus(&report.root).expect("verify");
        assert_eq!(&manifest, corpus.manifest());
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = CorpusConfig::default().with_output_dir(dir.path().join("out"));
        let corpus = assemble(tiny());
        write_corpus(&corpus, &config).expect("first write");

        let err = write_corpus(&corpus, &config).expect_err("second write refused");
        assert!(matches!(err, CorpusError::OutputExists { .. }));

        config.overwrite = true;
        write_corpus(&corpus, &config).expect("overwrite");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains("staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn parent_dir_target_is_refused_and_left_intact() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("precious.txt"), b"keep").expect("seed file");
        fs::create_dir(dir.path().join("keep")).expect("subdir");
        let config = CorpusConfig {
            overwrite: true,
            ..CorpusConfig::default().with_output_dir(dir.path().join("keep").join(".."))
        };

        let err = write_corpus(&assemble(tiny()), &config).expect_err("refused");
        assert!(matches!(err, CorpusError::InvalidConfig { .. }), "{err}");
        assert!(dir.path().join("precious.txt").is_file());
        assert!(dir.path().join("keep").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn target_resolving_to_an_ancestor_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("precious.txt"), b"keep").expect("seed file");
        let link = dir.path().join("here");
        std::os::unix::fs::symlink(dir.path(), &link).expect("symlink");
        let config = CorpusConfig {
            overwrite: true,
            ..CorpusConfig::default().with_output_dir(&link)
        };

        let err = write_corpus(&assemble(tiny()), &config).expect_err("refused");
        assert!(matches!(err, CorpusError::InvalidConfig { .. }), "{err}");
        assert!(dir.path().join("precious.txt").is_file());
    }

    fn staging_leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .expect("list")
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".staging-"))
            .collect()
    }

    #[test]
    fn unwritable_location_aborts_without_partial_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").expect("blocker");
        let target = blocker.join("out");
        let config = CorpusConfig::default().with_output_dir(&target);

        let err = write_corpus(&assemble(tiny()), &config).expect_err("write fails");
        assert!(err.is_io(), "{err}");
        assert!(matches!(err, CorpusError::Io { .. }));
        assert!(!target.exists());
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[test]
    fn failed_replacement_removes_staging_and_keeps_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where the corpus directory should be cannot be replaced.
        let target = dir.path().join("out");
        fs::write(&target, b"old").expect("existing file");
        let config = CorpusConfig {
            overwrite: true,
            ..CorpusConfig::default().with_output_dir(&target)
        };

        let err = write_corpus(&assemble(tiny()), &config).expect_err("replacement fails");
        assert!(matches!(err, CorpusError::Io { .. }), "{err}");
        assert_eq!(fs::read(&target).expect("target kept"), b"old");
        assert!(staging_leftovers(dir.path()).is_empty());
    }

    #[test]
    fn tampered_file_fails_verification() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CorpusConfig::default().with_output_dir(dir.path().join("out"));
        let report = write_corpus(&assemble(tiny()), &config).expect("write");
        fs::write(report.root.join("valid/valid_0000.bin"), [9, 9]).expect("tamper");
        let err = verify_corpus(&report.root).expect_err("tamper detected");
        assert!(matches!(err, CorpusError::ManifestMismatch { .. }), "{err}");
    }
}
