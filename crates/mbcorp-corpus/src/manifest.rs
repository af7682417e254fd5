//! Corpus manifest: one record per message plus per-category counts.
//!
//! Record fields serialize in a fixed order (`id`, `filename`, `category`,
//! `name`, `size`, `expected_result`, `hex_preview`) followed by the
//! message metadata in insertion order.

use std::collections::BTreeSet;
use std::path::Path;

use mbcorp_error::{CorpusError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::message::{Category, ExpectedResult, Message};

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";
/// Manifest file name at the corpus root.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Checksum list at the corpus root.
pub const CHECKSUM_FILE: &str = "checksums.sha256";
/// Leading bytes rendered into `hex_preview`.
pub const HEX_PREVIEW_BYTES: usize = 20;

const FIXED_FIELDS: [&str; 7] = [
    "id",
    "filename",
    "category",
    "name",
    "size",
    "expected_result",
    "hex_preview",
];

/// Message count per category, in manifest order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub valid: usize,
    pub malformed: usize,
    pub attacks: usize,
    pub fuzz: usize,
}

impl CategoryCounts {
    #[must_use]
    pub const fn get(&self, category: Category) -> usize {
        match category {
            Category::Valid => self.valid,
            Category::Malformed => self.malformed,
            Category::Attack => self.attacks,
            Category::Fuzz => self.fuzz,
        }
    }

    pub fn set(&mut self, category: Category, count: usize) {
        match category {
            Category::Valid => self.valid = count,
            Category::Malformed => self.malformed = count,
            Category::Attack => self.attacks = count,
            Category::Fuzz => self.fuzz = count,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.valid + self.malformed + self.attacks + self.fuzz
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub id: String,
    pub filename: String,
    pub category: Category,
    pub name: String,
    pub size: usize,
    pub expected_result: ExpectedResult,
    pub hex_preview: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ManifestRecord {
    /// Record for `message` at sequence number `index` within its category.
    #[must_use]
    pub fn from_message(message: &Message, index: usize) -> Self {
        let category = message.category();
        let id = record_id(category, index);
        Self {
            filename: format!("{id}.bin"),
            id,
            category,
            name: message.mnemonic().to_owned(),
            size: message.bytes().len(),
            expected_result: category.expected_result(),
            hex_preview: hex_preview(message.bytes()),
            metadata: message.metadata().to_json_map(),
        }
    }

    /// Path of the message file relative to the corpus root.
    #[must_use]
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.category, self.filename)
    }

    /// Recorded `violation` tag, if any.
    #[must_use]
    pub fn violation(&self) -> Option<&str> {
        self.metadata.get("violation").and_then(Value::as_str)
    }

    #[must_use]
    pub fn meta_int(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }
}

/// The consolidated manifest written as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub total_packets: usize,
    pub categories: CategoryCounts,
    pub packets: Vec<ManifestRecord>,
}

impl Manifest {
    /// Build a manifest from records already in category order.
    #[must_use]
    pub fn from_records(packets: Vec<ManifestRecord>) -> Self {
        let mut categories = CategoryCounts::default();
        for category in Category::ALL {
            let count = packets.iter().filter(|r| r.category == category).count();
            categories.set(category, count);
        }
        Self {
            version: MANIFEST_VERSION.to_owned(),
            total_packets: packets.len(),
            categories,
            packets,
        }
    }

    pub fn records_in(&self, category: Category) -> impl Iterator<Item = &ManifestRecord> {
        self.packets.iter().filter(move |r| r.category == category)
    }

    /// Pretty JSON bytes exactly as written to disk.
    pub fn to_json_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// `{category}_{index}` with a four-digit zero-padded index.
#[must_use]
pub fn record_id(category: Category, index: usize) -> String {
    format!("{category}_{index:04}")
}

/// Lowercase hex of at most the first [`HEX_PREVIEW_BYTES`] bytes.
#[must_use]
pub fn hex_preview(bytes: &[u8]) -> String {
    lower_hex(&bytes[..bytes.len().min(HEX_PREVIEW_BYTES)])
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    lower_hex(&Sha256::digest(bytes))
}

fn lower_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0F)]));
    }
    out
}

/// Structural self-check of a manifest; empty when consistent.
#[must_use]
pub fn validate_manifest(manifest: &Manifest) -> Vec<String> {
    let mut errors = Vec::new();
    if manifest.version != MANIFEST_VERSION {
        errors.push(format!(
            "unexpected version: {} (expected {MANIFEST_VERSION})",
            manifest.version
        ));
    }
    if manifest.total_packets != manifest.packets.len() {
        errors.push(format!(
            "total_packets {} does not match {} packets",
            manifest.total_packets,
            manifest.packets.len()
        ));
    }
    if manifest.categories.total() != manifest.total_packets {
        errors.push(format!(
            "category counts sum to {} but total_packets is {}",
            manifest.categories.total(),
            manifest.total_packets
        ));
    }

    let mut ids = BTreeSet::new();
    for record in &manifest.packets {
        if !ids.insert(record.id.as_str()) {
            errors.push(format!("duplicate id: {}", record.id));
        }
        validate_record(record, &mut errors);
    }

    for category in Category::ALL {
        let mut names = BTreeSet::new();
        let mut count = 0_usize;
        for (expected_index, record) in manifest.records_in(category).enumerate() {
            let expected_id = record_id(category, expected_index);
            if record.id != expected_id {
                errors.push(format!(
                    "{category} ids not contiguous: found {} where {expected_id} was expected",
                    record.id
                ));
            }
            if !names.insert(record.name.as_str()) {
                errors.push(format!("duplicate {category} name: {}", record.name));
            }
            count += 1;
        }
        let declared = manifest.categories.get(category);
        if declared != count {
            errors.push(format!(
                "{category} count {declared} does not match {count} records"
            ));
        }
    }

    errors
}

fn validate_record(record: &ManifestRecord, errors: &mut Vec<String>) {
    if record.filename != format!("{}.bin", record.id) {
        errors.push(format!("record {} has filename {}", record.id, record.filename));
    }
    if record.size == 0 {
        errors.push(format!("record {} is empty", record.id));
    }
    if record.expected_result != record.category.expected_result() {
        errors.push(format!(
            "record {} expects {} but category {} implies {}",
            record.id,
            record.expected_result,
            record.category,
            record.category.expected_result()
        ));
    }
    if record.hex_preview.len() != 2 * record.size.min(HEX_PREVIEW_BYTES) {
        errors.push(format!("record {} has a malformed hex_preview", record.id));
    }
    if matches!(record.category, Category::Malformed | Category::Attack)
        && record.violation().is_none()
    {
        errors.push(format!("record {} does not name a violation", record.id));
    }
    for field in FIXED_FIELDS {
        if record.metadata.contains_key(field) {
            errors.push(format!("record {} metadata shadows field {field}", record.id));
        }
    }
}

/// Read a manifest back from disk.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let bytes = std::fs::read(path).map_err(|source| CorpusError::io(path, source))?;
    serde_json::from_slice(&bytes).map_err(|source| CorpusError::json(path, source))
}

/// Operator summary printed by the binary.
#[must_use]
pub fn render_summary(manifest: &Manifest) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "corpus version={} total_packets={}",
        manifest.version, manifest.total_packets
    ));
    for category in Category::ALL {
        let records: Vec<&ManifestRecord> = manifest.records_in(category).collect();
        let bytes: usize = records.iter().map(|r| r.size).sum();
        let smallest = records.iter().map(|r| r.size).min().unwrap_or(0);
        let largest = records.iter().map(|r| r.size).max().unwrap_or(0);
        lines.push(format!(
            "- {category}: count={} expected={} bytes={bytes} size_range={smallest}..={largest}",
            records.len(),
            category.expected_result()
        ));
    }

    let mut tags: Vec<(&str, usize)> = Vec::new();
    for record in &manifest.packets {
        if let Some(tag) = record.violation() {
            match tags.iter_mut().find(|(existing, _)| *existing == tag) {
                Some((_, count)) => *count += 1,
                None => tags.push((tag, 1)),
            }
        }
    }
    tags.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(right.0)));
    lines.push(format!("violation tags: {}", tags.len()));
    for (tag, count) in tags {
        lines.push(format!("  {tag}={count}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MetaKey;

    fn sample() -> Manifest {
        let messages = [
            Message::new(
                Category::Valid,
                "fc03_addr0x0000_qty1",
                vec![0, 1, 0, 0, 0, 6, 1, 3, 0, 0, 0, 1],
            ),
            Message::new(Category::Malformed, "mbap_len_under_1", vec![0x03; 25])
                .with(MetaKey::Violation, "mbap_length_under")
                .with(MetaKey::Declared, 1_u16),
            Message::new(Category::Fuzz, "random_1b_0", vec![0xAB])
                .with(MetaKey::Kind, "random_bytes"),
        ];
        let records = messages
            .iter()
            .map(|m| ManifestRecord::from_message(m, 0))
            .collect();
        Manifest::from_records(records)
    }

    #[test]
    fn record_fields_and_preview() {
        let manifest = sample();
        let record = &manifest.packets[1];
        assert_eq!(record.id, "malformed_0000");
        assert_eq!(record.filename, "malformed_0000.bin");
        assert_eq!(record.relative_path(), "malformed/malformed_0000.bin");
        assert_eq!(record.hex_preview.len(), 40);
        assert_eq!(&record.hex_preview[..4], "0303");
        assert_eq!(record.expected_result, ExpectedResult::Block);
        assert_eq!(manifest.packets[2].hex_preview, "ab");
    }

    #[test]
    fn serialized_field_order_is_fixed_then_metadata() {
        let manifest = sample();
        let json = serde_json::to_value(&manifest.packets[1]).expect("serialize");
        let keys: Vec<&str> = json
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "filename",
                "category",
                "name",
                "size",
                "expected_result",
                "hex_preview",
                "violation",
                "declared"
            ]
        );
    }

    #[test]
    fn sample_manifest_validates() {
        let manifest = sample();
        assert_eq!(validate_manifest(&manifest), Vec::<String>::new());
        assert_eq!(manifest.categories.total(), 3);
        assert_eq!(manifest.categories.attacks, 0);
    }

    #[test]
    fn validation_reports_gaps_and_count_drift() {
        let mut manifest = sample();
        manifest.packets[1].id = "malformed_0001".to_owned();
        manifest.categories.fuzz = 2;
        let errors = validate_manifest(&manifest);
        assert!(errors.iter().any(|e| e.contains("not contiguous")), "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("fuzz count 2")), "{errors:?}");
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = sample();
        let bytes = manifest.to_json_bytes().expect("serialize");
        let back: Manifest = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(back, manifest);
        assert_eq!(back.packets[1].meta_int("declared"), Some(1));
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn summary_lists_categories_and_tags() {
        let summary = render_summary(&sample());
        assert!(summary.contains("total_packets=3"), "{summary}");
        assert!(summary.contains("- attacks: count=0"), "{summary}");
        assert!(summary.contains("mbap_length_under=1"), "{summary}");
    }
}
