//! Generated messages and their per-scenario metadata.
//!
//! Metadata keys form a closed set ([`MetaKey`]) so every key an enumerator
//! can emit is visible in one place, while the manifest still carries them
//! as a flat, per-record JSON object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Corpus category. The serialized name is also the directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "valid")]
    Valid,
    #[serde(rename = "malformed")]
    Malformed,
    #[serde(rename = "attacks")]
    Attack,
    #[serde(rename = "fuzz")]
    Fuzz,
}

impl Category {
    /// Categories in manifest order.
    pub const ALL: [Self; 4] = [Self::Valid, Self::Malformed, Self::Attack, Self::Fuzz];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Malformed => "malformed",
            Self::Attack => "attacks",
            Self::Fuzz => "fuzz",
        }
    }

    /// `pass` for valid messages, `block` for everything else.
    #[must_use]
    pub const fn expected_result(self) -> ExpectedResult {
        match self {
            Self::Valid => ExpectedResult::Pass,
            Self::Malformed | Self::Attack | Self::Fuzz => ExpectedResult::Block,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disposition a conformant implementation is expected to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedResult {
    Pass,
    Block,
}

impl fmt::Display for ExpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("pass"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// Every metadata key an enumerator may attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaKey {
    Function,
    FunctionCode,
    Address,
    Quantity,
    Value,
    UnitId,
    TransactionId,
    ProtocolId,
    Note,
    ReadAddress,
    ReadQuantity,
    WriteAddress,
    WriteQuantity,
    Violation,
    Violations,
    Declared,
    Actual,
    Delta,
    LengthDelta,
    ByteCount,
    Expected,
    PduDataLen,
    ExtraBytes,
    Cve,
    Variant,
    DeclaredLength,
    ActualPayload,
    OverflowBytes,
    RecordLength1,
    RecordLength2,
    DataLength,
    SplitPoint,
    Segment1Len,
    Segment2Len,
    SplitPoints,
    OverlapStart,
    OverlapLength,
    FirstFrameLen,
    MeiType,
    ReadCode,
    ObjectId,
    FileNumber,
    RecordNumber,
    RecordLength,
    Kind,
    Length,
    SeedOffset,
    PduLength,
    BitPosition,
    ByteIndex,
    BitIndex,
    OriginalLength,
    TruncatedLength,
    Byte,
    Start,
}

impl MetaKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::FunctionCode => "function_code",
            Self::Address => "address",
            Self::Quantity => "quantity",
            Self::Value => "value",
            Self::UnitId => "unit_id",
            Self::TransactionId => "transaction_id",
            Self::ProtocolId => "protocol_id",
            Self::Note => "note",
            Self::ReadAddress => "read_address",
            Self::ReadQuantity => "read_qty",
            Self::WriteAddress => "write_address",
            Self::WriteQuantity => "write_qty",
            Self::Violation => "violation",
            Self::Violations => "violations",
            Self::Declared => "declared",
            Self::Actual => "actual",
            Self::Delta => "delta",
            Self::LengthDelta => "length_delta",
            Self::ByteCount => "byte_count",
            Self::Expected => "expected",
            Self::PduDataLen => "pdu_data_len",
            Self::ExtraBytes => "extra_bytes",
            Self::Cve => "cve",
            Self::Variant => "variant",
            Self::DeclaredLength => "declared_length",
            Self::ActualPayload => "actual_payload",
            Self::OverflowBytes => "overflow_bytes",
            Self::RecordLength1 => "record_length_1",
            Self::RecordLength2 => "record_length_2",
            Self::DataLength => "data_length",
            Self::SplitPoint => "split_point",
            Self::Segment1Len => "segment_1_len",
            Self::Segment2Len => "segment_2_len",
            Self::SplitPoints => "split_points",
            Self::OverlapStart => "overlap_start",
            Self::OverlapLength => "overlap_length",
            Self::FirstFrameLen => "first_frame_len",
            Self::MeiType => "mei_type",
            Self::ReadCode => "read_code",
            Self::ObjectId => "object_id",
            Self::FileNumber => "file_number",
            Self::RecordNumber => "record_number",
            Self::RecordLength => "record_length",
            Self::Kind => "type",
            Self::Length => "length",
            Self::SeedOffset => "seed_offset",
            Self::PduLength => "pdu_length",
            Self::BitPosition => "bit_position",
            Self::ByteIndex => "byte_index",
            Self::BitIndex => "bit_index",
            Self::OriginalLength => "original_length",
            Self::TruncatedLength => "truncated_length",
            Self::Byte => "byte",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metadata value: integer, text, or a list of either.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaValue {
    Int(i64),
    Text(String),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl MetaValue {
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(value) => Value::from(*value),
            Self::Text(value) => Value::from(value.as_str()),
            Self::IntList(values) => Value::from(values.clone()),
            Self::TextList(values) => Value::from(values.clone()),
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

macro_rules! int_meta_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for MetaValue {
            fn from(value: $ty) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

int_meta_value!(u8, u16, u32, i32, i64);

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&[usize]> for MetaValue {
    fn from(values: &[usize]) -> Self {
        Self::IntList(
            values
                .iter()
                .map(|value| i64::try_from(*value).unwrap_or(i64::MAX))
                .collect(),
        )
    }
}

impl From<Vec<String>> for MetaValue {
    fn from(values: Vec<String>) -> Self {
        Self::TextList(values)
    }
}

/// Insertion-ordered metadata with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Metadata(Vec<(MetaKey, MetaValue)>);

impl Metadata {
    /// Set `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: MetaKey, value: MetaValue) {
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    #[must_use]
    pub fn get(&self, key: MetaKey) -> Option<&MetaValue> {
        self.0
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (MetaKey, &MetaValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object in insertion order.
    #[must_use]
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.entries()
            .map(|(key, value)| (key.as_str().to_owned(), value.to_json()))
            .collect()
    }
}

/// One generated message. Built once by an enumerator and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    category: Category,
    mnemonic: String,
    bytes: Vec<u8>,
    metadata: Metadata,
}

impl Message {
    #[must_use]
    pub fn new(category: Category, mnemonic: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            category,
            mnemonic: mnemonic.into(),
            bytes,
            metadata: Metadata::default(),
        }
    }

    /// Attach one metadata entry while the message is being built.
    #[must_use]
    pub fn with(mut self, key: MetaKey, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Recorded `violation` tag, if any.
    #[must_use]
    pub fn violation(&self) -> Option<&str> {
        self.metadata.get(MetaKey::Violation).and_then(MetaValue::as_text)
    }

    #[must_use]
    pub fn meta_int(&self, key: MetaKey) -> Option<i64> {
        self.metadata.get(key).and_then(MetaValue::as_int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_and_dispositions() {
        assert_eq!(Category::Attack.as_str(), "attacks");
        assert_eq!(Category::Valid.expected_result(), ExpectedResult::Pass);
        assert_eq!(Category::Fuzz.expected_result(), ExpectedResult::Block);
        assert_eq!(Category::from_name("attacks"), Some(Category::Attack));
        assert_eq!(
            serde_json::to_string(&Category::Attack).expect("serialize"),
            "\"attacks\""
        );
    }

    #[test]
    fn metadata_keeps_insertion_order_and_replaces_in_place() {
        let msg = Message::new(Category::Malformed, "m", vec![1])
            .with(MetaKey::Violation, "mbap_length_under")
            .with(MetaKey::Declared, 1_u16)
            .with(MetaKey::Violation, "mbap_length_over");
        let keys: Vec<&str> = msg.metadata().entries().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["violation", "declared"]);
        assert_eq!(msg.violation(), Some("mbap_length_over"));
        assert_eq!(msg.meta_int(MetaKey::Declared), Some(1));
    }

    #[test]
    fn json_map_uses_wire_key_names() {
        let msg = Message::new(Category::Fuzz, "f", vec![0])
            .with(MetaKey::Kind, "bit_flip")
            .with(MetaKey::SplitPoints, &[2_usize, 5][..]);
        let map = msg.metadata().to_json_map();
        assert_eq!(map["type"], Value::from("bit_flip"));
        assert_eq!(map["split_points"], serde_json::json!([2, 5]));
    }
}
