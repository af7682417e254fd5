//! Whole-corpus properties checked against the constraint inspector.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use mbcorp_corpus::enumerate::fuzz::fuzz_messages;
use mbcorp_corpus::{
    Category, Corpus, CorpusConfig, MetaKey, MetaValue, Message, build_validated_corpus, generate,
    verify_corpus,
};
use mbcorp_wire::{ConstraintCatalog, ENVELOPE_LEN, Envelope, inspect};
use proptest::prelude::*;

fn corpus() -> Corpus {
    build_validated_corpus(&CorpusConfig::default()).expect("default corpus builds")
}

fn in_category(corpus: &Corpus, category: Category) -> Vec<&Message> {
    corpus
        .messages()
        .iter()
        .filter(|message| message.category() == category)
        .collect()
}

fn find<'a>(corpus: &'a Corpus, mnemonic: &str) -> &'a Message {
    corpus
        .messages()
        .iter()
        .find(|message| message.mnemonic() == mnemonic)
        .unwrap_or_else(|| panic!("{mnemonic} missing"))
}

fn text_list(message: &Message, key: MetaKey) -> Vec<String> {
    match message.metadata().get(key) {
        Some(MetaValue::TextList(items)) => items.clone(),
        other => panic!("{}: expected text list, got {other:?}", message.mnemonic()),
    }
}

#[test]
fn valid_messages_conform_with_exact_length() {
    let catalog = ConstraintCatalog::standard();
    let corpus = corpus();
    let valid = in_category(&corpus, Category::Valid);
    assert!(!valid.is_empty());
    for message in valid {
        let report = inspect(&catalog, message.bytes());
        assert!(
            report.is_conforming(),
            "{}: {:?}",
            message.mnemonic(),
            report.names()
        );
        let envelope = Envelope::decode(message.bytes()).expect("envelope");
        assert_eq!(
            usize::from(envelope.length),
            message.bytes().len() - ENVELOPE_LEN + 1,
            "{}",
            message.mnemonic()
        );
        assert_eq!(envelope.protocol_id, 0);
        assert!(message.violation().is_none());
    }
}

#[test]
fn rejected_messages_are_flagged_by_their_violation() {
    let catalog = ConstraintCatalog::standard();
    let corpus = corpus();
    for message in corpus
        .messages()
        .iter()
        .filter(|message| matches!(message.category(), Category::Malformed | Category::Attack))
    {
        let violation = message
            .violation()
            .unwrap_or_else(|| panic!("{} has no violation", message.mnemonic()));
        let report = inspect(&catalog, message.bytes());
        if violation == "multiple_violations" {
            for component in text_list(message, MetaKey::Violations) {
                assert!(
                    report.has(&component),
                    "{}: {component} not derived from {:?}",
                    message.mnemonic(),
                    report.names()
                );
            }
        } else {
            assert!(
                report.has(violation),
                "{}: {violation} not derived from {:?}",
                message.mnemonic(),
                report.names()
            );
        }
    }
}

#[test]
fn recorded_length_delta_matches_the_bytes() {
    let corpus = corpus();
    let mut checked = 0;
    for message in corpus.messages() {
        let (Some(declared), Some(actual), Some(delta)) = (
            message.meta_int(MetaKey::Declared),
            message.meta_int(MetaKey::Actual),
            message.meta_int(MetaKey::Delta),
        ) else {
            continue;
        };
        assert_eq!(delta, (declared - actual).abs(), "{}", message.mnemonic());

        let frame = match message.meta_int(MetaKey::FirstFrameLen) {
            Some(offset) => &message.bytes()[usize::try_from(offset).expect("offset")..],
            None => message.bytes(),
        };
        let envelope = Envelope::decode(frame).expect("envelope");
        assert_eq!(i64::from(envelope.length), declared, "{}", message.mnemonic());
        let observed = i64::try_from(frame.len() - ENVELOPE_LEN + 1).expect("length");
        assert_eq!(observed, actual, "{}", message.mnemonic());
        checked += 1;
    }
    assert!(checked > 50, "only {checked} length cases");
}

#[test]
fn byte_count_direction_matches_the_quantity() {
    let catalog = ConstraintCatalog::standard();
    let corpus = corpus();
    let mut checked = 0;
    for message in in_category(&corpus, Category::Malformed) {
        let Some(violation) = message.violation() else {
            continue;
        };
        let direction = ["_byte_count_under", "_byte_count_over", "_byte_count_zero"]
            .into_iter()
            .find(|suffix| violation.ends_with(suffix));
        let Some(direction) = direction else {
            continue;
        };

        let pdu = &message.bytes()[ENVELOPE_LEN..];
        let (quantity, byte_count) = match pdu[0] {
            0x0F | 0x10 => (u16::from_be_bytes([pdu[3], pdu[4]]), pdu[5]),
            0x17 => (u16::from_be_bytes([pdu[7], pdu[8]]), pdu[9]),
            other => panic!("{}: unexpected code {other:#04x}", message.mnemonic()),
        };
        let expected = catalog
            .rule_for_code(pdu[0])
            .and_then(|rule| rule.expected_byte_count(quantity))
            .expect("packed write");
        assert_eq!(
            message.meta_int(MetaKey::Expected),
            Some(i64::try_from(expected).expect("expected")),
            "{}",
            message.mnemonic()
        );

        let byte_count = usize::from(byte_count);
        match direction {
            "_byte_count_under" => assert!(byte_count < expected, "{}", message.mnemonic()),
            "_byte_count_over" => assert!(byte_count > expected, "{}", message.mnemonic()),
            _ => assert_eq!(byte_count, 0, "{}", message.mnemonic()),
        }
        checked += 1;
    }
    assert!(checked > 20, "only {checked} byte count cases");
}

#[test]
fn ids_are_unique_and_contiguous_per_category() {
    let corpus = corpus();
    let mut seen: BTreeMap<Category, usize> = BTreeMap::new();
    for record in &corpus.manifest().packets {
        let next = seen.entry(record.category).or_insert(0);
        assert_eq!(record.id, format!("{}_{:04}", record.category, *next));
        assert_eq!(record.filename, format!("{}.bin", record.id));
        *next += 1;
    }
    for category in Category::ALL {
        assert_eq!(
            seen.get(&category).copied().unwrap_or(0),
            corpus.manifest().categories.get(category)
        );
    }
    let manifest = corpus.manifest();
    assert_eq!(manifest.total_packets, manifest.packets.len());
    assert_eq!(manifest.total_packets, manifest.categories.total());
}

fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).expect("read dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .into_owned();
                files.insert(relative, fs::read(&path).expect("read file"));
            }
        }
    }
    files
}

#[test]
fn two_runs_write_identical_trees() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = CorpusConfig::default().with_output_dir(dir.path().join("a"));
    let second = CorpusConfig::default().with_output_dir(dir.path().join("b"));

    let report_a = generate(&first).expect("first run");
    let report_b = generate(&second).expect("second run");
    assert_eq!(report_a.manifest_sha256, report_b.manifest_sha256);

    let tree_a = read_tree(&report_a.root);
    let tree_b = read_tree(&report_b.root);
    assert_eq!(tree_a.len(), report_a.files_written + 2);
    assert!(tree_a == tree_b, "trees differ");

    let manifest = verify_corpus(&report_a.root).expect("verify");
    assert_eq!(manifest.total_packets, report_a.files_written);
}

#[test]
fn first_valid_message_is_a_single_register_read() {
    let corpus = corpus();
    let (record, message) = corpus.entries().next().expect("non-empty corpus");
    assert_eq!(record.id, "valid_0000");
    assert_eq!(message.bytes().len(), 12);
    assert_eq!(
        message.bytes(),
        &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01]
    );
}

#[test]
fn length_under_one_is_described() {
    let corpus = corpus();
    let message = find(&corpus, "mbap_len_under_1");
    assert_eq!(message.violation(), Some("mbap_length_under"));
    assert_eq!(message.meta_int(MetaKey::Declared), Some(1));
    let envelope = Envelope::decode(message.bytes()).expect("envelope");
    assert_eq!(envelope.length, 1);
}

#[test]
fn bit_flips_survive_the_default_cap() {
    let corpus = corpus();
    let fuzz = in_category(&corpus, Category::Fuzz);
    assert_eq!(fuzz.len(), 250);
    let flips = fuzz
        .iter()
        .filter(|message| message.mnemonic().starts_with("bitflip_pos"))
        .count();
    assert_eq!(flips, 96);
}

#[test]
fn file_record_wraps_record_both_lengths() {
    let corpus = corpus();
    let wraps: Vec<&Message> = in_category(&corpus, Category::Attack)
        .into_iter()
        .filter(|message| message.mnemonic().starts_with("cve20685_"))
        .collect();
    assert!(!wraps.is_empty());
    for message in wraps {
        assert!(message.meta_int(MetaKey::RecordLength1).is_some());
        assert!(message.meta_int(MetaKey::RecordLength2).is_some());
        assert_eq!(
            message.metadata().get(MetaKey::Cve).and_then(MetaValue::as_text),
            Some("CVE-2022-20685")
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn fuzz_output_is_a_function_of_the_seed(seed in any::<u64>(), cap in 1_usize..300) {
        let first = fuzz_messages(seed, cap);
        let second = fuzz_messages(seed, cap);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= cap);

        let catalog = ConstraintCatalog::standard();
        for message in &first {
            prop_assert_eq!(message.category(), Category::Fuzz);
            // Arbitrary bytes never panic the inspector.
            let _ = inspect(&catalog, message.bytes());
        }
    }
}
