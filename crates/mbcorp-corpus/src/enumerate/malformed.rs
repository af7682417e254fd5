//! Malformed-category enumerator.
//!
//! One generator per constraint family. Each family violates its constraint
//! at several distances from the boundary, and every message records the
//! violated constraint plus the numeric parameters chosen. Deltas that would
//! need a negative length are skipped, never clamped.

use mbcorp_wire::catalog::COIL_ON;
use mbcorp_wire::{
    ConstraintCatalog, Envelope, OperationKind, Operation, Violation, build_conforming_request,
    frame,
};
use tracing::debug;

use super::TransactionIds;
use super::valid::DEFAULT_UNIT_ID;
use crate::message::{Category, MetaKey, Message};

pub const ENVELOPE_LENGTH_TID_BASE: u16 = 1000;
pub const PROTOCOL_ID_TID_BASE: u16 = 2000;
pub const FUNCTION_CODE_TID_BASE: u16 = 3000;
pub const FC01_TID_BASE: u16 = 4000;
pub const FC03_TID_BASE: u16 = 5000;
pub const FC05_TID_BASE: u16 = 6000;
pub const FC0F_TID_BASE: u16 = 7000;
pub const FC10_TID_BASE: u16 = 8000;
pub const CROSS_FIELD_TID_BASE: u16 = 9000;

/// Tag for messages that stack several independent violations.
pub const MULTIPLE_VIOLATIONS: &str = "multiple_violations";

const PROTOCOL_IDS: [u16; 20] = [
    0x0001, 0x0002, 0x000A, 0x00FF, 0x0100, 0x1234, 0x7FFF, 0x8000, 0xAAAA, 0xDEAD, 0xBEEF,
    0xCAFE, 0xFACE, 0xFEED, 0xFFFF, 0x0003, 0x0004, 0x0005, 0x0010, 0x0080,
];

const EXCEPTION_CODES: [u8; 29] = [
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x8F, 0x90, 0x95, 0x97, 0xA0, 0xB0, 0xC0, 0xD0,
    0xE0, 0xF0, 0xFE, 0xFF, 0x91, 0x92, 0x93, 0x94, 0x96, 0x98, 0x99, 0x9A, 0x9B, 0x9C,
];

const INVALID_COIL_VALUES: [u16; 30] = [
    0x0001, 0x0002, 0x000F, 0x00FF, 0x0100, 0x0F00, 0x1000, 0x1234, 0x5678, 0x7F00, 0x7FFF,
    0x8000, 0x8001, 0xAAAA, 0xBBBB, 0xCCCC, 0xDDDD, 0xEEEE, 0xFE00, 0xFEFF, 0xFF01, 0xFF7F,
    0xFFFE, 0xFFFF, 0xDEAD, 0xBEEF, 0xCAFE, 0xFACE, 0x1111, 0x2222,
];

/// Quantity/overflow violation plan for one address+quantity operation.
struct ReadWindowPlan<'a> {
    kind: OperationKind,
    zero_addresses: &'a [u16],
    over_quantities: &'a [u16],
    overflow_pairs: &'a [(u16, u16)],
}

const FC01_PLAN: ReadWindowPlan<'static> = ReadWindowPlan {
    kind: OperationKind::ReadCoils,
    zero_addresses: &[0x0000, 0x0001, 0x00FF, 0x7FFF, 0xFFFF],
    over_quantities: &[2001, 2048, 3000, 4000, 5000, 10000, 20000, 32000, 50000, 65535],
    overflow_pairs: &[
        (0xFFFF, 1),
        (0xFFFE, 3),
        (0xFF00, 256),
        (0xF000, 4097),
        (0x8000, 0x8001),
        (0xFFF0, 20),
        (0xFFFC, 5),
        (0xFFF8, 10),
        (0xFE00, 600),
        (0xF800, 2100),
        (0xFFFF, 2000),
        (0xFFF0, 2000),
        (0xFF00, 2000),
        (0xF000, 5000),
        (0xE000, 10000),
        (0xC000, 20000),
        (0x8001, 32768),
        (0x7FFF, 32770),
        (0xFFFE, 2),
        (0xFFFD, 4),
    ],
};

const FC03_PLAN: ReadWindowPlan<'static> = ReadWindowPlan {
    kind: OperationKind::ReadHoldingRegisters,
    zero_addresses: &[0x0000, 0x0001, 0x00FF, 0x7FFF, 0xFFFF],
    over_quantities: &[
        126, 127, 128, 150, 200, 255, 256, 500, 1000, 5000, 10000, 30000, 65535,
    ],
    overflow_pairs: &[
        (0xFFFF, 1),
        (0xFFFE, 2),
        (0xFF82, 125),
        (0xFF00, 125),
        (0xF000, 125),
        (0xFFFF, 125),
        (0xFFF0, 125),
        (0xFF80, 130),
        (0xFF00, 256),
        (0xF000, 5000),
        (0x8000, 32768),
        (0xFFFD, 4),
        (0xFFFC, 5),
        (0xFFF0, 20),
        (0xFFE0, 50),
        (0xFFC0, 100),
        (0xFF00, 300),
        (0xFE00, 600),
        (0xFC00, 1100),
        (0xE000, 10000),
    ],
};

const FC02_PLAN: ReadWindowPlan<'static> = ReadWindowPlan {
    kind: OperationKind::ReadDiscreteInputs,
    zero_addresses: &[0x0000, 0x0100, 0xFFFF],
    over_quantities: &[2001, 5000, 10000, 65535],
    overflow_pairs: &[
        (0xFFFF, 1),
        (0xFFFE, 3),
        (0xFF00, 256),
        (0xF000, 4097),
        (0xFFFF, 2000),
        (0xFFF0, 2000),
    ],
};

const FC04_PLAN: ReadWindowPlan<'static> = ReadWindowPlan {
    kind: OperationKind::ReadInputRegisters,
    zero_addresses: &[0x0000, 0x0100, 0xFFFF],
    over_quantities: &[126, 200, 500, 1000, 65535],
    overflow_pairs: &[(0xFFFF, 1), (0xFFFE, 2), (0xFF82, 125), (0xFFFF, 125)],
};

/// Enumerate every malformed family in order.
#[must_use]
pub fn malformed_messages(catalog: &ConstraintCatalog) -> Vec<Message> {
    let families: [(&str, Vec<Message>); 9] = [
        ("envelope_length", envelope_length()),
        ("protocol_id", protocol_id()),
        ("function_code", function_codes(catalog)),
        (
            "fc01",
            read_window(
                &FC01_PLAN,
                &mut TransactionIds::starting_at(FC01_TID_BASE),
            ),
        ),
        (
            "fc03",
            read_window(
                &FC03_PLAN,
                &mut TransactionIds::starting_at(FC03_TID_BASE),
            ),
        ),
        ("fc05", single_coil_values()),
        ("fc0f", multiple_coils(catalog)),
        ("fc10", multiple_registers(catalog)),
        ("cross_field", cross_field(catalog)),
    ];

    let mut out = Vec::new();
    for (family, messages) in families {
        debug!(family, count = messages.len(), "malformed family generated");
        out.extend(messages);
    }
    out
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn malformed(mnemonic: String, bytes: Vec<u8>, violation: &str) -> Message {
    Message::new(Category::Malformed, mnemonic, bytes).with(MetaKey::Violation, violation)
}

fn raw_frame(transaction_id: u16, protocol_id: u16, length: u16, pdu: &[u8]) -> Vec<u8> {
    frame(
        Envelope::new(transaction_id, protocol_id, length, DEFAULT_UNIT_ID),
        pdu,
    )
}

fn conforming(transaction_id: u16, op: &Operation) -> Vec<u8> {
    build_conforming_request(transaction_id, DEFAULT_UNIT_ID, op)
}

/// Envelope length that exactly describes `pdu`.
fn exact_length(pdu: &[u8]) -> usize {
    ConstraintCatalog::expected_envelope_length(pdu.len())
}

fn exact_length_u16(pdu: &[u8]) -> u16 {
    u16::try_from(exact_length(pdu)).unwrap_or(u16::MAX)
}

fn minimal_read_pdu() -> Vec<u8> {
    Operation::ReadHoldingRegisters {
        address: 0,
        quantity: 1,
    }
    .encode()
}

/// Fifty-register write with a matching 100-byte payload (107-byte envelope length).
fn large_write_pdu() -> Vec<u8> {
    Operation::WriteMultipleRegisters {
        address: 0,
        quantity: 50,
        byte_count: 100,
        payload: vec![0; 100],
    }
    .encode()
}

fn count_u8(count: usize) -> Option<u8> {
    u8::try_from(count).ok()
}

// ── Envelope length ─────────────────────────────────────────────────────

fn declared_length(
    mnemonic: String,
    transaction_id: u16,
    pdu: &[u8],
    declared: u16,
    violation: Violation,
) -> Message {
    let actual = exact_length(pdu);
    malformed(
        mnemonic,
        raw_frame(transaction_id, 0, declared, pdu),
        &violation.name(),
    )
    .with(MetaKey::Declared, declared)
    .with(MetaKey::Actual, actual)
    .with(MetaKey::Delta, actual.abs_diff(usize::from(declared)))
}

fn envelope_length() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(ENVELOPE_LENGTH_TID_BASE);
    let mut out = Vec::new();
    let small = minimal_read_pdu();
    let large = large_write_pdu();

    for declared in 1_u16..=5 {
        out.push(declared_length(
            format!("mbap_len_under_{declared}"),
            tids.next_id(),
            &small,
            declared,
            Violation::LengthUnder,
        ));
    }
    for declared in [5_u16, 10, 20, 50, 60] {
        out.push(declared_length(
            format!("mbap_len_under_large_{declared}"),
            tids.next_id(),
            &large,
            declared,
            Violation::LengthUnder,
        ));
    }
    for declared in [10_u16, 20, 50, 100, 200, 255, 500, 1000, 5000, 10000] {
        out.push(declared_length(
            format!("mbap_len_over_{declared}"),
            tids.next_id(),
            &small,
            declared,
            Violation::LengthOver,
        ));
    }

    // Each delta runs against the smallest base that can absorb it.
    for delta in 1_usize..=45 {
        let base = if delta < exact_length(&small) {
            &small
        } else {
            &large
        };
        let Some(declared) = exact_length(base)
            .checked_sub(delta)
            .and_then(|len| u16::try_from(len).ok())
        else {
            continue;
        };
        out.push(declared_length(
            format!("mbap_len_delta_under_{delta}"),
            tids.next_id(),
            base,
            declared,
            Violation::LengthUnder,
        ));
    }
    for delta in [1_usize, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000, 30000, 65000] {
        let Ok(declared) = u16::try_from(exact_length(&small) + delta) else {
            continue;
        };
        out.push(declared_length(
            format!("mbap_len_delta_over_{delta}"),
            tids.next_id(),
            &small,
            declared,
            Violation::LengthOver,
        ));
    }

    for kind in [
        OperationKind::ReadCoils,
        OperationKind::ReadHoldingRegisters,
        OperationKind::WriteSingleCoil,
    ] {
        let pdu = Operation::read(kind, 0, 1).encode();
        out.push(
            declared_length(
                format!("mbap_len_zero_fc{:02x}", kind.function_code()),
                tids.next_id(),
                &pdu,
                0,
                Violation::LengthZero,
            )
            .with(MetaKey::FunctionCode, kind.function_code()),
        );
    }
    out.push(declared_length(
        "mbap_len_max".to_owned(),
        tids.next_id(),
        &small,
        u16::MAX,
        Violation::LengthMax,
    ));
    out
}

// ── Protocol id and function codes ──────────────────────────────────────

fn protocol_id() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(PROTOCOL_ID_TID_BASE);
    let pdu = minimal_read_pdu();
    PROTOCOL_IDS
        .into_iter()
        .map(|protocol_id| {
            malformed(
                format!("proto_id_{protocol_id:#06x}"),
                raw_frame(tids.next_id(), protocol_id, exact_length_u16(&pdu), &pdu),
                &Violation::ProtocolIdNonzero.name(),
            )
            .with(MetaKey::ProtocolId, protocol_id)
        })
        .collect()
}

fn function_codes(catalog: &ConstraintCatalog) -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(FUNCTION_CODE_TID_BASE);
    let mut out = Vec::new();
    for code in catalog
        .reserved_function_codes()
        .take_while(|&code| code < 0x30)
    {
        let pdu = Operation::Raw {
            function_code: code,
            data: vec![0x00, 0x00, 0x00, 0x01],
        }
        .encode();
        out.push(
            malformed(
                format!("fc_reserved_{code:#04x}"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::ReservedFunctionCode.name(),
            )
            .with(MetaKey::FunctionCode, code),
        );
    }
    for code in EXCEPTION_CODES {
        let pdu = [code, 0x01];
        out.push(
            malformed(
                format!("fc_exception_{code:#04x}"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::ExceptionCodeAsRequest.name(),
            )
            .with(MetaKey::FunctionCode, code),
        );
    }
    out
}

/// Raw operation unit behind an envelope whose length is exact.
fn conforming_raw(transaction_id: u16, pdu: &[u8]) -> Vec<u8> {
    raw_frame(transaction_id, 0, exact_length_u16(pdu), pdu)
}

// ── Quantity windows ────────────────────────────────────────────────────

fn read_window(plan: &ReadWindowPlan<'_>, tids: &mut TransactionIds) -> Vec<Message> {
    let kind = plan.kind;
    let code = kind.function_code();
    let mut out = Vec::new();

    for &address in plan.zero_addresses {
        out.push(
            malformed(
                format!("fc{code:02x}_qty0_addr{address:#06x}"),
                conforming(tids.next_id(), &Operation::read(kind, address, 0)),
                &Violation::QuantityZero(code).name(),
            )
            .with(MetaKey::Address, address)
            .with(MetaKey::Quantity, 0_u16),
        );
    }
    for &quantity in plan.over_quantities {
        out.push(
            malformed(
                format!("fc{code:02x}_qty_over_{quantity}"),
                conforming(tids.next_id(), &Operation::read(kind, 0, quantity)),
                &Violation::QuantityOver(code).name(),
            )
            .with(MetaKey::Address, 0_u16)
            .with(MetaKey::Quantity, quantity),
        );
    }
    for &(address, quantity) in plan
        .overflow_pairs
        .iter()
        .filter(|(address, quantity)| ConstraintCatalog::address_overflows(*address, *quantity))
    {
        out.push(
            malformed(
                format!("fc{code:02x}_overflow_a{address:#06x}_q{quantity}"),
                conforming(tids.next_id(), &Operation::read(kind, address, quantity)),
                &Violation::AddressOverflow(code).name(),
            )
            .with(MetaKey::Address, address)
            .with(MetaKey::Quantity, quantity),
        );
    }
    out
}

fn single_coil_values() -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(FC05_TID_BASE);
    let code = OperationKind::WriteSingleCoil.function_code();
    INVALID_COIL_VALUES
        .into_iter()
        .map(|value| {
            malformed(
                format!("fc05_invalid_val_{value:#06x}"),
                conforming(
                    tids.next_id(),
                    &Operation::WriteSingleCoil { address: 0, value },
                ),
                &Violation::InvalidValue(code).name(),
            )
            .with(MetaKey::Value, value)
        })
        .collect()
}

// ── Byte counts ─────────────────────────────────────────────────────────

/// Multiple-write unit with explicit quantity and byte count, `byte_count` fill bytes.
fn multiple_write(kind: OperationKind, quantity: u16, byte_count: u8, fill: u8) -> Operation {
    let payload = vec![fill; usize::from(byte_count)];
    match kind {
        OperationKind::WriteMultipleCoils => Operation::WriteMultipleCoils {
            address: 0,
            quantity,
            byte_count,
            payload,
        },
        _ => Operation::WriteMultipleRegisters {
            address: 0,
            quantity,
            byte_count,
            payload,
        },
    }
}

/// Byte counts below and above the packing formula for each quantity.
fn byte_count_mismatches(
    catalog: &ConstraintCatalog,
    kind: OperationKind,
    tids: &mut TransactionIds,
    quantities: &[u16],
    fewer: &[usize],
    more: &[usize],
    fill: u8,
) -> Vec<Message> {
    let rule = catalog.rule(kind);
    let code = kind.function_code();
    let mut out = Vec::new();

    for &quantity in quantities {
        let Some(expected) = rule.expected_byte_count(quantity) else {
            continue;
        };
        for &less in fewer.iter().filter(|&&less| less < expected) {
            let Some(byte_count) = count_u8(expected - less) else {
                continue;
            };
            out.push(
                malformed(
                    format!("fc{code:02x}_bytes_under_q{quantity}_b{byte_count}"),
                    conforming(tids.next_id(), &multiple_write(kind, quantity, byte_count, fill)),
                    &Violation::ByteCountUnder(code).name(),
                )
                .with(MetaKey::Quantity, quantity)
                .with(MetaKey::ByteCount, byte_count)
                .with(MetaKey::Expected, expected),
            );
        }
    }
    for &quantity in quantities {
        let Some(expected) = rule.expected_byte_count(quantity) else {
            continue;
        };
        for &extra in more {
            let Some(byte_count) = count_u8(expected + extra) else {
                continue;
            };
            out.push(
                malformed(
                    format!("fc{code:02x}_bytes_over_q{quantity}_b{byte_count}"),
                    conforming(tids.next_id(), &multiple_write(kind, quantity, byte_count, fill)),
                    &Violation::ByteCountOver(code).name(),
                )
                .with(MetaKey::Quantity, quantity)
                .with(MetaKey::ByteCount, byte_count)
                .with(MetaKey::Expected, expected),
            );
        }
    }
    out
}

fn multiple_coils(catalog: &ConstraintCatalog) -> Vec<Message> {
    let kind = OperationKind::WriteMultipleCoils;
    let code = kind.function_code();
    let mut tids = TransactionIds::starting_at(FC0F_TID_BASE);
    let mut out = byte_count_mismatches(
        catalog,
        kind,
        &mut tids,
        &[8, 16, 32, 64, 100],
        &[1, 2, 3, 4],
        &[1, 2, 5, 10],
        0xFF,
    );
    for byte_count in [1_u8, 2, 5] {
        out.push(
            malformed(
                format!("fc0f_qty0_bytes{byte_count}"),
                conforming(tids.next_id(), &multiple_write(kind, 0, byte_count, 0xFF)),
                &Violation::QuantityZeroWithData(code).name(),
            )
            .with(MetaKey::Quantity, 0_u16)
            .with(MetaKey::ByteCount, byte_count),
        );
    }
    out
}

fn multiple_registers(catalog: &ConstraintCatalog) -> Vec<Message> {
    let kind = OperationKind::WriteMultipleRegisters;
    let code = kind.function_code();
    let mut tids = TransactionIds::starting_at(FC10_TID_BASE);
    let mut out = byte_count_mismatches(
        catalog,
        kind,
        &mut tids,
        &[2, 5, 10, 20, 50],
        &[1, 2, 4, 10],
        &[1, 2, 4, 10, 20],
        0x00,
    );
    // Byte count capped at 250 so it still fits the field.
    for quantity in [124_u16, 125, 126, 150, 200, 255] {
        let byte_count = count_u8(usize::from(quantity) * 2).map_or(250, |count| count.min(250));
        out.push(
            malformed(
                format!("fc10_qty_over_{quantity}"),
                conforming(tids.next_id(), &multiple_write(kind, quantity, byte_count, 0x00)),
                &Violation::QuantityOver(code).name(),
            )
            .with(MetaKey::Quantity, quantity)
            .with(MetaKey::ByteCount, byte_count),
        );
    }
    out
}

// ── Cross-field ─────────────────────────────────────────────────────────

fn cross_field(catalog: &ConstraintCatalog) -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(CROSS_FIELD_TID_BASE);
    let mut out = Vec::new();

    pdu_lengths(catalog, &mut tids, &mut out);

    let coils = OperationKind::WriteMultipleCoils;
    for quantity in [1969_u16, 2000, 5000, 10000] {
        let byte_count = count_u8(usize::from(quantity).div_ceil(8)).map_or(246, |count| count.min(246));
        out.push(
            malformed(
                format!("fc0f_qty_over_{quantity}"),
                conforming(tids.next_id(), &multiple_write(coils, quantity, byte_count, 0xFF)),
                &Violation::QuantityOver(coils.function_code()).name(),
            )
            .with(MetaKey::Quantity, quantity)
            .with(MetaKey::ByteCount, byte_count),
        );
    }

    for kind in [
        OperationKind::ReadCoils,
        OperationKind::ReadHoldingRegisters,
        OperationKind::WriteSingleRegister,
    ] {
        let pdu = Operation::read(kind, 0, 1).encode();
        out.push(
            declared_length(
                format!("mbap_len_1_fc{:02x}", kind.function_code()),
                tids.next_id(),
                &pdu,
                1,
                Violation::LengthOneWithPdu,
            )
            .with(MetaKey::FunctionCode, kind.function_code()),
        );
    }

    byte_count_zero(catalog, &mut tids, &mut out);

    let registers = OperationKind::WriteMultipleRegisters;
    for quantity in [1_u16, 5, 10] {
        let Some(byte_count) = count_u8(usize::from(quantity) * 2 + 1) else {
            continue;
        };
        out.push(
            malformed(
                format!("fc10_odd_bytecnt_q{quantity}"),
                conforming(tids.next_id(), &multiple_write(registers, quantity, byte_count, 0x00)),
                &Violation::OddByteCount(registers.function_code()).name(),
            )
            .with(MetaKey::Quantity, quantity)
            .with(MetaKey::ByteCount, byte_count),
        );
    }

    composites(&mut tids, &mut out);
    trailing(&mut tids, &mut out);
    read_write_windows(catalog, &mut tids, &mut out);
    out.extend(read_window(&FC02_PLAN, &mut tids));
    out.extend(read_window(&FC04_PLAN, &mut tids));
    out
}

fn pdu_lengths(catalog: &ConstraintCatalog, tids: &mut TransactionIds, out: &mut Vec<Message>) {
    for kind in [
        OperationKind::ReadHoldingRegisters,
        OperationKind::WriteSingleCoil,
        OperationKind::WriteMultipleRegisters,
        OperationKind::ReadWriteMultipleRegisters,
        OperationKind::ReadDeviceIdentification,
    ] {
        let code = kind.function_code();
        let needed = catalog.rule(kind).shape.header_len();
        let step = if needed > 5 { 4 } else { 1 };
        for short in (0..needed).step_by(step) {
            let mut pdu = vec![code];
            pdu.resize(1 + short, 0);
            out.push(
                malformed(
                    format!("pdu_too_short_fc{code:02x}_{short}b"),
                    conforming_raw(tids.next_id(), &pdu),
                    &Violation::PduTooShort.name(),
                )
                .with(MetaKey::FunctionCode, code)
                .with(MetaKey::PduDataLen, short),
            );
        }
    }

    for extra in [1_usize, 2, 5, 10, 50, 100] {
        let mut pdu = minimal_read_pdu();
        pdu.resize(pdu.len() + extra, 0);
        out.push(
            malformed(
                format!("pdu_too_long_fc03_{extra}extra"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::PduTooLong.name(),
            )
            .with(MetaKey::FunctionCode, 0x03_u8)
            .with(MetaKey::ExtraBytes, extra),
        );
    }

    out.push(malformed(
        "empty_pdu".to_owned(),
        conforming_raw(tids.next_id(), &[]),
        &Violation::EmptyPdu.name(),
    ));

    for size in [253_usize, 260, 500, 1000] {
        let mut pdu = vec![OperationKind::ReadHoldingRegisters.function_code()];
        pdu.resize(1 + size, 0);
        out.push(
            malformed(
                format!("oversized_pdu_{size}"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::OversizedPdu.name(),
            )
            .with(MetaKey::PduDataLen, size),
        );
    }
}

fn byte_count_zero(catalog: &ConstraintCatalog, tids: &mut TransactionIds, out: &mut Vec<Message>) {
    for (kind, quantities) in [
        (OperationKind::WriteMultipleRegisters, [1_u16, 5, 10, 50, 100]),
        (OperationKind::WriteMultipleCoils, [1, 8, 16, 100, 1000]),
    ] {
        let code = kind.function_code();
        for quantity in quantities {
            let expected = catalog.rule(kind).expected_byte_count(quantity).unwrap_or(0);
            out.push(
                malformed(
                    format!("fc{code:02x}_bytecnt0_qty{quantity}"),
                    conforming(tids.next_id(), &multiple_write(kind, quantity, 0, 0)),
                    &Violation::ByteCountZero(code).name(),
                )
                .with(MetaKey::Quantity, quantity)
                .with(MetaKey::ByteCount, 0_u8)
                .with(MetaKey::Expected, expected),
            );
        }
    }
}

/// Protocol id, envelope length and function code all wrong at once.
fn composites(tids: &mut TransactionIds, out: &mut Vec<Message>) {
    for protocol_id in [0x0001_u16, 0xFFFF] {
        for length_delta in [-3_i32, 100] {
            for code in [0x00_u8, 0x80] {
                let pdu = [code, 0x00, 0x00, 0x00, 0x01];
                let actual = exact_length(&pdu);
                let Some(declared) = isize::try_from(length_delta)
                    .ok()
                    .and_then(|delta| actual.checked_add_signed(delta))
                    .filter(|&len| len >= 1)
                    .and_then(|len| u16::try_from(len).ok())
                else {
                    continue;
                };
                let length_violation = if usize::from(declared) < actual {
                    Violation::LengthUnder
                } else {
                    Violation::LengthOver
                };
                let code_violation = if ConstraintCatalog::is_exception_code(code) {
                    Violation::ExceptionCodeAsRequest
                } else {
                    Violation::ReservedFunctionCode
                };
                let components = vec![
                    Violation::ProtocolIdNonzero.name(),
                    length_violation.name(),
                    code_violation.name(),
                ];
                out.push(
                    malformed(
                        format!("multi_violation_p{protocol_id:#06x}_d{length_delta}_fc{code:#04x}"),
                        raw_frame(tids.next_id(), protocol_id, declared, &pdu),
                        MULTIPLE_VIOLATIONS,
                    )
                    .with(MetaKey::Violations, components)
                    .with(MetaKey::ProtocolId, protocol_id)
                    .with(MetaKey::LengthDelta, length_delta)
                    .with(MetaKey::FunctionCode, code)
                    .with(MetaKey::Declared, declared)
                    .with(MetaKey::Actual, actual),
                );
            }
        }
    }
}

fn trailing(tids: &mut TransactionIds, out: &mut Vec<Message>) {
    let read = minimal_read_pdu();
    for extra in [1_usize, 2, 4, 8, 16, 32, 64, 128, 200] {
        let mut pdu = read.clone();
        pdu.resize(pdu.len() + extra, 0xAA);
        out.push(
            malformed(
                format!("fc03_trailing_{extra}b"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::TrailingData.name(),
            )
            .with(MetaKey::FunctionCode, 0x03_u8)
            .with(MetaKey::ExtraBytes, extra),
        );
    }
    let coil = Operation::WriteSingleCoil {
        address: 0,
        value: COIL_ON,
    }
    .encode();
    for extra in [1_usize, 2, 4, 10] {
        let mut pdu = coil.clone();
        pdu.resize(pdu.len() + extra, 0);
        out.push(
            malformed(
                format!("fc05_trailing_{extra}b"),
                conforming_raw(tids.next_id(), &pdu),
                &Violation::TrailingData.name(),
            )
            .with(MetaKey::FunctionCode, 0x05_u8)
            .with(MetaKey::ExtraBytes, extra),
        );
    }
}

/// Read window, write window and byte count of the combined read/write request.
fn read_write_windows(
    catalog: &ConstraintCatalog,
    tids: &mut TransactionIds,
    out: &mut Vec<Message>,
) {
    let kind = OperationKind::ReadWriteMultipleRegisters;
    let code = kind.function_code();
    let rule = catalog.rule(kind);
    let write_base = 0x0010;

    out.push(
        malformed(
            "fc17_read_qty0".to_owned(),
            conforming(tids.next_id(), &Operation::read_write_registers(0, 0, write_base, &[0])),
            &Violation::QuantityZero(code).name(),
        )
        .with(MetaKey::ReadQuantity, 0_u16),
    );
    for read_quantity in [126_u16, 200] {
        out.push(
            malformed(
                format!("fc17_read_qty_over_{read_quantity}"),
                conforming(
                    tids.next_id(),
                    &Operation::read_write_registers(0, read_quantity, write_base, &[0]),
                ),
                &Violation::QuantityOver(code).name(),
            )
            .with(MetaKey::ReadQuantity, read_quantity),
        );
    }
    out.push(
        malformed(
            "fc17_write_qty0".to_owned(),
            conforming(tids.next_id(), &Operation::read_write_registers(0, 1, write_base, &[])),
            &Violation::WriteQuantityZero(code).name(),
        )
        .with(MetaKey::WriteQuantity, 0_u16),
    );
    for write_quantity in [122_u16, 125] {
        let values = vec![0_u16; usize::from(write_quantity)];
        out.push(
            malformed(
                format!("fc17_write_qty_over_{write_quantity}"),
                conforming(
                    tids.next_id(),
                    &Operation::read_write_registers(0, 1, write_base, &values),
                ),
                &Violation::WriteQuantityOver(code).name(),
            )
            .with(MetaKey::WriteQuantity, write_quantity),
        );
    }
    out.push(
        malformed(
            "fc17_read_overflow_a0xffff_q1".to_owned(),
            conforming(
                tids.next_id(),
                &Operation::read_write_registers(0xFFFF, 1, write_base, &[0]),
            ),
            &Violation::AddressOverflow(code).name(),
        )
        .with(MetaKey::ReadAddress, 0xFFFF_u16)
        .with(MetaKey::ReadQuantity, 1_u16),
    );

    let write_quantity = 5_u16;
    let Some(expected) = rule.expected_byte_count(write_quantity) else {
        return;
    };
    for (byte_count, violation) in [
        (expected - 2, Violation::ByteCountUnder(code)),
        (expected + 2, Violation::ByteCountOver(code)),
    ] {
        let Some(field) = count_u8(byte_count) else {
            continue;
        };
        let op = Operation::ReadWriteMultipleRegisters {
            read_address: 0,
            read_quantity: 1,
            write_address: write_base,
            write_quantity,
            byte_count: field,
            payload: vec![0; byte_count],
        };
        let direction = if byte_count < expected { "under" } else { "over" };
        out.push(
            malformed(
                format!("fc17_bytes_{direction}_w{write_quantity}_b{byte_count}"),
                conforming(tids.next_id(), &op),
                &violation.name(),
            )
            .with(MetaKey::WriteQuantity, write_quantity)
            .with(MetaKey::ByteCount, byte_count)
            .with(MetaKey::Expected, expected),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbcorp_wire::inspect;
    use std::collections::BTreeSet;

    fn messages() -> Vec<Message> {
        malformed_messages(&ConstraintCatalog::standard())
    }

    fn find<'a>(messages: &'a [Message], mnemonic: &str) -> &'a Message {
        messages
            .iter()
            .find(|m| m.mnemonic() == mnemonic)
            .unwrap_or_else(|| panic!("{mnemonic} missing"))
    }

    #[test]
    fn mnemonics_are_unique() {
        let messages = messages();
        let names: BTreeSet<&str> = messages.iter().map(Message::mnemonic).collect();
        assert_eq!(names.len(), messages.len());
    }

    #[test]
    fn every_message_records_a_violation() {
        for message in messages() {
            assert!(message.violation().is_some(), "{}", message.mnemonic());
        }
    }

    #[test]
    fn length_under_one_records_exact_delta() {
        let messages = messages();
        let msg = find(&messages, "mbap_len_under_1");
        assert_eq!(msg.meta_int(MetaKey::Declared), Some(1));
        assert_eq!(msg.meta_int(MetaKey::Actual), Some(6));
        assert_eq!(msg.meta_int(MetaKey::Delta), Some(5));
        assert_eq!(&msg.bytes()[4..6], &[0x00, 0x01]);
    }

    #[test]
    fn large_deltas_switch_to_the_large_base() {
        let messages = messages();
        let msg = find(&messages, "mbap_len_delta_under_45");
        assert_eq!(msg.meta_int(MetaKey::Declared), Some(62));
        assert_eq!(msg.meta_int(MetaKey::Actual), Some(107));
        assert!(inspect(&ConstraintCatalog::standard(), msg.bytes()).has("mbap_length_under"));
    }

    #[test]
    fn reserved_codes_below_0x30_are_all_covered() {
        let messages = messages();
        let reserved = messages
            .iter()
            .filter(|m| m.violation() == Some("reserved_function_code"))
            .count();
        assert_eq!(reserved, 30);
    }

    #[test]
    fn register_byte_count_guard_skips_non_positive_counts() {
        let messages = messages();
        assert!(messages.iter().all(|m| m.mnemonic() != "fc10_bytes_under_q2_b0"));
        let under_q2 = messages
            .iter()
            .filter(|m| m.mnemonic().starts_with("fc10_bytes_under_q2_"))
            .count();
        assert_eq!(under_q2, 2);
    }

    #[test]
    fn overflow_pairs_that_do_not_overflow_are_dropped() {
        let messages = messages();
        assert!(
            messages
                .iter()
                .all(|m| m.mnemonic() != "fc03_overflow_a0xff82_q125")
        );
    }

    #[test]
    fn composites_list_their_components() {
        let messages = messages();
        let msg = find(&messages, "multi_violation_p0x0001_d-3_fc0x80");
        let report = inspect(&ConstraintCatalog::standard(), msg.bytes());
        for name in [
            "protocol_id_nonzero",
            "mbap_length_under",
            "exception_code_as_request",
        ] {
            assert!(report.has(name), "{name}");
        }
    }
}
