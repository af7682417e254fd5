//! Constraint inspector.
//!
//! Evaluates every catalog constraint against raw message bytes and reports
//! all derivable violations. This is not a protocol stack: it answers which
//! documented rules fail and nothing else. Arbitrary input never panics.

use crate::catalog::{
    ConstraintCatalog, FILE_RECORD_REFERENCE_TYPE, MEI_READ_DEVICE_ID, OperationRule, Packing,
    QuantityRule, Shape, Violation,
};
use crate::envelope::{ENVELOPE_LEN, Envelope};
use crate::operation::FileSubRequest;

/// Result of inspecting one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// `None` when fewer than seven bytes were present.
    pub envelope: Option<Envelope>,
    /// `None` when the operation unit is empty.
    pub function_code: Option<u8>,
    /// Every violation found, in check order, without duplicates.
    pub violations: Vec<Violation>,
}

impl Inspection {
    #[must_use]
    pub fn is_conforming(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether a violation with manifest tag `name` was derived.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.violations.iter().any(|violation| violation.name() == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.violations.iter().map(|violation| violation.name()).collect()
    }
}

/// Inspect a single framed message against `catalog`.
#[must_use]
pub fn inspect(catalog: &ConstraintCatalog, bytes: &[u8]) -> Inspection {
    let mut found = Findings::default();
    let Some(envelope) = Envelope::decode(bytes) else {
        found.flag(Violation::TruncatedEnvelope);
        return Inspection {
            envelope: None,
            function_code: None,
            violations: found.0,
        };
    };
    let pdu = bytes.get(ENVELOPE_LEN..).unwrap_or_default();

    check_envelope(envelope, pdu.len(), &mut found);

    let function_code = pdu.first().copied();
    match pdu.split_first() {
        None => found.flag(Violation::EmptyPdu),
        Some((&code, data)) => {
            if pdu.len() > catalog.max_pdu_len() {
                found.flag(Violation::OversizedPdu);
            }
            check_operation(catalog, code, data, &mut found);
        }
    }

    Inspection {
        envelope: Some(envelope),
        function_code,
        violations: found.0,
    }
}

#[derive(Default)]
struct Findings(Vec<Violation>);

impl Findings {
    fn flag(&mut self, violation: Violation) {
        if !self.0.contains(&violation) {
            self.0.push(violation);
        }
    }
}

fn check_envelope(envelope: Envelope, pdu_len: usize, found: &mut Findings) {
    if envelope.protocol_id != 0 {
        found.flag(Violation::ProtocolIdNonzero);
    }
    let declared = usize::from(envelope.length);
    let actual = ConstraintCatalog::expected_envelope_length(pdu_len);
    if declared < actual {
        found.flag(Violation::LengthUnder);
        match declared {
            0 => found.flag(Violation::LengthZero),
            1 => found.flag(Violation::LengthOneWithPdu),
            _ => {}
        }
    } else if declared > actual {
        found.flag(Violation::LengthOver);
        if envelope.length == u16::MAX {
            found.flag(Violation::LengthMax);
        }
    }
}

fn check_operation(catalog: &ConstraintCatalog, code: u8, data: &[u8], found: &mut Findings) {
    if ConstraintCatalog::is_exception_code(code) {
        found.flag(Violation::ExceptionCodeAsRequest);
        return;
    }
    if catalog.is_reserved(code) {
        found.flag(Violation::ReservedFunctionCode);
        return;
    }
    // Public codes without a catalog row and user-defined codes carry no shape rules.
    let Some(rule) = catalog.rule_for_code(code) else {
        return;
    };

    let shape = rule.shape;
    if data.len() < shape.header_len() {
        found.flag(Violation::PduTooShort);
        return;
    }
    if shape.is_fixed() && data.len() > shape.header_len() {
        found.flag(Violation::PduTooLong);
        found.flag(Violation::TrailingData);
    }

    match shape {
        Shape::AddressQuantity => {
            if let Some(quantity) = rule.quantity {
                check_window(
                    code,
                    quantity,
                    word(data, 0),
                    word(data, 2),
                    Window::Primary,
                    found,
                );
            }
        }
        Shape::AddressValue => {
            if !rule.accepts_value(word(data, 2)) {
                found.flag(Violation::InvalidValue(code));
            }
        }
        Shape::MultipleWrite => {
            let quantity = word(data, 2);
            if let Some(limits) = rule.quantity {
                check_window(code, limits, word(data, 0), quantity, Window::Primary, found);
            }
            if quantity == 0 && data[4] > 0 {
                found.flag(Violation::QuantityZeroWithData(code));
            }
            check_byte_count(rule, quantity, data[4], found);
            check_payload_len(usize::from(data[4]), &data[5..], found);
        }
        Shape::ReadWriteMultiple => {
            if let Some(limits) = rule.quantity {
                check_window(code, limits, word(data, 0), word(data, 2), Window::Primary, found);
            }
            let write_quantity = word(data, 6);
            if let Some(limits) = rule.write_quantity {
                check_window(code, limits, word(data, 4), write_quantity, Window::Write, found);
            }
            check_byte_count(rule, write_quantity, data[8], found);
            check_payload_len(usize::from(data[8]), &data[9..], found);
        }
        Shape::FileRecord => check_file_record(catalog, code, data, found),
        Shape::DeviceIdentification => {
            if data[0] != MEI_READ_DEVICE_ID {
                found.flag(Violation::InvalidMeiType(code));
            }
            if !catalog.device_id_read_codes().contains(&data[1]) {
                found.flag(Violation::InvalidReadCode(code));
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Window {
    Primary,
    Write,
}

fn check_window(
    code: u8,
    limits: QuantityRule,
    address: u16,
    quantity: u16,
    window: Window,
    found: &mut Findings,
) {
    let (zero, over, overflow) = match window {
        Window::Primary => (
            Violation::QuantityZero(code),
            Violation::QuantityOver(code),
            Violation::AddressOverflow(code),
        ),
        Window::Write => (
            Violation::WriteQuantityZero(code),
            Violation::WriteQuantityOver(code),
            Violation::WriteAddressOverflow(code),
        ),
    };
    if quantity < limits.min {
        found.flag(zero);
    } else if quantity > limits.max {
        found.flag(over);
    }
    if limits.overflow_checked && ConstraintCatalog::address_overflows(address, quantity) {
        found.flag(overflow);
    }
}

fn check_byte_count(rule: &OperationRule, quantity: u16, byte_count: u8, found: &mut Findings) {
    let code = rule.function_code();
    if rule.packing == Some(Packing::Registers) && byte_count % 2 == 1 {
        found.flag(Violation::OddByteCount(code));
    }
    if quantity == 0 {
        return;
    }
    let Some(expected) = rule.expected_byte_count(quantity) else {
        return;
    };
    let declared = usize::from(byte_count);
    if declared == 0 {
        found.flag(Violation::ByteCountZero(code));
    }
    if declared < expected {
        found.flag(Violation::ByteCountUnder(code));
    } else if declared > expected {
        found.flag(Violation::ByteCountOver(code));
    }
}

fn check_payload_len(declared: usize, payload: &[u8], found: &mut Findings) {
    if payload.len() < declared {
        found.flag(Violation::PduTooShort);
    } else if payload.len() > declared {
        found.flag(Violation::PduTooLong);
        found.flag(Violation::TrailingData);
    }
}

fn check_file_record(catalog: &ConstraintCatalog, code: u8, data: &[u8], found: &mut Findings) {
    let byte_count = data[0];
    if !catalog.file_record_byte_count().contains(&byte_count) {
        found.flag(Violation::ByteCountOutOfRange(code));
    }
    let records = &data[1..];
    check_payload_len(usize::from(byte_count), records, found);

    let mut rest = &records[..records.len().min(usize::from(byte_count))];
    while !rest.is_empty() {
        if rest.len() < FileSubRequest::HEADER_LEN {
            found.flag(Violation::TruncatedSubrequest(code));
            break;
        }
        if rest[0] != FILE_RECORD_REFERENCE_TYPE {
            found.flag(Violation::InvalidReferenceType(code));
        }
        let record_bytes = usize::from(word(rest, 5)) * 2;
        let body = &rest[FileSubRequest::HEADER_LEN..];
        if record_bytes > body.len() {
            found.flag(Violation::RecordLengthOverrun(code));
            break;
        }
        rest = &body[record_bytes..];
    }
}

/// Big-endian word at `offset`; callers have checked the length.
fn word(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OperationKind;
    use crate::envelope::{encode_envelope, frame};
    use crate::operation::{Operation, build_conforming_request};
    use proptest::prelude::*;

    fn catalog() -> ConstraintCatalog {
        ConstraintCatalog::standard()
    }

    fn raw(protocol_id: u16, length: u16, pdu: &[u8]) -> Vec<u8> {
        frame(Envelope::new(1, protocol_id, length, 0x01), pdu)
    }

    #[test]
    fn conforming_read_has_no_violations() {
        let bytes = build_conforming_request(
            1,
            1,
            &Operation::ReadHoldingRegisters {
                address: 0,
                quantity: 1,
            },
        );
        let report = inspect(&catalog(), &bytes);
        assert!(report.is_conforming(), "{:?}", report.names());
        assert_eq!(report.function_code, Some(0x03));
    }

    #[test]
    fn short_buffer_is_truncated_envelope() {
        let report = inspect(&catalog(), &[0, 1, 0]);
        assert_eq!(report.violations, vec![Violation::TruncatedEnvelope]);
        assert!(report.envelope.is_none());
    }

    #[test]
    fn length_one_with_pdu_is_also_under() {
        let report = inspect(&catalog(), &raw(0, 1, &[0x03, 0, 0, 0, 1]));
        assert!(report.has("mbap_length_under"));
        assert!(report.has("mbap_length_1_with_pdu"));
    }

    #[test]
    fn zero_and_max_lengths() {
        let report = inspect(&catalog(), &raw(0, 0, &[0x03, 0, 0, 0, 1]));
        assert!(report.has("mbap_length_zero"));
        let report = inspect(&catalog(), &raw(0, 0xFFFF, &[0x03, 0, 0, 0, 1]));
        assert!(report.has("mbap_length_over"));
        assert!(report.has("mbap_length_max"));
    }

    #[test]
    fn empty_pdu_with_exact_length() {
        let report = inspect(&catalog(), &raw(0, 1, &[]));
        assert_eq!(report.violations, vec![Violation::EmptyPdu]);
    }

    #[test]
    fn reserved_and_exception_codes() {
        let report = inspect(&catalog(), &raw(0, 6, &[0x09, 0, 0, 0, 1]));
        assert!(report.has("reserved_function_code"));
        let report = inspect(&catalog(), &raw(0, 3, &[0x83, 0x01]));
        assert!(report.has("exception_code_as_request"));
    }

    #[test]
    fn user_defined_code_has_no_shape_rules() {
        let report = inspect(&catalog(), &raw(0, 2, &[0x41]));
        assert!(report.is_conforming(), "{:?}", report.names());
    }

    #[test]
    fn quantity_and_overflow_checks() {
        let coils = |address, quantity| {
            build_conforming_request(1, 1, &Operation::read(OperationKind::ReadCoils, address, quantity))
        };
        assert!(inspect(&catalog(), &coils(0xFFFF, 0)).has("fc01_quantity_zero"));
        let report = inspect(&catalog(), &coils(0xFFF0, 2000));
        assert!(report.has("fc01_address_overflow"));
        assert!(!report.has("fc01_quantity_over"));
        assert!(inspect(&catalog(), &coils(0xFFFF - 2000, 2000)).is_conforming());
    }

    #[test]
    fn byte_count_zero_is_also_under() {
        let op = Operation::WriteMultipleCoils {
            address: 0,
            quantity: 8,
            byte_count: 0,
            payload: vec![],
        };
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert!(report.has("fc0f_byte_count_zero"));
        assert!(report.has("fc0f_byte_count_under"));
    }

    #[test]
    fn odd_register_byte_count() {
        let op = Operation::WriteMultipleRegisters {
            address: 0,
            quantity: 1,
            byte_count: 3,
            payload: vec![0; 3],
        };
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert!(report.has("fc10_odd_byte_count"));
        assert!(report.has("fc10_byte_count_over"));
        assert!(!report.has("pdu_too_long"));
    }

    #[test]
    fn read_write_windows_are_checked_independently() {
        let op = Operation::read_write_registers(0, 1, 0xFFFF, &[0]);
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert_eq!(report.names(), vec!["fc17_write_address_overflow"]);
    }

    #[test]
    fn file_record_overrun_and_truncation() {
        let op = Operation::write_file_record(&[FileSubRequest::conforming(1, 0, &[1, 2])]);
        assert!(inspect(&catalog(), &build_conforming_request(1, 1, &op)).is_conforming());

        let mut payload = vec![0_u8; 14];
        payload[0] = FILE_RECORD_REFERENCE_TYPE;
        payload[5..7].copy_from_slice(&0xFFFE_u16.to_be_bytes());
        let op = Operation::WriteFileRecord {
            byte_count: 14,
            payload,
        };
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert_eq!(report.names(), vec!["fc15_record_length_overrun"]);

        let op = Operation::WriteFileRecord {
            byte_count: 9,
            payload: vec![0x06, 0, 1, 0, 0, 0, 0, 0x06, 0],
        };
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert!(report.has("fc15_truncated_subrequest"));
    }

    #[test]
    fn device_identification_read_codes() {
        for read_code in 1..=4 {
            let op = Operation::ReadDeviceIdentification {
                mei_type: MEI_READ_DEVICE_ID,
                read_code,
                object_id: 0,
            };
            let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
            assert!(report.is_conforming(), "{:?}", report.names());
        }
        let op = Operation::ReadDeviceIdentification {
            mei_type: 0x0D,
            read_code: 0,
            object_id: 0,
        };
        let report = inspect(&catalog(), &build_conforming_request(1, 1, &op));
        assert!(report.has("fc2b_invalid_mei_type"));
        assert!(report.has("fc2b_invalid_read_code"));
    }

    #[test]
    fn trailing_bytes_on_fixed_shape() {
        let mut pdu = vec![0x05, 0, 0, 0xFF, 0x00];
        pdu.extend_from_slice(&[0; 4]);
        let length = u16::try_from(pdu.len() + 1).expect("small");
        let mut bytes = encode_envelope(1, 0, length, 1).to_vec();
        bytes.extend_from_slice(&pdu);
        let report = inspect(&catalog(), &bytes);
        assert!(report.has("trailing_data"));
        assert!(report.has("pdu_too_long"));
        assert!(!report.has("fc05_invalid_value"));
    }

    proptest! {
        #[test]
        fn never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
            let report = inspect(&catalog(), &bytes);
            prop_assert_eq!(report.envelope.is_none(), bytes.len() < ENVELOPE_LEN);
        }

        #[test]
        fn legal_register_reads_conform(address in 0_u16..=0xFF82, quantity in 1_u16..=125) {
            let bytes = build_conforming_request(7, 1, &Operation::ReadHoldingRegisters { address, quantity });
            let report = inspect(&catalog(), &bytes);
            prop_assert!(report.is_conforming(), "{:?}", report.names());
        }
    }
}
