//! Constraint catalog: the single source of truth for request legality.
//!
//! Every enumerator asks this table for limits, and every violation tag in a
//! corpus manifest is a [`Violation::name`] from here. Changing a protocol
//! limit means changing [`ConstraintCatalog::standard`] and nothing else.

use std::fmt;
use std::ops::RangeInclusive;

/// Highest addressable item. `address + quantity` may reach it but not pass it.
pub const ADDRESS_SPACE_END: u32 = 0xFFFF;

/// Largest legal operation unit (function code included).
pub const MAX_PDU_LEN: usize = 253;

/// Single-coil write values meaning ON and OFF.
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

/// Reference type every file-record sub-request must carry.
pub const FILE_RECORD_REFERENCE_TYPE: u8 = 0x06;

/// Encapsulated-interface type for Read Device Identification.
pub const MEI_READ_DEVICE_ID: u8 = 0x0E;

const COIL_VALUES: &[u16] = &[COIL_OFF, COIL_ON];

const PUBLIC_FUNCTION_CODES: &[u8] = &[
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0B, 0x0C, 0x0F, 0x10, 0x11, 0x14, 0x15,
    0x16, 0x17, 0x2B,
];

const USER_DEFINED_RANGES: [RangeInclusive<u8>; 2] = [0x41..=0x48, 0x64..=0x6E];

/// Operation types the catalog models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    ReadWriteMultipleRegisters,
    WriteFileRecord,
    ReadDeviceIdentification,
}

impl OperationKind {
    pub const ALL: [Self; 11] = [
        Self::ReadCoils,
        Self::ReadDiscreteInputs,
        Self::ReadHoldingRegisters,
        Self::ReadInputRegisters,
        Self::WriteSingleCoil,
        Self::WriteSingleRegister,
        Self::WriteMultipleCoils,
        Self::WriteMultipleRegisters,
        Self::ReadWriteMultipleRegisters,
        Self::WriteFileRecord,
        Self::ReadDeviceIdentification,
    ];

    #[must_use]
    pub const fn function_code(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::WriteFileRecord => 0x15,
            Self::ReadWriteMultipleRegisters => 0x17,
            Self::ReadDeviceIdentification => 0x2B,
        }
    }

    #[must_use]
    pub fn from_function_code(code: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.function_code() == code)
    }

    /// Stable snake-case name used in manifest metadata.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "read_coils",
            Self::ReadDiscreteInputs => "read_discrete_inputs",
            Self::ReadHoldingRegisters => "read_holding_regs",
            Self::ReadInputRegisters => "read_input_regs",
            Self::WriteSingleCoil => "write_single_coil",
            Self::WriteSingleRegister => "write_single_reg",
            Self::WriteMultipleCoils => "write_multiple_coils",
            Self::WriteMultipleRegisters => "write_multiple_regs",
            Self::ReadWriteMultipleRegisters => "read_write_multiple",
            Self::WriteFileRecord => "write_file_record",
            Self::ReadDeviceIdentification => "read_device_identification",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a quantity of items maps onto payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packing {
    /// Eight items per byte, least-significant bit first.
    Bits,
    /// Two bytes per item, big-endian.
    Registers,
}

impl Packing {
    /// Correct byte-count field for `quantity` items.
    #[must_use]
    pub const fn byte_count(self, quantity: u16) -> usize {
        match self {
            Self::Bits => (quantity as usize).div_ceil(8),
            Self::Registers => quantity as usize * 2,
        }
    }
}

/// Legal quantity range for one address window of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantityRule {
    pub min: u16,
    pub max: u16,
    /// Whether `address + quantity` must stay within [`ADDRESS_SPACE_END`].
    pub overflow_checked: bool,
}

impl QuantityRule {
    const fn windowed(min: u16, max: u16) -> Self {
        Self {
            min,
            max,
            overflow_checked: true,
        }
    }

    #[must_use]
    pub const fn contains(&self, quantity: u16) -> bool {
        quantity >= self.min && quantity <= self.max
    }

    /// A mid-range quantity, used as a representative legal value.
    #[must_use]
    pub const fn midpoint(&self) -> u16 {
        self.min + (self.max - self.min) / 2
    }
}

/// Field layout of an operation unit after its function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Start address + quantity, exactly four bytes.
    AddressQuantity,
    /// Address + value, exactly four bytes.
    AddressValue,
    /// Address + quantity + byte count, then `byte count` payload bytes.
    MultipleWrite,
    /// Read window, write window, byte count, then the write payload.
    ReadWriteMultiple,
    /// Byte count, then file-record sub-requests.
    FileRecord,
    /// MEI type, read code, object id, exactly three bytes.
    DeviceIdentification,
}

impl Shape {
    /// Bytes that must follow the function code before any payload.
    #[must_use]
    pub const fn header_len(self) -> usize {
        match self {
            Self::AddressQuantity | Self::AddressValue => 4,
            Self::MultipleWrite => 5,
            Self::ReadWriteMultiple => 9,
            Self::FileRecord => 1,
            Self::DeviceIdentification => 3,
        }
    }

    /// Whether the data length is fixed at [`Self::header_len`].
    #[must_use]
    pub const fn is_fixed(self) -> bool {
        matches!(
            self,
            Self::AddressQuantity | Self::AddressValue | Self::DeviceIdentification
        )
    }
}

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRule {
    pub kind: OperationKind,
    pub shape: Shape,
    /// Quantity rule for the primary (or read) window.
    pub quantity: Option<QuantityRule>,
    /// Quantity rule for the write window of a combined read/write.
    pub write_quantity: Option<QuantityRule>,
    pub packing: Option<Packing>,
    /// Restricted value domain for write-single operations.
    pub value_domain: Option<&'static [u16]>,
}

impl OperationRule {
    #[must_use]
    pub const fn function_code(&self) -> u8 {
        self.kind.function_code()
    }

    /// Correct byte-count field for a write carrying `quantity` items.
    #[must_use]
    pub fn expected_byte_count(&self, quantity: u16) -> Option<usize> {
        self.packing.map(|packing| packing.byte_count(quantity))
    }

    #[must_use]
    pub const fn is_write_single(&self) -> bool {
        matches!(self.shape, Shape::AddressValue)
    }

    /// Whether `value` is accepted by a write-single operation.
    #[must_use]
    pub fn accepts_value(&self, value: u16) -> bool {
        self.value_domain.is_none_or(|domain| domain.contains(&value))
    }
}

/// Read-only legality table for Modbus/TCP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintCatalog {
    rules: [OperationRule; OperationKind::ALL.len()],
    public_codes: &'static [u8],
    user_defined: [RangeInclusive<u8>; 2],
    max_pdu_len: usize,
    file_record_byte_count: RangeInclusive<u8>,
    device_id_read_codes: RangeInclusive<u8>,
}

impl ConstraintCatalog {
    /// The catalog as documented by the Modbus application protocol.
    #[must_use]
    pub fn standard() -> Self {
        let rule = |kind, shape, quantity, packing| OperationRule {
            kind,
            shape,
            quantity,
            write_quantity: None,
            packing,
            value_domain: None,
        };
        let bit_read = Some(QuantityRule::windowed(1, 2000));
        let register_read = Some(QuantityRule::windowed(1, 125));

        Self {
            rules: [
                rule(
                    OperationKind::ReadCoils,
                    Shape::AddressQuantity,
                    bit_read,
                    Some(Packing::Bits),
                ),
                rule(
                    OperationKind::ReadDiscreteInputs,
                    Shape::AddressQuantity,
                    bit_read,
                    Some(Packing::Bits),
                ),
                rule(
                    OperationKind::ReadHoldingRegisters,
                    Shape::AddressQuantity,
                    register_read,
                    Some(Packing::Registers),
                ),
                rule(
                    OperationKind::ReadInputRegisters,
                    Shape::AddressQuantity,
                    register_read,
                    Some(Packing::Registers),
                ),
                OperationRule {
                    value_domain: Some(COIL_VALUES),
                    ..rule(OperationKind::WriteSingleCoil, Shape::AddressValue, None, None)
                },
                rule(
                    OperationKind::WriteSingleRegister,
                    Shape::AddressValue,
                    None,
                    None,
                ),
                rule(
                    OperationKind::WriteMultipleCoils,
                    Shape::MultipleWrite,
                    Some(QuantityRule::windowed(1, 1968)),
                    Some(Packing::Bits),
                ),
                rule(
                    OperationKind::WriteMultipleRegisters,
                    Shape::MultipleWrite,
                    Some(QuantityRule::windowed(1, 123)),
                    Some(Packing::Registers),
                ),
                OperationRule {
                    write_quantity: Some(QuantityRule::windowed(1, 121)),
                    ..rule(
                        OperationKind::ReadWriteMultipleRegisters,
                        Shape::ReadWriteMultiple,
                        register_read,
                        Some(Packing::Registers),
                    )
                },
                rule(OperationKind::WriteFileRecord, Shape::FileRecord, None, None),
                rule(
                    OperationKind::ReadDeviceIdentification,
                    Shape::DeviceIdentification,
                    None,
                    None,
                ),
            ],
            public_codes: PUBLIC_FUNCTION_CODES,
            user_defined: USER_DEFINED_RANGES,
            max_pdu_len: MAX_PDU_LEN,
            file_record_byte_count: 0x07..=0xF5,
            device_id_read_codes: 0x01..=0x04,
        }
    }

    #[must_use]
    pub fn rule(&self, kind: OperationKind) -> &OperationRule {
        &self.rules[kind.index()]
    }

    #[must_use]
    pub fn rule_for_code(&self, function_code: u8) -> Option<&OperationRule> {
        OperationKind::from_function_code(function_code).map(|kind| self.rule(kind))
    }

    pub fn rules(&self) -> impl Iterator<Item = &OperationRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn is_public(&self, function_code: u8) -> bool {
        self.public_codes.contains(&function_code)
    }

    #[must_use]
    pub fn is_user_defined(&self, function_code: u8) -> bool {
        self.user_defined
            .iter()
            .any(|range| range.contains(&function_code))
    }

    /// Request codes that are neither public, user-defined, nor exceptions.
    #[must_use]
    pub fn is_reserved(&self, function_code: u8) -> bool {
        !Self::is_exception_code(function_code)
            && !self.is_public(function_code)
            && !self.is_user_defined(function_code)
    }

    /// Reserved codes in ascending order.
    pub fn reserved_function_codes(&self) -> impl Iterator<Item = u8> + '_ {
        (0x00..0x80).filter(|&code| self.is_reserved(code))
    }

    /// Exception responses have the high bit set and are never legal requests.
    #[must_use]
    pub const fn is_exception_code(function_code: u8) -> bool {
        function_code & 0x80 != 0
    }

    /// Envelope length that exactly describes a `pdu_len`-byte operation unit.
    #[must_use]
    pub const fn expected_envelope_length(pdu_len: usize) -> usize {
        pdu_len + 1
    }

    #[must_use]
    pub const fn address_overflows(address: u16, quantity: u16) -> bool {
        address as u32 + quantity as u32 > ADDRESS_SPACE_END
    }

    #[must_use]
    pub const fn max_pdu_len(&self) -> usize {
        self.max_pdu_len
    }

    #[must_use]
    pub fn file_record_byte_count(&self) -> RangeInclusive<u8> {
        self.file_record_byte_count.clone()
    }

    #[must_use]
    pub fn device_id_read_codes(&self) -> RangeInclusive<u8> {
        self.device_id_read_codes.clone()
    }
}

impl Default for ConstraintCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// A named constraint failure.
///
/// Function-code-specific variants carry the code so that the tag reads
/// `fc0f_byte_count_under` rather than a generic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Violation {
    TruncatedEnvelope,
    ProtocolIdNonzero,
    LengthUnder,
    LengthOver,
    LengthZero,
    LengthMax,
    LengthOneWithPdu,
    EmptyPdu,
    OversizedPdu,
    ReservedFunctionCode,
    ExceptionCodeAsRequest,
    PduTooShort,
    PduTooLong,
    TrailingData,
    QuantityZero(u8),
    QuantityZeroWithData(u8),
    QuantityOver(u8),
    AddressOverflow(u8),
    WriteQuantityZero(u8),
    WriteQuantityOver(u8),
    WriteAddressOverflow(u8),
    InvalidValue(u8),
    ByteCountUnder(u8),
    ByteCountOver(u8),
    ByteCountZero(u8),
    OddByteCount(u8),
    ByteCountOutOfRange(u8),
    TruncatedSubrequest(u8),
    InvalidReferenceType(u8),
    RecordLengthOverrun(u8),
    InvalidMeiType(u8),
    InvalidReadCode(u8),
}

impl Violation {
    /// Manifest tag for this violation.
    #[must_use]
    pub fn name(self) -> String {
        let (code, suffix) = match self {
            Self::TruncatedEnvelope => return "mbap_truncated".to_owned(),
            Self::ProtocolIdNonzero => return "protocol_id_nonzero".to_owned(),
            Self::LengthUnder => return "mbap_length_under".to_owned(),
            Self::LengthOver => return "mbap_length_over".to_owned(),
            Self::LengthZero => return "mbap_length_zero".to_owned(),
            Self::LengthMax => return "mbap_length_max".to_owned(),
            Self::LengthOneWithPdu => return "mbap_length_1_with_pdu".to_owned(),
            Self::EmptyPdu => return "empty_pdu".to_owned(),
            Self::OversizedPdu => return "oversized_pdu".to_owned(),
            Self::ReservedFunctionCode => return "reserved_function_code".to_owned(),
            Self::ExceptionCodeAsRequest => return "exception_code_as_request".to_owned(),
            Self::PduTooShort => return "pdu_too_short".to_owned(),
            Self::PduTooLong => return "pdu_too_long".to_owned(),
            Self::TrailingData => return "trailing_data".to_owned(),
            Self::QuantityZero(fc) => (fc, "quantity_zero"),
            Self::QuantityZeroWithData(fc) => (fc, "quantity_zero_with_data"),
            Self::QuantityOver(fc) => (fc, "quantity_over"),
            Self::AddressOverflow(fc) => (fc, "address_overflow"),
            Self::WriteQuantityZero(fc) => (fc, "write_quantity_zero"),
            Self::WriteQuantityOver(fc) => (fc, "write_quantity_over"),
            Self::WriteAddressOverflow(fc) => (fc, "write_address_overflow"),
            Self::InvalidValue(fc) => (fc, "invalid_value"),
            Self::ByteCountUnder(fc) => (fc, "byte_count_under"),
            Self::ByteCountOver(fc) => (fc, "byte_count_over"),
            Self::ByteCountZero(fc) => (fc, "byte_count_zero"),
            Self::OddByteCount(fc) => (fc, "odd_byte_count"),
            Self::ByteCountOutOfRange(fc) => (fc, "byte_count_out_of_range"),
            Self::TruncatedSubrequest(fc) => (fc, "truncated_subrequest"),
            Self::InvalidReferenceType(fc) => (fc, "invalid_reference_type"),
            Self::RecordLengthOverrun(fc) => (fc, "record_length_overrun"),
            Self::InvalidMeiType(fc) => (fc, "invalid_mei_type"),
            Self::InvalidReadCode(fc) => (fc, "invalid_read_code"),
        };
        format!("fc{code:02x}_{suffix}")
    }

    /// Whether the violation concerns the envelope rather than the operation unit.
    #[must_use]
    pub const fn is_envelope_level(self) -> bool {
        matches!(
            self,
            Self::TruncatedEnvelope
                | Self::ProtocolIdNonzero
                | Self::LengthUnder
                | Self::LengthOver
                | Self::LengthZero
                | Self::LengthMax
                | Self::LengthOneWithPdu
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
