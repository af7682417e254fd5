//! Operation-unit encoders.
//!
//! [`Operation::encode`] serializes field values verbatim, legal or not. The
//! convenience constructors (`write_coils`, `write_registers`, ...) derive
//! byte counts from the payload and are the only place a "correct" count is
//! computed on the encoding side.

use crate::catalog::{FILE_RECORD_REFERENCE_TYPE, OperationKind};
use crate::envelope::{Envelope, frame};

/// One sub-request of a file-record write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSubRequest {
    pub reference_type: u8,
    pub file_number: u16,
    pub record_number: u16,
    /// Declared record length in registers.
    pub record_length: u16,
    /// Record data as sent; not required to match `record_length`.
    pub data: Vec<u8>,
}

impl FileSubRequest {
    /// Sub-request header size: reference type, file, record, record length.
    pub const HEADER_LEN: usize = 7;

    /// A sub-request whose record length matches its register data.
    #[must_use]
    pub fn conforming(file_number: u16, record_number: u16, registers: &[u16]) -> Self {
        Self {
            reference_type: FILE_RECORD_REFERENCE_TYPE,
            file_number,
            record_number,
            record_length: u16::try_from(registers.len()).unwrap_or(u16::MAX),
            data: pack_registers(registers),
        }
    }

    #[must_use]
    pub fn header(&self) -> [u8; Self::HEADER_LEN] {
        let mut out = [0_u8; Self::HEADER_LEN];
        out[0] = self.reference_type;
        out[1..3].copy_from_slice(&self.file_number.to_be_bytes());
        out[3..5].copy_from_slice(&self.record_number.to_be_bytes());
        out[5..7].copy_from_slice(&self.record_length.to_be_bytes());
        out
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.data.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.data);
        out
    }
}

/// A request operation unit, described by its field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadCoils {
        address: u16,
        quantity: u16,
    },
    ReadDiscreteInputs {
        address: u16,
        quantity: u16,
    },
    ReadHoldingRegisters {
        address: u16,
        quantity: u16,
    },
    ReadInputRegisters {
        address: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        address: u16,
        value: u16,
    },
    WriteSingleRegister {
        address: u16,
        value: u16,
    },
    WriteMultipleCoils {
        address: u16,
        quantity: u16,
        byte_count: u8,
        payload: Vec<u8>,
    },
    WriteMultipleRegisters {
        address: u16,
        quantity: u16,
        byte_count: u8,
        payload: Vec<u8>,
    },
    ReadWriteMultipleRegisters {
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_quantity: u16,
        byte_count: u8,
        payload: Vec<u8>,
    },
    WriteFileRecord {
        byte_count: u8,
        payload: Vec<u8>,
    },
    ReadDeviceIdentification {
        mei_type: u8,
        read_code: u8,
        object_id: u8,
    },
    /// Any function code followed by arbitrary data bytes.
    Raw {
        function_code: u8,
        data: Vec<u8>,
    },
}

impl Operation {
    /// Address + quantity request for `kind`.
    ///
    /// Kinds without an address/quantity layout are encoded as [`Operation::Raw`]
    /// with the same four data bytes.
    #[must_use]
    pub fn read(kind: OperationKind, address: u16, quantity: u16) -> Self {
        match kind {
            OperationKind::ReadCoils => Self::ReadCoils { address, quantity },
            OperationKind::ReadDiscreteInputs => Self::ReadDiscreteInputs { address, quantity },
            OperationKind::ReadHoldingRegisters => Self::ReadHoldingRegisters { address, quantity },
            OperationKind::ReadInputRegisters => Self::ReadInputRegisters { address, quantity },
            other => Self::Raw {
                function_code: other.function_code(),
                data: address_pair(address, quantity).to_vec(),
            },
        }
    }

    /// Write-multiple-coils request with a byte count matching `values`.
    #[must_use]
    pub fn write_coils(address: u16, values: &[bool]) -> Self {
        let payload = pack_bits(values);
        Self::WriteMultipleCoils {
            address,
            quantity: u16::try_from(values.len()).unwrap_or(u16::MAX),
            byte_count: saturating_count(payload.len()),
            payload,
        }
    }

    /// Write-multiple-registers request with a byte count matching `values`.
    #[must_use]
    pub fn write_registers(address: u16, values: &[u16]) -> Self {
        let payload = pack_registers(values);
        Self::WriteMultipleRegisters {
            address,
            quantity: u16::try_from(values.len()).unwrap_or(u16::MAX),
            byte_count: saturating_count(payload.len()),
            payload,
        }
    }

    /// Combined read/write request with a byte count matching `values`.
    #[must_use]
    pub fn read_write_registers(
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: &[u16],
    ) -> Self {
        let payload = pack_registers(values);
        Self::ReadWriteMultipleRegisters {
            read_address,
            read_quantity,
            write_address,
            write_quantity: u16::try_from(values.len()).unwrap_or(u16::MAX),
            byte_count: saturating_count(payload.len()),
            payload,
        }
    }

    /// File-record write whose byte count covers exactly `records`.
    #[must_use]
    pub fn write_file_record(records: &[FileSubRequest]) -> Self {
        let payload: Vec<u8> = records.iter().flat_map(FileSubRequest::encode).collect();
        Self::WriteFileRecord {
            byte_count: saturating_count(payload.len()),
            payload,
        }
    }

    #[must_use]
    pub fn function_code(&self) -> u8 {
        match self {
            Self::Raw { function_code, .. } => *function_code,
            other => other
                .kind()
                .map_or(0, OperationKind::function_code),
        }
    }

    /// Catalog kind, or `None` for raw operation units.
    #[must_use]
    pub const fn kind(&self) -> Option<OperationKind> {
        Some(match self {
            Self::ReadCoils { .. } => OperationKind::ReadCoils,
            Self::ReadDiscreteInputs { .. } => OperationKind::ReadDiscreteInputs,
            Self::ReadHoldingRegisters { .. } => OperationKind::ReadHoldingRegisters,
            Self::ReadInputRegisters { .. } => OperationKind::ReadInputRegisters,
            Self::WriteSingleCoil { .. } => OperationKind::WriteSingleCoil,
            Self::WriteSingleRegister { .. } => OperationKind::WriteSingleRegister,
            Self::WriteMultipleCoils { .. } => OperationKind::WriteMultipleCoils,
            Self::WriteMultipleRegisters { .. } => OperationKind::WriteMultipleRegisters,
            Self::ReadWriteMultipleRegisters { .. } => OperationKind::ReadWriteMultipleRegisters,
            Self::WriteFileRecord { .. } => OperationKind::WriteFileRecord,
            Self::ReadDeviceIdentification { .. } => OperationKind::ReadDeviceIdentification,
            Self::Raw { .. } => return None,
        })
    }

    /// Function code followed by the big-endian fields and inline payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.function_code()];
        match self {
            Self::ReadCoils { address, quantity }
            | Self::ReadDiscreteInputs { address, quantity }
            | Self::ReadHoldingRegisters { address, quantity }
            | Self::ReadInputRegisters { address, quantity } => {
                out.extend_from_slice(&address_pair(*address, *quantity));
            }
            Self::WriteSingleCoil { address, value }
            | Self::WriteSingleRegister { address, value } => {
                out.extend_from_slice(&address_pair(*address, *value));
            }
            Self::WriteMultipleCoils {
                address,
                quantity,
                byte_count,
                payload,
            }
            | Self::WriteMultipleRegisters {
                address,
                quantity,
                byte_count,
                payload,
            } => {
                out.extend_from_slice(&address_pair(*address, *quantity));
                out.push(*byte_count);
                out.extend_from_slice(payload);
            }
            Self::ReadWriteMultipleRegisters {
                read_address,
                read_quantity,
                write_address,
                write_quantity,
                byte_count,
                payload,
            } => {
                out.extend_from_slice(&address_pair(*read_address, *read_quantity));
                out.extend_from_slice(&address_pair(*write_address, *write_quantity));
                out.push(*byte_count);
                out.extend_from_slice(payload);
            }
            Self::WriteFileRecord {
                byte_count,
                payload,
            } => {
                out.push(*byte_count);
                out.extend_from_slice(payload);
            }
            Self::ReadDeviceIdentification {
                mei_type,
                read_code,
                object_id,
            } => {
                out.extend_from_slice(&[*mei_type, *read_code, *object_id]);
            }
            Self::Raw { data, .. } => out.extend_from_slice(data),
        }
        out
    }
}

/// Envelope + operation unit with the envelope length computed from the unit.
#[must_use]
pub fn build_conforming_request(transaction_id: u16, unit_id: u8, operation: &Operation) -> Vec<u8> {
    let pdu = operation.encode();
    frame(Envelope::conforming(transaction_id, unit_id, pdu.len()), &pdu)
}

/// Pack booleans eight per byte, least-significant bit first. Unused trailing
/// bits of the last byte are zero.
#[must_use]
pub fn pack_bits(values: &[bool]) -> Vec<u8> {
    values
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .filter(|(_, on)| **on)
                .fold(0_u8, |byte, (bit, _)| byte | (1 << bit))
        })
        .collect()
}

/// Pack registers as consecutive big-endian words.
#[must_use]
pub fn pack_registers(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_be_bytes()).collect()
}

fn address_pair(first: u16, second: u16) -> [u8; 4] {
    let [a, b] = first.to_be_bytes();
    let [c, d] = second.to_be_bytes();
    [a, b, c, d]
}

fn saturating_count(len: usize) -> u8 {
    u8::try_from(len).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MEI_READ_DEVICE_ID;

    #[test]
    fn read_holding_registers_wire_form() {
        let bytes = build_conforming_request(
            1,
            0x01,
            &Operation::ReadHoldingRegisters {
                address: 0,
                quantity: 1,
            },
        );
        assert_eq!(
            bytes,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn pack_bits_is_lsb_first_with_zero_padding() {
        assert_eq!(pack_bits(&[true, false, true]), vec![0b0000_0101]);
        let nine = [true; 9];
        assert_eq!(pack_bits(&nine), vec![0xFF, 0x01]);
        assert!(pack_bits(&[]).is_empty());
    }

    #[test]
    fn write_registers_derives_byte_count() {
        let op = Operation::write_registers(0x0010, &[0x0102, 0x0304]);
        assert_eq!(
            op.encode(),
            vec![0x10, 0x00, 0x10, 0x00, 0x02, 0x04, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn write_coils_derives_byte_count() {
        let op = Operation::write_coils(0, &[true; 10]);
        assert_eq!(op.encode(), vec![0x0F, 0, 0, 0, 10, 2, 0xFF, 0x03]);
    }

    #[test]
    fn read_write_registers_layout() {
        let op = Operation::read_write_registers(0, 10, 0x0010, &[7]);
        assert_eq!(
            op.encode(),
            vec![0x17, 0, 0, 0, 10, 0, 0x10, 0, 1, 2, 0, 7]
        );
    }

    #[test]
    fn file_record_byte_count_covers_sub_requests() {
        let op = Operation::write_file_record(&[FileSubRequest::conforming(4, 7, &[0xABCD])]);
        assert_eq!(
            op.encode(),
            vec![0x15, 9, 0x06, 0, 4, 0, 7, 0, 1, 0xAB, 0xCD]
        );
    }

    #[test]
    fn encoder_does_not_validate() {
        let op = Operation::WriteMultipleRegisters {
            address: 0xFFFF,
            quantity: 0,
            byte_count: 200,
            payload: vec![],
        };
        assert_eq!(op.encode(), vec![0x10, 0xFF, 0xFF, 0, 0, 200]);
        let raw = Operation::Raw {
            function_code: 0x80,
            data: vec![0x01],
        };
        assert_eq!(raw.encode(), vec![0x80, 0x01]);
        assert_eq!(raw.kind(), None);
    }

    #[test]
    fn read_falls_back_to_raw_for_non_read_kinds() {
        let op = Operation::read(OperationKind::WriteSingleRegister, 1, 2);
        assert_eq!(op.encode(), vec![0x06, 0, 1, 0, 2]);
        let op = Operation::read(OperationKind::ReadInputRegisters, 1, 2);
        assert_eq!(op.kind(), Some(OperationKind::ReadInputRegisters));
    }

    #[test]
    fn device_identification_layout() {
        let op = Operation::ReadDeviceIdentification {
            mei_type: MEI_READ_DEVICE_ID,
            read_code: 1,
            object_id: 0,
        };
        assert_eq!(op.encode(), vec![0x2B, 0x0E, 0x01, 0x00]);
    }
}
