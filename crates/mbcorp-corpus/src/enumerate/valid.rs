//! Valid-category enumerator: representative legal requests and exact-limit
//! boundaries. Every message built here satisfies every catalog constraint.

use mbcorp_wire::catalog::{COIL_OFF, COIL_ON, MEI_READ_DEVICE_ID};
use mbcorp_wire::{
    ConstraintCatalog, FileSubRequest, OperationKind, Operation, build_conforming_request,
};
use tracing::debug;

use super::TransactionIds;
use crate::message::{Category, MetaKey, Message};

/// First transaction id of the valid family.
pub const VALID_TID_BASE: u16 = 1;
/// Unit id used unless a scenario varies it.
pub const DEFAULT_UNIT_ID: u8 = 0x01;

const REGISTER_QUANTITIES: [u16; 5] = [1, 10, 50, 100, 125];
const COIL_QUANTITIES: [u16; 7] = [1, 8, 16, 100, 500, 1000, 2000];
const DISCRETE_QUANTITIES: [u16; 6] = [1, 10, 100, 500, 1000, 2000];
const UNIT_IDS: [u8; 5] = [0x01, 0x02, 0x10, 0x7F, 0xFE];
const TRANSACTION_IDS: [u16; 10] = [
    0x0000, 0x0001, 0x00FF, 0x0100, 0x1234, 0x7FFF, 0x8000, 0xAAAA, 0xFFFE, 0xFFFF,
];

/// Enumerate the valid category in its fixed order.
#[must_use]
pub fn valid_messages(catalog: &ConstraintCatalog) -> Vec<Message> {
    let mut tids = TransactionIds::starting_at(VALID_TID_BASE);
    let mut out = Vec::new();

    read_sweep(
        &mut out,
        &mut tids,
        OperationKind::ReadHoldingRegisters,
        &REGISTER_QUANTITIES,
        &[0x0000, 0x0001, 0x0009, 0x0064, 0x7F00],
    );
    read_sweep(
        &mut out,
        &mut tids,
        OperationKind::ReadInputRegisters,
        &REGISTER_QUANTITIES,
        &[0x0000, 0x0050, 0x0100, 0x7F00],
    );
    read_sweep(
        &mut out,
        &mut tids,
        OperationKind::ReadCoils,
        &COIL_QUANTITIES,
        &[0x0000, 0x0010, 0x00FF, 0x7FFF],
    );
    read_sweep(
        &mut out,
        &mut tids,
        OperationKind::ReadDiscreteInputs,
        &DISCRETE_QUANTITIES,
        &[0x0000, 0x0100, 0x1000, 0x7FFF],
    );

    single_writes(&mut out, &mut tids);
    multiple_writes(&mut out, &mut tids);
    unit_ids(&mut out, &mut tids);
    read_write_combined(&mut out, &mut tids);
    file_records(&mut out, &mut tids);
    device_identification(&mut out, &mut tids);
    transaction_ids(&mut out);

    for address in [0x0000, 0x0001, 0x7FFF, 0x8000, 0xFFFE, 0xFFFF] {
        let op = Operation::WriteSingleRegister {
            address,
            value: 100,
        };
        out.push(
            valid(
                format!("fc06_edge_addr{address:#06x}"),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, OperationKind::WriteSingleRegister.name())
            .with(MetaKey::Address, address)
            .with(MetaKey::Value, 100_u16),
        );
    }

    exact_maxima(catalog, &mut out, &mut tids);
    overflow_boundaries(catalog, &mut out, &mut tids);

    debug!(count = out.len(), "valid enumerator finished");
    out
}

fn valid(mnemonic: String, op: &Operation, transaction_id: u16, unit_id: u8) -> Message {
    Message::new(
        Category::Valid,
        mnemonic,
        build_conforming_request(transaction_id, unit_id, op),
    )
}

fn read_sweep(
    out: &mut Vec<Message>,
    tids: &mut TransactionIds,
    kind: OperationKind,
    quantities: &[u16],
    addresses: &[u16],
) {
    for &quantity in quantities {
        for &address in addresses {
            let op = Operation::read(kind, address, quantity);
            out.push(
                valid(
                    format!("fc{:02x}_addr{address:#06x}_qty{quantity}", kind.function_code()),
                    &op,
                    tids.next_id(),
                    DEFAULT_UNIT_ID,
                )
                .with(MetaKey::Function, kind.name())
                .with(MetaKey::Address, address)
                .with(MetaKey::Quantity, quantity),
            );
        }
    }
}

fn single_writes(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for address in [0x0000, 0x0001, 0x00FF, 0x7FFF] {
        for value in [COIL_ON, COIL_OFF] {
            let op = Operation::WriteSingleCoil { address, value };
            out.push(
                valid(
                    format!("fc05_addr{address:#06x}_val{value:#06x}"),
                    &op,
                    tids.next_id(),
                    DEFAULT_UNIT_ID,
                )
                .with(MetaKey::Function, OperationKind::WriteSingleCoil.name())
                .with(MetaKey::Address, address)
                .with(MetaKey::Value, value),
            );
        }
    }
    for address in [0x0000, 0x0001, 0x0009] {
        for value in [0x0000, 0x0001, 0x00FF, 0x7FFF, 0xFFFF] {
            let op = Operation::WriteSingleRegister { address, value };
            out.push(
                valid(
                    format!("fc06_addr{address:#06x}_val{value:#06x}"),
                    &op,
                    tids.next_id(),
                    DEFAULT_UNIT_ID,
                )
                .with(MetaKey::Function, OperationKind::WriteSingleRegister.name())
                .with(MetaKey::Address, address)
                .with(MetaKey::Value, value),
            );
        }
    }
}

fn multiple_writes(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for quantity in [1_u16, 8, 16, 100] {
        let op = Operation::write_coils(0, &vec![true; usize::from(quantity)]);
        out.push(
            valid(format!("fc0f_qty{quantity}"), &op, tids.next_id(), DEFAULT_UNIT_ID)
                .with(MetaKey::Function, OperationKind::WriteMultipleCoils.name())
                .with(MetaKey::Address, 0_u16)
                .with(MetaKey::Quantity, quantity),
        );
    }
    for quantity in [1_u16, 5, 10, 50, 123] {
        let values: Vec<u16> = (0..quantity).collect();
        let op = Operation::write_registers(0, &values);
        out.push(
            valid(format!("fc10_qty{quantity}"), &op, tids.next_id(), DEFAULT_UNIT_ID)
                .with(MetaKey::Function, OperationKind::WriteMultipleRegisters.name())
                .with(MetaKey::Address, 0_u16)
                .with(MetaKey::Quantity, quantity),
        );
    }
}

fn unit_ids(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    let op = Operation::ReadHoldingRegisters {
        address: 0,
        quantity: 1,
    };
    for unit_id in UNIT_IDS {
        out.push(
            valid(format!("fc03_uid{unit_id:#04x}"), &op, tids.next_id(), unit_id)
                .with(MetaKey::Function, OperationKind::ReadHoldingRegisters.name())
                .with(MetaKey::UnitId, unit_id),
        );
    }
    for (unit_id, note) in [(0x00_u8, "broadcast"), (0xFF, "max_uid")] {
        out.push(
            valid(
                format!("fc03_uid{unit_id:#04x}_{note}"),
                &op,
                tids.next_id(),
                unit_id,
            )
            .with(MetaKey::Function, OperationKind::ReadHoldingRegisters.name())
            .with(MetaKey::UnitId, unit_id)
            .with(MetaKey::Note, note),
        );
    }
}

fn read_write_combined(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for read_quantity in [1_u16, 10, 50, 125] {
        for write_quantity in [1_u16, 5, 10] {
            let values: Vec<u16> = (0..write_quantity).collect();
            let op = Operation::read_write_registers(0x0000, read_quantity, 0x0010, &values);
            out.push(
                valid(
                    format!("fc17_r{read_quantity}_w{write_quantity}"),
                    &op,
                    tids.next_id(),
                    DEFAULT_UNIT_ID,
                )
                .with(
                    MetaKey::Function,
                    OperationKind::ReadWriteMultipleRegisters.name(),
                )
                .with(MetaKey::ReadQuantity, read_quantity)
                .with(MetaKey::WriteQuantity, write_quantity),
            );
        }
    }
}

fn file_records(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for (file_number, record_number, length) in [(1_u16, 0_u16, 1_u16), (1, 10, 4), (4, 0, 16)] {
        let registers: Vec<u16> = (0..length).map(|i| 0x1000 + i).collect();
        let op = Operation::write_file_record(&[FileSubRequest::conforming(
            file_number,
            record_number,
            &registers,
        )]);
        out.push(
            valid(
                format!("fc15_file{file_number}_rec{record_number}_len{length}"),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, OperationKind::WriteFileRecord.name())
            .with(MetaKey::FileNumber, file_number)
            .with(MetaKey::RecordNumber, record_number)
            .with(MetaKey::RecordLength, length),
        );
    }
    let op = Operation::write_file_record(&[
        FileSubRequest::conforming(2, 0, &[0xAAAA, 0x5555]),
        FileSubRequest::conforming(3, 7, &[0x0001]),
    ]);
    out.push(
        valid("fc15_two_subrequests".to_owned(), &op, tids.next_id(), DEFAULT_UNIT_ID)
            .with(MetaKey::Function, OperationKind::WriteFileRecord.name()),
    );
}

fn device_identification(out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for read_code in 1_u8..=4 {
        let op = Operation::ReadDeviceIdentification {
            mei_type: MEI_READ_DEVICE_ID,
            read_code,
            object_id: 0x00,
        };
        out.push(
            valid(
                format!("fc2b_read_code{read_code}"),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(
                MetaKey::Function,
                OperationKind::ReadDeviceIdentification.name(),
            )
            .with(MetaKey::MeiType, MEI_READ_DEVICE_ID)
            .with(MetaKey::ReadCode, read_code)
            .with(MetaKey::ObjectId, 0_u8),
        );
    }
}

/// Transaction ids are the varied field here, so the family counter is untouched.
fn transaction_ids(out: &mut Vec<Message>) {
    let op = Operation::ReadHoldingRegisters {
        address: 0,
        quantity: 1,
    };
    for transaction_id in TRANSACTION_IDS {
        out.push(
            valid(
                format!("fc03_txid{transaction_id:#06x}"),
                &op,
                transaction_id,
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, OperationKind::ReadHoldingRegisters.name())
            .with(MetaKey::TransactionId, transaction_id),
        );
    }
}

fn exact_maxima(catalog: &ConstraintCatalog, out: &mut Vec<Message>, tids: &mut TransactionIds) {
    for kind in [OperationKind::ReadCoils, OperationKind::ReadHoldingRegisters] {
        let Some(limits) = catalog.rule(kind).quantity else {
            continue;
        };
        let op = Operation::read(kind, 0, limits.max);
        out.push(
            valid(
                format!("fc{:02x}_max_qty_{}", kind.function_code(), limits.max),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, kind.name())
            .with(MetaKey::Quantity, limits.max)
            .with(MetaKey::Note, "max allowed"),
        );
    }

    if let Some(limits) = catalog.rule(OperationKind::WriteMultipleCoils).quantity {
        let pattern: Vec<bool> = (0..limits.max).map(|i| i % 2 == 1).collect();
        let op = Operation::write_coils(0, &pattern);
        out.push(
            valid(
                format!("fc0f_max_qty_{}", limits.max),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, OperationKind::WriteMultipleCoils.name())
            .with(MetaKey::Quantity, limits.max)
            .with(MetaKey::Note, "max allowed"),
        );
    }

    if let Some(limits) = catalog.rule(OperationKind::WriteMultipleRegisters).quantity {
        let values: Vec<u16> = (0..limits.max).collect();
        let op = Operation::write_registers(0, &values);
        out.push(
            valid(
                format!("fc10_max_qty_{}", limits.max),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, OperationKind::WriteMultipleRegisters.name())
            .with(MetaKey::Quantity, limits.max)
            .with(MetaKey::Note, "max allowed"),
        );
    }
}

/// `address + quantity == 0xFFFF` at the maximum quantity: legal, not overflow.
fn overflow_boundaries(
    catalog: &ConstraintCatalog,
    out: &mut Vec<Message>,
    tids: &mut TransactionIds,
) {
    for kind in [
        OperationKind::ReadCoils,
        OperationKind::ReadHoldingRegisters,
        OperationKind::ReadDiscreteInputs,
        OperationKind::ReadInputRegisters,
    ] {
        let Some(limits) = catalog.rule(kind).quantity else {
            continue;
        };
        let address = u16::MAX - limits.max;
        let op = Operation::read(kind, address, limits.max);
        out.push(
            valid(
                format!("fc{:02x}_boundary_addr_plus_qty_ffff", kind.function_code()),
                &op,
                tids.next_id(),
                DEFAULT_UNIT_ID,
            )
            .with(MetaKey::Function, kind.name())
            .with(MetaKey::Address, address)
            .with(MetaKey::Quantity, limits.max)
            .with(MetaKey::Note, "addr+qty exactly 0xFFFF"),
        );
    }
}
