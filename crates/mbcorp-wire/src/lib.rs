//! Wire model for Modbus/TCP request corpora.
//!
//! ```text
//!   ConstraintCatalog ──► Operation::encode ──► frame / build_conforming_request
//!          │
//!          └──────────► inspect(bytes) → Vec<Violation>
//! ```
//!
//! The encoders never validate: they serialize whatever field values they
//! are given, so deliberately illegal messages are built the same way as
//! legal ones. Legality lives in [`catalog`] alone, and [`inspect`] is its
//! executable form.

pub mod catalog;
pub mod envelope;
pub mod inspect;
pub mod operation;

pub use catalog::{
    ConstraintCatalog, OperationKind, OperationRule, Packing, QuantityRule, Shape, Violation,
};
pub use envelope::{ENVELOPE_LEN, Envelope, encode_envelope, frame};
pub use inspect::{Inspection, inspect};
pub use operation::{
    FileSubRequest, Operation, build_conforming_request, pack_bits, pack_registers,
};
