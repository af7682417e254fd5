//! Fuzz enumerator.
//!
//! A single [`StdRng`] seeded from the configured seed drives every random
//! draw, in a fixed order, so the same seed always yields byte-identical
//! output. The structured families (bit flips, truncations, patterns) draw
//! nothing and are deterministic regardless of seed.

use mbcorp_wire::{Envelope, Operation, build_conforming_request, frame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::valid::DEFAULT_UNIT_ID;
use super::{TransactionIds, first_n};
use crate::message::{Category, MetaKey, MetaValue, Message};

pub const FUZZ_TID_BASE: u16 = 20000;
pub const DEFAULT_FUZZ_SEED: u64 = 42;
pub const DEFAULT_FUZZ_CAP: usize = 250;

/// Bits flipped in the canonical message, one per fuzz message.
pub const BIT_FLIP_COUNT: usize = 96;

const RANDOM_LENGTHS: [usize; 13] = [1, 2, 3, 5, 7, 8, 12, 13, 20, 50, 100, 200, 255];
const FILL_LENGTHS: [usize; 5] = [7, 12, 20, 50, 100];
const REPEATED_BYTES: [u8; 6] = [0x00, 0x55, 0xAA, 0xFF, 0x41, 0x90];
const PATTERN_LENGTHS: [usize; 4] = [7, 12, 20, 50];
const COUNTER_STARTS: [u8; 4] = [0, 64, 128, 192];
const COUNTER_LENGTHS: [usize; 3] = [12, 20, 50];

/// The legal message every structured mutation starts from.
#[must_use]
pub fn canonical_message() -> Vec<u8> {
    build_conforming_request(
        1,
        DEFAULT_UNIT_ID,
        &Operation::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        },
    )
}

/// Enumerate fuzz messages for `seed`, keeping the first `cap`.
#[must_use]
pub fn fuzz_messages(seed: u64, cap: usize) -> Vec<Message> {
    let mut fuzzer = Fuzzer::new(seed);
    fuzzer.random_buffers();
    fuzzer.random_operation_units();
    fuzzer.random_envelopes();
    fuzzer.fills();
    fuzzer.bit_flips();
    fuzzer.truncations();
    fuzzer.repeated_bytes();
    fuzzer.counters();
    fuzzer.little_endian_fields();
    first_n(fuzzer.out, cap, "fuzz")
}

struct Fuzzer {
    rng: StdRng,
    tids: TransactionIds,
    out: Vec<Message>,
}

impl Fuzzer {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tids: TransactionIds::starting_at(FUZZ_TID_BASE),
            out: Vec::new(),
        }
    }

    /// Every message consumes one transaction id, framed or not.
    fn emit<const N: usize>(
        &mut self,
        mnemonic: String,
        bytes: Vec<u8>,
        kind: &str,
        metadata: [(MetaKey, MetaValue); N],
    ) {
        self.tids.next_id();
        let message = metadata.into_iter().fold(
            Message::new(Category::Fuzz, mnemonic, bytes).with(MetaKey::Kind, kind),
            |message, (key, value)| message.with(key, value),
        );
        self.out.push(message);
    }

    fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.rng.r#gen::<u8>()).collect()
    }

    fn random_buffers(&mut self) {
        for length in RANDOM_LENGTHS {
            for offset in 0..3_usize {
                let data = self.random_bytes(length);
                self.emit(
                    format!("random_{length}b_{offset}"),
                    data,
                    "random_bytes",
                    [
                        (MetaKey::Length, MetaValue::from(length)),
                        (MetaKey::SeedOffset, MetaValue::from(offset)),
                    ],
                );
            }
        }
    }

    fn random_operation_units(&mut self) {
        for index in 0..40 {
            let pdu_len: u16 = self.rng.gen_range(1..=200);
            let pdu = self.random_bytes(usize::from(pdu_len));
            let envelope = Envelope::new(self.tids.peek(), 0, pdu_len + 1, DEFAULT_UNIT_ID);
            self.emit(
                format!("valid_mbap_random_pdu_{index}"),
                frame(envelope, &pdu),
                "valid_header_random_pdu",
                [(MetaKey::PduLength, MetaValue::from(pdu_len))],
            );
        }
    }

    fn random_envelopes(&mut self) {
        let pdu = Operation::ReadHoldingRegisters {
            address: 0,
            quantity: 1,
        }
        .encode();
        for index in 0..30 {
            let transaction_id: u16 = self.rng.r#gen();
            let protocol_id: u16 = self.rng.r#gen();
            let length: u16 = self.rng.r#gen();
            let unit_id: u8 = self.rng.r#gen();
            let envelope = Envelope::new(transaction_id, protocol_id, length, unit_id);
            self.emit(
                format!("random_mbap_valid_pdu_{index}"),
                frame(envelope, &pdu),
                "random_header_valid_pdu",
                [
                    (MetaKey::TransactionId, MetaValue::from(transaction_id)),
                    (MetaKey::ProtocolId, MetaValue::from(protocol_id)),
                    (MetaKey::DeclaredLength, MetaValue::from(length)),
                    (MetaKey::UnitId, MetaValue::from(unit_id)),
                ],
            );
        }
    }

    fn fills(&mut self) {
        for (fill, name, kind) in [
            (0x00_u8, "all_zeros", "all_zeros"),
            (0xFF, "all_ff", "all_ones"),
        ] {
            for length in FILL_LENGTHS {
                self.emit(
                    format!("{name}_{length}b"),
                    vec![fill; length],
                    kind,
                    [(MetaKey::Length, MetaValue::from(length))],
                );
            }
        }
    }

    fn bit_flips(&mut self) {
        let canonical = canonical_message();
        for position in 0..BIT_FLIP_COUNT.min(canonical.len() * 8) {
            let (byte_index, bit_index) = (position / 8, position % 8);
            let mut flipped = canonical.clone();
            flipped[byte_index] ^= 1 << bit_index;
            self.emit(
                format!("bitflip_pos{position}"),
                flipped,
                "bit_flip",
                [
                    (MetaKey::BitPosition, MetaValue::from(position)),
                    (MetaKey::ByteIndex, MetaValue::from(byte_index)),
                    (MetaKey::BitIndex, MetaValue::from(bit_index)),
                ],
            );
        }
    }

    fn truncations(&mut self) {
        let canonical = canonical_message();
        for length in 1..canonical.len() {
            self.emit(
                format!("truncated_{length}b"),
                canonical[..length].to_vec(),
                "truncated",
                [
                    (MetaKey::OriginalLength, MetaValue::from(canonical.len())),
                    (MetaKey::TruncatedLength, MetaValue::from(length)),
                ],
            );
        }
    }

    fn repeated_bytes(&mut self) {
        for byte in REPEATED_BYTES {
            for length in PATTERN_LENGTHS {
                self.emit(
                    format!("repeated_{byte:#04x}_{length}b"),
                    vec![byte; length],
                    "repeated_byte",
                    [
                        (MetaKey::Byte, MetaValue::from(byte)),
                        (MetaKey::Length, MetaValue::from(length)),
                    ],
                );
            }
        }
    }

    fn counters(&mut self) {
        for start in COUNTER_STARTS {
            for length in COUNTER_LENGTHS {
                let data = (0..length)
                    .scan(start, |next, _| {
                        let byte = *next;
                        *next = next.wrapping_add(1);
                        Some(byte)
                    })
                    .collect();
                self.emit(
                    format!("counter_{start}_{length}b"),
                    data,
                    "counter",
                    [
                        (MetaKey::Start, MetaValue::from(start)),
                        (MetaKey::Length, MetaValue::from(length)),
                    ],
                );
            }
        }
    }

    /// Address and quantity written little-endian behind a correct envelope.
    fn little_endian_fields(&mut self) {
        for index in 0..10 {
            let address: u16 = self.rng.r#gen();
            let quantity: u16 = self.rng.gen_range(1..=125);
            let mut pdu = vec![0x03];
            pdu.extend_from_slice(&address.to_le_bytes());
            pdu.extend_from_slice(&quantity.to_le_bytes());
            let envelope = Envelope::conforming(self.tids.peek(), DEFAULT_UNIT_ID, pdu.len());
            self.emit(
                format!("le_endian_{index}"),
                frame(envelope, &pdu),
                "wrong_endianness",
                [
                    (MetaKey::Address, MetaValue::from(address)),
                    (MetaKey::Quantity, MetaValue::from(quantity)),
                ],
            );
        }
    }
}
