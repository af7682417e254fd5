//! MBAP session envelope.
//!
//! Seven bytes, big-endian: transaction id (2), protocol id (2), length (2),
//! unit id (1). The length counts the unit id plus the operation unit that
//! follows the envelope.

/// Envelope size in bytes.
pub const ENVELOPE_LEN: usize = 7;

/// Protocol identifier carried by every Modbus/TCP message.
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Broadcast unit identifier.
pub const BROADCAST_UNIT_ID: u8 = 0x00;

/// Decoded or to-be-encoded envelope fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Envelope {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl Envelope {
    #[must_use]
    pub const fn new(transaction_id: u16, protocol_id: u16, length: u16, unit_id: u8) -> Self {
        Self {
            transaction_id,
            protocol_id,
            length,
            unit_id,
        }
    }

    /// Envelope whose length field is exact for an operation unit of `pdu_len` bytes.
    ///
    /// Saturates at `u16::MAX` for operation units too large to describe.
    #[must_use]
    pub fn conforming(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Self {
        let length = u16::try_from(pdu_len.saturating_add(1)).unwrap_or(u16::MAX);
        Self::new(transaction_id, MODBUS_PROTOCOL_ID, length, unit_id)
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; ENVELOPE_LEN] {
        encode_envelope(
            self.transaction_id,
            self.protocol_id,
            self.length,
            self.unit_id,
        )
    }

    /// Read the envelope from the first seven bytes of `bytes`.
    ///
    /// Returns `None` when fewer than seven bytes are present.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let header: &[u8; ENVELOPE_LEN] = bytes.get(..ENVELOPE_LEN)?.try_into().ok()?;
        Some(Self {
            transaction_id: u16::from_be_bytes([header[0], header[1]]),
            protocol_id: u16::from_be_bytes([header[2], header[3]]),
            length: u16::from_be_bytes([header[4], header[5]]),
            unit_id: header[6],
        })
    }
}

/// Serialize the four envelope fields in wire order. Performs no validation.
#[must_use]
pub fn encode_envelope(
    transaction_id: u16,
    protocol_id: u16,
    length: u16,
    unit_id: u8,
) -> [u8; ENVELOPE_LEN] {
    let mut out = [0_u8; ENVELOPE_LEN];
    out[0..2].copy_from_slice(&transaction_id.to_be_bytes());
    out[2..4].copy_from_slice(&protocol_id.to_be_bytes());
    out[4..6].copy_from_slice(&length.to_be_bytes());
    out[6] = unit_id;
    out
}

/// Concatenate an envelope with raw operation-unit bytes, exactly as given.
#[must_use]
pub fn frame(envelope: Envelope, pdu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ENVELOPE_LEN + pdu.len());
    out.extend_from_slice(&envelope.to_bytes());
    out.extend_from_slice(pdu);
    out
}
