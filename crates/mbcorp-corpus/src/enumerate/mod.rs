//! Category enumerators.
//!
//! Each enumerator is a pure function from the constraint catalog (and, for
//! fuzz, a seed) to an owned `Vec<Message>`. Generator families start their
//! transaction ids at separate bases by convention only; families that vary
//! the transaction id itself (valid id sweeps, random fuzz envelopes) can
//! land anywhere in the 16-bit space.

pub mod attack;
pub mod fuzz;
pub mod malformed;
pub mod valid;

use tracing::debug;

use crate::message::Message;

/// Monotonic transaction-id source for one generator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionIds {
    next: u16,
}

impl TransactionIds {
    #[must_use]
    pub const fn starting_at(base: u16) -> Self {
        Self { next: base }
    }

    /// Hand out the current id and advance.
    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    #[must_use]
    pub const fn peek(&self) -> u16 {
        self.next
    }
}

/// Keep the first `cap` messages in generation order.
pub(crate) fn first_n(mut messages: Vec<Message>, cap: usize, family: &str) -> Vec<Message> {
    let generated = messages.len();
    messages.truncate(cap);
    debug!(family, generated, kept = messages.len(), "enumerator output capped");
    messages
}
