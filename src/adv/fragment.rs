//! Advertising-data fragmenter.
//!
//! A complete payload can exceed what one HCI data command carries
//! (251 bytes), so it is pushed to the controller as a tagged sequence:
//!
//! | payload              | sequence                                 |
//! |----------------------|------------------------------------------|
//! | fits one command     | `Complete`                               |
//! | needs several        | `First`, `Intermediate`*, `Last`         |
//!
//! The manager releases the next chunk only after the previous command's
//! success completion, so fragments of one payload never interleave with
//! anything else on the same instance.

use crate::adv::Payload;
use crate::config::ADV_DATA_LEN_MAX;

/// Fragment tag octet on advertising-data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FragmentOp {
    Intermediate = 0x00,
    First = 0x01,
    Last = 0x02,
    Complete = 0x03,
}

/// A payload in the middle of being written to the controller.
#[derive(Debug)]
pub struct FragmentJob {
    data: Payload,
    offset: usize,
    first: bool,
}

impl FragmentJob {
    pub fn new(data: Payload) -> Self {
        Self {
            data,
            offset: 0,
            first: true,
        }
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Hand out the next chunk with its tag, or `None` once the payload is
    /// fully emitted.  An empty payload yields exactly one `Complete`
    /// chunk of length 0.
    pub fn next_chunk(&mut self) -> Option<(FragmentOp, &[u8])> {
        if !self.first && self.offset == self.data.len() {
            return None;
        }

        let more = self.data.len() - self.offset > ADV_DATA_LEN_MAX;
        let op = match (self.first, more) {
            (true, true) => FragmentOp::First,
            (true, false) => FragmentOp::Complete,
            (false, true) => FragmentOp::Intermediate,
            (false, false) => FragmentOp::Last,
        };

        let len = if more {
            ADV_DATA_LEN_MAX
        } else {
            self.data.len() - self.offset
        };
        let start = self.offset;
        self.offset += len;
        self.first = false;

        Some((op, &self.data[start..start + len]))
    }
}
