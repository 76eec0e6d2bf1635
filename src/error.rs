//! Unified error types for the advertising manager.
//!
//! Only *synchronously detected* failures live here — controller-reported
//! failures are not errors at this level, they arrive later as HCI status
//! octets inside [`AdvEvent`](crate::adv::events::AdvEvent)s.  All variants
//! are `Copy` so they pass through the dispatch layer without allocation.

use core::fmt;

/// Every fallible manager operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvError {
    /// The advertiser id is outside the controller's instance table.
    InvalidInstance(u8),
    /// The instance exists but is not allocated to an advertiser.
    NotRegistered(u8),
    /// Another operation is still in flight on this instance.
    Busy(u8),
    /// Every controller advertising set is already allocated.
    TooManyAdvertisers,
    /// The payload does not fit the extended-advertising data capacity.
    PayloadTooLarge,
}

impl fmt::Display for AdvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInstance(id) => write!(f, "bad instance id {id}"),
            Self::NotRegistered(id) => write!(f, "instance {id} not in use"),
            Self::Busy(id) => write!(f, "instance {id} has an operation in flight"),
            Self::TooManyAdvertisers => write!(f, "no free advertiser instance"),
            Self::PayloadTooLarge => write!(f, "advertising payload too large"),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, AdvError>;
