//! Outbound advertising events.
//!
//! The manager emits these through the
//! [`AdvEventSink`](crate::adv::ports::AdvEventSink) port whenever an
//! asynchronous outcome lands: a command completion, a pipeline finishing,
//! a bounded duration elapsing.  Statuses are HCI octets (`0x00` success);
//! synchronous misuse never reaches the sink, it is returned as a typed
//! error instead.

use crate::adv::BdAddr;

/// Structured events emitted by the advertising core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvEvent {
    /// `SetParameters` completed; `tx_power` is the effective value the
    /// controller granted.
    ParametersSet { inst_id: u8, status: u8, tx_power: i8 },

    /// A standalone data update finished — every fragment was accepted, or
    /// one was rejected with `status`.
    DataSet { inst_id: u8, scan_rsp: bool, status: u8 },

    /// An enable or disable completed.
    Enabled { inst_id: u8, enabled: bool, status: u8 },

    PeriodicParametersSet { inst_id: u8, status: u8 },

    PeriodicDataSet { inst_id: u8, status: u8 },

    PeriodicEnabled { inst_id: u8, enabled: bool, status: u8 },

    /// Outcome of `start_advertising` on an already-registered instance.
    AdvertisingStarted { inst_id: u8, status: u8 },

    /// Outcome of `start_advertising_set`.  On a failure after
    /// registration the slot has already been freed and the event carries
    /// `(0, 0, status)`.
    SetStarted { inst_id: u8, tx_power: i8, status: u8 },

    /// A bounded-duration set reached its timeout; a disable was issued.
    TimedOut { inst_id: u8 },

    /// Privacy hook: the ACL layer should refresh this connection's local
    /// address after an advertising set terminated into a connection.
    OwnAddressUpdate { connection_handle: u16, address: BdAddr },
}
