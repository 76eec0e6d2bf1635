//! BLE multi-advertising set manager.
//!
//! Multiplexes several concurrent BLE advertising sets over a single
//! controller: slot allocation, address assignment, parameter and payload
//! configuration, enable/disable with bounded duration, periodic
//! advertising, and termination bookkeeping.
//!
//! The crate is laid out hexagonally.  The domain core in [`adv`] never
//! touches a transport or a clock directly — the controller and the timer
//! facility sit behind **port traits** ([`adv::ports`]), so the whole
//! command-sequencing logic runs and is tested on the host against
//! recording fakes.
//!
//! ```text
//!  caller ──▶ BleAdvertisingManager ──▶ AdvertiserHciPort ──▶ controller
//!                    │    ▲                    │
//!                    │    └── on_command_complete / on_alarm /
//!                    ▼         on_advertising_set_terminated
//!               AdvEventSink (asynchronous outcomes)
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod adv;
pub mod config;
mod error;

pub use error::{AdvError, Result};
