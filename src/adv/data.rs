//! SetData payload preprocessing.
//!
//! Before a payload is fragmented onto the wire, two rewrites run:
//!
//! 1. Legacy-connectable sets get a Flags AD structure prepended to their
//!    advertising data (limited-discoverable when a bounded duration is
//!    active, general-discoverable otherwise).
//! 2. Every TX-Power-Level AD structure gets its value stamped with the
//!    instance's *effective* transmit power — the value the controller
//!    granted at `SetParameters` time, not the one the caller asked for.

use crate::adv::Payload;
use crate::config::{
    EIR_FLAGS_TYPE, EIR_TX_POWER_LEVEL_TYPE, FLAG_GENERAL_DISCOVERABLE, FLAG_LIMITED_DISCOVERABLE,
};
use crate::error::AdvError;

/// True when both the connectable (bit 0) and legacy (bit 4) event
/// property flags are set.
pub fn is_legacy_connectable(advertising_event_properties: u16) -> bool {
    advertising_event_properties & 0x10 != 0 && advertising_event_properties & 0x01 != 0
}

/// Build the payload actually handed to the controller.
///
/// `timeout_s` is the instance's *recorded* bounded duration — the value a
/// previously completed bounded enable left behind, not the one of a start
/// request still in flight.
pub fn prepare(
    data: &[u8],
    advertising_event_properties: u16,
    timeout_s: u32,
    tx_power: i8,
    is_scan_rsp: bool,
) -> Result<Payload, AdvError> {
    let mut out = Payload::new();

    if !is_scan_rsp && is_legacy_connectable(advertising_event_properties) {
        let flags_val = if timeout_s != 0 {
            FLAG_LIMITED_DISCOVERABLE
        } else {
            FLAG_GENERAL_DISCOVERABLE
        };
        out.extend_from_slice(&[2, EIR_FLAGS_TYPE, flags_val])
            .map_err(|_| AdvError::PayloadTooLarge)?;
    }

    out.extend_from_slice(data)
        .map_err(|_| AdvError::PayloadTooLarge)?;

    rewrite_tx_power(&mut out, tx_power);
    Ok(out)
}

/// Walk the AD structures and stamp the effective transmit power into
/// every TX-Power-Level entry.  A zero or overrunning length terminates
/// the walk instead of reading past the buffer.
pub fn rewrite_tx_power(data: &mut [u8], tx_power: i8) {
    let mut i = 0;
    while i + 1 < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + 1 + len > data.len() {
            break;
        }
        if data[i + 1] == EIR_TX_POWER_LEVEL_TYPE && len >= 2 {
            data[i + 2] = tx_power as u8;
        }
        i += len + 1;
    }
}
