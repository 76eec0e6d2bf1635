//! Advertising domain core — pure control-plane logic, zero I/O.
//!
//! This module owns the business rules of the multi-advertising manager:
//! the instance table, the commissioning pipelines, payload preprocessing
//! and fragmentation, and resolvable-address rotation.  All interaction
//! with the controller and the platform clock happens through the **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real hardware.

pub mod data;
pub mod events;
pub mod fragment;
pub mod instance;
mod pipeline;
pub mod ports;
pub mod rpa;
pub mod service;

use heapless::Vec;

use crate::config::ADV_PAYLOAD_CAP;

pub use service::BleAdvertisingManager;

/// A 48-bit Bluetooth device address in little-endian byte order (byte 0 is
/// the least significant octet, as it travels on the wire).
pub type BdAddr = [u8; 6];

/// An owned advertising payload, bounded by the extended-advertising cap.
pub type Payload = Vec<u8, ADV_PAYLOAD_CAP>;

/// Whether an instance advertises from the controller's public address or a
/// random (resolvable) one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OwnAddressType {
    Public = 0x00,
    Random = 0x01,
}

/// User-facing advertising parameters, recorded into the instance and
/// forwarded to the controller by `SetParameters`.
#[derive(Debug, Clone)]
pub struct AdvertisingParameters {
    /// Event property bitfield: bit 0 connectable, bit 1 scannable,
    /// bits 2-3 directed, bit 4 legacy.
    pub advertising_event_properties: u16,
    /// Advertising interval range, 0.625 ms units.
    pub adv_int_min: u32,
    pub adv_int_max: u32,
    /// Primary channel map (0x07 = 37, 38, 39).
    pub channel_map: u8,
    pub adv_filter_policy: u8,
    /// Requested transmit power, dBm.  The controller's granted value
    /// overwrites this once `SetParameters` completes.
    pub tx_power: i8,
    pub primary_advertising_phy: u8,
    pub secondary_advertising_phy: u8,
    pub scan_request_notification_enable: bool,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            // Legacy connectable-and-scannable.
            advertising_event_properties: 0x0013,
            adv_int_min: 160,
            adv_int_max: 210,
            channel_map: 0x07,
            adv_filter_policy: 0x00,
            tx_power: -7,
            primary_advertising_phy: 0x01,
            secondary_advertising_phy: 0x01,
            scan_request_notification_enable: false,
        }
    }
}

/// Periodic advertising parameters.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicAdvertisingParameters {
    /// When false, the periodic leg of `start_advertising_set` is skipped.
    pub enable: bool,
    /// Periodic interval range, 1.25 ms units.
    pub min_interval: u16,
    pub max_interval: u16,
    pub periodic_advertising_properties: u16,
}

impl Default for PeriodicAdvertisingParameters {
    fn default() -> Self {
        Self {
            enable: false,
            min_interval: 80,
            max_interval: 96,
            periodic_advertising_properties: 0x0000,
        }
    }
}
