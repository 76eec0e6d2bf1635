//! Port traits — the hexagonal boundary between the advertising core and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BleAdvertisingManager (domain)
//! ```
//!
//! Driven adapters (the HCI transport, the platform timer, event consumers)
//! implement these traits.  The manager consumes them via generics at call
//! sites, so the domain core never touches hardware directly.
//!
//! Command methods on [`AdvertiserHciPort`] only *issue*: the adapter
//! queues the command and returns.  Completions are paired with their
//! command by the adapter and fed back into
//! [`BleAdvertisingManager::on_command_complete`](crate::adv::service::BleAdvertisingManager::on_command_complete)
//! as [`CommandComplete`] records by the dispatch loop.

use crate::adv::events::AdvEvent;
use crate::adv::fragment::FragmentOp;
use crate::adv::{BdAddr, OwnAddressType};

/// HCI status octet for success.
pub const STATUS_SUCCESS: u8 = 0x00;

/// Generic host-side failure status, used when a pipeline dies for a
/// reason the controller never saw.
pub const STATUS_FAILURE: u8 = 0x04;

/// The full `LE Set Extended Advertising Parameters` field set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParametersCommand {
    pub advertising_event_properties: u16,
    pub adv_int_min: u32,
    pub adv_int_max: u32,
    pub channel_map: u8,
    pub own_address_type: OwnAddressType,
    pub own_address: BdAddr,
    pub peer_address_type: u8,
    pub peer_address: BdAddr,
    pub adv_filter_policy: u8,
    pub tx_power: i8,
    pub primary_advertising_phy: u8,
    pub secondary_max_skip: u8,
    pub secondary_advertising_phy: u8,
    pub advertising_sid: u8,
    pub scan_request_notification_enable: bool,
}

/// Which command a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SetParameters,
    SetRandomAddress,
    SetAdvertisingData,
    SetScanResponseData,
    SetPeriodicParameters,
    SetPeriodicData,
    SetPeriodicEnable,
    Enable,
}

/// One issued command's completion.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete {
    pub inst_id: u8,
    pub kind: CommandKind,
    /// HCI status octet; `0x00` is success.
    pub status: u8,
    /// Granted transmit power, present on `SetParameters` completions.
    pub selected_tx_power: Option<i8>,
}

/// Payload of the `LE Advertising Set Terminated` controller event.
#[derive(Debug, Clone, Copy)]
pub struct SetTerminated {
    pub status: u8,
    pub advertising_handle: u8,
    pub connection_handle: u16,
    pub num_completed_extended_adv_events: u8,
}

/// Capability the advertising core needs from the controller.
pub trait AdvertiserHciPort {
    /// Number of advertising sets the controller supports.
    fn read_instance_count(&self) -> u8;

    /// Controller bug workaround: when true, advertising handle 0 must be
    /// reserved and never used.
    fn quirk_advertiser_zero_handle(&self) -> bool;

    /// The controller's public device address.
    fn public_address(&self) -> BdAddr;

    fn set_random_address(&mut self, inst_id: u8, addr: BdAddr);

    fn set_parameters(&mut self, inst_id: u8, cmd: &SetParametersCommand);

    fn set_advertising_data(
        &mut self,
        inst_id: u8,
        op: FragmentOp,
        fragment_preference: u8,
        data: &[u8],
    );

    fn set_scan_response_data(
        &mut self,
        inst_id: u8,
        op: FragmentOp,
        fragment_preference: u8,
        data: &[u8],
    );

    fn set_periodic_advertising_parameters(
        &mut self,
        inst_id: u8,
        min_interval: u16,
        max_interval: u16,
        properties: u16,
    );

    fn set_periodic_advertising_data(&mut self, inst_id: u8, op: FragmentOp, data: &[u8]);

    fn set_periodic_advertising_enable(&mut self, enable: bool, inst_id: u8);

    fn enable(&mut self, enable: bool, inst_id: u8, duration: u16, max_ext_adv_events: u8);
}

/// Kinds of per-instance deadlines the manager arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    /// Periodic resolvable-address rotation.
    AddressRotation,
    /// One-shot bounded-duration disable.
    AdvertisingTimeout,
}

/// Alarm identity: at most one alarm of each kind exists per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmId {
    pub inst_id: u8,
    pub kind: AlarmKind,
}

/// Deadline scheduler the platform provides.  Arming an already-armed id
/// replaces the previous deadline.  Fires come back through the dispatch
/// loop into
/// [`BleAdvertisingManager::on_alarm`](crate::adv::service::BleAdvertisingManager::on_alarm).
pub trait AlarmPort {
    fn arm_periodic(&mut self, id: AlarmId, interval_ms: u64);
    fn arm_oneshot(&mut self, id: AlarmId, delay_ms: u64);
    fn cancel(&mut self, id: AlarmId);
}

/// Consumer of asynchronous advertising outcomes.  Adapters decide where
/// they go — application callbacks, a log, an IPC channel.
pub trait AdvEventSink {
    fn emit(&mut self, event: &AdvEvent);
}
