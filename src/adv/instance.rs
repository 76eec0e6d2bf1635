//! Advertising instance slots.
//!
//! One [`AdvertisingInstance`] per controller advertising set, held in a
//! fixed-capacity [`InstanceTable`] indexed by `inst_id`.  Invariants the
//! table maintains:
//!
//! - a free slot (`in_use == false`) carries no pending operation,
//! - slot state is wiped on unregister, so a later occupant never observes
//!   a previous advertiser's address or parameters.

use heapless::Vec;

use crate::adv::pipeline::PendingOp;
use crate::adv::{BdAddr, OwnAddressType};
use crate::config::MAX_ADV_INSTANCES;

/// One controller advertising set slot.
#[derive(Debug)]
pub struct AdvertisingInstance {
    pub(crate) inst_id: u8,
    pub(crate) in_use: bool,
    pub(crate) advertising_event_properties: u16,
    pub(crate) own_address_type: OwnAddressType,
    pub(crate) own_address: BdAddr,
    /// Effective transmit power: overwritten with the controller-granted
    /// value when `SetParameters` completes.
    pub(crate) tx_power: i8,
    /// Bounded duration left behind by the last bounded enable; 0 when
    /// unbounded.
    pub(crate) timeout_s: u32,
    pub(crate) raddr_timer_armed: bool,
    pub(crate) timeout_timer_armed: bool,
    /// The operation currently in flight on this slot, if any.
    pub(crate) pending: Option<PendingOp>,
}

impl AdvertisingInstance {
    pub(crate) fn new(inst_id: u8) -> Self {
        Self {
            inst_id,
            in_use: false,
            advertising_event_properties: 0,
            own_address_type: OwnAddressType::Public,
            own_address: [0; 6],
            tx_power: 0,
            timeout_s: 0,
            raddr_timer_armed: false,
            timeout_timer_armed: false,
            pending: None,
        }
    }

    /// Wipe the slot back to its freshly-constructed state, keeping only
    /// the id.  Drops any pending operation, so a stale completion later
    /// finds nothing to act on.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.inst_id);
    }

    pub fn inst_id(&self) -> u8 {
        self.inst_id
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub fn own_address(&self) -> BdAddr {
        self.own_address
    }

    pub fn own_address_type(&self) -> OwnAddressType {
        self.own_address_type
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    pub fn timeout_s(&self) -> u32 {
        self.timeout_s
    }

    /// Directed advertising bits (2-3) of the event properties.
    pub fn is_directed(&self) -> bool {
        self.advertising_event_properties & 0x0C != 0
    }
}

/// Fixed-capacity, `inst_id`-indexed sequence of advertising slots.
#[derive(Debug)]
pub(crate) struct InstanceTable {
    slots: Vec<AdvertisingInstance, MAX_ADV_INSTANCES>,
}

impl InstanceTable {
    /// Build a table of `count` slots with stable ids `0..count`.
    pub fn with_count(count: u8) -> Self {
        let mut slots = Vec::new();
        for id in 0..count.min(MAX_ADV_INSTANCES as u8) {
            // Capacity is clamped above, so the push cannot fail.
            let _ = slots.push(AdvertisingInstance::new(id));
        }
        Self { slots }
    }

    pub fn len(&self) -> u8 {
        self.slots.len() as u8
    }

    pub fn get(&self, inst_id: u8) -> Option<&AdvertisingInstance> {
        self.slots.get(usize::from(inst_id))
    }

    pub fn get_mut(&mut self, inst_id: u8) -> Option<&mut AdvertisingInstance> {
        self.slots.get_mut(usize::from(inst_id))
    }

    /// First slot not allocated to an advertiser, lowest id first.
    pub fn first_free(&mut self) -> Option<&mut AdvertisingInstance> {
        self.slots.iter_mut().find(|s| !s.in_use)
    }

    pub fn in_use_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }
}
