//! Mock controller and recording sink for integration tests.
//!
//! Records every issued HCI command so tests can assert on the full
//! command history, and plays completions back in issue order — one at a
//! time, the way a real single-outstanding-command transport does.

use multiadv::adv::events::AdvEvent;
use multiadv::adv::fragment::FragmentOp;
use multiadv::adv::ports::{
    AdvEventSink, AdvertiserHciPort, CommandComplete, CommandKind, SetParametersCommand,
};
use multiadv::adv::BdAddr;
use multiadv::adv::BleAdvertisingManager;
use multiadv::adapters::alarms::SoftwareAlarms;
use rand_core::RngCore;

// ── Issued-command record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HciCall {
    SetRandomAddress {
        inst_id: u8,
        addr: BdAddr,
    },
    SetParameters {
        inst_id: u8,
        cmd: SetParametersCommand,
    },
    SetAdvertisingData {
        inst_id: u8,
        op: FragmentOp,
        frag_pref: u8,
        data: Vec<u8>,
    },
    SetScanResponseData {
        inst_id: u8,
        op: FragmentOp,
        frag_pref: u8,
        data: Vec<u8>,
    },
    SetPeriodicParameters {
        inst_id: u8,
        min_interval: u16,
        max_interval: u16,
        properties: u16,
    },
    SetPeriodicData {
        inst_id: u8,
        op: FragmentOp,
        data: Vec<u8>,
    },
    SetPeriodicEnable {
        enable: bool,
        inst_id: u8,
    },
    Enable {
        enable: bool,
        inst_id: u8,
        duration: u16,
        max_events: u8,
    },
}

impl HciCall {
    fn kind(&self) -> CommandKind {
        match self {
            Self::SetRandomAddress { .. } => CommandKind::SetRandomAddress,
            Self::SetParameters { .. } => CommandKind::SetParameters,
            Self::SetAdvertisingData { .. } => CommandKind::SetAdvertisingData,
            Self::SetScanResponseData { .. } => CommandKind::SetScanResponseData,
            Self::SetPeriodicParameters { .. } => CommandKind::SetPeriodicParameters,
            Self::SetPeriodicData { .. } => CommandKind::SetPeriodicData,
            Self::SetPeriodicEnable { .. } => CommandKind::SetPeriodicEnable,
            Self::Enable { .. } => CommandKind::Enable,
        }
    }

    fn inst_id(&self) -> u8 {
        match self {
            Self::SetRandomAddress { inst_id, .. }
            | Self::SetParameters { inst_id, .. }
            | Self::SetAdvertisingData { inst_id, .. }
            | Self::SetScanResponseData { inst_id, .. }
            | Self::SetPeriodicParameters { inst_id, .. }
            | Self::SetPeriodicData { inst_id, .. }
            | Self::SetPeriodicEnable { inst_id, .. }
            | Self::Enable { inst_id, .. } => *inst_id,
        }
    }
}

// ── MockController ────────────────────────────────────────────

/// Display order AA:BB:CC:DD:EE:FF, stored little-endian.
pub const PUBLIC_ADDR: BdAddr = [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA];

pub struct MockController {
    pub instance_count: u8,
    pub quirk_zero: bool,
    pub granted_tx_power: i8,
    /// Commands of this kind complete with this status instead of success.
    pub fail_with: Option<(CommandKind, u8)>,
    pub calls: Vec<HciCall>,
    completed: usize,
}

#[allow(dead_code)]
impl MockController {
    pub fn new(instance_count: u8) -> Self {
        Self {
            instance_count,
            quirk_zero: false,
            granted_tx_power: 9,
            fail_with: None,
            calls: Vec::new(),
            completed: 0,
        }
    }

    /// Completion for the oldest issued-but-uncompleted command.
    pub fn next_completion(&mut self) -> Option<CommandComplete> {
        let call = self.calls.get(self.completed)?;
        self.completed += 1;

        let kind = call.kind();
        let status = match self.fail_with {
            Some((k, s)) if k == kind => s,
            _ => 0x00,
        };
        let selected_tx_power = (kind == CommandKind::SetParameters && status == 0x00)
            .then_some(self.granted_tx_power);

        Some(CommandComplete {
            inst_id: call.inst_id(),
            kind,
            status,
            selected_tx_power,
        })
    }

    /// Issued commands not yet consumed by an assertion.
    pub fn take_calls(&mut self) -> Vec<HciCall> {
        self.completed = self.completed.saturating_sub(self.calls.len());
        std::mem::take(&mut self.calls)
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.calls.iter().map(HciCall::kind).collect()
    }
}

impl AdvertiserHciPort for MockController {
    fn read_instance_count(&self) -> u8 {
        self.instance_count
    }

    fn quirk_advertiser_zero_handle(&self) -> bool {
        self.quirk_zero
    }

    fn public_address(&self) -> BdAddr {
        PUBLIC_ADDR
    }

    fn set_random_address(&mut self, inst_id: u8, addr: BdAddr) {
        self.calls.push(HciCall::SetRandomAddress { inst_id, addr });
    }

    fn set_parameters(&mut self, inst_id: u8, cmd: &SetParametersCommand) {
        self.calls.push(HciCall::SetParameters {
            inst_id,
            cmd: cmd.clone(),
        });
    }

    fn set_advertising_data(&mut self, inst_id: u8, op: FragmentOp, frag_pref: u8, data: &[u8]) {
        self.calls.push(HciCall::SetAdvertisingData {
            inst_id,
            op,
            frag_pref,
            data: data.to_vec(),
        });
    }

    fn set_scan_response_data(&mut self, inst_id: u8, op: FragmentOp, frag_pref: u8, data: &[u8]) {
        self.calls.push(HciCall::SetScanResponseData {
            inst_id,
            op,
            frag_pref,
            data: data.to_vec(),
        });
    }

    fn set_periodic_advertising_parameters(
        &mut self,
        inst_id: u8,
        min_interval: u16,
        max_interval: u16,
        properties: u16,
    ) {
        self.calls.push(HciCall::SetPeriodicParameters {
            inst_id,
            min_interval,
            max_interval,
            properties,
        });
    }

    fn set_periodic_advertising_data(&mut self, inst_id: u8, op: FragmentOp, data: &[u8]) {
        self.calls.push(HciCall::SetPeriodicData {
            inst_id,
            op,
            data: data.to_vec(),
        });
    }

    fn set_periodic_advertising_enable(&mut self, enable: bool, inst_id: u8) {
        self.calls
            .push(HciCall::SetPeriodicEnable { enable, inst_id });
    }

    fn enable(&mut self, enable: bool, inst_id: u8, duration: u16, max_ext_adv_events: u8) {
        self.calls.push(HciCall::Enable {
            enable,
            inst_id,
            duration,
            max_events: max_ext_adv_events,
        });
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AdvEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&AdvEvent> {
        self.events.last()
    }
}

impl AdvEventSink for RecordingSink {
    fn emit(&mut self, event: &AdvEvent) {
        self.events.push(event.clone());
    }
}

// ── Deterministic entropy ─────────────────────────────────────

/// xorshift64* stream, seeded per test.
pub struct FakeRng(u64);

#[allow(dead_code)]
impl FakeRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }
}

impl RngCore for FakeRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// ── Drive helpers ─────────────────────────────────────────────

/// Deliver pending completions until the controller queue drains, the way
/// the dispatch loop would.
#[allow(dead_code)]
pub fn pump(
    mgr: &mut BleAdvertisingManager,
    hci: &mut MockController,
    alarms: &mut SoftwareAlarms,
    sink: &mut RecordingSink,
) {
    while let Some(complete) = hci.next_completion() {
        mgr.on_command_complete(complete, hci, alarms, sink);
    }
}
