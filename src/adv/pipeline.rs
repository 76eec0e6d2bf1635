//! Commissioning pipeline state.
//!
//! The asynchronous command chains of the manager are state machines
//! driven by a single completion dispatch: each instance carries at most
//! one [`PendingOp`], which is **taken out of the slot by value** for the
//! duration of a dispatch.  A failure short-circuit simply drops it, so a
//! stale completion arriving later finds an empty slot and cannot corrupt
//! anything.

use crate::adv::fragment::FragmentJob;
use crate::adv::ports::CommandKind;
use crate::adv::{Payload, PeriodicAdvertisingParameters};

/// The operation currently in flight on an instance.
#[derive(Debug)]
pub(crate) enum PendingOp {
    /// Standalone `SetParameters`.
    SetParameters,
    /// Standalone data update, possibly spanning several fragments.
    SetData { job: FragmentJob, scan_rsp: bool },
    SetPeriodicParameters,
    SetPeriodicData { job: FragmentJob },
    SetPeriodicEnable { enable: bool },
    /// Standalone enable/disable; `timeout_s > 0` arms the duration alarm
    /// once the controller accepts.
    Enable { enable: bool, timeout_s: u32 },
    /// A running start pipeline.
    Start(StartJob),
}

impl PendingOp {
    /// The command kind whose completion this operation is waiting for.
    pub fn expected_kind(&self) -> CommandKind {
        match self {
            Self::SetParameters => CommandKind::SetParameters,
            Self::SetData { scan_rsp: false, .. } => CommandKind::SetAdvertisingData,
            Self::SetData { scan_rsp: true, .. } => CommandKind::SetScanResponseData,
            Self::SetPeriodicParameters => CommandKind::SetPeriodicParameters,
            Self::SetPeriodicData { .. } => CommandKind::SetPeriodicData,
            Self::SetPeriodicEnable { .. } => CommandKind::SetPeriodicEnable,
            Self::Enable { .. } => CommandKind::Enable,
            Self::Start(job) => match job.step {
                StartStep::Parameters => CommandKind::SetParameters,
                StartStep::RandomAddress => CommandKind::SetRandomAddress,
                StartStep::AdvertisingData => CommandKind::SetAdvertisingData,
                StartStep::ScanResponseData => CommandKind::SetScanResponseData,
                StartStep::PeriodicParameters => CommandKind::SetPeriodicParameters,
                StartStep::PeriodicData => CommandKind::SetPeriodicData,
                StartStep::PeriodicEnable => CommandKind::SetPeriodicEnable,
                StartStep::Enable => CommandKind::Enable,
            },
        }
    }
}

/// Which start entry point is running.  The full-set flavor compensates
/// with an unregister when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartKind {
    /// `start_advertising` on an already-registered instance.
    Advertising,
    /// `start_advertising_set`: register + commission + optional periodic.
    FullSet,
}

/// The command category the pipeline is awaiting a completion of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartStep {
    Parameters,
    RandomAddress,
    AdvertisingData,
    ScanResponseData,
    PeriodicParameters,
    PeriodicData,
    PeriodicEnable,
    Enable,
}

/// The commissioning context: everything a start request needs across its
/// chain.  Payloads are moved in at entry; the job is owned by the
/// instance's pending slot until the chain finishes or fails.
#[derive(Debug)]
pub(crate) struct StartJob {
    pub kind: StartKind,
    pub step: StartStep,
    pub advertise_data: Payload,
    pub scan_response_data: Payload,
    pub periodic_params: PeriodicAdvertisingParameters,
    pub periodic_data: Payload,
    pub timeout_s: u32,
    /// Fragmenter for the data payload currently on the wire.
    pub frag: Option<FragmentJob>,
}
