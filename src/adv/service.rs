//! The advertising manager — public API façade and completion dispatch.
//!
//! [`BleAdvertisingManager`] owns the instance table and every
//! commissioning state machine.  It is driven from a single dispatch loop:
//! API calls issue HCI commands through the injected
//! [`AdvertiserHciPort`], and the loop feeds completions, controller
//! events, and alarm fires back in through [`on_command_complete`],
//! [`on_advertising_set_terminated`], and [`on_alarm`].
//!
//! ```text
//!  register / start_* / set_* ──▶ ┌──────────────────────────┐ ──▶ HCI port
//!                                 │   BleAdvertisingManager  │
//!  completions / events / alarms ─▶  instance table · jobs   │ ──▶ AdvEventSink
//!                                 └──────────────────────────┘
//! ```
//!
//! [`on_command_complete`]: BleAdvertisingManager::on_command_complete
//! [`on_advertising_set_terminated`]: BleAdvertisingManager::on_advertising_set_terminated
//! [`on_alarm`]: BleAdvertisingManager::on_alarm

use log::{debug, error, info, warn};
use rand_core::RngCore;

use crate::adv::data;
use crate::adv::events::AdvEvent;
use crate::adv::fragment::FragmentJob;
use crate::adv::instance::{AdvertisingInstance, InstanceTable};
use crate::adv::pipeline::{PendingOp, StartJob, StartKind, StartStep};
use crate::adv::ports::{
    AdvEventSink, AdvertiserHciPort, AlarmId, AlarmKind, AlarmPort, CommandComplete,
    SetParametersCommand, SetTerminated, STATUS_FAILURE, STATUS_SUCCESS,
};
use crate::adv::rpa;
use crate::adv::{
    AdvertisingParameters, Payload, PeriodicAdvertisingParameters,
};
use crate::config::{AdvertiserConfig, ADV_PAYLOAD_CAP, FRAGMENT_PREFERENCE, MAX_ADV_INSTANCES};
use crate::error::{AdvError, Result};

/// The multi-advertising control plane.
pub struct BleAdvertisingManager {
    config: AdvertiserConfig,
    table: InstanceTable,
}

impl BleAdvertisingManager {
    /// Size the instance table from the controller and apply the
    /// zero-handle quirk: on affected controllers, handle 0 is registered
    /// here and never used.
    pub fn initialize(
        config: AdvertiserConfig,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        rng: &mut dyn RngCore,
    ) -> Self {
        let count = hci.read_instance_count().min(MAX_ADV_INSTANCES as u8);
        info!("advertising manager: controller supports {} instances", count);

        let mut mgr = Self {
            config,
            table: InstanceTable::with_count(count),
        };

        if hci.quirk_advertiser_zero_handle() {
            match mgr.register(hci, alarms, rng) {
                Ok(id) => info!("quirk: advertiser {} reserved and parked", id),
                Err(e) => warn!("quirk: could not reserve advertiser 0: {}", e),
            }
        }

        mgr
    }

    /// Number of slots in the table.
    pub fn instance_count(&self) -> u8 {
        self.table.len()
    }

    /// Slots currently allocated to advertisers.
    pub fn in_use_count(&self) -> usize {
        self.table.in_use_count()
    }

    /// Read-only view of a slot, for introspection and tests.
    pub fn instance(&self, inst_id: u8) -> Option<&AdvertisingInstance> {
        self.table.get(inst_id)
    }

    // ── Registration ──────────────────────────────────────────

    /// Allocate the first free slot.  With privacy on, the slot gets a
    /// fresh resolvable address and a periodic rotation alarm; otherwise
    /// it advertises from the controller's public address.
    pub fn register(
        &mut self,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        rng: &mut dyn RngCore,
    ) -> Result<u8> {
        let privacy = self.config.privacy_enabled;
        let irk = self.config.irk;
        let rotation_ms = self.config.rpa_rotation_interval_ms;
        let public = hci.public_address();

        let Some(inst) = self.table.first_free() else {
            info!("no free advertiser instance");
            return Err(AdvError::TooManyAdvertisers);
        };

        // The slot may carry leftovers from a retired directed set.
        inst.reset();
        inst.in_use = true;
        let inst_id = inst.inst_id;

        if privacy {
            inst.own_address_type = crate::adv::OwnAddressType::Random;
            inst.own_address = rpa::generate(&irk, rng);
            inst.raddr_timer_armed = true;
            alarms.arm_periodic(
                AlarmId {
                    inst_id,
                    kind: AlarmKind::AddressRotation,
                },
                rotation_ms,
            );
            info!("advertiser {} registered (resolvable address)", inst_id);
        } else {
            inst.own_address_type = crate::adv::OwnAddressType::Public;
            inst.own_address = public;
            info!("advertiser {} registered (public address)", inst_id);
        }

        Ok(inst_id)
    }

    /// Release a slot: quiet disable on the controller, cancel both
    /// alarms, wipe the slot.  Idempotent once the slot is free.
    pub fn unregister(
        &mut self,
        inst_id: u8,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
    ) {
        let Some(inst) = self.table.get_mut(inst_id) else {
            error!("unregister: bad instance id {}", inst_id);
            return;
        };
        if !inst.in_use {
            debug!("unregister: instance {} already free", inst_id);
            return;
        }

        hci.enable(false, inst_id, 0x0000, 0x00);

        if inst.raddr_timer_armed {
            alarms.cancel(AlarmId {
                inst_id,
                kind: AlarmKind::AddressRotation,
            });
        }
        if inst.timeout_timer_armed {
            alarms.cancel(AlarmId {
                inst_id,
                kind: AlarmKind::AdvertisingTimeout,
            });
        }

        inst.reset();
        info!("advertiser {} unregistered", inst_id);
    }

    // ── Parameters ────────────────────────────────────────────

    /// Record the event properties and requested power, then push the full
    /// parameter set to the controller.  The completion carries the
    /// granted power, which becomes the instance's effective value.
    pub fn set_parameters(
        &mut self,
        inst_id: u8,
        params: &AdvertisingParameters,
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }

        inst.advertising_event_properties = params.advertising_event_properties;
        inst.tx_power = params.tx_power;
        let cmd = build_parameters_command(params, inst);

        inst.pending = Some(PendingOp::SetParameters);
        hci.set_parameters(inst_id, &cmd);
        Ok(())
    }

    // ── Data ──────────────────────────────────────────────────

    /// Preprocess and write advertising or scan-response data.  Fragments
    /// beyond the first are chained on completions.
    pub fn set_data(
        &mut self,
        inst_id: u8,
        is_scan_rsp: bool,
        data: &[u8],
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }

        let payload = data::prepare(
            data,
            inst.advertising_event_properties,
            inst.timeout_s,
            inst.tx_power,
            is_scan_rsp,
        )?;

        let mut job = FragmentJob::new(payload);
        if let Some((op, chunk)) = job.next_chunk() {
            if is_scan_rsp {
                hci.set_scan_response_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
            } else {
                hci.set_advertising_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
            }
        }
        inst.pending = Some(PendingOp::SetData {
            job,
            scan_rsp: is_scan_rsp,
        });
        Ok(())
    }

    // ── Enable ────────────────────────────────────────────────

    /// Enable or disable the set.  A bounded enable (`timeout_s > 0`) arms
    /// the duration alarm once the controller's completion is seen — never
    /// earlier, so a rejected enable needs no compensating cancel.
    pub fn enable(
        &mut self,
        inst_id: u8,
        enable: bool,
        timeout_s: u32,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }
        debug!(
            "instance {}: enable={} timeout={}s",
            inst_id, enable, timeout_s
        );

        if enable && timeout_s > 0 {
            inst.pending = Some(PendingOp::Enable {
                enable: true,
                timeout_s,
            });
            hci.enable(true, inst_id, 0x0000, 0x00);
        } else {
            if inst.timeout_timer_armed {
                inst.timeout_timer_armed = false;
                alarms.cancel(AlarmId {
                    inst_id,
                    kind: AlarmKind::AdvertisingTimeout,
                });
            }
            inst.pending = Some(PendingOp::Enable {
                enable,
                timeout_s: 0,
            });
            hci.enable(enable, inst_id, 0x0000, 0x00);
        }
        Ok(())
    }

    // ── Periodic advertising ──────────────────────────────────

    pub fn set_periodic_advertising_parameters(
        &mut self,
        inst_id: u8,
        params: &PeriodicAdvertisingParameters,
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }
        inst.pending = Some(PendingOp::SetPeriodicParameters);
        hci.set_periodic_advertising_parameters(
            inst_id,
            params.min_interval,
            params.max_interval,
            params.periodic_advertising_properties,
        );
        Ok(())
    }

    /// Periodic data goes out raw — no flags prepend, no power rewrite.
    pub fn set_periodic_advertising_data(
        &mut self,
        inst_id: u8,
        data: &[u8],
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }

        let payload = Payload::from_slice(data).map_err(|_| AdvError::PayloadTooLarge)?;
        let mut job = FragmentJob::new(payload);
        if let Some((op, chunk)) = job.next_chunk() {
            hci.set_periodic_advertising_data(inst_id, op, chunk);
        }
        inst.pending = Some(PendingOp::SetPeriodicData { job });
        Ok(())
    }

    pub fn set_periodic_advertising_enable(
        &mut self,
        inst_id: u8,
        enable: bool,
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }
        inst.pending = Some(PendingOp::SetPeriodicEnable { enable });
        hci.set_periodic_advertising_enable(enable, inst_id);
        Ok(())
    }

    // ── Start pipelines ───────────────────────────────────────

    /// Commission an already-registered instance: parameters, random
    /// address, both payloads, enable.  The outcome arrives as
    /// [`AdvEvent::AdvertisingStarted`]; a bounded duration later fires
    /// [`AdvEvent::TimedOut`].
    pub fn start_advertising(
        &mut self,
        inst_id: u8,
        params: &AdvertisingParameters,
        advertise_data: &[u8],
        scan_response_data: &[u8],
        timeout_s: u32,
        hci: &mut impl AdvertiserHciPort,
    ) -> Result<()> {
        ensure_payload_fits(advertise_data, params.advertising_event_properties)?;
        let advertise_data =
            Payload::from_slice(advertise_data).map_err(|_| AdvError::PayloadTooLarge)?;
        let scan_response_data =
            Payload::from_slice(scan_response_data).map_err(|_| AdvError::PayloadTooLarge)?;

        let inst = self.checked_instance_mut(inst_id)?;
        if inst.pending.is_some() {
            return Err(AdvError::Busy(inst_id));
        }

        inst.advertising_event_properties = params.advertising_event_properties;
        inst.tx_power = params.tx_power;
        let cmd = build_parameters_command(params, inst);

        inst.pending = Some(PendingOp::Start(StartJob {
            kind: StartKind::Advertising,
            step: StartStep::Parameters,
            advertise_data,
            scan_response_data,
            periodic_params: PeriodicAdvertisingParameters::default(),
            periodic_data: Payload::new(),
            timeout_s,
            frag: None,
        }));
        hci.set_parameters(inst_id, &cmd);
        Ok(())
    }

    /// Allocate a slot and commission it end to end, including the
    /// periodic leg when `periodic_params.enable` is set.  Returns the
    /// allocated id; the outcome arrives as [`AdvEvent::SetStarted`].  Any
    /// controller failure after allocation unregisters the slot before the
    /// outcome is surfaced, so a failed call leaves the table untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn start_advertising_set(
        &mut self,
        params: &AdvertisingParameters,
        advertise_data: &[u8],
        scan_response_data: &[u8],
        periodic_params: &PeriodicAdvertisingParameters,
        periodic_data: &[u8],
        timeout_s: u32,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        rng: &mut dyn RngCore,
    ) -> Result<u8> {
        // Size checks before allocation, so a bad payload never needs
        // compensation.
        ensure_payload_fits(advertise_data, params.advertising_event_properties)?;
        let advertise_data =
            Payload::from_slice(advertise_data).map_err(|_| AdvError::PayloadTooLarge)?;
        let scan_response_data =
            Payload::from_slice(scan_response_data).map_err(|_| AdvError::PayloadTooLarge)?;
        let periodic_data =
            Payload::from_slice(periodic_data).map_err(|_| AdvError::PayloadTooLarge)?;

        let inst_id = self.register(hci, alarms, rng)?;

        let Some(inst) = self.table.get_mut(inst_id) else {
            // register() only returns ids it allocated
            return Err(AdvError::InvalidInstance(inst_id));
        };
        inst.advertising_event_properties = params.advertising_event_properties;
        inst.tx_power = params.tx_power;
        let cmd = build_parameters_command(params, inst);

        inst.pending = Some(PendingOp::Start(StartJob {
            kind: StartKind::FullSet,
            step: StartStep::Parameters,
            advertise_data,
            scan_response_data,
            periodic_params: *periodic_params,
            periodic_data,
            timeout_s,
            frag: None,
        }));
        hci.set_parameters(inst_id, &cmd);
        Ok(inst_id)
    }

    // ── Completion dispatch ───────────────────────────────────

    /// Feed one command completion back into the state machines.  Stray
    /// completions — freed slots, fire-and-forget commands — are dropped.
    pub fn on_command_complete(
        &mut self,
        complete: CommandComplete,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        sink: &mut impl AdvEventSink,
    ) {
        let inst_id = complete.inst_id;

        let op = {
            let Some(inst) = self.table.get_mut(inst_id) else {
                warn!("completion for unknown instance {}", inst_id);
                return;
            };
            if !inst.in_use {
                debug!("instance {}: completion for freed slot dropped", inst_id);
                return;
            }
            match inst.pending.take() {
                Some(op) => op,
                None => {
                    debug!(
                        "instance {}: unsolicited {:?} completion dropped",
                        inst_id, complete.kind
                    );
                    return;
                }
            }
        };

        let expected = op.expected_kind();
        if complete.kind != expected {
            warn!(
                "instance {}: {:?} completion while waiting for {:?} — ignored",
                inst_id, complete.kind, expected
            );
            if let Some(inst) = self.table.get_mut(inst_id) {
                inst.pending = Some(op);
            }
            return;
        }

        match op {
            PendingOp::SetParameters => self.finish_set_parameters(inst_id, &complete, sink),
            PendingOp::SetData { job, scan_rsp } => {
                self.continue_set_data(inst_id, job, scan_rsp, complete.status, hci, sink)
            }
            PendingOp::SetPeriodicParameters => {
                if complete.status != STATUS_SUCCESS {
                    error!(
                        "instance {}: setting periodic parameters failed, status {:#04x}",
                        inst_id, complete.status
                    );
                }
                sink.emit(&AdvEvent::PeriodicParametersSet {
                    inst_id,
                    status: complete.status,
                });
            }
            PendingOp::SetPeriodicData { job } => {
                self.continue_periodic_data(inst_id, job, complete.status, hci, sink)
            }
            PendingOp::SetPeriodicEnable { enable } => {
                if complete.status != STATUS_SUCCESS {
                    error!(
                        "instance {}: periodic enable failed, status {:#04x}",
                        inst_id, complete.status
                    );
                }
                sink.emit(&AdvEvent::PeriodicEnabled {
                    inst_id,
                    enabled: enable,
                    status: complete.status,
                });
            }
            PendingOp::Enable { enable, timeout_s } => {
                self.finish_enable(inst_id, enable, timeout_s, complete.status, alarms, sink)
            }
            PendingOp::Start(job) => self.advance_start(inst_id, job, &complete, hci, alarms, sink),
        }
    }

    fn finish_set_parameters(
        &mut self,
        inst_id: u8,
        complete: &CommandComplete,
        sink: &mut impl AdvEventSink,
    ) {
        if complete.status == STATUS_SUCCESS {
            if let (Some(inst), Some(tx)) =
                (self.table.get_mut(inst_id), complete.selected_tx_power)
            {
                inst.tx_power = tx;
            }
        } else {
            error!(
                "instance {}: setting parameters failed, status {:#04x}",
                inst_id, complete.status
            );
        }
        let tx_power = self.table.get(inst_id).map(|i| i.tx_power).unwrap_or(0);
        sink.emit(&AdvEvent::ParametersSet {
            inst_id,
            status: complete.status,
            tx_power,
        });
    }

    fn continue_set_data(
        &mut self,
        inst_id: u8,
        mut job: FragmentJob,
        scan_rsp: bool,
        status: u8,
        hci: &mut impl AdvertiserHciPort,
        sink: &mut impl AdvEventSink,
    ) {
        if status != STATUS_SUCCESS {
            error!(
                "instance {}: setting {} data failed, status {:#04x}",
                inst_id,
                if scan_rsp { "scan response" } else { "advertise" },
                status
            );
            sink.emit(&AdvEvent::DataSet {
                inst_id,
                scan_rsp,
                status,
            });
            return;
        }

        let sent = match job.next_chunk() {
            Some((op, chunk)) => {
                if scan_rsp {
                    hci.set_scan_response_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                } else {
                    hci.set_advertising_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                }
                true
            }
            None => false,
        };

        if sent {
            if let Some(inst) = self.table.get_mut(inst_id) {
                inst.pending = Some(PendingOp::SetData { job, scan_rsp });
            }
        } else {
            sink.emit(&AdvEvent::DataSet {
                inst_id,
                scan_rsp,
                status: STATUS_SUCCESS,
            });
        }
    }

    fn continue_periodic_data(
        &mut self,
        inst_id: u8,
        mut job: FragmentJob,
        status: u8,
        hci: &mut impl AdvertiserHciPort,
        sink: &mut impl AdvEventSink,
    ) {
        if status != STATUS_SUCCESS {
            error!(
                "instance {}: setting periodic data failed, status {:#04x}",
                inst_id, status
            );
            sink.emit(&AdvEvent::PeriodicDataSet { inst_id, status });
            return;
        }

        let sent = match job.next_chunk() {
            Some((op, chunk)) => {
                hci.set_periodic_advertising_data(inst_id, op, chunk);
                true
            }
            None => false,
        };

        if sent {
            if let Some(inst) = self.table.get_mut(inst_id) {
                inst.pending = Some(PendingOp::SetPeriodicData { job });
            }
        } else {
            sink.emit(&AdvEvent::PeriodicDataSet {
                inst_id,
                status: STATUS_SUCCESS,
            });
        }
    }

    fn finish_enable(
        &mut self,
        inst_id: u8,
        enable: bool,
        timeout_s: u32,
        status: u8,
        alarms: &mut impl AlarmPort,
        sink: &mut impl AdvEventSink,
    ) {
        if status != STATUS_SUCCESS {
            error!(
                "instance {}: {} failed, status {:#04x}",
                inst_id,
                if enable { "enable" } else { "disable" },
                status
            );
        }

        // Callback first, then the duration alarm.
        sink.emit(&AdvEvent::Enabled {
            inst_id,
            enabled: enable,
            status,
        });

        if enable && timeout_s > 0 {
            if let Some(inst) = self.table.get_mut(inst_id) {
                inst.timeout_s = timeout_s;
                inst.timeout_timer_armed = true;
            }
            alarms.arm_oneshot(
                AlarmId {
                    inst_id,
                    kind: AlarmKind::AdvertisingTimeout,
                },
                u64::from(timeout_s) * 1000,
            );
        }
    }

    fn advance_start(
        &mut self,
        inst_id: u8,
        mut job: StartJob,
        complete: &CommandComplete,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        sink: &mut impl AdvEventSink,
    ) {
        if complete.status != STATUS_SUCCESS {
            self.fail_start(inst_id, &job, complete.status, hci, alarms, sink);
            return;
        }

        match job.step {
            StartStep::Parameters => {
                let own_address = {
                    let Some(inst) = self.table.get_mut(inst_id) else {
                        return;
                    };
                    if let Some(tx) = complete.selected_tx_power {
                        inst.tx_power = tx;
                    }
                    inst.own_address
                };
                job.step = StartStep::RandomAddress;
                hci.set_random_address(inst_id, own_address);
                self.park(inst_id, job);
            }

            StartStep::RandomAddress => {
                // Advertising data next, rewritten with the granted power.
                let prepared = match self.table.get(inst_id) {
                    Some(inst) => data::prepare(
                        &job.advertise_data,
                        inst.advertising_event_properties,
                        inst.timeout_s,
                        inst.tx_power,
                        false,
                    ),
                    None => return,
                };
                match prepared {
                    Ok(payload) => {
                        let mut frag = FragmentJob::new(payload);
                        if let Some((op, chunk)) = frag.next_chunk() {
                            hci.set_advertising_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                        }
                        job.frag = Some(frag);
                        job.step = StartStep::AdvertisingData;
                        self.park(inst_id, job);
                    }
                    Err(e) => {
                        error!("instance {}: advertise data rejected: {}", inst_id, e);
                        self.fail_start(inst_id, &job, STATUS_FAILURE, hci, alarms, sink);
                    }
                }
            }

            StartStep::AdvertisingData => {
                if let Some(frag) = job.frag.as_mut() {
                    let sent = match frag.next_chunk() {
                        Some((op, chunk)) => {
                            hci.set_advertising_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                            true
                        }
                        None => false,
                    };
                    if sent {
                        self.park(inst_id, job);
                        return;
                    }
                }
                job.frag = None;

                let prepared = match self.table.get(inst_id) {
                    Some(inst) => data::prepare(
                        &job.scan_response_data,
                        inst.advertising_event_properties,
                        inst.timeout_s,
                        inst.tx_power,
                        true,
                    ),
                    None => return,
                };
                match prepared {
                    Ok(payload) => {
                        let mut frag = FragmentJob::new(payload);
                        if let Some((op, chunk)) = frag.next_chunk() {
                            hci.set_scan_response_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                        }
                        job.frag = Some(frag);
                        job.step = StartStep::ScanResponseData;
                        self.park(inst_id, job);
                    }
                    Err(e) => {
                        error!("instance {}: scan response data rejected: {}", inst_id, e);
                        self.fail_start(inst_id, &job, STATUS_FAILURE, hci, alarms, sink);
                    }
                }
            }

            StartStep::ScanResponseData => {
                if let Some(frag) = job.frag.as_mut() {
                    let sent = match frag.next_chunk() {
                        Some((op, chunk)) => {
                            hci.set_scan_response_data(inst_id, op, FRAGMENT_PREFERENCE, chunk);
                            true
                        }
                        None => false,
                    };
                    if sent {
                        self.park(inst_id, job);
                        return;
                    }
                }
                job.frag = None;

                if job.kind == StartKind::FullSet && job.periodic_params.enable {
                    let p = job.periodic_params;
                    hci.set_periodic_advertising_parameters(
                        inst_id,
                        p.min_interval,
                        p.max_interval,
                        p.periodic_advertising_properties,
                    );
                    job.step = StartStep::PeriodicParameters;
                    self.park(inst_id, job);
                } else {
                    hci.enable(true, inst_id, 0x0000, 0x00);
                    job.step = StartStep::Enable;
                    self.park(inst_id, job);
                }
            }

            StartStep::PeriodicParameters => {
                let mut frag = FragmentJob::new(core::mem::take(&mut job.periodic_data));
                if let Some((op, chunk)) = frag.next_chunk() {
                    hci.set_periodic_advertising_data(inst_id, op, chunk);
                }
                job.frag = Some(frag);
                job.step = StartStep::PeriodicData;
                self.park(inst_id, job);
            }

            StartStep::PeriodicData => {
                if let Some(frag) = job.frag.as_mut() {
                    let sent = match frag.next_chunk() {
                        Some((op, chunk)) => {
                            hci.set_periodic_advertising_data(inst_id, op, chunk);
                            true
                        }
                        None => false,
                    };
                    if sent {
                        self.park(inst_id, job);
                        return;
                    }
                }
                job.frag = None;
                hci.set_periodic_advertising_enable(true, inst_id);
                job.step = StartStep::PeriodicEnable;
                self.park(inst_id, job);
            }

            StartStep::PeriodicEnable => {
                hci.enable(true, inst_id, 0x0000, 0x00);
                job.step = StartStep::Enable;
                self.park(inst_id, job);
            }

            StartStep::Enable => {
                // Chain complete.  Outcome first, then the duration alarm.
                match job.kind {
                    StartKind::Advertising => {
                        info!("instance {}: advertising started", inst_id);
                        sink.emit(&AdvEvent::AdvertisingStarted {
                            inst_id,
                            status: STATUS_SUCCESS,
                        });
                    }
                    StartKind::FullSet => {
                        let tx_power = self.table.get(inst_id).map(|i| i.tx_power).unwrap_or(0);
                        info!(
                            "instance {}: advertising set started (tx {} dBm)",
                            inst_id, tx_power
                        );
                        sink.emit(&AdvEvent::SetStarted {
                            inst_id,
                            tx_power,
                            status: STATUS_SUCCESS,
                        });
                    }
                }

                if job.timeout_s > 0 {
                    if let Some(inst) = self.table.get_mut(inst_id) {
                        inst.timeout_s = job.timeout_s;
                        inst.timeout_timer_armed = true;
                    }
                    alarms.arm_oneshot(
                        AlarmId {
                            inst_id,
                            kind: AlarmKind::AdvertisingTimeout,
                        },
                        u64::from(job.timeout_s) * 1000,
                    );
                }
            }
        }
    }

    fn fail_start(
        &mut self,
        inst_id: u8,
        job: &StartJob,
        status: u8,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        sink: &mut impl AdvEventSink,
    ) {
        error!(
            "instance {}: start pipeline failed at {:?}, status {:#04x}",
            inst_id, job.step, status
        );
        match job.kind {
            StartKind::Advertising => {
                sink.emit(&AdvEvent::AdvertisingStarted { inst_id, status });
            }
            StartKind::FullSet => {
                // Compensation: free the slot before surfacing the failure.
                self.unregister(inst_id, hci, alarms);
                sink.emit(&AdvEvent::SetStarted {
                    inst_id: 0,
                    tx_power: 0,
                    status,
                });
            }
        }
    }

    fn park(&mut self, inst_id: u8, job: StartJob) {
        if let Some(inst) = self.table.get_mut(inst_id) {
            inst.pending = Some(PendingOp::Start(job));
        }
    }

    // ── Controller events ─────────────────────────────────────

    /// `LE Advertising Set Terminated`.  Non-directed sets are re-armed so
    /// the advertiser keeps running after a connection; directed sets are
    /// one-shot and retire their slot.
    pub fn on_advertising_set_terminated(
        &mut self,
        evt: SetTerminated,
        hci: &mut impl AdvertiserHciPort,
        sink: &mut impl AdvEventSink,
    ) {
        debug!(
            "set terminated: status {:#04x} handle {} conn {:#06x} events {}",
            evt.status, evt.advertising_handle, evt.connection_handle,
            evt.num_completed_extended_adv_events
        );

        let privacy = self.config.privacy_enabled;
        let Some(inst) = self.table.get_mut(evt.advertising_handle) else {
            warn!(
                "terminated event for unknown handle {}",
                evt.advertising_handle
            );
            return;
        };

        if privacy {
            sink.emit(&AdvEvent::OwnAddressUpdate {
                connection_handle: evt.connection_handle,
                address: inst.own_address,
            });
        }

        if inst.in_use {
            if !inst.is_directed() {
                // The controller paused the set for the new connection.
                hci.enable(true, evt.advertising_handle, 0x0000, 0x00);
            } else {
                // Directed advertising is one-shot.
                inst.in_use = false;
            }
        }
    }

    // ── Alarm fires ───────────────────────────────────────────

    /// Entry point for the platform's alarm dispatch.
    pub fn on_alarm(
        &mut self,
        id: AlarmId,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        rng: &mut dyn RngCore,
        sink: &mut impl AdvEventSink,
    ) {
        match id.kind {
            AlarmKind::AddressRotation => self.rotate_address(id, hci, alarms, rng),
            AlarmKind::AdvertisingTimeout => self.duration_expired(id.inst_id, hci, sink),
        }
    }

    fn rotate_address(
        &mut self,
        id: AlarmId,
        hci: &mut impl AdvertiserHciPort,
        alarms: &mut impl AlarmPort,
        rng: &mut dyn RngCore,
    ) {
        let irk = self.config.irk;
        let Some(inst) = self.table.get_mut(id.inst_id) else {
            warn!("rotation alarm for unknown instance {}", id.inst_id);
            return;
        };
        if !inst.in_use {
            // Stale periodic alarm, e.g. after a directed set retired.
            inst.raddr_timer_armed = false;
            alarms.cancel(id);
            return;
        }

        inst.own_address = rpa::generate(&irk, rng);
        debug!("instance {}: rotated resolvable address", id.inst_id);
        hci.set_random_address(id.inst_id, inst.own_address);
    }

    fn duration_expired(
        &mut self,
        inst_id: u8,
        hci: &mut impl AdvertiserHciPort,
        sink: &mut impl AdvEventSink,
    ) {
        let Some(inst) = self.table.get_mut(inst_id) else {
            warn!("timeout alarm for unknown instance {}", inst_id);
            return;
        };
        inst.timeout_timer_armed = false;
        if !inst.in_use {
            debug!("instance {}: timeout for freed slot dropped", inst_id);
            return;
        }

        info!("instance {}: advertising duration elapsed, disabling", inst_id);
        hci.enable(false, inst_id, 0x0000, 0x00);
        sink.emit(&AdvEvent::TimedOut { inst_id });
    }

    // ── Internal ──────────────────────────────────────────────

    fn checked_instance_mut(&mut self, inst_id: u8) -> Result<&mut AdvertisingInstance> {
        let Some(inst) = self.table.get_mut(inst_id) else {
            error!("bad instance id {}", inst_id);
            return Err(AdvError::InvalidInstance(inst_id));
        };
        if !inst.in_use {
            error!("instance {} not in use", inst_id);
            return Err(AdvError::NotRegistered(inst_id));
        }
        Ok(inst)
    }
}

/// Assemble the wire command from the caller's parameters and the
/// instance's address state.
fn build_parameters_command(
    params: &AdvertisingParameters,
    inst: &AdvertisingInstance,
) -> SetParametersCommand {
    SetParametersCommand {
        advertising_event_properties: params.advertising_event_properties,
        adv_int_min: params.adv_int_min,
        adv_int_max: params.adv_int_max,
        channel_map: params.channel_map,
        own_address_type: inst.own_address_type,
        own_address: inst.own_address,
        peer_address_type: 0x00,
        peer_address: [0; 6],
        adv_filter_policy: params.adv_filter_policy,
        tx_power: inst.tx_power,
        primary_advertising_phy: params.primary_advertising_phy,
        secondary_max_skip: 0x01,
        secondary_advertising_phy: params.secondary_advertising_phy,
        // TODO: expose the SID once callers need more than one per address.
        advertising_sid: 0x01,
        scan_request_notification_enable: params.scan_request_notification_enable,
    }
}

/// A payload that would overflow the data cap once the flags structure is
/// prepended is rejected before anything is issued.
fn ensure_payload_fits(advertise_data: &[u8], properties: u16) -> Result<()> {
    let overhead = if data::is_legacy_connectable(properties) {
        3
    } else {
        0
    };
    if advertise_data.len() + overhead > ADV_PAYLOAD_CAP {
        return Err(AdvError::PayloadTooLarge);
    }
    Ok(())
}
