//! Software alarm wheel.
//!
//! A fixed-capacity [`AlarmPort`] implementation driven by an external
//! millisecond clock.  The owner advances it with [`poll`], which returns
//! the alarms that came due so the dispatch loop can forward each into
//! [`BleAdvertisingManager::on_alarm`] while keeping the wheel available
//! as the port:
//!
//! ```ignore
//! for id in alarms.poll(now_ms) {
//!     manager.on_alarm(id, &mut hci, &mut alarms, &mut rng, &mut sink);
//! }
//! ```
//!
//! Periodic entries re-arm relative to the poll that fired them (no
//! catch-up storms after a long sleep); one-shots retire.
//!
//! [`poll`]: SoftwareAlarms::poll
//! [`BleAdvertisingManager::on_alarm`]: crate::adv::service::BleAdvertisingManager::on_alarm

use heapless::Vec;
use log::warn;

use crate::adv::ports::{AlarmId, AlarmPort};
use crate::config::MAX_ADV_INSTANCES;

/// Two alarms per instance: rotation + duration.
const ALARM_CAP: usize = MAX_ADV_INSTANCES * 2;

#[derive(Debug, Clone, Copy)]
struct AlarmEntry {
    id: AlarmId,
    deadline_ms: u64,
    /// `Some` for periodic alarms.
    period_ms: Option<u64>,
}

/// Fixed-capacity software timer wheel.
pub struct SoftwareAlarms {
    entries: Vec<AlarmEntry, ALARM_CAP>,
    now_ms: u64,
}

impl SoftwareAlarms {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            now_ms: 0,
        }
    }

    /// Advance the clock and collect every alarm that came due, earliest
    /// deadline first.
    pub fn poll(&mut self, now_ms: u64) -> Vec<AlarmId, ALARM_CAP> {
        self.now_ms = now_ms;
        let mut fired: Vec<AlarmId, ALARM_CAP> = Vec::new();

        loop {
            let due = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.deadline_ms <= now_ms)
                .min_by_key(|(_, e)| e.deadline_ms)
                .map(|(i, _)| i);
            let Some(i) = due else { break };

            let mut entry = self.entries.swap_remove(i);
            // fired is as large as the entry store; the push cannot fail
            let _ = fired.push(entry.id);
            if let Some(period) = entry.period_ms {
                // A zero period would come due again within this poll.
                entry.deadline_ms = now_ms + period.max(1);
                let _ = self.entries.push(entry);
            }
        }

        fired
    }

    /// Whether an alarm with this id is currently armed.
    pub fn armed(&self, id: AlarmId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Earliest armed deadline, so the owning loop can sleep until it.
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_ms).min()
    }

    fn insert(&mut self, id: AlarmId, deadline_ms: u64, period_ms: Option<u64>) {
        // Re-arming replaces the previous deadline.
        self.entries.retain(|e| e.id != id);
        if self
            .entries
            .push(AlarmEntry {
                id,
                deadline_ms,
                period_ms,
            })
            .is_err()
        {
            warn!("alarm store full, dropping {:?}", id);
        }
    }
}

impl Default for SoftwareAlarms {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmPort for SoftwareAlarms {
    fn arm_periodic(&mut self, id: AlarmId, interval_ms: u64) {
        self.insert(id, self.now_ms + interval_ms, Some(interval_ms));
    }

    fn arm_oneshot(&mut self, id: AlarmId, delay_ms: u64) {
        self.insert(id, self.now_ms + delay_ms, None);
    }

    fn cancel(&mut self, id: AlarmId) {
        self.entries.retain(|e| e.id != id);
    }
}
