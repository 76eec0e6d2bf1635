//! Event sink adapter that forwards advertising outcomes to the log.
//!
//! Useful as the default sink while bringing up a platform, and in tests
//! that drive the manager without inspecting events.

use log::info;

use crate::adv::events::AdvEvent;
use crate::adv::ports::AdvEventSink;

#[derive(Debug, Default)]
pub struct LogEventSink;

impl AdvEventSink for LogEventSink {
    fn emit(&mut self, event: &AdvEvent) {
        info!("adv event: {:?}", event);
    }
}
