//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements   | Connects to                         |
//! |--------------|--------------|-------------------------------------|
//! | `alarms`     | AlarmPort    | any millisecond tick source         |
//! | `log_sink`   | AdvEventSink | the `log` facade                    |
//!
//! The HCI transport itself is platform property and stays outside this
//! crate; an adapter for it implements
//! [`AdvertiserHciPort`](crate::adv::ports::AdvertiserHciPort) and pairs
//! completions with issued commands before feeding them back into the
//! manager.

pub mod alarms;
pub mod log_sink;
