//! Platform-independent core of idlenap: typed configuration, the trigger
//! state machine, the hibernate countdown and the collaborator contracts the
//! desktop client plugs into.

pub mod api;
pub mod config;
pub mod countdown;
pub mod domain;
pub mod machine;
pub mod path;
pub mod powercfg;
pub mod services;

pub use config::Config;
pub use countdown::{Countdown, CountdownInput, CountdownOutcome, CountdownView};
pub use domain::{HibernateReason, MenuChecks, NoticeLevel, TickOutcome};
pub use machine::TriggerMachine;
pub use services::{
    Clock, ConfigStore, Hibernator, Notices, Notifier, Probe, Services, SystemClock,
};
