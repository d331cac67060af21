//! Contracts between the trigger machine and the outside world.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::api::NotifyError;
use crate::config::{Config, ConfigError, NetCheck, PushTarget};
use crate::countdown::CountdownView;
use crate::domain::{HibernateMethod, NoticeLevel, now_local};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("os query failed: {0}")]
    Os(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HibernateError {
    #[error("all hibernate mechanisms failed: {0}")]
    Failed(String),
}

/// Idle time, uptime and reachability of the local machine.
#[async_trait]
pub trait Probe: Send + Sync {
    fn idle_seconds(&self) -> Result<u64, ProbeError>;
    fn uptime_seconds(&self) -> Result<u64, ProbeError>;
    /// Link state, DNS and HTTP must all succeed. Fails closed.
    async fn is_online(&self, check: &NetCheck) -> bool;
}

/// Best-effort single push of a reminder.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        target: &PushTarget,
        title: &str,
        content: &str,
    ) -> Result<String, NotifyError>;
}

#[async_trait]
pub trait Hibernator: Send + Sync {
    async fn hibernate(&self) -> Result<HibernateMethod, HibernateError>;
}

/// User-facing notices.
pub trait Notices: Send + Sync {
    /// Informational toast; the machine only calls this when toasts are enabled.
    fn toast(&self, level: NoticeLevel, title: &str, message: &str);
    /// Blocking error the user must acknowledge.
    fn alert(&self, title: &str, message: &str);
}

pub trait ConfigStore: Send + Sync {
    fn save(&self, config: &Config) -> Result<(), ConfigError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        now_local()
    }
}

/// Everything the trigger machine talks to.
#[derive(Clone)]
pub struct Services {
    pub probe: Arc<dyn Probe>,
    pub notifier: Arc<dyn Notifier>,
    pub hibernator: Arc<dyn Hibernator>,
    pub notices: Arc<dyn Notices>,
    pub countdown_view: Arc<dyn CountdownView>,
    pub store: Arc<dyn ConfigStore>,
    pub clock: Arc<dyn Clock>,
}
