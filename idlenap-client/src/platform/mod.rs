#[cfg(target_os = "windows")]
pub mod windows;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use idlenap_shared::services::ProbeError;
use tokio::sync::mpsc::UnboundedSender;

use crate::AppError;
use crate::app::{Shell, UiEvent};

/// Keeps the single-instance lock; dropping it releases the lock.
pub struct InstanceGuard {
    _inner: Box<dyn Send>,
}

impl InstanceGuard {
    pub fn new(inner: impl Send + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

/// OS-level facilities the agent needs.
#[async_trait]
pub trait Platform: Send + Sync {
    fn idle_seconds(&self) -> Result<u64, ProbeError>;
    fn uptime_seconds(&self) -> Result<u64, ProbeError>;
    /// Whether any network link is up. Cheap; checked before DNS and HTTP.
    fn link_up(&self) -> bool;
    /// `None` when another instance already holds the lock.
    fn single_instance(&self) -> Result<Option<InstanceGuard>, AppError>;
    /// Starts the tray icon and its message pump on a dedicated thread.
    fn spawn_shell(&self, events: UnboundedSender<UiEvent>) -> Result<Arc<dyn Shell>, AppError>;
    async fn open_in_editor(&self, path: &Path) -> Result<(), AppError>;
    async fn install_autostart(&self) -> Result<(), AppError>;
    async fn uninstall_autostart(&self) -> Result<(), AppError>;
    async fn autostart_installed(&self) -> bool;
}

/// Detect the current platform and return an implementation.
pub fn detect() -> Result<Arc<dyn Platform>, AppError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsPlatform::new()))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AppError::Unsupported(std::env::consts::OS))
    }
}

/// Lets CLI subcommands print to the console they were started from.
pub fn attach_parent_console() {
    #[cfg(target_os = "windows")]
    windows::attach_parent_console();
}
