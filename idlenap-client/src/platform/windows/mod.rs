use std::path::Path;
use std::sync::Arc;

use idlenap_shared::services::ProbeError;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::AppError;
use crate::app::{Shell, UiEvent};
use crate::process::hidden;

use super::{InstanceGuard, Platform};

pub mod install;
pub mod instance;
pub mod probe;
pub mod shell;

/// Windows implementation of the platform interface.
#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Platform for WindowsPlatform {
    fn idle_seconds(&self) -> Result<u64, ProbeError> {
        probe::idle_seconds()
    }

    fn uptime_seconds(&self) -> Result<u64, ProbeError> {
        probe::uptime_seconds()
    }

    fn link_up(&self) -> bool {
        probe::link_up()
    }

    fn single_instance(&self) -> Result<Option<InstanceGuard>, AppError> {
        match instance::SingleInstance::acquire() {
            Ok(Some(lock)) => Ok(Some(InstanceGuard::new(lock))),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error=%e, "single-instance lock unavailable; running unguarded");
                Ok(Some(InstanceGuard::new(())))
            }
        }
    }

    fn spawn_shell(&self, events: UnboundedSender<UiEvent>) -> Result<Arc<dyn Shell>, AppError> {
        let shell = shell::spawn(events)?;
        Ok(shell)
    }

    async fn open_in_editor(&self, path: &Path) -> Result<(), AppError> {
        debug!(path=%path.display(), "opening in default editor");
        let status = hidden("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg(path)
            .status()
            .await
            .map_err(AppError::Io)?;
        if !status.success() {
            return Err(AppError::Platform(format!("start exited with {status}")));
        }
        Ok(())
    }

    async fn install_autostart(&self) -> Result<(), AppError> {
        install::install_for_current_user().await
    }

    async fn uninstall_autostart(&self) -> Result<(), AppError> {
        install::uninstall_for_current_user().await
    }

    async fn autostart_installed(&self) -> bool {
        install::task_exists().await
    }
}

/// NUL-terminated UTF-16 copy of `s`.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Copies `s` into a fixed UTF-16 buffer, truncating and NUL-terminating.
pub(crate) fn copy_wide(dst: &mut [u16], s: &str) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let mut n = 0;
    for (slot, unit) in dst.iter_mut().zip(s.encode_utf16().take(max)) {
        *slot = unit;
        n += 1;
    }
    dst[n] = 0;
}

pub fn attach_parent_console() {
    use windows_sys::Win32::System::Console::{ATTACH_PARENT_PROCESS, AttachConsole};
    // Fails harmlessly when started without a console (e.g. from the task).
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
