use std::sync::atomic::{AtomicBool, Ordering};

use idlenap_shared::NoticeLevel;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    WinRt,
    LogOnly,
}

/// Informational desktop toasts. Downgrades to logging after the first
/// failure to show one.
#[derive(Debug)]
pub struct Toaster {
    downgraded: AtomicBool,
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Toaster {
    pub fn new() -> Self {
        Self {
            downgraded: AtomicBool::new(!cfg!(target_os = "windows")),
        }
    }

    pub fn kind(&self) -> ToastKind {
        if self.downgraded.load(Ordering::Relaxed) {
            ToastKind::LogOnly
        } else {
            ToastKind::WinRt
        }
    }

    pub fn show(&self, level: NoticeLevel, title: &str, message: &str) {
        match self.kind() {
            ToastKind::WinRt => match show_winrt(title, message) {
                Ok(()) => debug!(?level, "toast shown"),
                Err(e) => {
                    warn!(error=%e, "toast failed; downgrading to LogOnly");
                    self.downgraded.store(true, Ordering::Relaxed);
                    info!(?level, "[TOAST] {title}: {message}");
                }
            },
            ToastKind::LogOnly => info!(?level, "[TOAST] {title}: {message}"),
        }
    }
}

#[cfg(target_os = "windows")]
fn show_winrt(title: &str, message: &str) -> Result<(), String> {
    use tauri_winrt_notification::{Duration, Toast};
    Toast::new(Toast::POWERSHELL_APP_ID)
        .title(title)
        .text1(message)
        .sound(None)
        .duration(Duration::Short)
        .show()
        .map_err(|e| e.to_string())
}

#[cfg(not(target_os = "windows"))]
fn show_winrt(_title: &str, _message: &str) -> Result<(), String> {
    Err("toasts need Windows".into())
}
