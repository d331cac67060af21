use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use idlenap_shared::domain::HibernateMethod;
use idlenap_shared::powercfg::{self, Availability};
use idlenap_shared::services::{HibernateError, Hibernator};
use tracing::{info, warn};

use crate::AppError;
use crate::process::{output_text, run_elevated, run_hidden};

const HIBERNATE_TIMEOUT: Duration = Duration::from_secs(10);
const POWERCFG_TIMEOUT: Duration = Duration::from_secs(15);
pub const POWERCFG_DUMP: &str = "powercfg_a.txt";

/// `shutdown /h`, then one `SetSuspendState` fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellHibernator;

#[async_trait]
impl Hibernator for ShellHibernator {
    async fn hibernate(&self) -> Result<HibernateMethod, HibernateError> {
        let first = match run_hidden("shutdown", &["/h"], HIBERNATE_TIMEOUT).await {
            Ok(out) if out.status.success() => return Ok(HibernateMethod::Shutdown),
            Ok(out) => format!("shutdown /h exited with {}", out.status),
            Err(e) => format!("shutdown /h: {e}"),
        };
        warn!(error=%first, "falling back to SetSuspendState");

        match run_hidden(
            "rundll32.exe",
            &["powrprof.dll,SetSuspendState", "1,1,0"],
            HIBERNATE_TIMEOUT,
        )
        .await
        {
            Ok(out) if out.status.success() => Ok(HibernateMethod::SetSuspendState),
            Ok(out) => Err(HibernateError::Failed(format!(
                "{first}; rundll32 exited with {}",
                out.status
            ))),
            Err(e) => Err(HibernateError::Failed(format!("{first}; rundll32: {e}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HibernateReport {
    pub availability: Availability,
    pub dump: Option<PathBuf>,
}

impl HibernateReport {
    pub fn summary(&self) -> String {
        let mut text = self.availability.reason().to_string();
        if self.availability != Availability::Available {
            text.push_str(
                "\nUse \"Enable hibernate\" in the tray menu, or run `powercfg /h on` from an elevated prompt.",
            );
        }
        if let Some(dump) = &self.dump {
            text.push_str(&format!("\n\nFull output saved to {}", dump.display()));
        }
        text
    }
}

/// Runs `powercfg /a` in a UTF-8 console and keeps the raw output for support.
pub async fn check_hibernate(data_dir: &Path) -> Result<HibernateReport, AppError> {
    let out = run_hidden("cmd", &["/C", "chcp 65001 >NUL & powercfg /a"], POWERCFG_TIMEOUT).await?;
    let text = output_text(&out);
    let availability = powercfg::hibernate_availability(&text);

    let dump_path = data_dir.join(POWERCFG_DUMP);
    let dump = match std::fs::create_dir_all(data_dir).and_then(|_| std::fs::write(&dump_path, &text)) {
        Ok(()) => Some(dump_path),
        Err(e) => {
            warn!(error=%e, "could not save powercfg output");
            None
        }
    };
    info!(?availability, "hibernate availability checked");
    Ok(HibernateReport { availability, dump })
}

/// `powercfg /h on`, elevating through UAC when the plain call fails.
pub async fn enable_hibernate() -> Result<(), AppError> {
    let out = run_hidden("powercfg", &["/h", "on"], POWERCFG_TIMEOUT).await?;
    if out.status.success() {
        info!("hibernate enabled");
        return Ok(());
    }
    warn!(status=%out.status, "powercfg /h on failed; retrying elevated");
    let status = run_elevated("powercfg", &["/h".to_string(), "on".to_string()]).await?;
    if !status.success() {
        return Err(AppError::Platform(format!(
            "elevated powercfg /h on failed with status {status}"
        )));
    }
    info!("hibernate enabled (elevated)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_points_to_enable_only_when_unavailable() {
        let missing = HibernateReport {
            availability: Availability::Unavailable,
            dump: None,
        };
        assert!(missing.summary().contains("\"Enable hibernate\""));

        let ready = HibernateReport {
            availability: Availability::Available,
            dump: Some(PathBuf::from("powercfg_a.txt")),
        };
        let text = ready.summary();
        assert!(!text.contains("Enable hibernate"));
        assert!(text.ends_with("Full output saved to powercfg_a.txt"));
    }
}
