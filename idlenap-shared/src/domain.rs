use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Persisted timestamp format (ISO 8601, second precision, local time).
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Human readable timestamp format used in notices and status blocks.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_stamp(dt: NaiveDateTime) -> String {
    dt.format(STAMP_FORMAT).to_string()
}

pub fn display_stamp(dt: NaiveDateTime) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

/// Parses a persisted timestamp. Accepts the ISO form (optionally with
/// fractional seconds) and the space separated display form.
pub fn parse_stamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, DISPLAY_FORMAT))
        .ok()
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Why a hibernate flow was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HibernateReason {
    /// The configured number of reminders went out and the machine stayed idle.
    ReminderThresholdReached { sent: u32 },
    SendFailed,
    NoNetwork,
    /// Started by hand from the tray menu.
    Test,
}

impl fmt::Display for HibernateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HibernateReason::ReminderThresholdReached { sent } => {
                write!(f, "reminder threshold reached ({sent}/{sent})")
            }
            HibernateReason::SendFailed => f.write_str("send failed"),
            HibernateReason::NoNetwork => f.write_str("no network"),
            HibernateReason::Test => f.write_str("test hibernate"),
        }
    }
}

/// Branch taken by a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A countdown is on screen; nothing was evaluated.
    Skipped,
    /// Thresholds not met or inside the resume grace window.
    NotEligible,
    /// A reminder streak is in progress and the idle window has not re-elapsed.
    Debounced,
    RemindSuppressed,
    /// Reminder delivered. `of == 0` means notify-only mode.
    Notified { sent: u32, of: u32 },
    HibernateSuppressed,
    CountdownStarted(HibernateReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// How the OS was asked to hibernate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HibernateMethod {
    Shutdown,
    SetSuspendState,
}

impl fmt::Display for HibernateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HibernateMethod::Shutdown => f.write_str("shutdown /h"),
            HibernateMethod::SetSuspendState => f.write_str("powrprof SetSuspendState"),
        }
    }
}

/// Checkmarks rendered in the tray menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuChecks {
    pub suppress_remind: bool,
    pub suppress_hibernate: bool,
    pub autostart: bool,
    pub balloons: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn stamp_parses_both_forms() {
        let dt = NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        assert_eq!(format_stamp(dt), "2026-03-04T05:06:07");
        assert_eq!(parse_stamp("2026-03-04T05:06:07"), Some(dt));
        assert_eq!(parse_stamp("2026-03-04 05:06:07"), Some(dt));
        assert_eq!(parse_stamp("  "), None);
        assert_eq!(parse_stamp("yesterday"), None);
    }

    #[test]
    fn reason_text() {
        assert_eq!(
            HibernateReason::ReminderThresholdReached { sent: 2 }.to_string(),
            "reminder threshold reached (2/2)"
        );
        assert_eq!(HibernateReason::NoNetwork.to_string(), "no network");
    }
}
