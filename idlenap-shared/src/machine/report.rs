use chrono::NaiveDateTime;

use crate::config::{BASE_INFO_PLACEHOLDER, DEFAULT_REMIND_TEMPLATE};
use crate::domain::display_stamp;

pub const REMIND_TITLE: &str = "Computer left running";

/// `3h 5m` style rendering of a number of seconds.
pub fn format_uptime(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    format!("{h}h {m}m")
}

pub fn base_info(uptime_secs: u64, idle_secs: u64, now: NaiveDateTime) -> String {
    format!(
        "Uptime: {}\nIdle: {} min\nTime: {}",
        format_uptime(uptime_secs),
        idle_secs / 60,
        display_stamp(now)
    )
}

/// Substitutes every `{base_info}`; without the placeholder the template is
/// appended after a blank line. A blank template means the default one.
pub fn render_content(template: &str, base_info: &str) -> String {
    let template = match template.trim() {
        "" => DEFAULT_REMIND_TEMPLATE,
        t => t,
    };
    if template.contains(BASE_INFO_PLACEHOLDER) {
        template.replace(BASE_INFO_PLACEHOLDER, base_info)
    } else {
        format!("{base_info}\n\n{template}")
    }
}

pub fn countdown_detail(base_info: &str, countdown_secs: u32) -> String {
    format!("{base_info}\n\n{countdown_secs} seconds until auto-hibernate.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .and_hms_opt(8, 9, 10)
            .unwrap()
    }

    #[test]
    fn status_block() {
        let info = base_info(3 * 3600 + 5 * 60 + 59, 70 * 60 + 30, now());
        assert_eq!(info, "Uptime: 3h 5m\nIdle: 70 min\nTime: 2026-05-01 08:09:10");
    }

    #[test]
    fn template_placeholder_replaced() {
        assert_eq!(render_content("A {base_info} B", "X"), "A X B");
    }

    #[test]
    fn template_without_placeholder_is_appended() {
        assert_eq!(render_content("  go to bed  ", "X"), "X\n\ngo to bed");
    }

    #[test]
    fn blank_template_uses_default() {
        assert_eq!(
            render_content(" ", "X"),
            DEFAULT_REMIND_TEMPLATE.replace(BASE_INFO_PLACEHOLDER, "X")
        );
    }
}
