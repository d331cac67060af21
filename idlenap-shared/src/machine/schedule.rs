//! Self-adjusting poll interval.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

/// Used when the interval cannot be computed.
pub const FALLBACK_POLL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct PollInputs {
    pub now: NaiveDateTime,
    /// `None` when the idle probe failed.
    pub idle_secs: Option<u64>,
    pub uptime_secs: Option<u64>,
    pub idle_threshold_secs: u64,
    pub uptime_threshold_secs: u64,
    /// Remaining debounce deadline of an in-progress reminder streak.
    pub streak_last_remind: Option<NaiveDateTime>,
    pub grace_until: Option<NaiveDateTime>,
}

fn secs_until(now: NaiveDateTime, target: NaiveDateTime) -> i64 {
    (target - now).num_seconds()
}

/// Delay until the next moment a threshold can become satisfied, never less
/// than one second.
pub fn next_poll_interval(inputs: &PollInputs) -> Duration {
    let Some(idle) = inputs.idle_secs else {
        return FALLBACK_POLL;
    };
    let idle_th = inputs.idle_threshold_secs;

    let mut secs: u64 = match inputs.streak_last_remind {
        Some(last) => {
            let target = last + TimeDelta::seconds(idle_th as i64);
            let remaining = secs_until(inputs.now, target);
            if remaining > 0 { remaining as u64 } else { 1 }
        }
        None if idle < idle_th => idle_th - idle,
        None => idle_th,
    };

    if let Some(uptime) = inputs.uptime_secs {
        if uptime < inputs.uptime_threshold_secs {
            secs = secs.max(inputs.uptime_threshold_secs - uptime);
        }
    }

    if let Some(until) = inputs.grace_until {
        let remaining = secs_until(inputs.now, until);
        if remaining > 0 {
            secs = secs.min(remaining as u64);
        }
    }

    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn base() -> PollInputs {
        PollInputs {
            now: at(12, 0, 0),
            idle_secs: Some(0),
            uptime_secs: Some(10 * 3600),
            idle_threshold_secs: 3600,
            uptime_threshold_secs: 7200,
            streak_last_remind: None,
            grace_until: None,
        }
    }

    #[test]
    fn waits_for_remaining_idle() {
        let mut i = base();
        i.idle_secs = Some(600);
        assert_eq!(next_poll_interval(&i), Duration::from_secs(3000));
    }

    #[test]
    fn past_threshold_checks_every_threshold() {
        let mut i = base();
        i.idle_secs = Some(4000);
        assert_eq!(next_poll_interval(&i), Duration::from_secs(3600));
    }

    #[test]
    fn streak_waits_for_debounce() {
        let mut i = base();
        i.idle_secs = Some(5000);
        i.streak_last_remind = Some(at(11, 30, 0));
        assert_eq!(next_poll_interval(&i), Duration::from_secs(1800));

        i.streak_last_remind = Some(at(10, 0, 0));
        assert_eq!(next_poll_interval(&i), Duration::from_secs(1));
    }

    #[test]
    fn uptime_deficit_extends_wait() {
        let mut i = base();
        i.uptime_secs = Some(600);
        i.idle_secs = Some(3000);
        assert_eq!(next_poll_interval(&i), Duration::from_secs(6600));
    }

    #[test]
    fn grace_caps_wait() {
        let mut i = base();
        i.grace_until = Some(at(12, 2, 0));
        assert_eq!(next_poll_interval(&i), Duration::from_secs(120));

        i.grace_until = Some(at(11, 0, 0));
        assert_eq!(next_poll_interval(&i), Duration::from_secs(3600));
    }

    #[test]
    fn zero_threshold_floors_to_one_second() {
        let mut i = base();
        i.idle_threshold_secs = 0;
        assert_eq!(next_poll_interval(&i), Duration::from_secs(1));
    }

    #[test]
    fn probe_failure_falls_back() {
        let mut i = base();
        i.idle_secs = None;
        assert_eq!(next_poll_interval(&i), FALLBACK_POLL);
    }
}
