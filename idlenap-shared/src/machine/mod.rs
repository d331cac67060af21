//! Trigger state machine.
//!
//! Turns uptime/idle readings into "do nothing", "push a reminder" or
//! "offer a cancellable hibernate". The machine has exactly one owner, the
//! agent loop, so none of its state is shared.

pub mod report;
pub mod schedule;
pub mod session;

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use crate::config::Config;
use crate::countdown::{Countdown, CountdownInput, CountdownOutcome};
use crate::domain::{
    HibernateReason, MenuChecks, NoticeLevel, TickOutcome, display_stamp, format_stamp,
    parse_stamp,
};
use crate::services::Services;

use schedule::{PollInputs, next_poll_interval};
pub use session::Session;

pub const APP_TITLE: &str = "idlenap";
pub const COUNTDOWN_TITLE: &str = "Hibernating soon";
pub const TEST_COUNTDOWN_SECS: u32 = 60;
pub const HIBERNATE_FAILED_TITLE: &str = "Hibernate failed";

/// Values replaced by [`TriggerMachine::mark_hibernate_time`], kept so a
/// failed hibernate can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HibernateStamp {
    pub written: String,
    pub prev_time: String,
    pub prev_notice: String,
}

pub struct TriggerMachine {
    config: Config,
    session: Session,
    countdown: Option<Countdown>,
    poll_interval: Duration,
    rearmed: bool,
    services: Services,
}

impl TriggerMachine {
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config: config.sanitized(),
            session: Session::default(),
            countdown: None,
            poll_interval: schedule::FALLBACK_POLL,
            rearmed: false,
            services,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown.is_some()
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown.as_ref().and_then(Countdown::remaining)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The interval set by the last re-arm, once.
    pub fn take_rearm(&mut self) -> Option<Duration> {
        std::mem::take(&mut self.rearmed).then_some(self.poll_interval)
    }

    pub fn menu_checks(&self) -> MenuChecks {
        MenuChecks {
            suppress_remind: self.session.suppress_once_remind,
            suppress_hibernate: self.session.suppress_once_hibernate,
            autostart: self.config.autostart_enabled,
            balloons: self.config.tray_balloon_enabled,
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.services.clock.now()
    }

    /// Recomputes the poll interval from fresh probe readings.
    pub fn rearm(&mut self) {
        let probe = &self.services.probe;
        let idle_secs = probe
            .idle_seconds()
            .inspect_err(|e| tracing::warn!(error = %e, "idle probe failed; using fallback poll"))
            .ok();
        let uptime_secs = probe.uptime_seconds().ok();
        let remind_times = self.config.online_remind_times;
        let inputs = PollInputs {
            now: self.now(),
            idle_secs,
            uptime_secs,
            idle_threshold_secs: self.config.idle_threshold_secs(),
            uptime_threshold_secs: self.config.uptime_threshold_secs(),
            streak_last_remind: self
                .session
                .streak_in_progress(remind_times)
                .then_some(self.session.last_online_remind_time)
                .flatten(),
            grace_until: self.session.resume_grace_until,
        };
        self.poll_interval = next_poll_interval(&inputs);
        self.rearmed = true;
        tracing::debug!(interval_secs = self.poll_interval.as_secs(), "poll re-armed");
    }

    fn notify_user(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!(notice = message),
            NoticeLevel::Warning => tracing::warn!(notice = message),
            NoticeLevel::Error => tracing::error!(notice = message),
        }
        if self.config.tray_balloon_enabled {
            self.services.notices.toast(level, APP_TITLE, message);
        }
    }

    fn persist(&self) {
        if let Err(e) = self.services.store.save(&self.config) {
            tracing::error!(error = %e, "failed to save config");
        }
    }

    fn should_trigger(&self, now: NaiveDateTime, uptime: u64, idle: u64) -> bool {
        if self.session.in_grace(now) {
            return false;
        }
        uptime >= self.config.uptime_threshold_secs() && idle >= self.config.idle_threshold_secs()
    }

    /// Completes a trigger-flow branch: stamps the trigger and clears both
    /// one-shot flags.
    fn close_branch(&mut self) {
        self.session.last_trigger_time = Some(self.now());
        self.session.consume_once_flags();
    }

    pub fn on_startup(&mut self) {
        self.show_last_hibernate_notice(None);
        self.rearm();
    }

    /// One poll evaluation.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.countdown.is_some() {
            return TickOutcome::Skipped;
        }

        let probe = self.services.probe.clone();
        let uptime = probe.uptime_seconds().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "uptime probe failed");
            0
        });
        let idle = probe.idle_seconds().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "idle probe failed");
            0
        });

        if uptime < self.config.uptime_threshold_secs() || idle < self.config.idle_threshold_secs()
        {
            self.session.reset_streak();
        }

        self.rearm();

        let now = self.now();
        if !self.should_trigger(now, uptime, idle) {
            return TickOutcome::NotEligible;
        }

        let base_info = report::base_info(uptime, idle, now);
        let content = report::render_content(&self.config.remind_template, &base_info);

        if !probe.is_online(&self.config.net_check()).await {
            tracing::info!("trigger while offline");
            self.session.reset_streak();
            return self.prepare_hibernate_flow(&base_info, HibernateReason::NoNetwork);
        }

        if self.session.suppress_once_remind {
            self.notify_user(NoticeLevel::Info, "Reminder skipped for this trigger.");
            self.close_branch();
            return TickOutcome::RemindSuppressed;
        }

        let remind_times = self.config.online_remind_times;
        if self.session.streak_in_progress(remind_times) {
            if let Some(last) = self.session.last_online_remind_time {
                let window = TimeDelta::seconds(self.config.idle_threshold_secs() as i64);
                if now - last < window {
                    return TickOutcome::Debounced;
                }
            }
        }

        let sent = self
            .services
            .notifier
            .send(&self.config.push_target(), report::REMIND_TITLE, &content)
            .await;
        if let Err(e) = sent {
            tracing::warn!(error = %e, "reminder push failed");
            self.session.reset_streak();
            return self.prepare_hibernate_flow(&base_info, HibernateReason::SendFailed);
        }

        if remind_times == 0 {
            self.notify_user(NoticeLevel::Info, "Reminder sent.");
            self.close_branch();
            return TickOutcome::Notified { sent: 1, of: 0 };
        }

        let count = self.session.online_remind_count + 1;
        self.session.online_remind_count = count;
        self.session.last_online_remind_time = Some(self.now());

        if count < remind_times {
            self.notify_user(
                NoticeLevel::Info,
                &format!(
                    "Reminder sent ({count}/{remind_times}); another will follow if the machine stays idle."
                ),
            );
            self.close_branch();
            self.rearm();
            return TickOutcome::Notified {
                sent: count,
                of: remind_times,
            };
        }

        self.notify_user(
            NoticeLevel::Info,
            &format!("Reminder sent ({count}/{remind_times}); hibernate countdown follows."),
        );
        self.session.reset_streak();
        self.prepare_hibernate_flow(
            &base_info,
            HibernateReason::ReminderThresholdReached { sent: count },
        )
    }

    /// Offers a cancellable hibernate, unless the user asked to skip it once.
    /// A running countdown is left alone and the call reports `Skipped`.
    pub fn prepare_hibernate_flow(&mut self, base_info: &str, reason: HibernateReason) -> TickOutcome {
        if self.countdown.is_some() {
            tracing::debug!(%reason, "countdown already running; not starting another");
            return TickOutcome::Skipped;
        }
        if self.session.suppress_once_hibernate {
            self.notify_user(NoticeLevel::Info, "Hibernate skipped for this trigger.");
            self.close_branch();
            return TickOutcome::HibernateSuppressed;
        }

        self.notify_user(
            NoticeLevel::Warning,
            &format!("{reason}: cancellable hibernate countdown started."),
        );
        let seconds = self.config.countdown_secs();
        let detail = report::countdown_detail(base_info, seconds);
        self.countdown = Some(Countdown::start(
            seconds,
            COUNTDOWN_TITLE,
            &detail,
            self.services.countdown_view.clone(),
        ));
        self.close_branch();
        tracing::info!(%reason, seconds, "hibernate countdown started");
        TickOutcome::CountdownStarted(reason)
    }

    /// Hand-started countdown. Ignored while one is already running.
    pub fn start_test_countdown(&mut self) -> bool {
        if self.countdown.is_some() {
            return false;
        }
        let detail = format!(
            "{}: {TEST_COUNTDOWN_SECS} seconds until hibernate.",
            HibernateReason::Test
        );
        self.countdown = Some(Countdown::start(
            TEST_COUNTDOWN_SECS,
            COUNTDOWN_TITLE,
            &detail,
            self.services.countdown_view.clone(),
        ));
        true
    }

    /// Feeds one input to the running countdown and finishes it on a terminal
    /// outcome.
    pub async fn countdown_input(&mut self, input: CountdownInput) -> Option<CountdownOutcome> {
        let outcome = self.countdown.as_mut()?.handle(input)?;
        self.countdown = None;
        self.finish_countdown(outcome).await;
        Some(outcome)
    }

    async fn finish_countdown(&mut self, outcome: CountdownOutcome) {
        if outcome.proceeds() {
            let stamp = self.mark_hibernate_time();
            match self.services.hibernator.hibernate().await {
                Ok(method) => tracing::info!(%method, ?outcome, "hibernate requested"),
                Err(e) => {
                    tracing::error!(error = %e, "hibernate failed");
                    self.revert_hibernate_time(&stamp);
                    self.services.notices.alert(
                        HIBERNATE_FAILED_TITLE,
                        "Could not hibernate.\nCheck the power settings or enable hibernate with `powercfg /h on`.",
                    );
                }
            }
        } else {
            tracing::info!("hibernate countdown cancelled");
        }
        self.rearm();
    }

    pub fn on_resume_event(&mut self) {
        self.session.reset_streak();
        let grace = self.config.resume_grace_sec;
        self.session.resume_grace_until = (grace > 0)
            .then(|| self.now() + TimeDelta::seconds(i64::from(grace)));
        tracing::info!(grace_secs = grace, "resumed from sleep");
        self.show_last_hibernate_notice(Some("Resumed from sleep"));
        self.rearm();
    }

    fn show_last_hibernate_notice(&mut self, prefix: Option<&str>) {
        let last = self.config.last_hibernate_time.trim().to_string();
        if last.is_empty() || self.config.last_hibernate_notice_time.trim() == last {
            return;
        }
        let Some(at) = parse_stamp(&last) else {
            return;
        };
        let line = format!("Last hibernated at: {}", display_stamp(at));
        let message = match prefix {
            Some(prefix) => format!("{prefix}\n{line}"),
            None => line,
        };
        self.notify_user(NoticeLevel::Info, &message);
        self.config.last_hibernate_notice_time = last;
        self.persist();
    }

    /// Records "now" as the last hibernate time and clears the notice marker.
    pub fn mark_hibernate_time(&mut self) -> HibernateStamp {
        let written = format_stamp(self.now());
        let stamp = HibernateStamp {
            written: written.clone(),
            prev_time: std::mem::replace(&mut self.config.last_hibernate_time, written),
            prev_notice: std::mem::take(&mut self.config.last_hibernate_notice_time),
        };
        self.persist();
        stamp
    }

    /// Restores the previous values only if nothing overwrote the stamp
    /// since. Returns whether anything changed.
    pub fn revert_hibernate_time(&mut self, stamp: &HibernateStamp) -> bool {
        if self.config.last_hibernate_time != stamp.written {
            tracing::debug!("hibernate stamp overwritten; revert skipped");
            return false;
        }
        self.config.last_hibernate_time = stamp.prev_time.clone();
        self.config.last_hibernate_notice_time = stamp.prev_notice.clone();
        self.persist();
        true
    }

    /// Replaces the config with a reloaded one.
    pub fn apply_config(&mut self, config: Config) {
        self.config = config.sanitized();
        self.session.reset_streak();
        tracing::info!("config applied");
        self.rearm();
    }

    pub fn toggle_suppress_remind(&mut self) -> bool {
        self.session.suppress_once_remind = !self.session.suppress_once_remind;
        self.session.suppress_once_remind
    }

    pub fn toggle_suppress_hibernate(&mut self) -> bool {
        self.session.suppress_once_hibernate = !self.session.suppress_once_hibernate;
        self.session.suppress_once_hibernate
    }

    pub fn reset_suppressions(&mut self) {
        self.session.consume_once_flags();
        self.notify_user(NoticeLevel::Info, "One-shot suppressions cleared.");
    }

    pub fn toggle_balloons(&mut self) -> bool {
        self.config.tray_balloon_enabled = !self.config.tray_balloon_enabled;
        self.persist();
        self.config.tray_balloon_enabled
    }

    pub fn set_autostart(&mut self, enabled: bool) {
        self.config.autostart_enabled = enabled;
        self.persist();
    }

    /// User-facing notice outside a trigger branch, e.g. from a menu action.
    pub fn notice(&self, level: NoticeLevel, message: &str) {
        self.notify_user(level, message);
    }
}

impl std::fmt::Debug for TriggerMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerMachine")
            .field("session", &self.session)
            .field("countdown", &self.countdown)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
