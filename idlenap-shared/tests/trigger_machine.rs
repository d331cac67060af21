use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use idlenap_shared::api::NotifyError;
use idlenap_shared::config::{NetCheck, PushTarget};
use idlenap_shared::domain::HibernateMethod;
use idlenap_shared::services::{HibernateError, ProbeError};
use idlenap_shared::{
    Clock, Config, ConfigStore, CountdownInput, CountdownOutcome, CountdownView, HibernateReason,
    Hibernator, NoticeLevel, Notices, Notifier, Probe, Services, TickOutcome, TriggerMachine,
};

const HOUR: u64 = 3600;
const MINUTE: u64 = 60;

struct FakeProbe {
    idle: Mutex<Option<u64>>,
    uptime: Mutex<Option<u64>>,
    online: AtomicBool,
}

#[async_trait]
impl Probe for FakeProbe {
    fn idle_seconds(&self) -> Result<u64, ProbeError> {
        self.idle
            .lock()
            .unwrap()
            .ok_or_else(|| ProbeError::Os("GetLastInputInfo".into()))
    }

    fn uptime_seconds(&self) -> Result<u64, ProbeError> {
        self.uptime
            .lock()
            .unwrap()
            .ok_or_else(|| ProbeError::Os("GetTickCount64".into()))
    }

    async fn is_online(&self, _check: &NetCheck) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeNotifier {
    /// Scripted results; empty means success.
    script: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
    last_content: Mutex<String>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(
        &self,
        _target: &PushTarget,
        _title: &str,
        content: &str,
    ) -> Result<String, NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_content.lock().unwrap() = content.to_string();
        if self.script.lock().unwrap().pop_front().unwrap_or(true) {
            Ok(r#"{"code":200}"#.into())
        } else {
            Err(NotifyError::Status {
                status: 500,
                body: "boom".into(),
            })
        }
    }
}

#[derive(Default)]
struct FakeHibernator {
    fail: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl Hibernator for FakeHibernator {
    async fn hibernate(&self) -> Result<HibernateMethod, HibernateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(HibernateError::Failed("access denied".into()))
        } else {
            Ok(HibernateMethod::Shutdown)
        }
    }
}

#[derive(Default)]
struct RecordingNotices {
    toasts: Mutex<Vec<(NoticeLevel, String)>>,
    alerts: Mutex<Vec<String>>,
}

impl Notices for RecordingNotices {
    fn toast(&self, level: NoticeLevel, _title: &str, message: &str) {
        self.toasts.lock().unwrap().push((level, message.to_string()));
    }

    fn alert(&self, title: &str, _message: &str) {
        self.alerts.lock().unwrap().push(title.to_string());
    }
}

#[derive(Default)]
struct RecordingView {
    opened: Mutex<Vec<(String, u32)>>,
    updates: AtomicUsize,
    closes: AtomicUsize,
}

impl CountdownView for RecordingView {
    fn open(&self, _title: &str, detail: &str, remaining: u32) {
        self.opened
            .lock()
            .unwrap()
            .push((detail.to_string(), remaining));
    }

    fn update(&self, _remaining: u32) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Vec<Config>>,
}

impl ConfigStore for MemoryStore {
    fn save(&self, config: &Config) -> Result<(), idlenap_shared::config::ConfigError> {
        self.saved.lock().unwrap().push(config.clone());
        Ok(())
    }
}

struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    fn advance(&self, secs: u64) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::seconds(secs as i64);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

struct Harness {
    probe: Arc<FakeProbe>,
    notifier: Arc<FakeNotifier>,
    hibernator: Arc<FakeHibernator>,
    notices: Arc<RecordingNotices>,
    view: Arc<RecordingView>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    machine: TriggerMachine,
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn config(remind_times: u32) -> Config {
    Config {
        pushplus_token: "tok".into(),
        pushplus_topic: "family".into(),
        online_remind_times: remind_times,
        uptime_hours: 2,
        idle_minutes: 60,
        pre_hibernate_countdown_sec: 60,
        resume_grace_sec: 120,
        tray_balloon_enabled: true,
        ..Config::default()
    }
}

impl Harness {
    /// Uptime 3h, idle 70min, online.
    fn new(config: Config) -> Self {
        let probe = Arc::new(FakeProbe {
            idle: Mutex::new(Some(70 * MINUTE)),
            uptime: Mutex::new(Some(3 * HOUR)),
            online: AtomicBool::new(true),
        });
        let notifier = Arc::new(FakeNotifier::default());
        let hibernator = Arc::new(FakeHibernator::default());
        let notices = Arc::new(RecordingNotices::default());
        let view = Arc::new(RecordingView::default());
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(ManualClock {
            now: Mutex::new(start_time()),
        });
        let services = Services {
            probe: probe.clone(),
            notifier: notifier.clone(),
            hibernator: hibernator.clone(),
            notices: notices.clone(),
            countdown_view: view.clone(),
            store: store.clone(),
            clock: clock.clone(),
        };
        Self {
            machine: TriggerMachine::new(config, services),
            probe,
            notifier,
            hibernator,
            notices,
            view,
            store,
            clock,
        }
    }

    fn set_idle(&self, secs: u64) {
        *self.probe.idle.lock().unwrap() = Some(secs);
    }

    fn set_online(&self, online: bool) {
        self.probe.online.store(online, Ordering::SeqCst);
    }

    fn sends(&self) -> usize {
        self.notifier.calls.load(Ordering::SeqCst)
    }

    fn countdowns_opened(&self) -> usize {
        self.view.opened.lock().unwrap().len()
    }

    fn toasts(&self) -> Vec<String> {
        self.notices
            .toasts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn flags(&self) -> (bool, bool) {
        let s = self.machine.session();
        (s.suppress_once_remind, s.suppress_once_hibernate)
    }

    async fn expire_countdown(&mut self) -> Option<CountdownOutcome> {
        let mut last = None;
        while self.machine.countdown_active() {
            last = self.machine.countdown_input(CountdownInput::Second).await;
        }
        last
    }
}

#[tokio::test]
async fn below_threshold_is_not_eligible() {
    let mut h = Harness::new(config(0));
    h.set_idle(59 * MINUTE);
    assert_eq!(h.machine.tick().await, TickOutcome::NotEligible);
    assert_eq!(h.sends(), 0);
    assert_eq!(h.machine.poll_interval(), Duration::from_secs(MINUTE));
}

#[tokio::test]
async fn notify_only_mode_sends_and_consumes_flags() {
    let mut h = Harness::new(config(0));
    h.machine.toggle_suppress_hibernate();
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 0 }
    );
    assert_eq!(h.sends(), 1);
    assert_eq!(h.flags(), (false, false));
    assert_eq!(h.countdowns_opened(), 0);
    assert!(h.toasts().iter().any(|t| t == "Reminder sent."));
    assert!(h.machine.session().last_trigger_time.is_some());

    let content = h.notifier.last_content.lock().unwrap().clone();
    assert!(content.starts_with("Uptime: 3h 0m\nIdle: 70 min\nTime: 2026-01-01 12:00:00"));
}

#[tokio::test]
async fn remind_suppression_skips_send_and_consumes_flags() {
    let mut h = Harness::new(config(2));
    h.machine.toggle_suppress_remind();
    h.machine.toggle_suppress_hibernate();
    assert_eq!(h.machine.tick().await, TickOutcome::RemindSuppressed);
    assert_eq!(h.sends(), 0);
    assert_eq!(h.flags(), (false, false));
}

#[tokio::test]
async fn send_failure_enters_hibernate_flow() {
    let mut h = Harness::new(config(3));
    h.notifier.script.lock().unwrap().push_back(false);
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::CountdownStarted(HibernateReason::SendFailed)
    );
    assert_eq!(h.flags(), (false, false));
    assert_eq!(h.machine.session().online_remind_count, 0);
    assert!(h.machine.countdown_active());
}

#[tokio::test]
async fn send_failure_with_hibernate_suppressed() {
    let mut h = Harness::new(config(3));
    h.notifier.script.lock().unwrap().push_back(false);
    h.machine.toggle_suppress_hibernate();
    assert_eq!(h.machine.tick().await, TickOutcome::HibernateSuppressed);
    assert_eq!(h.flags(), (false, false));
    assert_eq!(h.countdowns_opened(), 0);
}

#[tokio::test]
async fn offline_goes_straight_to_countdown() {
    let mut h = Harness::new(config(2));
    h.set_online(false);
    h.machine.toggle_suppress_remind();
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::CountdownStarted(HibernateReason::NoNetwork)
    );
    assert_eq!(h.sends(), 0);
    assert_eq!(h.flags(), (false, false));

    let opened = h.view.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].1, 60);
    assert!(opened[0].0.ends_with("\n\n60 seconds until auto-hibernate."));
    assert!(
        h.toasts()
            .iter()
            .any(|t| t == "no network: cancellable hibernate countdown started.")
    );
}

#[tokio::test]
async fn ticks_are_skipped_while_a_countdown_runs() {
    let mut h = Harness::new(config(0));
    h.set_online(false);
    h.machine.tick().await;
    let interval = h.machine.poll_interval();

    h.set_idle(5 * HOUR);
    assert_eq!(h.machine.tick().await, TickOutcome::Skipped);
    assert_eq!(h.countdowns_opened(), 1);
    assert_eq!(h.machine.poll_interval(), interval);
}

#[tokio::test]
async fn hibernate_flow_leaves_a_running_countdown_alone() {
    let mut h = Harness::new(config(0));
    h.set_online(false);
    h.machine.tick().await;
    assert!(h.machine.countdown_active());

    assert_eq!(
        h.machine
            .prepare_hibernate_flow("info", HibernateReason::NoNetwork),
        TickOutcome::Skipped
    );
    assert_eq!(h.countdowns_opened(), 1);
    assert_eq!(h.view.closes.load(Ordering::SeqCst), 0);
    assert!(h.machine.countdown_active());
}

#[tokio::test]
async fn second_reminder_after_idle_window_starts_countdown() {
    let mut h = Harness::new(config(2));
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 2 }
    );
    assert_eq!(h.machine.session().online_remind_count, 1);

    h.clock.advance(61 * MINUTE);
    h.set_idle(131 * MINUTE);
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::CountdownStarted(HibernateReason::ReminderThresholdReached { sent: 2 })
    );
    assert_eq!(h.sends(), 2);
    assert_eq!(h.machine.session().online_remind_count, 0);
    assert!(h.machine.session().last_online_remind_time.is_none());
    assert_eq!(h.countdowns_opened(), 1);
}

#[tokio::test]
async fn hibernate_suppression_wins_over_completed_streak() {
    let mut h = Harness::new(config(2));
    h.machine.tick().await;
    h.clock.advance(61 * MINUTE);
    h.machine.toggle_suppress_hibernate();

    let before = h.toasts().len();
    assert_eq!(h.machine.tick().await, TickOutcome::HibernateSuppressed);
    assert_eq!(h.countdowns_opened(), 0);
    assert!(!h.machine.countdown_active());
    assert_eq!(h.machine.session().online_remind_count, 0);
    assert!(
        h.toasts()[before..]
            .iter()
            .any(|t| t == "Hibernate skipped for this trigger.")
    );
    assert_eq!(h.flags(), (false, false));
}

#[tokio::test]
async fn debounce_holds_the_streak() {
    let mut h = Harness::new(config(3));
    h.machine.tick().await;
    h.machine.toggle_suppress_hibernate();

    h.clock.advance(10 * MINUTE);
    assert_eq!(h.machine.tick().await, TickOutcome::Debounced);
    assert_eq!(h.sends(), 1);
    assert_eq!(h.machine.session().online_remind_count, 1);
    assert_eq!(h.flags(), (false, true));
    assert_eq!(h.machine.poll_interval(), Duration::from_secs(50 * MINUTE));
}

#[tokio::test]
async fn streak_restarts_after_activity() {
    let mut h = Harness::new(config(3));
    h.machine.tick().await;
    assert_eq!(h.machine.session().online_remind_count, 1);

    h.set_idle(5);
    h.clock.advance(5 * MINUTE);
    assert_eq!(h.machine.tick().await, TickOutcome::NotEligible);
    assert_eq!(h.machine.session().online_remind_count, 0);

    h.set_idle(60 * MINUTE);
    h.clock.advance(10 * MINUTE);
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 3 }
    );
}

#[tokio::test]
async fn idle_probe_failure_never_triggers() {
    let mut h = Harness::new(config(0));
    *h.probe.idle.lock().unwrap() = None;
    assert_eq!(h.machine.tick().await, TickOutcome::NotEligible);
    assert_eq!(h.sends(), 0);
    assert_eq!(h.machine.poll_interval(), Duration::from_secs(60));
}

#[tokio::test]
async fn expired_countdown_hibernates_and_stamps() {
    let mut h = Harness::new(config(0));
    h.set_online(false);
    h.machine.tick().await;

    for _ in 0..59 {
        assert_eq!(h.machine.countdown_input(CountdownInput::Second).await, None);
    }
    assert_eq!(h.machine.countdown_remaining(), Some(1));
    assert_eq!(
        h.machine.countdown_input(CountdownInput::Second).await,
        Some(CountdownOutcome::Expired)
    );
    assert!(!h.machine.countdown_active());
    assert_eq!(h.hibernator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.machine.config().last_hibernate_time, "2026-01-01T12:00:00");
    assert_eq!(h.machine.config().last_hibernate_notice_time, "");
    assert_eq!(h.view.closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.view.updates.load(Ordering::SeqCst), 59);

    let saved = h.store.saved.lock().unwrap();
    assert_eq!(
        saved.last().map(|c| c.last_hibernate_time.as_str()),
        Some("2026-01-01T12:00:00")
    );
}

#[tokio::test]
async fn cancelled_countdown_does_not_hibernate() {
    let mut h = Harness::new(config(0));
    h.set_online(false);
    h.machine.tick().await;
    h.machine.countdown_input(CountdownInput::Second).await;

    assert_eq!(
        h.machine.countdown_input(CountdownInput::Cancel).await,
        Some(CountdownOutcome::Cancelled)
    );
    assert_eq!(h.machine.countdown_input(CountdownInput::Second).await, None);
    assert_eq!(h.hibernator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.machine.config().last_hibernate_time, "");
    assert_eq!(h.machine.take_rearm(), Some(h.machine.poll_interval()));
}

#[tokio::test]
async fn failed_hibernate_reverts_and_alerts() {
    let mut cfg = config(0);
    cfg.last_hibernate_time = "2025-12-31T22:00:00".into();
    cfg.last_hibernate_notice_time = "2025-12-31T22:00:00".into();
    let mut h = Harness::new(cfg);
    h.hibernator.fail.store(true, Ordering::SeqCst);
    h.set_online(false);
    h.machine.tick().await;

    assert_eq!(
        h.machine.countdown_input(CountdownInput::HibernateNow).await,
        Some(CountdownOutcome::HibernateNow)
    );
    assert_eq!(h.machine.config().last_hibernate_time, "2025-12-31T22:00:00");
    assert_eq!(
        h.machine.config().last_hibernate_notice_time,
        "2025-12-31T22:00:00"
    );
    assert_eq!(h.notices.alerts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn revert_leaves_newer_stamp_alone() {
    let mut h = Harness::new(config(0));
    let first = h.machine.mark_hibernate_time();
    assert_eq!(first.prev_time, "");

    h.clock.advance(30);
    let second = h.machine.mark_hibernate_time();
    assert_ne!(first.written, second.written);

    assert!(!h.machine.revert_hibernate_time(&first));
    assert_eq!(h.machine.config().last_hibernate_time, second.written);

    assert!(h.machine.revert_hibernate_time(&second));
    assert_eq!(h.machine.config().last_hibernate_time, first.written);
}

#[tokio::test]
async fn resume_opens_grace_window_and_shows_notice_once() {
    let mut cfg = config(0);
    cfg.last_hibernate_time = "2026-01-01T08:00:00".into();
    let mut h = Harness::new(cfg);

    h.machine.on_resume_event();
    assert_eq!(
        h.toasts(),
        vec!["Resumed from sleep\nLast hibernated at: 2026-01-01 08:00:00".to_string()]
    );
    assert_eq!(
        h.machine.config().last_hibernate_notice_time,
        "2026-01-01T08:00:00"
    );
    assert_eq!(h.store.saved.lock().unwrap().len(), 1);
    assert_eq!(h.machine.poll_interval(), Duration::from_secs(120));

    assert_eq!(h.machine.tick().await, TickOutcome::NotEligible);

    h.machine.on_resume_event();
    assert_eq!(h.toasts().len(), 1);

    h.clock.advance(121);
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 0 }
    );
}

#[tokio::test]
async fn resume_mid_streak_starts_a_fresh_streak() {
    let mut h = Harness::new(config(3));
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 3 }
    );
    assert_eq!(h.machine.session().online_remind_count, 1);

    h.machine.on_resume_event();
    assert_eq!(h.machine.session().online_remind_count, 0);
    assert!(h.machine.session().last_online_remind_time.is_none());

    h.clock.advance(121);
    assert_eq!(
        h.machine.tick().await,
        TickOutcome::Notified { sent: 1, of: 3 }
    );
    assert_eq!(h.sends(), 2);
}

#[tokio::test]
async fn startup_notice_has_no_prefix() {
    let mut cfg = config(0);
    cfg.last_hibernate_time = "2026-01-01T08:00:00".into();
    let mut h = Harness::new(cfg);
    h.machine.on_startup();
    assert_eq!(
        h.toasts(),
        vec!["Last hibernated at: 2026-01-01 08:00:00".to_string()]
    );
    assert!(h.machine.take_rearm().is_some());
    assert!(h.machine.take_rearm().is_none());
}

#[tokio::test]
async fn toasts_follow_balloon_setting() {
    let mut cfg = config(0);
    cfg.tray_balloon_enabled = false;
    let mut h = Harness::new(cfg);
    h.machine.tick().await;
    assert!(h.toasts().is_empty());

    assert!(h.machine.toggle_balloons());
    assert!(h.machine.menu_checks().balloons);
    h.machine.reset_suppressions();
    assert_eq!(h.toasts(), vec!["One-shot suppressions cleared.".to_string()]);
}

#[tokio::test]
async fn test_countdown_ignores_flags_and_duplicates() {
    let mut h = Harness::new(config(0));
    h.machine.toggle_suppress_remind();
    assert!(h.machine.start_test_countdown());
    assert!(!h.machine.start_test_countdown());
    assert_eq!(h.countdowns_opened(), 1);
    assert!(h.machine.menu_checks().suppress_remind);

    assert_eq!(h.expire_countdown().await, Some(CountdownOutcome::Expired));
    assert_eq!(h.hibernator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn applying_config_resets_streak() {
    let mut h = Harness::new(config(3));
    h.machine.tick().await;
    assert_eq!(h.machine.session().online_remind_count, 1);

    let mut next = config(3);
    next.idle_minutes = 5000;
    h.machine.apply_config(next);
    assert_eq!(h.machine.session().online_remind_count, 0);
    assert_eq!(h.machine.config().idle_minutes, 1440);
    assert!(h.machine.take_rearm().is_some());
}
