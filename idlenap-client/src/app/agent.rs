use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use idlenap_shared::api::rest::PushPlusNotifier;
use idlenap_shared::{
    CountdownInput, MenuChecks, NoticeLevel, Notifier, Services, SystemClock, TriggerMachine,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{APP_NAME, MenuCommand, Shell, ShellBridge, ShellCommand, UiEvent};
use crate::config::{ConfigFile, data_dir};
use crate::hibernate::{ShellHibernator, check_hibernate, enable_hibernate};
use crate::net::SystemProbe;
use crate::platform::{self, Platform};
use crate::AppError;

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);
const CONFIG_WATCH_INTERVAL: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);
const HIBERNATE_RECHECK_DELAY: Duration = Duration::from_secs(2);

/// Entry point for the tray agent in the current session.
pub async fn run(cfg_path: PathBuf) -> Result<(), AppError> {
    let plat = match platform::detect() {
        Ok(p) => p,
        Err(AppError::Unsupported(os)) => {
            warn!(os, "unsupported platform; the tray agent only runs on Windows");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let Some(_instance) = plat.single_instance()? else {
        info!("another instance is already running; exiting");
        return Ok(());
    };

    let store = Arc::new(ConfigFile::new(cfg_path));
    let config = store.load();
    info!(path=%store.path().display(), "loaded config");

    let (events_tx, events) = mpsc::unbounded_channel();
    let shell = plat.spawn_shell(events_tx)?;
    let bridge = Arc::new(ShellBridge::new(shell.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(PushPlusNotifier);
    let services = Services {
        probe: Arc::new(SystemProbe::new(plat.clone())?),
        notifier: notifier.clone(),
        hibernator: Arc::new(ShellHibernator),
        notices: bridge.clone(),
        countdown_view: bridge,
        store: store.clone(),
        clock: Arc::new(SystemClock),
    };

    let mut agent = Agent {
        machine: TriggerMachine::new(config, services),
        shell,
        platform: plat,
        store,
        notifier,
        last_checks: None,
    };
    agent.verify_autostart().await;
    agent.machine.on_startup();

    let cancel = CancellationToken::new();
    let cancel_child = cancel.child_token();
    let mut handle = tokio::spawn(async move { agent.main_loop(cancel_child, events).await });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received; requesting main loop to stop");
            cancel.cancel();
        }
        _ = &mut handle => {
            info!("main loop finished");
        }
    }

    if !handle.is_finished() {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
    }
    Ok(())
}

/// Single owner of the trigger machine.
struct Agent {
    machine: TriggerMachine,
    shell: Arc<dyn Shell>,
    platform: Arc<dyn Platform>,
    store: Arc<ConfigFile>,
    notifier: Arc<dyn Notifier>,
    last_checks: Option<MenuChecks>,
}

impl Agent {
    async fn main_loop(mut self, cancel: CancellationToken, mut events: UnboundedReceiver<UiEvent>) {
        let first = self
            .machine
            .take_rearm()
            .unwrap_or_else(|| self.machine.poll_interval());
        let mut next_poll = Instant::now() + first;
        let mut countdown_step = interval_at(Instant::now() + COUNTDOWN_STEP, COUNTDOWN_STEP);
        countdown_step.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut config_watch = interval(CONFIG_WATCH_INTERVAL);
        config_watch.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut countdown_was_active = self.machine.countdown_active();
        self.sync_checks();

        loop {
            let countdown_active = self.machine.countdown_active();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_until(next_poll) => {
                    let outcome = self.machine.tick().await;
                    debug!(?outcome, "tick");
                    next_poll = Instant::now() + self.machine.poll_interval();
                }
                _ = countdown_step.tick(), if countdown_active => {
                    self.machine.countdown_input(CountdownInput::Second).await;
                }
                _ = config_watch.tick() => self.reload_if_changed(),
                ev = events.recv() => {
                    let Some(ev) = ev else {
                        warn!("shell event channel closed");
                        break;
                    };
                    if self.handle_event(ev).await.is_break() {
                        break;
                    }
                }
            }

            if let Some(wait) = self.machine.take_rearm() {
                next_poll = Instant::now() + wait;
            }
            let active = self.machine.countdown_active();
            if active && !countdown_was_active {
                countdown_step.reset();
            }
            countdown_was_active = active;
            self.sync_checks();
        }

        info!("agent stopping");
        self.shell.post(ShellCommand::Quit);
    }

    fn sync_checks(&mut self) {
        let checks = self.machine.menu_checks();
        if self.last_checks != Some(checks) {
            self.last_checks = Some(checks);
            self.shell.post(ShellCommand::SetChecks(checks));
        }
    }

    fn reload_if_changed(&mut self) {
        if !self.store.changed_on_disk() {
            return;
        }
        info!(path=%self.store.path().display(), "config changed on disk; reloading");
        let cfg = self.store.load();
        self.machine.apply_config(cfg);
        self.machine.notice(NoticeLevel::Info, "Settings reloaded.");
    }

    async fn handle_event(&mut self, ev: UiEvent) -> ControlFlow<()> {
        debug!(?ev, "ui event");
        match ev {
            UiEvent::Resumed => self.machine.on_resume_event(),
            UiEvent::Countdown(input) => {
                if let Some(outcome) = self.machine.countdown_input(input).await {
                    info!(?outcome, "countdown finished");
                }
            }
            UiEvent::Menu(cmd) => return self.handle_menu(cmd).await,
            UiEvent::ShellClosed => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn info_box(&self, title: &str, message: impl Into<String>) {
        self.shell.post(ShellCommand::Info {
            title: title.to_string(),
            message: message.into(),
        });
    }

    fn alert_box(&self, title: &str, message: impl Into<String>) {
        self.shell.post(ShellCommand::Alert {
            title: title.to_string(),
            message: message.into(),
        });
    }

    async fn handle_menu(&mut self, cmd: MenuCommand) -> ControlFlow<()> {
        match cmd {
            MenuCommand::ToggleSuppressRemind => {
                let on = self.machine.toggle_suppress_remind();
                self.machine.notice(
                    NoticeLevel::Info,
                    if on {
                        "The next reminder will be skipped."
                    } else {
                        "The next reminder will be sent."
                    },
                );
            }
            MenuCommand::ToggleSuppressHibernate => {
                let on = self.machine.toggle_suppress_hibernate();
                self.machine.notice(
                    NoticeLevel::Info,
                    if on {
                        "The next hibernate will be skipped."
                    } else {
                        "The next hibernate will go ahead."
                    },
                );
            }
            MenuCommand::ResetSuppressions => self.machine.reset_suppressions(),
            MenuCommand::ToggleAutostart => {
                let enable = !self.machine.config().autostart_enabled;
                self.set_autostart(enable).await;
            }
            MenuCommand::ToggleBalloons => {
                let on = self.machine.toggle_balloons();
                info!(on, "notifications toggled");
            }
            MenuCommand::OpenSettings => self.open_settings().await,
            MenuCommand::CheckHibernate => self.check_hibernate().await,
            MenuCommand::EnableHibernate => self.enable_hibernate().await,
            MenuCommand::TestNotification => {
                match super::send_test_notification(self.notifier.as_ref(), self.machine.config())
                    .await
                {
                    Ok(msg) => self.info_box("Test reminder", msg),
                    Err(msg) => self.alert_box("Test reminder", msg),
                }
            }
            MenuCommand::TestHibernate => {
                if !self.machine.start_test_countdown() {
                    self.machine
                        .notice(NoticeLevel::Info, "A hibernate countdown is already running.");
                }
            }
            MenuCommand::About => self.info_box(APP_NAME, super::about_text()),
            MenuCommand::Quit => {
                info!("quit requested from tray");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn set_autostart(&mut self, enable: bool) {
        let res = if enable {
            self.platform.install_autostart().await
        } else {
            self.platform.uninstall_autostart().await
        };
        match res {
            Ok(()) => {
                self.machine.set_autostart(enable);
                self.machine.notice(
                    NoticeLevel::Info,
                    if enable {
                        "Autostart enabled."
                    } else {
                        "Autostart disabled."
                    },
                );
            }
            Err(e) => {
                warn!(error=%e, enable, "autostart change failed");
                self.alert_box("Autostart", format!("Could not change autostart: {e}"));
            }
        }
    }

    /// Makes the logon task match the saved setting.
    async fn verify_autostart(&mut self) {
        let enabled = self.machine.config().autostart_enabled;
        let installed = self.platform.autostart_installed().await;
        match (enabled, installed) {
            (true, false) => match self.platform.install_autostart().await {
                Ok(()) => self.machine.notice(
                    NoticeLevel::Info,
                    "Autostart task was missing and has been re-created.",
                ),
                Err(e) => {
                    warn!(error=%e, "could not re-create autostart task");
                    self.machine.notice(
                        NoticeLevel::Warning,
                        "Autostart task is missing and could not be re-created.",
                    );
                }
            },
            (false, true) => {
                if let Err(e) = self.platform.uninstall_autostart().await {
                    warn!(error=%e, "could not remove leftover autostart task");
                } else {
                    info!("removed leftover autostart task");
                }
            }
            _ => debug!(enabled, "autostart state consistent"),
        }
    }

    async fn open_settings(&mut self) {
        let path = self.store.path().to_path_buf();
        if !path.exists() {
            if let Err(e) = self.store.write(self.machine.config()) {
                warn!(error=%e, "could not write config before opening it");
            }
        }
        if let Err(e) = self.platform.open_in_editor(&path).await {
            warn!(error=%e, "could not open settings");
            self.alert_box(
                "Settings",
                format!("Could not open {}:\n{e}", path.display()),
            );
        }
    }

    /// Turns hibernate on, then reports what `powercfg /a` says afterwards.
    async fn enable_hibernate(&mut self) {
        if let Err(e) = enable_hibernate().await {
            warn!(error=%e, "enabling hibernate failed");
            self.alert_box("Enable hibernate", format!("Could not enable hibernate: {e}"));
            return;
        }
        tokio::time::sleep(HIBERNATE_RECHECK_DELAY).await;
        self.check_hibernate().await;
    }

    async fn check_hibernate(&mut self) {
        let Some(dir) = data_dir() else {
            self.alert_box("Hibernate support", "Could not determine the data directory.");
            return;
        };
        match check_hibernate(&dir).await {
            Ok(report) => self.info_box("Hibernate support", report.summary()),
            Err(e) => self.alert_box("Hibernate support", format!("powercfg failed: {e}")),
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown: received ctrl_c"),
        Err(e) => {
            warn!(error=%e, "cannot listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    }
}
