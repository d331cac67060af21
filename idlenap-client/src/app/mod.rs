//! Glue between the trigger machine and the desktop shell.
//!
//! The shell (tray icon, menu, countdown window) runs on its own thread and
//! talks to the agent through [`UiEvent`]s. The agent answers with
//! [`ShellCommand`]s.

pub mod agent;

use std::sync::Arc;

use idlenap_shared::config::Config;
use idlenap_shared::domain::{display_stamp, now_local};
use idlenap_shared::{CountdownInput, CountdownView, MenuChecks, NoticeLevel, Notices, Notifier};

use crate::notify::Toaster;

pub const APP_NAME: &str = "idlenap";
pub const TEST_MESSAGE_TITLE: &str = "idlenap test message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    ToggleSuppressRemind,
    ToggleSuppressHibernate,
    ResetSuppressions,
    ToggleAutostart,
    ToggleBalloons,
    OpenSettings,
    CheckHibernate,
    EnableHibernate,
    TestNotification,
    TestHibernate,
    About,
    Quit,
}

/// Tray menu from top to bottom; `None` is a separator.
pub const MENU_LAYOUT: &[Option<MenuCommand>] = &[
    Some(MenuCommand::ToggleSuppressRemind),
    Some(MenuCommand::ToggleSuppressHibernate),
    Some(MenuCommand::ResetSuppressions),
    None,
    Some(MenuCommand::OpenSettings),
    Some(MenuCommand::ToggleAutostart),
    Some(MenuCommand::ToggleBalloons),
    None,
    Some(MenuCommand::CheckHibernate),
    Some(MenuCommand::EnableHibernate),
    Some(MenuCommand::TestNotification),
    Some(MenuCommand::TestHibernate),
    None,
    Some(MenuCommand::About),
    Some(MenuCommand::Quit),
];

const MENU_ID_BASE: u16 = 1000;

impl MenuCommand {
    pub const ALL: [MenuCommand; 12] = [
        MenuCommand::ToggleSuppressRemind,
        MenuCommand::ToggleSuppressHibernate,
        MenuCommand::ResetSuppressions,
        MenuCommand::ToggleAutostart,
        MenuCommand::ToggleBalloons,
        MenuCommand::OpenSettings,
        MenuCommand::CheckHibernate,
        MenuCommand::EnableHibernate,
        MenuCommand::TestNotification,
        MenuCommand::TestHibernate,
        MenuCommand::About,
        MenuCommand::Quit,
    ];

    /// Win32 menu item id.
    pub fn id(self) -> u16 {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        MENU_ID_BASE + idx as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        let idx = id.checked_sub(MENU_ID_BASE)?;
        Self::ALL.get(usize::from(idx)).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuCommand::ToggleSuppressRemind => "Skip next reminder",
            MenuCommand::ToggleSuppressHibernate => "Skip next hibernate",
            MenuCommand::ResetSuppressions => "Clear one-shot skips",
            MenuCommand::ToggleAutostart => "Start at logon",
            MenuCommand::ToggleBalloons => "Show notifications",
            MenuCommand::OpenSettings => "Settings",
            MenuCommand::CheckHibernate => "Check hibernate support",
            MenuCommand::EnableHibernate => "Enable hibernate",
            MenuCommand::TestNotification => "Send test reminder",
            MenuCommand::TestHibernate => "Test hibernate (60 s)",
            MenuCommand::About => "About",
            MenuCommand::Quit => "Quit",
        }
    }

    /// Checkmark state, for the items that carry one.
    pub fn checked(self, checks: &MenuChecks) -> Option<bool> {
        match self {
            MenuCommand::ToggleSuppressRemind => Some(checks.suppress_remind),
            MenuCommand::ToggleSuppressHibernate => Some(checks.suppress_hibernate),
            MenuCommand::ToggleAutostart => Some(checks.autostart),
            MenuCommand::ToggleBalloons => Some(checks.balloons),
            _ => None,
        }
    }
}

/// Shell → agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Menu(MenuCommand),
    /// The OS reported a resume from sleep or hibernate.
    Resumed,
    Countdown(CountdownInput),
    /// The shell window is gone; the agent should stop.
    ShellClosed,
}

/// Agent → shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    OpenCountdown {
        title: String,
        detail: String,
        remaining: u32,
    },
    UpdateCountdown(u32),
    CloseCountdown,
    SetChecks(MenuChecks),
    Info {
        title: String,
        message: String,
    },
    Alert {
        title: String,
        message: String,
    },
    Quit,
}

pub trait Shell: Send + Sync {
    /// Queues `cmd` for the shell thread. Never blocks.
    fn post(&self, cmd: ShellCommand);
}

/// Presents machine notices and the countdown through the shell.
pub struct ShellBridge {
    shell: Arc<dyn Shell>,
    toaster: Toaster,
}

impl ShellBridge {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        Self {
            shell,
            toaster: Toaster::new(),
        }
    }
}

impl Notices for ShellBridge {
    fn toast(&self, level: NoticeLevel, title: &str, message: &str) {
        self.toaster.show(level, title, message);
    }

    fn alert(&self, title: &str, message: &str) {
        self.shell.post(ShellCommand::Alert {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

impl CountdownView for ShellBridge {
    fn open(&self, title: &str, detail: &str, remaining: u32) {
        self.shell.post(ShellCommand::OpenCountdown {
            title: title.to_string(),
            detail: detail.to_string(),
            remaining,
        });
    }

    fn update(&self, remaining: u32) {
        self.shell.post(ShellCommand::UpdateCountdown(remaining));
    }

    fn close(&self) {
        self.shell.post(ShellCommand::CloseCountdown);
    }
}

pub fn about_text() -> String {
    format!(
        "{APP_NAME} {}\n\nReminds you when the computer is left running idle and offers to hibernate it.",
        env!("CARGO_PKG_VERSION")
    )
}

/// Pushes a fixed test message. Both the Ok and the Err text are meant for
/// the user.
pub async fn send_test_notification(notifier: &dyn Notifier, cfg: &Config) -> Result<String, String> {
    cfg.push_ready().map_err(str::to_string)?;
    let target = cfg.push_target();
    let content = format!(
        "{TEST_MESSAGE_TITLE}\nTime: {}\nTopic: {}",
        display_stamp(now_local()),
        target.topic
    );
    match notifier.send(&target, TEST_MESSAGE_TITLE, &content).await {
        Ok(body) => {
            tracing::info!(topic = %target.topic, "test message sent");
            Ok(format!("Test message sent to topic \"{}\".\n\n{body}", target.topic))
        }
        Err(e) => {
            tracing::warn!(error = %e, "test message failed");
            Err(format!("Test message failed: {e}"))
        }
    }
}
