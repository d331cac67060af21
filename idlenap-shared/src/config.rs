use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PUSH_API: &str = "https://www.pushplus.plus/send";
pub const DEFAULT_NET_CHECK_URL: &str = "https://baidu.com";
pub const DEFAULT_REMIND_TEMPLATE: &str =
    "{base_info}\n\nConsider shutting down, hibernating or closing the lid.";
pub const BASE_INFO_PLACEHOLDER: &str = "{base_info}";

/// Key used by older releases before `online_remind_times` existed.
const LEGACY_REMIND_KEY: &str = "online_hibernate_policy";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("parse: {0}")]
    Parse(String),
    #[error("config root is not a JSON object")]
    NotAnObject,
    #[error("io: {0}")]
    Io(String),
}

/// User-editable settings, persisted as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pushplus_token: String,
    pub pushplus_topic: String,
    pub pushplus_api: String,
    pub remind_template: String,
    /// 0 = remind forever without hibernating; N = hibernate after the Nth reminder.
    pub online_remind_times: u32,

    pub uptime_hours: u32,
    pub idle_minutes: u32,
    pub pre_hibernate_countdown_sec: u32,
    pub resume_grace_sec: u32,
    pub tray_balloon_enabled: bool,
    pub last_hibernate_time: String,
    pub last_hibernate_notice_time: String,

    pub net_check_url: String,
    pub net_check_timeout_sec: u32,

    pub autostart_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pushplus_token: String::new(),
            pushplus_topic: String::new(),
            pushplus_api: DEFAULT_PUSH_API.to_string(),
            remind_template: DEFAULT_REMIND_TEMPLATE.to_string(),
            online_remind_times: 0,
            uptime_hours: 2,
            idle_minutes: 60,
            pre_hibernate_countdown_sec: 60,
            resume_grace_sec: 120,
            tray_balloon_enabled: false,
            last_hibernate_time: String::new(),
            last_hibernate_notice_time: String::new(),
            net_check_url: DEFAULT_NET_CHECK_URL.to_string(),
            net_check_timeout_sec: 2,
            autostart_enabled: false,
        }
    }
}

/// Where reminders are pushed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub api: String,
    pub token: String,
    pub topic: String,
}

/// Reachability probe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCheck {
    pub url: String,
    pub timeout: Duration,
}

impl Config {
    /// Overlays the keys present in `text` onto the defaults.
    ///
    /// A key whose value does not fit its field keeps the default; the rest of
    /// the document still applies. Unknown keys are dropped.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let Value::Object(user) = value else {
            return Err(ConfigError::NotAnObject);
        };
        Ok(Self::overlay(user).sanitized())
    }

    fn overlay(mut user: Map<String, Value>) -> Self {
        if !user.contains_key("online_remind_times") {
            if let Some(legacy) = user.get(LEGACY_REMIND_KEY).cloned() {
                user.insert("online_remind_times".into(), legacy);
            }
        }
        user.remove(LEGACY_REMIND_KEY);

        let mut merged = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Self::default(),
        };
        for (key, value) in user {
            if !merged.contains_key(&key) {
                continue;
            }
            let previous = merged.insert(key.clone(), value);
            if serde_json::from_value::<Self>(Value::Object(merged.clone())).is_err() {
                tracing::warn!(key = %key, "config: ignoring invalid value; using default");
                if let Some(previous) = previous {
                    merged.insert(key, previous);
                }
            }
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }

    /// Clamps numeric ranges and restores blank strings that must not be blank.
    pub fn sanitized(mut self) -> Self {
        self.uptime_hours = self.uptime_hours.min(168);
        self.idle_minutes = self.idle_minutes.min(24 * 60);
        self.pre_hibernate_countdown_sec = self.pre_hibernate_countdown_sec.clamp(1, 3600);
        self.net_check_timeout_sec = self.net_check_timeout_sec.clamp(1, 10);
        self.online_remind_times = self.online_remind_times.min(99);

        self.pushplus_token = self.pushplus_token.trim().to_string();
        self.pushplus_topic = self.pushplus_topic.trim().to_string();
        if self.pushplus_api.trim().is_empty() {
            self.pushplus_api = DEFAULT_PUSH_API.to_string();
        }
        if self.net_check_url.trim().is_empty() {
            self.net_check_url = DEFAULT_NET_CHECK_URL.to_string();
        }
        if self.remind_template.trim().is_empty() {
            self.remind_template = DEFAULT_REMIND_TEMPLATE.to_string();
        }
        self
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn uptime_threshold_secs(&self) -> u64 {
        u64::from(self.uptime_hours) * 3600
    }

    pub fn idle_threshold_secs(&self) -> u64 {
        u64::from(self.idle_minutes) * 60
    }

    pub fn countdown_secs(&self) -> u32 {
        self.pre_hibernate_countdown_sec.max(1)
    }

    pub fn push_target(&self) -> PushTarget {
        PushTarget {
            api: self.pushplus_api.trim().to_string(),
            token: self.pushplus_token.clone(),
            topic: self.pushplus_topic.clone(),
        }
    }

    pub fn net_check(&self) -> NetCheck {
        NetCheck {
            url: self.net_check_url.trim().to_string(),
            timeout: Duration::from_secs(u64::from(self.net_check_timeout_sec.max(1))),
        }
    }

    /// Token and topic are both required before anything can be pushed.
    pub fn push_ready(&self) -> Result<(), &'static str> {
        if self.pushplus_token.is_empty() {
            return Err("push token must not be empty");
        }
        if self.pushplus_topic.is_empty() {
            return Err("push topic must not be empty");
        }
        Ok(())
    }
}
