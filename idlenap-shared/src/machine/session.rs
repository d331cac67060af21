use chrono::NaiveDateTime;

/// In-memory state of one run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub suppress_once_remind: bool,
    pub suppress_once_hibernate: bool,
    /// Consecutive successful reminders in the current streak.
    pub online_remind_count: u32,
    pub last_online_remind_time: Option<NaiveDateTime>,
    pub last_trigger_time: Option<NaiveDateTime>,
    pub resume_grace_until: Option<NaiveDateTime>,
}

impl Session {
    pub fn reset_streak(&mut self) {
        self.online_remind_count = 0;
        self.last_online_remind_time = None;
    }

    pub fn consume_once_flags(&mut self) {
        self.suppress_once_remind = false;
        self.suppress_once_hibernate = false;
    }

    /// True while more reminders are owed before hibernating.
    pub fn streak_in_progress(&self, remind_times: u32) -> bool {
        remind_times > 0
            && self.online_remind_count > 0
            && self.online_remind_count < remind_times
            && self.last_online_remind_time.is_some()
    }

    pub fn in_grace(&self, now: NaiveDateTime) -> bool {
        self.resume_grace_until.is_some_and(|until| now < until)
    }
}
