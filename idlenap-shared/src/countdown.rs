//! Cancellable pre-hibernate countdown.
//!
//! `Running` is left exactly once, for one of `Expired`, `Cancelled` or
//! `HibernateNow`. The view is opened on construction (disabling its owner)
//! and closed on that transition (re-enabling and refocusing the owner).

use std::sync::Arc;

/// Presentation side of a countdown.
pub trait CountdownView: Send + Sync {
    fn open(&self, title: &str, detail: &str, remaining: u32);
    fn update(&self, remaining: u32);
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownInput {
    /// One second elapsed.
    Second,
    Cancel,
    HibernateNow,
    /// The window went away by other means. Treated as a cancel.
    WindowClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Expired,
    Cancelled,
    HibernateNow,
}

impl CountdownOutcome {
    pub fn cancelled(&self) -> bool {
        matches!(self, CountdownOutcome::Cancelled)
    }

    /// Expiry and "hibernate now" both go ahead; only a cancel stops it.
    pub fn proceeds(&self) -> bool {
        !self.cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Running { remaining: u32 },
    Finished(CountdownOutcome),
}

pub struct Countdown {
    state: CountdownState,
    view: Arc<dyn CountdownView>,
}

impl Countdown {
    pub fn start(seconds: u32, title: &str, detail: &str, view: Arc<dyn CountdownView>) -> Self {
        let remaining = seconds.max(1);
        view.open(title, detail, remaining);
        Self {
            state: CountdownState::Running { remaining },
            view,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.state {
            CountdownState::Running { remaining } => Some(remaining),
            CountdownState::Finished(_) => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, CountdownState::Running { .. })
    }

    /// Applies `input`. Returns the outcome on the one transition out of
    /// `Running`, and `None` for every other call.
    pub fn handle(&mut self, input: CountdownInput) -> Option<CountdownOutcome> {
        let CountdownState::Running { remaining } = self.state else {
            return None;
        };
        let outcome = match input {
            CountdownInput::Second if remaining <= 1 => CountdownOutcome::Expired,
            CountdownInput::Second => {
                let remaining = remaining - 1;
                self.state = CountdownState::Running { remaining };
                self.view.update(remaining);
                return None;
            }
            CountdownInput::Cancel | CountdownInput::WindowClosed => CountdownOutcome::Cancelled,
            CountdownInput::HibernateNow => CountdownOutcome::HibernateNow,
        };
        self.state = CountdownState::Finished(outcome);
        self.view.close();
        Some(outcome)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if self.is_running() {
            self.view.close();
        }
    }
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Countdown").field("state", &self.state).finish()
    }
}
