//! Idle timeout bookkeeping.
//!
//! [`IdleTracker`] holds no timers of its own: the caller feeds it the current
//! instant and sleeps until [`IdleTracker::next_wakeup`]. That keeps it
//! testable against tokio's paused clock.

use std::time::Duration;
use tokio::time::Instant;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSettings {
    /// Inactivity before the warning shows.
    pub idle_after: Duration,
    /// Length of the countdown before forced logout.
    pub warning_for: Duration,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            idle_after: Duration::from_secs(4 * 60),
            warning_for: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Active { deadline: Instant },
    Warning { logout_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    WarningStarted { remaining_secs: u64 },
    Countdown { remaining_secs: u64 },
    Expired,
}

#[derive(Debug)]
pub struct IdleTracker {
    settings: IdleSettings,
    phase: Phase,
    last_reported: Option<u64>,
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl IdleTracker {
    pub fn new(settings: IdleSettings) -> Self {
        Self {
            settings,
            phase: Phase::Stopped,
            last_reported: None,
        }
    }

    /// (Re)arm the idle timer. Also used for "stay connected".
    pub fn start(&mut self, now: Instant) {
        self.phase = Phase::Active {
            deadline: now + self.settings.idle_after,
        };
        self.last_reported = None;
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
        self.last_reported = None;
    }

    /// User input. Pushes the deadline back while active; ignored once the
    /// warning is showing. Returns whether the timer moved.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::Active { .. } => {
                self.phase = Phase::Active {
                    deadline: now + self.settings.idle_after,
                };
                true
            }
            Phase::Stopped | Phase::Warning { .. } => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Stopped
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.phase, Phase::Warning { .. })
    }

    /// Whole seconds left on the countdown, rounded up.
    pub fn remaining(&self, now: Instant) -> Option<u64> {
        match self.phase {
            Phase::Warning { logout_at } => Some(ceil_secs(logout_at.saturating_duration_since(now))),
            _ => None,
        }
    }

    /// Advance to `now`, reporting at most one transition.
    pub fn poll(&mut self, now: Instant) -> Option<IdleEvent> {
        match self.phase {
            Phase::Stopped => None,
            Phase::Active { deadline } => {
                if now < deadline {
                    return None;
                }
                let logout_at = deadline + self.settings.warning_for;
                if now >= logout_at {
                    self.stop();
                    return Some(IdleEvent::Expired);
                }
                self.phase = Phase::Warning { logout_at };
                let remaining_secs = ceil_secs(logout_at - now);
                self.last_reported = Some(remaining_secs);
                Some(IdleEvent::WarningStarted { remaining_secs })
            }
            Phase::Warning { logout_at } => {
                if now >= logout_at {
                    self.stop();
                    return Some(IdleEvent::Expired);
                }
                let remaining_secs = ceil_secs(logout_at - now);
                if self.last_reported == Some(remaining_secs) {
                    return None;
                }
                self.last_reported = Some(remaining_secs);
                Some(IdleEvent::Countdown { remaining_secs })
            }
        }
    }

    /// When the caller should poll next. `None` while stopped.
    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        match self.phase {
            Phase::Stopped => None,
            Phase::Active { deadline } => Some(deadline),
            Phase::Warning { logout_at } => {
                let left = logout_at.saturating_duration_since(now);
                if left.is_zero() {
                    return Some(now);
                }
                // Land on the next whole-second boundary of the countdown.
                let step = left.as_nanos() % TICK.as_nanos();
                let step = if step == 0 { TICK } else { Duration::from_nanos(step as u64) };
                Some(now + step)
            }
        }
    }
}
