//! Tap disambiguation for feed cards.
//!
//! A raw tap cannot be classified on arrival: it is held until either a
//! second tap lands inside the window (double tap, a like) or the window
//! elapses (single tap, a play toggle). Time is supplied by the caller so the
//! host loop and tests drive the same state machine.

use std::time::{Duration, Instant};

pub const DEFAULT_DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);
pub const DEFAULT_FEEDBACK_DURATION: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    TogglePlay,
    Like,
}

#[derive(Debug, Clone)]
pub struct GestureDisambiguator {
    window: Duration,
    feedback: Duration,
    pending_tap: Option<Instant>,
    feedback_until: Option<Instant>,
}

impl Default for GestureDisambiguator {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_TAP_WINDOW, DEFAULT_FEEDBACK_DURATION)
    }
}

impl GestureDisambiguator {
    pub fn new(window: Duration, feedback: Duration) -> Self {
        Self {
            window,
            feedback,
            pending_tap: None,
            feedback_until: None,
        }
    }

    /// Registers a raw tap.
    ///
    /// Returns `Like` when this tap completes a double tap. A previously held
    /// tap whose window already elapsed (the host did not poll in time)
    /// commits here as `TogglePlay` before this tap is held.
    pub fn tap(&mut self, now: Instant) -> Option<Intent> {
        match self.pending_tap.take() {
            Some(previous) if now.saturating_duration_since(previous) <= self.window => {
                self.show_feedback(now);
                Some(Intent::Like)
            }
            Some(_) => {
                self.pending_tap = Some(now);
                Some(Intent::TogglePlay)
            }
            None => {
                self.pending_tap = Some(now);
                None
            }
        }
    }

    /// Explicit double-click from pointer input; no window involved.
    pub fn double_click(&mut self, now: Instant) -> Intent {
        self.pending_tap = None;
        self.show_feedback(now);
        Intent::Like
    }

    /// Commits an expired held tap and expires the feedback flag.
    pub fn poll(&mut self, now: Instant) -> Option<Intent> {
        if let Some(until) = self.feedback_until {
            if now >= until {
                self.feedback_until = None;
            }
        }
        match self.pending_tap {
            Some(tapped) if now.saturating_duration_since(tapped) > self.window => {
                self.pending_tap = None;
                Some(Intent::TogglePlay)
            }
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending_tap = None;
        self.feedback_until = None;
    }

    pub fn pending_tap(&self) -> Option<Instant> {
        self.pending_tap
    }

    pub fn feedback_visible(&self) -> bool {
        self.feedback_until.is_some()
    }

    /// Earliest instant at which [`poll`](Self::poll) would change state.
    pub fn next_deadline(&self) -> Option<Instant> {
        let tap = self
            .pending_tap
            .map(|at| at + self.window + Duration::from_millis(1));
        match (tap, self.feedback_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn show_feedback(&mut self, now: Instant) {
        self.feedback_until = Some(now + self.feedback);
    }
}
