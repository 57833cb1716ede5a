use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::visibility::Span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub src: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub music: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
}

/// Host surface whose page-level scrolling the feed takes over while mounted.
pub trait ScrollSurface {
    fn suppress_page_scroll(&mut self);
    fn restore_page_scroll(&mut self);
}

/// Holds page scrolling suppressed until dropped.
pub struct FeedMount<'a, S: ScrollSurface + ?Sized> {
    surface: &'a mut S,
}

impl<S: ScrollSurface + ?Sized> FeedMount<'_, S> {
    pub fn surface(&mut self) -> &mut S {
        &mut *self.surface
    }
}

impl<S: ScrollSurface + ?Sized> Drop for FeedMount<'_, S> {
    fn drop(&mut self) {
        self.surface.restore_page_scroll();
    }
}

pub fn mount<S: ScrollSurface + ?Sized>(surface: &mut S) -> FeedMount<'_, S> {
    surface.suppress_page_scroll();
    FeedMount { surface }
}

// Fraction of the remaining distance covered per 16ms frame.
const EASE_PER_FRAME: f64 = 0.35;
const FRAME: Duration = Duration::from_millis(16);
const SETTLE_EPSILON: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct FeedScroller {
    videos: Vec<Video>,
    slot_height: f64,
    scroll_offset: f64,
    current: usize,
    target: Option<f64>,
}

impl FeedScroller {
    pub fn new(videos: Vec<Video>, slot_height: f64) -> Self {
        Self {
            videos,
            slot_height: slot_height.max(1.0),
            scroll_offset: 0.0,
            current: 0,
            target: None,
        }
    }

    pub fn video(&self, index: usize) -> Option<&Video> {
        self.videos.get(index)
    }

    pub fn current_video(&self) -> Option<&Video> {
        self.videos.get(self.current)
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn controls_enabled(&self) -> bool {
        !self.videos.is_empty()
    }

    pub fn can_go_previous(&self) -> bool {
        self.controls_enabled() && self.current > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.controls_enabled() && self.current + 1 < self.videos.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn slot_height(&self) -> f64 {
        self.slot_height
    }

    pub fn is_animating(&self) -> bool {
        self.target.is_some()
    }

    pub fn set_slot_height(&mut self, slot_height: f64) {
        let slot_height = slot_height.max(1.0);
        if (slot_height - self.slot_height).abs() < f64::EPSILON {
            return;
        }
        self.slot_height = slot_height;
        self.target = None;
        self.scroll_offset = self.slot_offset(self.current);
    }

    /// User scrolling. Cancels any programmatic scroll in flight.
    pub fn set_scroll_offset(&mut self, offset: f64) {
        self.target = None;
        self.scroll_offset = offset.clamp(0.0, self.max_offset());
        self.current = self.index_for_offset(self.scroll_offset);
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.set_scroll_offset(self.scroll_offset + delta);
    }

    /// Smooth-scrolls to `index` (clamped) and returns the clamped index.
    pub fn go_to(&mut self, index: usize) -> usize {
        if self.videos.is_empty() {
            return 0;
        }
        let index = index.min(self.videos.len() - 1);
        self.current = index;
        let target = self.slot_offset(index);
        if (target - self.scroll_offset).abs() <= SETTLE_EPSILON {
            self.scroll_offset = target;
            self.target = None;
        } else {
            self.target = Some(target);
        }
        index
    }

    pub fn previous(&mut self) -> usize {
        self.go_to(self.current.saturating_sub(1))
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.current.saturating_add(1))
    }

    /// Snaps to the nearest slot once user scrolling has gone idle.
    pub fn snap(&mut self) -> usize {
        self.go_to(self.current)
    }

    /// Advances the smooth scroll; returns true while still moving.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        let frames = elapsed.as_secs_f64() / FRAME.as_secs_f64();
        let remaining = (1.0 - EASE_PER_FRAME).powf(frames.max(0.0));
        self.scroll_offset = target + (self.scroll_offset - target) * remaining;
        if (self.scroll_offset - target).abs() <= SETTLE_EPSILON {
            self.scroll_offset = target;
            self.target = None;
            return false;
        }
        true
    }

    pub fn slot_offset(&self, index: usize) -> f64 {
        index as f64 * self.slot_height
    }

    /// Slot rectangle relative to the viewport top.
    pub fn slot_span(&self, index: usize) -> Option<Span> {
        if index >= self.videos.len() {
            return None;
        }
        Some(Span::new(
            self.slot_offset(index) - self.scroll_offset,
            self.slot_height,
        ))
    }

    pub fn viewport(&self) -> Span {
        Span::new(0.0, self.slot_height)
    }

    fn max_offset(&self) -> f64 {
        self.slot_offset(self.videos.len().saturating_sub(1))
    }

    fn index_for_offset(&self, offset: f64) -> usize {
        if self.videos.is_empty() {
            return 0;
        }
        let index = (offset / self.slot_height).round().max(0.0) as usize;
        index.min(self.videos.len() - 1)
    }
}
