use std::collections::BTreeSet;

pub const DEFAULT_THRESHOLD: f64 = 0.75;

pub type ElementId = usize;

/// Vertical span in viewport rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub top: f64,
    pub height: f64,
}

impl Span {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Fraction of `element` inside `viewport`, in `[0, 1]`.
pub fn intersection_ratio(element: Span, viewport: Span) -> f64 {
    if element.height <= 0.0 {
        return 0.0;
    }
    let top = element.top.max(viewport.top);
    let bottom = element.bottom().min(viewport.bottom());
    ((bottom - top).max(0.0) / element.height).clamp(0.0, 1.0)
}

/// Host capability that watches elements for viewport intersection.
pub trait VisibilityObserver {
    fn observe(&mut self, element: ElementId);
    fn unobserve(&mut self, element: ElementId);
}

/// Observer over a single scrolling viewport.
///
/// Layout is supplied at measurement time, so the observer only keeps the
/// set of elements it has been asked to watch.
#[derive(Debug, Default)]
pub struct ViewportObserver {
    observed: BTreeSet<ElementId>,
}

impl ViewportObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_observing(&self, element: ElementId) -> bool {
        self.observed.contains(&element)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Intersection ratio for every observed element that has a layout.
    pub fn measure<F>(&self, viewport: Span, layout: F) -> Vec<(ElementId, f64)>
    where
        F: Fn(ElementId) -> Option<Span>,
    {
        self.observed
            .iter()
            .filter_map(|&element| {
                layout(element).map(|span| (element, intersection_ratio(span, viewport)))
            })
            .collect()
    }
}

impl VisibilityObserver for ViewportObserver {
    fn observe(&mut self, element: ElementId) {
        self.observed.insert(element);
    }

    fn unobserve(&mut self, element: ElementId) {
        self.observed.remove(&element);
    }
}

/// Per-card "in view" state derived from intersection ratios.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    threshold: f64,
    element: Option<ElementId>,
    visible: bool,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl VisibilityTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            element: None,
            visible: false,
        }
    }

    /// Starts observing `element`, releasing any previous observation first.
    pub fn attach(&mut self, observer: &mut dyn VisibilityObserver, element: ElementId) {
        if let Some(previous) = self.element.take() {
            observer.unobserve(previous);
        }
        observer.observe(element);
        self.element = Some(element);
    }

    pub fn detach(&mut self, observer: &mut dyn VisibilityObserver) {
        if let Some(previous) = self.element.take() {
            observer.unobserve(previous);
        }
    }

    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Feeds a new ratio; returns the new state only on a transition.
    pub fn update(&mut self, ratio: f64) -> Option<bool> {
        let visible = ratio >= self.threshold;
        if visible == self.visible {
            return None;
        }
        self.visible = visible;
        Some(visible)
    }
}
