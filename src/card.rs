use std::time::{Duration, Instant};

use crate::feed::Video;
use crate::gesture::{self, GestureDisambiguator, Intent};
use crate::playback::{
    MediaElement, PlayTicket, PlaybackController, PlaybackError, PlaybackOptions, PlaybackState,
};
use crate::visibility::{self, ElementId, VisibilityObserver, VisibilityTracker};

#[derive(Debug, Clone, Copy)]
pub struct CardOptions {
    pub visibility_threshold: f64,
    pub playback: PlaybackOptions,
    pub double_tap_window: Duration,
    pub feedback_duration: Duration,
}

impl Default for CardOptions {
    fn default() -> Self {
        Self {
            visibility_threshold: visibility::DEFAULT_THRESHOLD,
            playback: PlaybackOptions::default(),
            double_tap_window: gesture::DEFAULT_DOUBLE_TAP_WINDOW,
            feedback_duration: gesture::DEFAULT_FEEDBACK_DURATION,
        }
    }
}

/// Snapshot of one mounted card, as the view renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardState {
    pub visible: bool,
    pub paused: bool,
    pub muted: bool,
    pub liked: bool,
    pub like_count: u64,
    pub pending_tap: Option<Instant>,
    pub like_feedback: bool,
    pub tap_to_play: bool,
}

/// Owned per-card state: visibility, playback, gestures and likes.
pub struct CardController<M: MediaElement> {
    video_id: String,
    tracker: VisibilityTracker,
    playback: PlaybackController<M>,
    gestures: GestureDisambiguator,
    liked: bool,
    like_count: u64,
}

impl<M: MediaElement> CardController<M> {
    pub fn mount(
        video: &Video,
        element: ElementId,
        media: M,
        options: CardOptions,
        observer: &mut dyn VisibilityObserver,
    ) -> Self {
        let mut tracker = VisibilityTracker::new(options.visibility_threshold);
        tracker.attach(observer, element);
        Self {
            video_id: video.id.clone(),
            tracker,
            playback: PlaybackController::new(media, options.playback),
            gestures: GestureDisambiguator::new(
                options.double_tap_window,
                options.feedback_duration,
            ),
            liked: false,
            like_count: video.likes,
        }
    }

    /// Releases the observation, drops pending timers and pauses the media.
    pub fn unmount(&mut self, observer: &mut dyn VisibilityObserver) {
        self.tracker.detach(observer);
        self.gestures.cancel();
        self.playback.stop();
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn element(&self) -> Option<ElementId> {
        self.tracker.element()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn state(&self) -> CardState {
        CardState {
            visible: self.tracker.is_visible(),
            paused: self.playback.is_paused(),
            muted: self.playback.is_muted(),
            liked: self.liked,
            like_count: self.like_count,
            pending_tap: self.gestures.pending_tap(),
            like_feedback: self.gestures.feedback_visible(),
            tap_to_play: self.playback.needs_gesture(),
        }
    }

    /// Feeds an intersection ratio; returns the visibility transition, if any.
    pub fn on_ratio(&mut self, ratio: f64) -> Option<bool> {
        let transition = self.tracker.update(ratio)?;
        if !transition {
            // Off-screen cards must not keep a half-classified tap around.
            self.gestures.cancel();
        }
        self.playback.set_visible(transition);
        log::debug!(
            "card {}: {}",
            self.video_id,
            if transition { "in view" } else { "out of view" }
        );
        Some(transition)
    }

    pub fn tap(&mut self, now: Instant) -> Option<Intent> {
        let intent = self.gestures.tap(now)?;
        self.apply(intent);
        Some(intent)
    }

    pub fn double_click(&mut self, now: Instant) -> Intent {
        let intent = self.gestures.double_click(now);
        self.apply(intent);
        intent
    }

    pub fn tick(&mut self, now: Instant) -> Option<Intent> {
        let intent = self.gestures.poll(now)?;
        self.apply(intent);
        Some(intent)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.gestures.next_deadline()
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.playback.toggle_mute()
    }

    /// Like button: toggles, unlike double tap.
    pub fn toggle_like(&mut self) -> bool {
        if self.liked {
            self.liked = false;
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.like();
        }
        self.liked
    }

    pub fn on_play_settled(&mut self, ticket: PlayTicket, result: Result<(), PlaybackError>) {
        self.playback.on_play_settled(ticket, result);
    }

    fn like(&mut self) {
        if !self.liked {
            self.liked = true;
            self.like_count = self.like_count.saturating_add(1);
        }
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::TogglePlay => self.playback.toggle(),
            Intent::Like => self.like(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::testing::{MediaCall, RecordingMedia};
    use crate::visibility::ViewportObserver;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn video() -> Video {
        Video {
            id: "v1".into(),
            src: "https://cdn.test/v1.mp4".into(),
            author: "@ana".into(),
            caption: "sunset".into(),
            music: "lofi".into(),
            likes: 41,
            comments: 2,
            shares: 0,
        }
    }

    fn mounted(
        observer: &mut ViewportObserver,
    ) -> (CardController<RecordingMedia>, RecordingMedia) {
        let media = RecordingMedia::default();
        let card = CardController::mount(
            &video(),
            0,
            media.clone(),
            CardOptions::default(),
            observer,
        );
        (card, media)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn double_tap_likes_once_and_replays_feedback() {
        let mut observer = ViewportObserver::new();
        let (mut card, _media) = mounted(&mut observer);
        card.on_ratio(1.0);
        let start = Instant::now();

        card.tap(start);
        card.tap(start + ms(120));
        assert_eq!(card.state().like_count, 42);
        assert!(card.state().liked);
        card.tick(start + ms(1000));
        assert!(!card.state().like_feedback);

        let again = start + ms(2000);
        card.tap(again);
        assert_eq!(card.tap(again + ms(100)), Some(Intent::Like));
        assert_eq!(card.state().like_count, 42);
        assert!(card.state().like_feedback);
        card.tick(again + ms(899));
        assert!(card.state().like_feedback);
        card.tick(again + ms(900));
        assert!(!card.state().like_feedback);
        assert_eq!(card.playback_state(), PlaybackState::Playing);
    }

    #[test]
    fn single_tap_pauses_after_window() {
        let mut observer = ViewportObserver::new();
        let (mut card, _media) = mounted(&mut observer);
        card.on_ratio(0.9);
        let start = Instant::now();
        assert_eq!(card.tap(start), None);
        assert!(card.state().pending_tap.is_some());
        assert!(!card.state().paused);
        assert_eq!(card.tick(start + ms(301)), Some(Intent::TogglePlay));
        assert!(card.state().paused);
    }

    #[test]
    fn like_button_toggles() {
        let mut observer = ViewportObserver::new();
        let (mut card, _media) = mounted(&mut observer);
        assert!(card.toggle_like());
        assert_eq!(card.state().like_count, 42);
        assert!(!card.toggle_like());
        assert_eq!(card.state().like_count, 41);
        card.double_click(Instant::now());
        assert_eq!(card.state().like_count, 42);
    }

    #[test]
    fn unmount_releases_observer_and_timers() {
        let mut observer = ViewportObserver::new();
        let (mut card, media) = mounted(&mut observer);
        card.on_ratio(1.0);
        let start = Instant::now();
        card.tap(start);
        card.unmount(&mut observer);
        assert_eq!(observer.observed_count(), 0);
        assert_eq!(card.next_deadline(), None);
        assert_eq!(card.tick(start + ms(400)), None);
        assert_eq!(media.last_call(), Some(MediaCall::Pause));
        assert!(card.state().paused);
    }

    #[test]
    fn hidden_card_is_always_paused() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..64 {
            let mut observer = ViewportObserver::new();
            let (mut card, media) = mounted(&mut observer);
            let mut now = Instant::now();
            for _ in 0..200 {
                now += ms(rng.gen_range(0..500));
                match rng.gen_range(0..6) {
                    0 | 1 => {
                        card.on_ratio(rng.gen_range(0.0..=1.0));
                    }
                    2 => {
                        card.tap(now);
                    }
                    3 => {
                        card.tick(now);
                    }
                    4 => {
                        if let Some(ticket) = media.last_play() {
                            let result = if rng.gen_bool(0.8) {
                                Ok(())
                            } else {
                                Err(PlaybackError::Refused("autoplay blocked".into()))
                            };
                            card.on_play_settled(ticket, result);
                        }
                    }
                    _ => {
                        card.toggle_mute();
                    }
                }
                let state = card.state();
                assert!(state.visible || state.paused, "hidden card playing: {state:?}");
            }
        }
    }
}
