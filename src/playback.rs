use std::fmt;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("no media player available")]
    Unavailable,
    #[error("playback refused: {0}")]
    Refused(String),
}

/// Identifies one asynchronous start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayTicket(pub u64);

impl fmt::Display for PlayTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Media surface a card drives.
///
/// `request_play` must not block; the outcome is reported back through
/// [`PlaybackController::on_play_settled`] with the same ticket.
pub trait MediaElement {
    fn request_play(&mut self, ticket: PlayTicket);
    fn pause(&mut self);
    fn set_muted(&mut self, muted: bool);
}

impl<M: MediaElement + ?Sized> MediaElement for Box<M> {
    fn request_play(&mut self, ticket: PlayTicket) {
        (**self).request_play(ticket)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    User,
    AutoplayDisabled,
    StartFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Inactive,
    Playing,
    Paused(PauseReason),
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackOptions {
    pub autoplay: bool,
    pub reduced_motion: bool,
    pub start_muted: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            reduced_motion: false,
            start_muted: true,
        }
    }
}

impl PlaybackOptions {
    fn autoplay_allowed(&self) -> bool {
        self.autoplay && !self.reduced_motion
    }
}

pub struct PlaybackController<M: MediaElement> {
    media: M,
    options: PlaybackOptions,
    state: PlaybackState,
    muted: bool,
    user_paused: bool,
    pending: Option<PlayTicket>,
    next_ticket: u64,
}

impl<M: MediaElement> PlaybackController<M> {
    pub fn new(mut media: M, options: PlaybackOptions) -> Self {
        media.set_muted(options.start_muted);
        Self {
            media,
            options,
            state: PlaybackState::Inactive,
            muted: options.start_muted,
            user_paused: false,
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn pending_request(&self) -> Option<PlayTicket> {
        self.pending
    }

    /// True when the card should offer a "tap to play" affordance.
    pub fn needs_gesture(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Paused(PauseReason::StartFailed | PauseReason::AutoplayDisabled)
        )
    }

    pub fn set_visible(&mut self, visible: bool) {
        if !visible {
            if self.state != PlaybackState::Inactive || self.pending.is_some() {
                log::debug!("playback: left view, pausing");
            }
            self.pending = None;
            self.media.pause();
            self.state = PlaybackState::Inactive;
            return;
        }
        if self.state != PlaybackState::Inactive {
            return;
        }
        self.state = if self.user_paused {
            PlaybackState::Paused(PauseReason::User)
        } else if !self.options.autoplay_allowed() {
            PlaybackState::Paused(PauseReason::AutoplayDisabled)
        } else {
            self.start();
            PlaybackState::Playing
        };
    }

    /// Single-tap intent.
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Inactive => {}
            PlaybackState::Playing => {
                self.pending = None;
                self.media.pause();
                self.user_paused = true;
                self.state = PlaybackState::Paused(PauseReason::User);
            }
            PlaybackState::Paused(_) => {
                self.user_paused = false;
                self.start();
                self.state = PlaybackState::Playing;
            }
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.set_muted(!self.muted);
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.media.set_muted(muted);
    }

    pub fn on_play_settled(&mut self, ticket: PlayTicket, result: Result<(), PlaybackError>) {
        if self.pending != Some(ticket) {
            // Superseded or cancelled; whatever the element did, it stays paused.
            if result.is_ok() && self.state != PlaybackState::Playing {
                self.media.pause();
            }
            return;
        }
        self.pending = None;
        if let Err(err) = result {
            log::warn!("playback: start request {ticket} failed: {err}");
            self.media.pause();
            self.state = PlaybackState::Paused(PauseReason::StartFailed);
        }
    }

    /// Releases the media element on unmount.
    pub fn stop(&mut self) {
        self.pending = None;
        self.media.pause();
        self.state = PlaybackState::Inactive;
    }

    fn start(&mut self) {
        self.next_ticket += 1;
        let ticket = PlayTicket(self.next_ticket);
        self.pending = Some(ticket);
        self.media.request_play(ticket);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{MediaCall, RecordingMedia};
    use super::*;

    fn controller(options: PlaybackOptions) -> (PlaybackController<RecordingMedia>, RecordingMedia) {
        let media = RecordingMedia::default();
        (PlaybackController::new(media.clone(), options), media)
    }

    #[test]
    fn starts_muted_and_inactive() {
        let (ctl, media) = controller(PlaybackOptions::default());
        assert_eq!(ctl.state(), PlaybackState::Inactive);
        assert!(ctl.is_muted());
        assert_eq!(media.last_call(), Some(MediaCall::Mute(true)));
    }

    #[test]
    fn visibility_drives_autoplay() {
        let (mut ctl, media) = controller(PlaybackOptions::default());
        ctl.set_visible(true);
        assert_eq!(ctl.state(), PlaybackState::Playing);
        let ticket = media.last_play().unwrap();
        ctl.on_play_settled(ticket, Ok(()));
        assert_eq!(ctl.pending_request(), None);

        ctl.set_visible(false);
        assert_eq!(ctl.state(), PlaybackState::Inactive);
        assert!(ctl.is_paused());
        assert_eq!(media.last_call(), Some(MediaCall::Pause));
    }

    #[test]
    fn taps_toggle_between_playing_and_user_paused() {
        let (mut ctl, _media) = controller(PlaybackOptions::default());
        ctl.toggle();
        assert_eq!(ctl.state(), PlaybackState::Inactive);
        ctl.set_visible(true);
        ctl.toggle();
        assert_eq!(ctl.state(), PlaybackState::Paused(PauseReason::User));
        ctl.toggle();
        assert_eq!(ctl.state(), PlaybackState::Playing);
    }

    #[test]
    fn user_pause_survives_scrolling_away_and_back() {
        let (mut ctl, _media) = controller(PlaybackOptions::default());
        ctl.set_visible(true);
        ctl.toggle();
        ctl.set_visible(false);
        ctl.set_visible(true);
        assert_eq!(ctl.state(), PlaybackState::Paused(PauseReason::User));
    }

    #[test]
    fn reduced_motion_holds_autoplay() {
        let (mut ctl, media) = controller(PlaybackOptions {
            reduced_motion: true,
            ..PlaybackOptions::default()
        });
        ctl.set_visible(true);
        assert_eq!(ctl.state(), PlaybackState::Paused(PauseReason::AutoplayDisabled));
        assert!(ctl.needs_gesture());
        assert_eq!(media.last_play(), None);
        ctl.toggle();
        assert_eq!(ctl.state(), PlaybackState::Playing);
    }

    #[test]
    fn failed_start_shows_affordance_without_retry() {
        let (mut ctl, media) = controller(PlaybackOptions::default());
        ctl.set_visible(true);
        let ticket = media.last_play().unwrap();
        ctl.on_play_settled(ticket, Err(PlaybackError::Unavailable));
        assert_eq!(ctl.state(), PlaybackState::Paused(PauseReason::StartFailed));
        assert!(ctl.needs_gesture());
        let plays = media
            .calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, MediaCall::Play(_)))
            .count();
        assert_eq!(plays, 1);
    }

    #[test]
    fn leaving_view_beats_pending_start() {
        let (mut ctl, media) = controller(PlaybackOptions::default());
        ctl.set_visible(true);
        let ticket = media.last_play().unwrap();
        ctl.set_visible(false);
        ctl.on_play_settled(ticket, Ok(()));
        assert_eq!(ctl.state(), PlaybackState::Inactive);
        assert_eq!(media.last_call(), Some(MediaCall::Pause));
    }

    #[test]
    fn mute_is_independent_of_play_state() {
        let (mut ctl, media) = controller(PlaybackOptions::default());
        ctl.set_visible(true);
        assert!(!ctl.toggle_mute());
        assert_eq!(ctl.state(), PlaybackState::Playing);
        assert_eq!(media.last_call(), Some(MediaCall::Mute(false)));
    }
}
