use std::collections::{BTreeMap, HashMap};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::card::{CardController, CardOptions, CardState};
use crate::comments::{CommentRecord, CommentsStore};
use crate::config::Config;
use crate::feed::{self, FeedScroller, ScrollSurface, Video};
use crate::gesture::Intent;
use crate::playback::MediaElement;
use crate::player::{MpvMedia, MpvOptions, PlayerEvent, PreviewMedia};
use crate::share::{self, SharePayload, ShareOutcome, SystemShareHost};
use crate::storage::StoragePort;
use crate::visibility::{ElementId, ViewportObserver};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_LIKE: Color = Color::Rgb(243, 139, 168);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);

const TICK_RATE: Duration = Duration::from_millis(120);
const FRAME_RATE: Duration = Duration::from_millis(16);
const MOUSE_SCROLL_ROWS: f64 = 3.0;
const MOUNT_RADIUS: usize = 1;
const STATUS_HEIGHT: u16 = 1;

type Media = Box<dyn MediaElement>;

pub struct Options {
    pub videos: Vec<Video>,
    pub config: Config,
    pub storage: Arc<dyn StoragePort>,
    pub status_message: String,
}

struct CommentsPanel {
    video_id: String,
    entries: Vec<CommentRecord>,
    input: String,
    scroll: u16,
}

/// Enables mouse capture so wheel events reach the feed instead of the
/// terminal's own scrollback.
struct TerminalScrollSurface;

impl ScrollSurface for TerminalScrollSurface {
    fn suppress_page_scroll(&mut self) {
        if let Err(err) = io::stdout().execute(EnableMouseCapture) {
            log::warn!("ui: enable mouse capture failed: {err}");
        }
    }

    fn restore_page_scroll(&mut self) {
        if let Err(err) = io::stdout().execute(DisableMouseCapture) {
            log::warn!("ui: disable mouse capture failed: {err}");
        }
    }
}

pub struct Model {
    feed: FeedScroller,
    observer: ViewportObserver,
    cards: BTreeMap<usize, CardController<Media>>,
    elements: HashMap<ElementId, usize>,
    next_element: ElementId,
    card_options: CardOptions,
    config: Config,
    comments: CommentsStore<Arc<dyn StoragePort>>,
    comment_counts: HashMap<String, usize>,
    comments_panel: Option<CommentsPanel>,
    share_host: SystemShareHost,
    player_tx: Sender<PlayerEvent>,
    player_rx: Receiver<PlayerEvent>,
    status_message: String,
    feed_area: Rect,
    last_user_scroll: Option<Instant>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (player_tx, player_rx) = unbounded();
        let card_options = options.config.card_options();
        let share_host = SystemShareHost::new(options.config.share.command.clone());
        let mut model = Self {
            feed: FeedScroller::new(options.videos, 1.0),
            observer: ViewportObserver::new(),
            cards: BTreeMap::new(),
            elements: HashMap::new(),
            next_element: 0,
            card_options,
            config: options.config,
            comments: CommentsStore::new(options.storage),
            comment_counts: HashMap::new(),
            comments_panel: None,
            share_host,
            player_tx,
            player_rx,
            status_message: options.status_message,
            feed_area: Rect::default(),
            last_user_scroll: None,
            needs_redraw: true,
        };
        model.sync_mounted();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let mut surface = TerminalScrollSurface;
        let result = {
            let _mounted = feed::mount(&mut surface);
            self.event_loop(&mut terminal)
        };

        self.unmount_all();
        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            let size = terminal.size()?;
            self.resize(size);

            if self.poll_player() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = self.poll_timeout(last_tick);
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            let elapsed = last_tick.elapsed();
            last_tick = Instant::now();
            if self.tick(elapsed, last_tick) {
                self.mark_dirty();
            }
        }

        Ok(())
    }

    fn poll_timeout(&self, last_tick: Instant) -> Duration {
        if self.feed.is_animating() {
            return FRAME_RATE;
        }
        let now = Instant::now();
        let mut timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        for card in self.cards.values() {
            if let Some(deadline) = card.next_deadline() {
                timeout = timeout.min(deadline.saturating_duration_since(now));
            }
        }
        if let Some(scrolled) = self.last_user_scroll {
            let snap_at = scrolled + self.config.feed.snap_delay;
            timeout = timeout.min(snap_at.saturating_duration_since(now));
        }
        timeout
    }

    /// Advances animations and timers; returns true when something changed.
    fn tick(&mut self, elapsed: Duration, now: Instant) -> bool {
        let mut dirty = false;

        if let Some(scrolled) = self.last_user_scroll {
            if now.saturating_duration_since(scrolled) >= self.config.feed.snap_delay {
                self.last_user_scroll = None;
                self.feed.snap();
                dirty = true;
            }
        }

        if self.feed.is_animating() {
            self.feed.tick(elapsed);
            self.update_visibility();
            dirty = true;
        }

        for card in self.cards.values_mut() {
            let before = card.state();
            if let Some(intent) = card.tick(now) {
                log::debug!("ui: card {} committed {intent:?}", card.video_id());
            }
            if card.state() != before {
                dirty = true;
            }
        }
        dirty
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn resize(&mut self, size: Rect) {
        let (feed_area, _) = split_areas(size);
        if feed_area == self.feed_area {
            return;
        }
        self.feed_area = feed_area;
        self.feed.set_slot_height(f64::from(feed_area.height.max(1)));
        self.update_visibility();
        self.mark_dirty();
    }

    fn poll_player(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.player_rx.try_recv() {
            let Some(index) = self.elements.get(&event.card).copied() else {
                continue;
            };
            if let Some(card) = self.cards.get_mut(&index) {
                if let Err(err) = &event.result {
                    self.status_message =
                        format!("Couldn't start playback ({err}). Press space to try again.");
                }
                card.on_play_settled(event.ticket, event.result);
                changed = true;
            }
        }
        changed
    }

    fn make_media(&self, element: ElementId, video: &Video) -> Media {
        if self.config.player.enabled {
            Box::new(MpvMedia::new(
                element,
                MpvOptions {
                    command: self.config.player.video_command.clone(),
                    src: video.src.clone(),
                    label: video.caption.clone(),
                },
                self.player_tx.clone(),
            ))
        } else {
            Box::new(PreviewMedia::new(element, self.player_tx.clone()))
        }
    }

    /// Keeps cards mounted for the current slot and its neighbours only.
    fn sync_mounted(&mut self) {
        if self.feed.is_empty() {
            self.unmount_all();
            return;
        }
        let current = self.feed.current_index();
        let first = current.saturating_sub(MOUNT_RADIUS);
        let last = (current + MOUNT_RADIUS).min(self.feed.len() - 1);

        let stale: Vec<usize> = self
            .cards
            .keys()
            .copied()
            .filter(|index| *index < first || *index > last)
            .collect();
        for index in stale {
            if let Some(mut card) = self.cards.remove(&index) {
                if let Some(element) = card.element() {
                    self.elements.remove(&element);
                }
                card.unmount(&mut self.observer);
            }
        }

        for index in first..=last {
            if self.cards.contains_key(&index) {
                continue;
            }
            let Some(video) = self.feed.video(index).cloned() else {
                continue;
            };
            let element = self.next_element;
            self.next_element += 1;
            let media = self.make_media(element, &video);
            let card = CardController::mount(
                &video,
                element,
                media,
                self.card_options,
                &mut self.observer,
            );
            self.elements.insert(element, index);
            self.cards.insert(index, card);
        }
    }

    fn unmount_all(&mut self) {
        for (_, mut card) in std::mem::take(&mut self.cards) {
            card.unmount(&mut self.observer);
        }
        self.elements.clear();
    }

    fn update_visibility(&mut self) {
        self.sync_mounted();
        let feed = &self.feed;
        let elements = &self.elements;
        let ratios = self.observer.measure(feed.viewport(), |element| {
            elements
                .get(&element)
                .and_then(|index| feed.slot_span(*index))
        });
        for (element, ratio) in ratios {
            let Some(index) = self.elements.get(&element).copied() else {
                continue;
            };
            if let Some(card) = self.cards.get_mut(&index) {
                card.on_ratio(ratio);
            }
        }
    }

    fn current_card(&mut self) -> Option<&mut CardController<Media>> {
        let index = self.feed.current_index();
        self.cards.get_mut(&index)
    }

    fn navigate(&mut self, forward: bool) {
        if !self.feed.controls_enabled() {
            self.status_message = "The feed is empty.".to_string();
            return;
        }
        self.last_user_scroll = None;
        if forward && !self.feed.can_go_next() {
            self.status_message = "You're at the end of the feed.".to_string();
            return;
        }
        if !forward && !self.feed.can_go_previous() {
            self.status_message = "You're at the top of the feed.".to_string();
            return;
        }
        if forward {
            self.feed.next();
        } else {
            self.feed.previous();
        }
        self.update_visibility();
    }

    fn jump_to(&mut self, index: usize) {
        if !self.feed.controls_enabled() {
            return;
        }
        self.last_user_scroll = None;
        self.feed.go_to(index);
        self.update_visibility();
    }

    fn tap_current(&mut self, now: Instant) {
        let Some(card) = self.current_card() else {
            return;
        };
        if let Some(intent) = card.tap(now) {
            let message = describe_intent(intent, &card.state());
            self.status_message = message;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.comments_panel.is_some() {
            self.handle_comments_key(key.code);
            self.mark_dirty();
            return Ok(false);
        }

        let now = Instant::now();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown => self.navigate(true),
            KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => self.navigate(false),
            KeyCode::Char('g') | KeyCode::Home => self.jump_to(0),
            KeyCode::Char('G') | KeyCode::End => self.jump_to(usize::MAX),
            KeyCode::Char(' ') | KeyCode::Enter => self.tap_current(now),
            KeyCode::Char('d') => {
                if let Some(card) = self.current_card() {
                    let intent = card.double_click(now);
                    self.status_message = describe_intent(intent, &card.state());
                }
            }
            KeyCode::Char('l') => {
                if let Some(card) = self.current_card() {
                    self.status_message = if card.toggle_like() {
                        "Liked.".to_string()
                    } else {
                        "Like removed.".to_string()
                    };
                }
            }
            KeyCode::Char('m') => {
                if let Some(card) = self.current_card() {
                    self.status_message = if card.toggle_mute() {
                        "Muted.".to_string()
                    } else {
                        "Sound on.".to_string()
                    };
                }
            }
            KeyCode::Char('c') => self.open_comments(),
            KeyCode::Char('s') => self.share_current(),
            KeyCode::Char('o') => self.open_in_browser(),
            _ => {}
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_comments_key(&mut self, code: KeyCode) {
        let Some(panel) = self.comments_panel.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.comments_panel = None;
                self.status_message = "Comments closed.".to_string();
            }
            KeyCode::Enter => self.submit_comment(),
            KeyCode::Backspace => {
                panel.input.pop();
            }
            KeyCode::Up => panel.scroll = panel.scroll.saturating_sub(1),
            KeyCode::Down => panel.scroll = panel.scroll.saturating_add(1),
            KeyCode::Char(ch) => panel.input.push(ch),
            _ => {}
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) {
        if self.comments_panel.is_some() {
            return;
        }
        let now = Instant::now();
        match event.kind {
            MouseEventKind::ScrollDown => {
                self.feed.scroll_by(MOUSE_SCROLL_ROWS);
                self.last_user_scroll = Some(now);
                self.update_visibility();
            }
            MouseEventKind::ScrollUp => {
                self.feed.scroll_by(-MOUSE_SCROLL_ROWS);
                self.last_user_scroll = Some(now);
                self.update_visibility();
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if self.slot_at(event.row) == Some(self.feed.current_index()) {
                    self.tap_current(now);
                }
            }
            _ => return,
        }
        self.mark_dirty();
    }

    fn slot_at(&self, row: u16) -> Option<usize> {
        let area = self.feed_area;
        if row < area.y || row >= area.y + area.height || self.feed.is_empty() {
            return None;
        }
        let offset = self.feed.scroll_offset() + f64::from(row - area.y);
        let index = (offset / self.feed.slot_height()).floor() as usize;
        (index < self.feed.len()).then_some(index)
    }

    fn open_comments(&mut self) {
        let Some(video) = self.feed.current_video() else {
            self.status_message = "No video selected.".to_string();
            return;
        };
        let video_id = video.id.clone();
        let entries = self.comments.get_comments(&video_id);
        self.comment_counts.insert(video_id.clone(), entries.len());
        self.status_message =
            "Type a comment and press Enter to post. Esc closes comments.".to_string();
        self.comments_panel = Some(CommentsPanel {
            video_id,
            entries,
            input: String::new(),
            scroll: 0,
        });
    }

    fn submit_comment(&mut self) {
        let Some(panel) = self.comments_panel.as_mut() else {
            return;
        };
        let record = match CommentRecord::compose(&self.config.comments.user, &panel.input) {
            Ok(record) => record,
            Err(err) => {
                self.status_message = format!("Not posted: {err}.");
                return;
            }
        };
        match self.comments.add_comment(&panel.video_id, record) {
            Ok(entries) => {
                self.comment_counts
                    .insert(panel.video_id.clone(), entries.len());
                panel.entries = entries;
                panel.input.clear();
                panel.scroll = u16::MAX;
                self.status_message = "Comment posted.".to_string();
            }
            Err(err) => {
                self.status_message = format!("Not posted: {err}.");
            }
        }
    }

    fn share_current(&mut self) {
        let Some(video) = self.feed.current_video() else {
            return;
        };
        let payload = SharePayload::for_video(video, &self.config.feed.share_base_url);
        match share::share(&mut self.share_host, &payload) {
            ShareOutcome::Shared => self.status_message = "Shared.".to_string(),
            ShareOutcome::Copied => {
                self.status_message = format!("Link copied to clipboard: {}", payload.url)
            }
            ShareOutcome::Failed => {}
        }
    }

    fn open_in_browser(&mut self) {
        let Some(video) = self.feed.current_video() else {
            return;
        };
        let url = video.src.clone();
        match webbrowser::open(&url) {
            Ok(_) => self.status_message = "Opened video in your browser.".to_string(),
            Err(err) => {
                self.status_message = format!("Failed to open video: {err} (URL: {url})")
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), area);
        let (feed_area, status_area) = split_areas(area);

        if self.feed.is_empty() {
            let empty = Paragraph::new("No videos to show. Pass --feed <file> to load a list.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY));
            frame.render_widget(empty, feed_area);
        } else {
            for (&index, card) in &self.cards {
                self.draw_card(frame, feed_area, index, card);
            }
        }

        if let Some(panel) = &self.comments_panel {
            self.draw_comments(frame, feed_area, panel);
        }

        let status = Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", self.position_label()),
                Style::default().fg(COLOR_BG).bg(COLOR_ACCENT),
            ),
            Span::raw(" "),
            Span::styled(
                self.status_message.clone(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ),
        ]));
        frame.render_widget(status, status_area);
    }

    fn position_label(&self) -> String {
        if self.feed.is_empty() {
            "0/0".to_string()
        } else {
            format!("{}/{}", self.feed.current_index() + 1, self.feed.len())
        }
    }

    fn draw_card(&self, frame: &mut Frame, area: Rect, index: usize, card: &CardController<Media>) {
        let Some(span) = self.feed.slot_span(index) else {
            return;
        };
        let Some(video) = self.feed.video(index) else {
            return;
        };
        let top = span.top.round() as i32;
        let bottom = top + span.height.round() as i32;
        let visible_top = top.max(0);
        let visible_bottom = bottom.min(i32::from(area.height));
        if visible_bottom <= visible_top {
            return;
        }
        let rect = Rect {
            x: area.x,
            y: area.y + visible_top as u16,
            width: area.width,
            height: (visible_bottom - visible_top) as u16,
        };
        let clipped_rows = (visible_top - top) as u16;

        let state = card.state();
        let focused = index == self.feed.current_index();
        let comment_count = self
            .comment_counts
            .get(&video.id)
            .map(|count| *count as u64)
            .unwrap_or(video.comments);
        let lines = card_lines(video, &state, comment_count, rect.width);

        let border = if focused {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        let block = Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG));
        let body = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((clipped_rows, 0));
        frame.render_widget(Clear, rect);
        frame.render_widget(body, rect);
    }

    fn draw_comments(&self, frame: &mut Frame, area: Rect, panel: &CommentsPanel) {
        let rect = panel_rect(area);
        let inner_width = rect.width.saturating_sub(2).max(1) as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        for comment in &panel.entries {
            lines.push(Line::from(vec![
                Span::styled(
                    comment.user.clone(),
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", comment.created_at.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ),
            ]));
            for wrapped in textwrap::wrap(&comment.text, inner_width) {
                lines.push(Line::from(Span::styled(
                    wrapped.into_owned(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )));
            }
            lines.push(Line::default());
        }

        let body_height = rect.height.saturating_sub(5);
        let max_scroll = (lines.len() as u16).saturating_sub(body_height);
        let scroll = panel.scroll.min(max_scroll);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(rect);

        let title = format!(" Comments ({}) ", panel.entries.len());
        let list = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(COLOR_BORDER_FOCUSED)),
            )
            .style(Style::default().bg(COLOR_PANEL_BG))
            .scroll((scroll, 0));
        let input = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(COLOR_SUCCESS)),
            Span::styled(
                tail_to_width(&panel.input, inner_width.saturating_sub(3)),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Add comment ")
                .border_style(Style::default().fg(COLOR_BORDER_IDLE)),
        )
        .style(Style::default().bg(COLOR_PANEL_BG));

        frame.render_widget(Clear, rect);
        frame.render_widget(list, chunks[0]);
        frame.render_widget(input, chunks[1]);
    }
}

fn split_areas(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(STATUS_HEIGHT)])
        .split(area);
    (chunks[0], chunks[1])
}

fn panel_rect(area: Rect) -> Rect {
    let width = (area.width / 2).max(30).min(area.width);
    Rect {
        x: area.x + area.width - width,
        y: area.y,
        width,
        height: area.height,
    }
}

fn describe_intent(intent: Intent, state: &CardState) -> String {
    match intent {
        Intent::Like => "♥ Liked.".to_string(),
        Intent::TogglePlay if state.paused => "Paused.".to_string(),
        Intent::TogglePlay => "Playing.".to_string(),
    }
}

fn playback_label(state: &CardState) -> (&'static str, Color) {
    if !state.visible {
        ("", COLOR_TEXT_SECONDARY)
    } else if state.tap_to_play {
        ("▶  Tap to play", COLOR_ACCENT)
    } else if state.paused {
        ("⏸  Paused", COLOR_TEXT_SECONDARY)
    } else {
        ("▶  Playing", COLOR_SUCCESS)
    }
}

fn card_lines(video: &Video, state: &CardState, comments: u64, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    lines.push(Line::from(vec![
        Span::styled(
            format!(" {}", video.author),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", if state.muted { "🔇" } else { "🔊" }),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ]));
    lines.push(Line::from(Span::styled(
        format!(" {}", video.caption),
        Style::default().fg(COLOR_TEXT_PRIMARY),
    )));
    lines.push(Line::from(Span::styled(
        format!(" ♪ {}", video.music),
        Style::default().fg(COLOR_TEXT_SECONDARY),
    )));
    lines.push(Line::default());

    let (label, color) = playback_label(state);
    lines.push(Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center));
    if state.like_feedback {
        lines.push(Line::from(Span::styled(
            "♥",
            Style::default().fg(COLOR_LIKE).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center));
    }
    lines.push(Line::default());

    let heart = if state.liked { "♥" } else { "♡" };
    let like_style = if state.liked {
        Style::default().fg(COLOR_LIKE)
    } else {
        Style::default().fg(COLOR_TEXT_SECONDARY)
    };
    lines.push(Line::from(vec![
        Span::styled(format!(" {heart} {}", compact_count(state.like_count)), like_style),
        Span::styled(
            format!("   💬 {}", compact_count(comments)),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
        Span::styled(
            format!("   ↗ {}", compact_count(video.shares)),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ),
    ]));
    lines.push(Line::from(Span::styled(
        format!(" {}", tail_to_width(&video.src, width.saturating_sub(4) as usize)),
        Style::default().fg(COLOR_BORDER_IDLE),
    )));
    lines.push(Line::from(Span::styled(
        " space play/pause · double space like · m mute · c comments · s share",
        Style::default().fg(COLOR_BORDER_IDLE),
    )));
    lines
}

fn compact_count(value: u64) -> String {
    match value {
        0..=999 => value.to_string(),
        1_000..=999_999 => format!("{:.1}K", value as f64 / 1_000.0),
        _ => format!("{:.1}M", value as f64 / 1_000_000.0),
    }
}

/// Keeps the end of `text` that fits in `width` columns.
fn tail_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut kept: Vec<char> = Vec::new();
    let mut used = 1;
    for ch in text.chars().rev() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        kept.push(ch);
    }
    kept.reverse();
    let mut out = String::from("…");
    out.extend(kept);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_videos;
    use crate::storage::MemoryStorage;

    fn model() -> Model {
        let mut config = Config::default();
        config.player.enabled = false;
        let mut model = Model::new(Options {
            videos: sample_videos(),
            config,
            storage: Arc::new(MemoryStorage::new()),
            status_message: String::new(),
        });
        model.resize(Rect::new(0, 0, 80, 25));
        model.poll_player();
        model
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    fn settle(model: &mut Model) {
        let mut now = Instant::now();
        for _ in 0..200 {
            now += FRAME_RATE;
            model.tick(FRAME_RATE, now);
        }
        model.poll_player();
    }

    #[test]
    fn mounts_only_neighbouring_cards() {
        let mut model = model();
        assert_eq!(model.cards.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert!(model.cards[&0].state().visible);
        assert!(!model.cards[&0].state().paused);
        assert!(model.cards[&1].state().paused);

        model.handle_key(key(KeyCode::Char('j'))).unwrap();
        model.handle_key(key(KeyCode::Char('j'))).unwrap();
        settle(&mut model);
        assert_eq!(model.feed.current_index(), 2);
        assert_eq!(model.cards.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(model.observer.observed_count(), 3);
        assert!(model.cards[&2].state().visible);
        assert!(model.cards[&1].state().paused);
    }

    #[test]
    fn comments_panel_posts_and_counts() {
        let mut model = model();
        model.handle_key(key(KeyCode::Char('c'))).unwrap();
        for ch in "great clip".chars() {
            model.handle_key(key(KeyCode::Char(ch))).unwrap();
        }
        model.handle_key(key(KeyCode::Enter)).unwrap();
        let panel = model.comments_panel.as_ref().unwrap();
        assert_eq!(panel.entries.len(), 3);
        assert_eq!(panel.entries[2].text, "great clip");
        assert_eq!(panel.entries[2].user, "You");
        assert_eq!(model.comment_counts.get("v1"), Some(&3));

        model.handle_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(model.comments_panel.as_ref().unwrap().entries.len(), 3);
        model.handle_key(key(KeyCode::Esc)).unwrap();
        assert!(model.comments_panel.is_none());
    }

    #[test]
    fn quit_and_empty_feed_are_safe() {
        let mut config = Config::default();
        config.player.enabled = false;
        let mut model = Model::new(Options {
            videos: Vec::new(),
            config,
            storage: Arc::new(MemoryStorage::new()),
            status_message: String::new(),
        });
        model.resize(Rect::new(0, 0, 80, 25));
        assert!(!model.handle_key(key(KeyCode::Char('j'))).unwrap());
        assert!(!model.handle_key(key(KeyCode::Char(' '))).unwrap());
        assert!(!model.handle_key(key(KeyCode::Char('c'))).unwrap());
        assert!(model.handle_key(key(KeyCode::Char('q'))).unwrap());
    }

    #[test]
    fn like_button_updates_current_card() {
        let mut model = model();
        model.handle_key(key(KeyCode::Char('l'))).unwrap();
        let state = model.cards[&0].state();
        assert!(state.liked);
        assert_eq!(state.like_count, sample_videos()[0].likes + 1);
    }

    #[test]
    fn counts_are_compacted() {
        assert_eq!(compact_count(999), "999");
        assert_eq!(compact_count(20_511), "20.5K");
        assert_eq!(compact_count(3_400_000), "3.4M");
    }

    #[test]
    fn tail_keeps_end_of_long_text() {
        assert_eq!(tail_to_width("short", 10), "short");
        assert_eq!(tail_to_width("abcdefghij", 5), "…ghij");
    }
}
