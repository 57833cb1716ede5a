use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::card::CardOptions;
use crate::playback::PlaybackOptions;

const DEFAULT_ENV_PREFIX: &str = "REELFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub share: ShareConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub comments: CommentsConfig,
}

impl Config {
    pub fn card_options(&self) -> CardOptions {
        CardOptions {
            visibility_threshold: self.playback.visibility_threshold,
            playback: PlaybackOptions {
                autoplay: self.playback.autoplay,
                reduced_motion: self.playback.reduced_motion,
                start_muted: true,
            },
            double_tap_window: self.gestures.double_tap_window,
            feedback_duration: self.gestures.feedback_duration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
    #[serde(default = "default_snap_delay", with = "humantime_serde")]
    pub snap_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: None,
            share_base_url: default_share_base_url(),
            snap_delay: default_snap_delay(),
        }
    }
}

fn default_share_base_url() -> String {
    "https://reelfeed.local/v/".into()
}

fn default_snap_delay() -> Duration {
    Duration::from_millis(150)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            reduced_motion: false,
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_visibility_threshold() -> f64 {
    crate::visibility::DEFAULT_THRESHOLD
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GestureConfig {
    #[serde(default = "default_double_tap_window", with = "humantime_serde")]
    pub double_tap_window: Duration,
    #[serde(default = "default_feedback_duration", with = "humantime_serde")]
    pub feedback_duration: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_window: default_double_tap_window(),
            feedback_duration: default_feedback_duration(),
        }
    }
}

fn default_double_tap_window() -> Duration {
    crate::gesture::DEFAULT_DOUBLE_TAP_WINDOW
}

fn default_feedback_duration() -> Duration {
    crate::gesture::DEFAULT_FEEDBACK_DURATION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_video_command")]
    pub video_command: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            video_command: default_video_command(),
        }
    }
}

fn default_video_command() -> Vec<String> {
    vec!["mpv".into(), "%URL%".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ShareConfig {
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentsConfig {
    #[serde(default = "default_comment_user")]
    pub user: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            user: default_comment_user(),
        }
    }
}

fn default_comment_user() -> String {
    "You".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    cfg.playback.visibility_threshold = sanitize_threshold(cfg.playback.visibility_threshold);
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if other.feed.source.is_some() {
        base.feed.source = other.feed.source;
    }
    if !other.feed.share_base_url.is_empty() {
        base.feed.share_base_url = other.feed.share_base_url;
    }
    base.feed.snap_delay = other.feed.snap_delay;

    base.playback = other.playback;
    base.gestures = other.gestures;

    base.player.enabled = other.player.enabled;
    if !other.player.video_command.is_empty() {
        base.player.video_command = other.player.video_command;
    }

    if !other.share.command.is_empty() {
        base.share.command = other.share.command;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    if !other.comments.user.trim().is_empty() {
        base.comments.user = other.comments.user;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.source" => cfg.feed.source = Some(PathBuf::from(value)),
        "feed.share_base_url" => cfg.feed.share_base_url = value,
        "feed.snap_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.snap_delay = duration;
            }
        }
        "playback.autoplay" => cfg.playback.autoplay = parse_bool(&value),
        "playback.reduced_motion" => cfg.playback.reduced_motion = parse_bool(&value),
        "playback.visibility_threshold" => {
            if let Some(parsed) = value.trim().parse::<f64>().ok().filter(|v| v.is_finite()) {
                cfg.playback.visibility_threshold = parsed;
            }
        }
        "gestures.double_tap_window" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.gestures.double_tap_window = duration;
            }
        }
        "gestures.feedback_duration" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.gestures.feedback_duration = duration;
            }
        }
        "player.enabled" => cfg.player.enabled = parse_bool(&value),
        "player.video_command" => cfg.player.video_command = split_list(&value),
        "share.command" => cfg.share.command = split_list(&value),
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        "comments.user" => cfg.comments.user = value,
        _ => {}
    }
}

fn sanitize_threshold(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        default_visibility_threshold()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "True" | "yes")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reelfeed").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated(file: Option<PathBuf>, prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: file,
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn defaults_match_feed_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.gestures.double_tap_window, Duration::from_millis(300));
        assert_eq!(cfg.gestures.feedback_duration, Duration::from_millis(800));
        assert_eq!(cfg.playback.visibility_threshold, 0.75);
        assert!(cfg.playback.autoplay);
        assert!(cfg.card_options().playback.start_muted);
    }

    #[test]
    fn reads_yaml_with_humantime_durations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "gestures:\n  double_tap_window: 250ms\nplayback:\n  reduced_motion: true\nplayer:\n  video_command: [\"vlc\", \"%URL%\"]\n",
        )
        .unwrap();
        let cfg = load(isolated(Some(path), "REELFEED_TEST_YAML")).unwrap();
        assert_eq!(cfg.gestures.double_tap_window, Duration::from_millis(250));
        assert_eq!(cfg.gestures.feedback_duration, Duration::from_millis(800));
        assert!(cfg.playback.reduced_motion);
        assert!(cfg.playback.autoplay);
        assert_eq!(cfg.player.video_command, vec!["vlc", "%URL%"]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(load(isolated(Some(path), "REELFEED_TEST_MISSING")).is_err());
    }

    #[test]
    fn env_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "comments:\n  user: Alex\n").unwrap();
        env::set_var("REELFEED_TEST_ENV_GESTURES__FEEDBACK_DURATION", "1s");
        env::set_var("REELFEED_TEST_ENV_PLAYBACK__VISIBILITY_THRESHOLD", "1.5");
        let cfg = load(isolated(Some(path), "REELFEED_TEST_ENV")).unwrap();
        env::remove_var("REELFEED_TEST_ENV_GESTURES__FEEDBACK_DURATION");
        env::remove_var("REELFEED_TEST_ENV_PLAYBACK__VISIBILITY_THRESHOLD");
        assert_eq!(cfg.gestures.feedback_duration, Duration::from_secs(1));
        assert_eq!(cfg.playback.visibility_threshold, 1.0);
        assert_eq!(cfg.comments.user, "Alex");
    }

    #[test]
    fn non_finite_threshold_keeps_default() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.yaml");
        fs::write(&empty, "{}\n").unwrap();
        env::set_var("REELFEED_TEST_NAN_PLAYBACK__VISIBILITY_THRESHOLD", "NaN");
        let cfg = load(isolated(Some(empty), "REELFEED_TEST_NAN")).unwrap();
        env::remove_var("REELFEED_TEST_NAN_PLAYBACK__VISIBILITY_THRESHOLD");
        assert_eq!(cfg.playback.visibility_threshold, 0.75);

        let path = dir.path().join("config.yaml");
        fs::write(&path, "playback:\n  visibility_threshold: .nan\n").unwrap();
        let cfg = load(isolated(Some(path), "REELFEED_TEST_NAN_YAML")).unwrap();
        assert_eq!(cfg.playback.visibility_threshold, 0.75);
    }
}
