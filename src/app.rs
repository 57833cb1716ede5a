use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::comments::CommentsStore;
use crate::config::{self, Config};
use crate::data::{FeedSource, JsonFeedSource, SampleFeedSource};
use crate::logging;
use crate::storage::{self, MemoryStorage, SqliteStorage, StoragePort};
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub feed: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    logging::init_from_env().context("init logging")?;
    let cfg = load_config(&options)?;

    let source = feed_source(&options, &cfg);
    let videos = source.load().context("load feed")?;
    log::info!("app: loaded {} videos", videos.len());

    let (storage, mut status) = open_storage(&cfg);
    if status.is_empty() {
        status = format!(
            "{} videos · j/k scroll · space play/pause · q quit · config {}",
            videos.len(),
            friendly_path(config::default_path().as_ref())
        );
    }

    let mut model = ui::Model::new(ui::Options {
        videos,
        config: cfg,
        storage,
        status_message: status,
    });
    model.run()
}

/// Prints the stored comments for one video as JSON, seeding on first access.
pub fn print_comments(video_id: &str, options: &RunOptions) -> Result<()> {
    let cfg = load_config(options)?;
    let storage = SqliteStorage::open(storage::Options {
        path: cfg.storage.path.clone(),
    })
    .context("open storage")?;
    let mut store = CommentsStore::new(storage);
    let comments = store.get_comments(video_id);
    let rendered = serde_json::to_string_pretty(&comments).context("serialize comments")?;
    println!("{rendered}");
    Ok(())
}

fn load_config(options: &RunOptions) -> Result<Config> {
    config::load(config::LoadOptions {
        config_file: options.config.clone(),
        env_prefix: None,
    })
    .context("load config")
}

fn feed_source(options: &RunOptions, cfg: &Config) -> Box<dyn FeedSource> {
    match options.feed.clone().or_else(|| cfg.feed.source.clone()) {
        Some(path) => {
            log::debug!("app: reading feed from {}", path.display());
            Box::new(JsonFeedSource::new(path))
        }
        None => Box::new(SampleFeedSource),
    }
}

/// Falls back to in-memory storage so the feed stays usable when the
/// database cannot be opened; comments then last for this session only.
fn open_storage(cfg: &Config) -> (Arc<dyn StoragePort>, String) {
    match SqliteStorage::open(storage::Options {
        path: cfg.storage.path.clone(),
    }) {
        Ok(store) => (Arc::new(store), String::new()),
        Err(err) => {
            log::warn!("app: storage unavailable: {err:#}");
            (
                Arc::new(MemoryStorage::new()),
                "Storage unavailable; comments will not be saved.".to_string(),
            )
        }
    }
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/reelfeed/config.yaml".to_string()
    }
}
