use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::feed::Video;

/// Supplies the ordered video list the feed is built from.
pub trait FeedSource {
    fn load(&self) -> Result<Vec<Video>>;
}

pub struct JsonFeedSource {
    path: PathBuf,
}

impl JsonFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedSource for JsonFeedSource {
    fn load(&self) -> Result<Vec<Video>> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read feed file at {}", self.path.display()))?;
        let videos: Vec<Video> = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse feed file at {}", self.path.display()))?;
        Ok(videos)
    }
}

#[derive(Default)]
pub struct SampleFeedSource;

impl FeedSource for SampleFeedSource {
    fn load(&self) -> Result<Vec<Video>> {
        Ok(sample_videos())
    }
}

pub fn sample_videos() -> Vec<Video> {
    let entries = [
        (
            "v1",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
            "@lena.codes",
            "Morning espresso ritual before standup",
            "Lo-fi Beats - Coffee Shop",
            1280,
            2,
            41,
        ),
        (
            "v2",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4",
            "@trailrunner",
            "Chasing the last light on the ridge",
            "Original sound - trailrunner",
            8734,
            2,
            312,
        ),
        (
            "v3",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerFun.mp4",
            "@mandarin.daily",
            "Three phrases for ordering street food",
            "Guzheng Loop",
            452,
            2,
            19,
        ),
        (
            "v4",
            "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerJoyrides.mp4",
            "@pixelpaws",
            "He heard the treat bag from two rooms away",
            "Original sound - pixelpaws",
            20511,
            2,
            1337,
        ),
    ];
    entries
        .into_iter()
        .map(
            |(id, src, author, caption, music, likes, comments, shares)| Video {
                id: id.into(),
                src: src.into(),
                author: author.into(),
                caption: caption.into(),
                music: music.into(),
                likes,
                comments,
                shares,
            },
        )
        .collect()
}
