#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod card;
pub mod comments;
pub mod config;
pub mod data;
pub mod feed;
pub mod gesture;
pub mod logging;
pub mod playback;
pub mod player;
pub mod share;
pub mod storage;
pub mod ui;
pub mod visibility;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
