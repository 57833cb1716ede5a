use std::fs;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::playback::{MediaElement, PlayTicket, PlaybackError};
use crate::visibility::ElementId;

const IPC_READY_TIMEOUT: Duration = Duration::from_secs(3);
const IPC_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Outcome of an asynchronous start request, drained by the host loop.
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub card: ElementId,
    pub ticket: PlayTicket,
    pub result: Result<(), PlaybackError>,
}

/// Media element that only reports success; used when no player is wanted.
pub struct PreviewMedia {
    card: ElementId,
    events: Sender<PlayerEvent>,
}

impl PreviewMedia {
    pub fn new(card: ElementId, events: Sender<PlayerEvent>) -> Self {
        Self { card, events }
    }
}

impl MediaElement for PreviewMedia {
    fn request_play(&mut self, ticket: PlayTicket) {
        let _ = self.events.send(PlayerEvent {
            card: self.card,
            ticket,
            result: Ok(()),
        });
    }

    fn pause(&mut self) {}

    fn set_muted(&mut self, _muted: bool) {}
}

pub struct MpvOptions {
    pub command: Vec<String>,
    pub src: String,
    pub label: String,
}

/// One mpv process per card, controlled over its JSON IPC socket.
///
/// The process is launched lazily by the first start request and killed when
/// the element is dropped.
pub struct MpvMedia {
    card: ElementId,
    options: Arc<MpvOptions>,
    ipc_path: String,
    child: Arc<Mutex<Option<Child>>>,
    muted: bool,
    events: Sender<PlayerEvent>,
}

impl MpvMedia {
    pub fn new(card: ElementId, options: MpvOptions, events: Sender<PlayerEvent>) -> Self {
        Self {
            card,
            options: Arc::new(options),
            ipc_path: unique_ipc_path(),
            child: Arc::new(Mutex::new(None)),
            muted: true,
            events,
        }
    }

    fn is_running(&self) -> bool {
        let mut guard = self.child.lock();
        match guard.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                *guard = None;
                false
            }
            None => false,
        }
    }

    fn send_property(&self, name: &str, value: bool) -> Result<()> {
        let payload = json!({ "command": ["set_property", name, value] });
        let serialized = serde_json::to_string(&payload).context("serialize mpv command")?;
        send_ipc_command(&self.ipc_path, &serialized)
    }
}

impl MediaElement for MpvMedia {
    fn request_play(&mut self, ticket: PlayTicket) {
        let card = self.card;
        let events = self.events.clone();

        if self.is_running() {
            let result = self
                .send_property("pause", false)
                .map_err(|err| PlaybackError::Refused(format!("{err:#}")));
            let _ = events.send(PlayerEvent {
                card,
                ticket,
                result,
            });
            return;
        }

        let options = self.options.clone();
        let ipc_path = self.ipc_path.clone();
        let slot = self.child.clone();
        let muted = self.muted;
        thread::spawn(move || {
            let result = launch(&options, &ipc_path, muted).and_then(|child| {
                *slot.lock() = Some(child);
                wait_for_ipc(&ipc_path)
            });
            let result = result.map_err(|err| {
                log::warn!("player: launch for card {card} failed: {err:#}");
                PlaybackError::Refused(format!("{err:#}"))
            });
            let _ = events.send(PlayerEvent {
                card,
                ticket,
                result,
            });
        });
    }

    fn pause(&mut self) {
        if !self.is_running() {
            return;
        }
        if let Err(err) = self.send_property("pause", true) {
            log::warn!("player: pause over IPC failed, stopping player: {err:#}");
            if let Some(mut child) = self.child.lock().take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if !self.is_running() {
            return;
        }
        if let Err(err) = self.send_property("mute", muted) {
            log::warn!("player: mute over IPC failed: {err:#}");
        }
    }
}

impl Drop for MpvMedia {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        cleanup_ipc_path(&self.ipc_path);
    }
}

fn launch(options: &MpvOptions, ipc_path: &str, muted: bool) -> Result<Child> {
    let (program, template) = options
        .command
        .split_first()
        .ok_or_else(|| anyhow!("player command is empty"))?;
    if options.src.trim().is_empty() {
        return Err(anyhow!("video URL missing"));
    }

    cleanup_ipc_path(ipc_path);

    let mut args: Vec<String> = template
        .iter()
        .map(|arg| arg.replace("%URL%", &options.src))
        .collect();
    if !template.iter().any(|arg| arg.contains("%URL%")) {
        args.push(options.src.clone());
    }
    args.push(format!("--input-ipc-server={ipc_path}"));
    args.push(format!("--mute={}", if muted { "yes" } else { "no" }));
    args.push("--force-window=yes".to_string());
    args.push("--keep-open=no".to_string());
    args.push("--loop-file=inf".to_string());
    args.push("--really-quiet".to_string());
    args.push("--no-terminal".to_string());
    if !options.label.is_empty() {
        args.push(format!("--force-media-title={}", options.label));
    }
    log::debug!("player: launching {program} {args:?}");

    let mut command = Command::new(program);
    command.args(&args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    command
        .spawn()
        .with_context(|| format!("launch {program} to play {}", options.src))
}

fn wait_for_ipc(ipc_path: &str) -> Result<()> {
    let deadline = Instant::now() + IPC_READY_TIMEOUT;
    while Instant::now() < deadline {
        if ipc_ready(ipc_path) {
            return Ok(());
        }
        thread::sleep(IPC_POLL_INTERVAL);
    }
    Err(anyhow!("player did not open its control socket in time"))
}

#[cfg(unix)]
fn ipc_ready(path: &str) -> bool {
    UnixStream::connect(path).is_ok()
}

#[cfg(not(unix))]
fn ipc_ready(path: &str) -> bool {
    fs::metadata(path).is_ok()
}

#[cfg(unix)]
fn send_ipc_command(path: &str, serialized: &str) -> Result<()> {
    let mut stream =
        UnixStream::connect(path).with_context(|| format!("connect to mpv IPC socket {path}"))?;
    stream
        .write_all(serialized.as_bytes())
        .context("write mpv IPC command")?;
    stream
        .write_all(b"\n")
        .context("write mpv IPC command terminator")?;
    Ok(())
}

#[cfg(not(unix))]
fn send_ipc_command(path: &str, serialized: &str) -> Result<()> {
    let mut pipe = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("connect to mpv IPC pipe {path}"))?;
    pipe.write_all(serialized.as_bytes())
        .context("write mpv IPC command")?;
    pipe.write_all(b"\n")
        .context("write mpv IPC command terminator")?;
    Ok(())
}

#[cfg(unix)]
fn unique_ipc_path() -> String {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "reelfeed-mpv-{}-{}.sock",
        std::process::id(),
        random_suffix()
    ));
    path.to_string_lossy().to_string()
}

#[cfg(not(unix))]
fn unique_ipc_path() -> String {
    format!(
        r"\\.\pipe\reelfeed-mpv-{}-{}",
        std::process::id(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

fn cleanup_ipc_path(path: &str) {
    if !cfg!(unix) {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::debug!("player: failed to remove ipc path {path}: {err}");
        }
    }
}
