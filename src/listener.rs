//! One listener per keyboard device.
//!
//! A listener feeds every key press into the shared [`ActivityLedger`] and
//! turns Ctrl+F9..F12 into hotkey tokens on the fifo. The Ctrl state is local
//! to the listener: Ctrl on one keyboard and F9 on another do not combine.

use crate::clock::Clock;
use crate::error::{FapsError, FapsResult};
use crate::fifo::OutboundChannel;
use crate::keyboard::{KeyEvent, KeyEventCause, Keyboard};
use crate::ledger::ActivityLedger;
use crate::protocol::{HotkeyCommand, Token};
use futures::{Stream, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a listener does in response to one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Nothing: releases and autorepeats.
    Ignore,
    /// Count the press.
    Record,
    /// Count the press and publish the command.
    Hotkey(HotkeyCommand),
}

/// Per-device modifier state.
#[derive(Debug, Default)]
pub struct HotkeyTracker {
    modifier_held: bool,
}

impl HotkeyTracker {
    pub fn modifier_held(&self) -> bool {
        self.modifier_held
    }

    pub fn on_event(&mut self, ev: &KeyEvent) -> Reaction {
        match ev.cause {
            KeyEventCause::Press if ev.code.is_modifier() => {
                self.modifier_held = true;
                Reaction::Record
            }
            KeyEventCause::Press if self.modifier_held => HotkeyCommand::for_key(ev.code)
                .map(Reaction::Hotkey)
                .unwrap_or(Reaction::Record),
            KeyEventCause::Press => Reaction::Record,
            KeyEventCause::Release if ev.code.is_modifier() => {
                self.modifier_held = false;
                Reaction::Ignore
            }
            KeyEventCause::Release | KeyEventCause::Repeat => Reaction::Ignore,
        }
    }
}

/// How a listener's read loop ended.
#[derive(Debug)]
pub enum ListenerStatus {
    /// The device reported end-of-file.
    Closed,
    /// The device could not be opened.
    OpenFailed(FapsError),
    /// Reading from the device failed.
    ReadFailed(FapsError),
    /// Writing a hotkey to the fifo failed.
    ChannelFailed(FapsError),
}

impl ListenerStatus {
    /// `0` for a clean close, `1` for every failure.
    pub fn code(&self) -> i32 {
        match self {
            ListenerStatus::Closed => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerStatus::Closed => f.write_str("closed"),
            ListenerStatus::OpenFailed(e) => write!(f, "open failed: {e}"),
            ListenerStatus::ReadFailed(e) => write!(f, "read failed: {e}"),
            ListenerStatus::ChannelFailed(e) => write!(f, "fifo write failed: {e}"),
        }
    }
}

/// Everything a listener shares with the rest of the daemon.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    pub clock: Clock,
    pub ledger: Arc<ActivityLedger>,
    pub channel: Arc<OutboundChannel>,
}

/// Open `device` and listen on it until the device or the fifo goes away.
pub async fn listen(device: PathBuf, ctx: ListenerContext) -> ListenerStatus {
    let keyboard = match Keyboard::open(&device) {
        Ok(keyboard) => keyboard,
        Err(e) => {
            tracing::warn!("{}: {e}. Closing listener...", device.display());
            return ListenerStatus::OpenFailed(e);
        }
    };

    if keyboard.name().is_empty() {
        tracing::info!("Listening on {}.", device.display());
    } else {
        tracing::info!("Listening on {} ({}).", device.display(), keyboard.name());
    }

    run(&device, keyboard, ctx).await
}

/// Drive the read loop over an already open event source.
pub async fn run<S>(device: &Path, mut events: S, ctx: ListenerContext) -> ListenerStatus
where
    S: Stream<Item = FapsResult<Vec<KeyEvent>>> + Unpin,
{
    let mut tracker = HotkeyTracker::default();

    while let Some(batch) = events.next().await {
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("{}: device read error: {e}. Closing listener...", device.display());
                return ListenerStatus::ReadFailed(e);
            }
        };

        for ev in &batch {
            tracing::trace!("{}: {:?} {:?} at {}", device.display(), ev.cause, ev.code, ev.ts);

            let command = match tracker.on_event(ev) {
                Reaction::Ignore => continue,
                Reaction::Record => {
                    ctx.ledger.record(ctx.clock.now());
                    continue;
                }
                Reaction::Hotkey(command) => {
                    ctx.ledger.record(ctx.clock.now());
                    command
                }
            };

            tracing::debug!("{}: hotkey {command:?}", device.display());

            if let Err(e) = ctx.channel.send(&Token::Command(command)).await {
                tracing::warn!("{}: fifo write error: {e}. Closing listener...", device.display());
                return ListenerStatus::ChannelFailed(e);
            }
        }
    }

    ListenerStatus::Closed
}
