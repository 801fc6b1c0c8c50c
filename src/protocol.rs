//! The byte format spoken over the fifo.
//!
//! Every message is one fixed-width, NUL-padded ASCII token written with a
//! single `write(2)`:
//!
//! | token        | width | example          |
//! |--------------|-------|------------------|
//! | metric       | 9     | `APM:142\0\0`    |
//! | hotkey       | 8     | `F10\0\0\0\0\0`  |
//!
//! Subscribers tell tokens apart by their text, so the widths must not change.

use crate::key_code::KeyCode;
use std::fmt;

/// Width of a metric token on the wire.
pub const METRIC_TOKEN_LEN: usize = 9;
/// Width of a hotkey token on the wire.
pub const COMMAND_TOKEN_LEN: usize = 8;

const METRIC_PREFIX: &str = "APM:";

/// A control command triggered by Ctrl plus a function key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCommand {
    ToggleFps,
    ToggleApm,
    StartCaptureVideo,
    StartCapturePicture,
}

impl HotkeyCommand {
    /// The command bound to `code`, if any.
    pub fn for_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::F9 => Some(Self::ToggleFps),
            KeyCode::F10 => Some(Self::ToggleApm),
            KeyCode::F11 => Some(Self::StartCaptureVideo),
            KeyCode::F12 => Some(Self::StartCapturePicture),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::ToggleFps => "F9",
            Self::ToggleApm => "F10",
            Self::StartCaptureVideo => "F11",
            Self::StartCapturePicture => "F12",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "F9" => Some(Self::ToggleFps),
            "F10" => Some(Self::ToggleApm),
            "F11" => Some(Self::StartCaptureVideo),
            "F12" => Some(Self::StartCapturePicture),
            _ => None,
        }
    }
}

impl fmt::Display for HotkeyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One message sent to the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Metric(u32),
    Command(HotkeyCommand),
}

impl Token {
    /// The exact bytes written to the fifo.
    ///
    /// Metric text longer than eight characters is cut so the final byte is
    /// always NUL.
    pub fn encode(&self) -> Vec<u8> {
        let (text, width) = match self {
            Token::Metric(apm) => (format!("{METRIC_PREFIX}{apm}"), METRIC_TOKEN_LEN),
            Token::Command(cmd) => (cmd.token().to_string(), COMMAND_TOKEN_LEN),
        };

        let mut buf = vec![0u8; width];
        let len = text.len().min(width - 1);
        buf[..len].copy_from_slice(&text.as_bytes()[..len]);
        buf
    }

    /// Parse one token as read by a subscriber. Trailing NULs are ignored.
    pub fn decode(buf: &[u8]) -> Option<Token> {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let text = std::str::from_utf8(&buf[..end]).ok()?;

        match text.strip_prefix(METRIC_PREFIX) {
            Some(apm) => apm.parse().ok().map(Token::Metric),
            None => HotkeyCommand::from_token(text).map(Token::Command),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Metric(apm) => write!(f, "{METRIC_PREFIX}{apm}"),
            Token::Command(cmd) => cmd.fmt(f),
        }
    }
}
