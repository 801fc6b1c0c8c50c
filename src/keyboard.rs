pub(crate) mod device;
mod event_codes;

use crate::error::{FapsError, FapsResult};
use crate::key_code::KeyCode;
use chrono::{DateTime, NaiveDateTime};
use futures::{ready, Stream};
use std::convert::TryFrom;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::unix::AsyncFd;

use event_codes::{
    EV_KEY, EV_KEY_PRESS, EV_KEY_RELEASE, EV_KEY_REPEAT, EV_MSC, EV_REP, EV_SYN,
};

/// The directory scanned by [`InputDirScanner`] by default.
pub const INPUT_DIR: &str = "/dev/input";

/// An open keyboard device.
///
/// `Keyboard` is a [`Stream`] of key event batches. Each item holds the
/// `EV_KEY` events returned by one `read(2)` of the device; the stream ends when
/// the device reports end-of-file.
#[derive(Debug)]
pub struct Keyboard {
    /// The name of the device, as reported by `EVIOCGNAME`.
    name: String,
    /// The path of the input device (e.g. `/dev/input/event0`).
    path: PathBuf,
    /// The file descriptor of the open input device file.
    async_fd: AsyncFd<File>,
}

impl Keyboard {
    /// Open `path` read-only and register it with the tokio reactor.
    pub fn open(path: &Path) -> FapsResult<Self> {
        let open_err = |source| FapsError::DeviceOpen {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;

        device::set_nonblocking(&file)?;

        // Not every character device answers EVIOCGNAME; the name is cosmetic.
        let name = device::read_name(&file).unwrap_or_default();

        Ok(Keyboard {
            name,
            path: path.to_path_buf(),
            async_fd: AsyncFd::new(file).map_err(open_err)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Stream for Keyboard {
    type Item = FapsResult<Vec<KeyEvent>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let mut guard = match ready!(self.async_fd.poll_read_ready(cx)) {
                Ok(guard) => guard,
                Err(e) => return Poll::Ready(Some(Err(e.into()))),
            };

            match guard.try_io(|inner| device::read_key_events(inner.as_raw_fd())) {
                Ok(Ok(Some(events))) if events.is_empty() => continue,
                Ok(Ok(Some(events))) => return Poll::Ready(Some(Ok(events))),
                Ok(Ok(None)) => return Poll::Ready(None),
                Ok(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                Err(_would_block) => continue,
            }
        }
    }
}

/// A key event (EV_KEY).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// The kernel timestamp of the event, or the Unix epoch if the kernel
    /// reported an invalid one.
    pub ts: NaiveDateTime,
    /// The action that triggered the event.
    pub cause: KeyEventCause,
    /// The key code of the key that triggered the event.
    pub code: KeyCode,
}

impl KeyEvent {
    /// Build an event stamped with the Unix epoch; handy where the kernel
    /// timestamp is irrelevant.
    pub fn new(cause: KeyEventCause, code: KeyCode) -> Self {
        Self {
            ts: NaiveDateTime::default(),
            cause,
            code,
        }
    }
}

/// The reason a `KeyEvent` fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventCause {
    /// The key was pressed.
    Press,
    /// The key was released.
    Release,
    /// The key is being held down and the kernel emitted an autorepeat.
    Repeat,
}

impl TryFrom<&libc::input_event> for KeyEvent {
    type Error = FapsError;

    fn try_from(ev: &libc::input_event) -> Result<Self, Self::Error> {
        if ev.type_ != EV_KEY as u16 {
            return Err(FapsError::UnsupportedEventType(ev.type_));
        }

        let cause = match ev.value {
            EV_KEY_RELEASE => KeyEventCause::Release,
            EV_KEY_PRESS => KeyEventCause::Press,
            EV_KEY_REPEAT => KeyEventCause::Repeat,
            n => {
                return Err(FapsError::InvalidKeyEvent(format!(
                    "invalid value for EV_KEY: {n}"
                )))
            }
        };

        Ok(Self {
            ts: event_time(&ev.time).unwrap_or_default(),
            cause,
            code: KeyCode::from(ev.code),
        })
    }
}

/// The kernel timestamp of an event, if it is a valid point in time.
fn event_time(time: &libc::timeval) -> Option<NaiveDateTime> {
    let nsec = u32::try_from(i64::from(time.tv_usec).checked_mul(1000)?).ok()?;

    DateTime::from_timestamp(i64::from(time.tv_sec), nsec).map(|ts| ts.naive_utc())
}

/// Supplies the device paths the daemon should listen on.
pub trait DeviceEnumerator {
    fn enumerate(&self) -> FapsResult<Vec<PathBuf>>;
}

/// Explicit device paths, e.g. from `--device` on the command line.
impl DeviceEnumerator for Vec<PathBuf> {
    fn enumerate(&self) -> FapsResult<Vec<PathBuf>> {
        Ok(self.clone())
    }
}

/// Finds keyboard-class character devices by probing their event masks.
#[derive(Debug, Clone)]
pub struct InputDirScanner {
    dir: PathBuf,
}

impl InputDirScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for InputDirScanner {
    fn default() -> Self {
        Self::new(INPUT_DIR)
    }
}

impl DeviceEnumerator for InputDirScanner {
    fn enumerate(&self) -> FapsResult<Vec<PathBuf>> {
        let mut keyboards = device::find_char_devices(&self.dir)?
            .filter(|path| is_keyboard(path))
            .collect::<Vec<_>>();

        keyboards.sort();

        Ok(keyboards)
    }
}

fn is_keyboard(path: &Path) -> bool {
    match File::open(path).map_err(FapsError::from).and_then(|f| device::read_event_flags(&f)) {
        Ok(flags) => has_keyboard_flags(flags),
        Err(e) => {
            tracing::debug!("{}: skipping device: {e}", path.display());
            false
        }
    }
}

/// Check whether the specified `flags` indicate the device is a keyboard.
fn has_keyboard_flags(flags: libc::c_ulong) -> bool {
    const KEYBOARD_FLAGS: libc::c_ulong =
        (1 << EV_SYN) | (1 << EV_KEY) | (1 << EV_MSC) | (1 << EV_REP);

    (flags & KEYBOARD_FLAGS) == KEYBOARD_FLAGS
}
