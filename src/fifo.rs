//! The named pipe the daemon publishes on.
//!
//! The fifo is created with [`create`], which hands back a [`FifoGuard`] that
//! unlinks it again on drop. [`connect`] then waits for the subscriber to open
//! the read end and returns the [`OutboundChannel`] shared by every publishing
//! task.

use crate::error::{FapsError, FapsResult};
use crate::protocol::Token;
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::unix::AsyncFd;

/// Default location of the fifo.
pub const DEFAULT_FIFO_PATH: &str = "/tmp/faps.fifo";

/// How long [`connect`] keeps waiting for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Number of open attempts before giving up.
    pub attempts: u32,
    /// Pause between two attempts.
    pub backoff: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Removes the fifo from the filesystem when dropped.
#[derive(Debug)]
pub struct FifoGuard {
    path: PathBuf,
}

impl FifoGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FifoGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove fifo {}: {e}", self.path.display());
        }
    }
}

/// Create the fifo at `path` with mode `0666`.
///
/// Fails if anything already exists at `path`.
pub fn create(path: &Path) -> FapsResult<FifoGuard> {
    let create_err = |source| FapsError::FifoCreate {
        path: path.to_path_buf(),
        source,
    };

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| create_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let res = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };

    if res < 0 {
        return Err(create_err(io::Error::last_os_error()));
    }

    Ok(FifoGuard {
        path: path.to_path_buf(),
    })
}

/// Open the write end of the fifo once a subscriber holds the read end.
///
/// The open is non-blocking, so a missing reader shows up as `ENXIO`; only
/// that error is retried, with `policy.backoff` between attempts.
pub async fn connect(path: &Path, policy: ConnectPolicy) -> FapsResult<OutboundChannel> {
    for attempt in 1..=policy.attempts {
        match open_write_end(path) {
            Ok(file) => {
                tracing::debug!("fifo {} connected after {attempt} attempt(s)", path.display());
                return OutboundChannel::new(file).map_err(|source| FapsError::FifoOpen {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                tracing::trace!("no reader on {} yet (attempt {attempt})", path.display());
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(source) => {
                return Err(FapsError::FifoOpen {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    Err(FapsError::SubscriberTimeout {
        path: path.to_path_buf(),
        attempts: policy.attempts,
    })
}

fn open_write_end(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// The daemon's write end of the fifo.
///
/// Any number of tasks may [`send`](Self::send) concurrently; each token
/// is one `write(2)` of at most `PIPE_BUF` bytes and so never interleaves with
/// another. The first write that finds the reader gone marks the channel broken
/// for good.
#[derive(Debug)]
pub struct OutboundChannel {
    async_fd: AsyncFd<File>,
    broken: AtomicBool,
}

impl OutboundChannel {
    fn new(file: File) -> io::Result<Self> {
        Ok(Self {
            async_fd: AsyncFd::new(file)?,
            broken: AtomicBool::new(false),
        })
    }

    /// Whether a write has already failed with a broken pipe.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Write one token, waiting while the pipe is full.
    pub async fn send(&self, token: &Token) -> FapsResult<()> {
        let buf = token.encode();

        loop {
            if self.is_broken() {
                return Err(FapsError::ChannelBroken);
            }

            let mut guard = self.async_fd.writable().await?;

            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(&buf)
            }) {
                Ok(Ok(n)) if n == buf.len() => return Ok(()),
                Ok(Ok(n)) => {
                    return Err(FapsError::ShortWrite {
                        written: n,
                        expected: buf.len(),
                    })
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    self.broken.store(true, Ordering::Release);
                    return Err(FapsError::ChannelBroken);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_would_block) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HotkeyCommand;
    use std::io::Read;
    use tokio::time::{timeout, Instant};

    fn open_read_end(path: &Path) -> File {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .unwrap()
    }

    fn quick() -> ConnectPolicy {
        ConnectPolicy {
            attempts: 3,
            backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn guard_unlinks_fifo_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");

        let guard = create(&path).unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn create_fails_when_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();

        let err = create(&path).unwrap_err();
        assert!(matches!(err, FapsError::FifoCreate { .. }));
    }

    #[tokio::test]
    async fn connect_times_out_without_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();

        let err = connect(&path, quick()).await.unwrap_err();
        assert!(matches!(err, FapsError::SubscriberTimeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn connect_fails_fast_on_missing_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.fifo");

        let err = connect(&path, quick()).await.unwrap_err();
        assert!(matches!(err, FapsError::FifoOpen { .. }));
    }

    #[tokio::test]
    async fn tokens_arrive_as_fixed_width_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();
        let mut reader = open_read_end(&path);

        let channel = connect(&path, quick()).await.unwrap();
        channel.send(&Token::Metric(42)).await.unwrap();
        channel
            .send(&Token::Command(HotkeyCommand::ToggleApm))
            .await
            .unwrap();

        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        assert_eq!(buf, b"APM:42\0\0\0F10\0\0\0\0\0");
    }

    #[tokio::test]
    async fn channel_breaks_once_reader_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();
        let reader = open_read_end(&path);

        let channel = connect(&path, quick()).await.unwrap();
        drop(reader);

        let first = channel.send(&Token::Metric(1)).await;
        assert!(matches!(first, Err(FapsError::ChannelBroken)));
        assert!(channel.is_broken());

        let second = channel.send(&Token::Metric(2)).await;
        assert!(matches!(second, Err(FapsError::ChannelBroken)));
    }

    #[tokio::test]
    async fn connect_retries_until_reader_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();
        let policy = ConnectPolicy {
            attempts: 20,
            backoff: Duration::from_millis(25),
        };

        let reader_path = path.clone();
        let reader = tokio::spawn(async move {
            tokio::time::sleep(policy.backoff * 2).await;
            open_read_end(&reader_path)
        });

        let started = Instant::now();
        let channel = connect(&path, policy).await;
        let _reader = reader.await.unwrap();

        assert!(channel.is_ok(), "got {channel:?}");
        assert!(started.elapsed() >= policy.backoff);
    }

    #[tokio::test]
    async fn full_pipe_delays_send_until_drained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faps.fifo");
        let _guard = create(&path).unwrap();
        let mut reader = open_read_end(&path);
        let channel = connect(&path, quick()).await.unwrap();
        let token = Token::Metric(7);

        let mut sent = 0;
        while timeout(Duration::from_millis(20), channel.send(&token)).await.is_ok() {
            sent += 1;
            assert!(sent < 1_000_000, "pipe never filled up");
        }
        assert!(sent > 0);

        let mut pending = Box::pin(channel.send(&token));
        assert!(futures::poll!(pending.as_mut()).is_pending());
        assert!(!channel.is_broken());

        let mut drained = Vec::new();
        let _ = reader.read_to_end(&mut drained);
        assert!(drained.len() >= 4096);

        let res = timeout(Duration::from_secs(1), pending).await;
        assert!(matches!(res, Ok(Ok(()))), "got {res:?}");
    }
}
