use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FapsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to create fifo {}: {source}", path.display())]
    FifoCreate { path: PathBuf, source: io::Error },
    #[error("failed to open fifo {}: {source}", path.display())]
    FifoOpen { path: PathBuf, source: io::Error },
    #[error("client did not connect to the fifo {} within {attempts} attempts", path.display())]
    SubscriberTimeout { path: PathBuf, attempts: u32 },
    #[error("fifo reader is gone")]
    ChannelBroken,
    #[error("short fifo write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("{}: error opening device: {source}", path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },
    #[error("failed to enumerate keyboard devices: {0}")]
    Enumeration(io::Error),
    #[error("task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
    #[error("invalid key event: {0}")]
    InvalidKeyEvent(String),
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(u16),
}

pub type FapsResult<T> = Result<T, FapsError>;
