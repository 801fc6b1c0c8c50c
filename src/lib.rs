//! This crate implements `faps-daemon`, which turns raw keyboard input into an
//! actions-per-minute (APM) metric and a handful of hotkeys, and publishes both
//! to a single subscriber over a named pipe.
//!
//! Every keyboard found by a [`DeviceEnumerator`] gets its own listener task.
//! Listeners stamp each key press into a shared [`ActivityLedger`], from which
//! a publisher task derives the APM once per interval. Ctrl+F9 through Ctrl+F12
//! are forwarded as [`HotkeyCommand`]s. See [`protocol`] for the wire format.
//!
//! # Example
//!
//! Run the daemon on the default fifo, listening on every detected keyboard.
//! Reading `/dev/input` usually requires root privileges.
//!
//! ```no_run
//! use faps::{supervisor, Clock, Config, FapsError, InputDirScanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FapsError> {
//!     let clock = Clock::start();
//!     let shutdown = supervisor::run(clock, &Config::default(), &InputDirScanner::default()).await?;
//!     println!("{shutdown:?}");
//!
//!     Ok(())
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("This crate only works on Linux");

pub mod clock;
pub mod config;
mod error;
pub mod fifo;
pub(crate) mod key_code;
mod keyboard;
pub mod ledger;
pub mod listener;
pub mod protocol;
pub mod publisher;
pub mod supervisor;

pub use clock::{Clock, Timestamp};
pub use config::{Args, Config};
pub use error::{FapsError, FapsResult};
pub use key_code::KeyCode;
pub use keyboard::{DeviceEnumerator, InputDirScanner, KeyEvent, KeyEventCause, Keyboard};
pub use ledger::ActivityLedger;
pub use protocol::{HotkeyCommand, Token};
