use crate::fifo::{ConnectPolicy, DEFAULT_FIFO_PATH};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_APM_WINDOW_SECS: u64 = 10;
pub const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 20;

/// Command-line options of `faps-daemon`.
#[derive(Debug, Parser)]
#[command(name = "faps-daemon", version, about = "Publish keyboard APM and hotkeys over a fifo")]
pub struct Args {
    /// Path of the fifo shared with the subscriber.
    #[arg(short = 't', long = "fifo", env = "FAPS_FIFO_PATH", default_value = DEFAULT_FIFO_PATH)]
    pub fifo: PathBuf,

    /// Length of the APM window in seconds.
    #[arg(
        short = 'i',
        long = "apm-window",
        default_value_t = DEFAULT_APM_WINDOW_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub apm_window: u64,

    /// Seconds between two published APM values.
    #[arg(
        short = 'v',
        long = "publish-interval",
        default_value_t = DEFAULT_PUBLISH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub publish_interval: u64,

    /// How many times to try opening the fifo, one second apart, before giving up.
    #[arg(
        long = "connect-attempts",
        default_value_t = DEFAULT_CONNECT_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub connect_attempts: u32,

    /// Listen on this device instead of scanning /dev/input. May be repeated.
    #[arg(short = 'd', long = "device")]
    pub devices: Vec<PathBuf>,
}

impl Args {
    pub fn into_config(self) -> Config {
        Config {
            fifo_path: self.fifo,
            apm_window: Duration::from_secs(self.apm_window),
            publish_interval: Duration::from_secs(self.publish_interval),
            connect: ConnectPolicy {
                attempts: self.connect_attempts,
                ..ConnectPolicy::default()
            },
            devices: self.devices,
        }
    }
}

/// Settings used by the supervisor.
#[derive(Debug, Clone)]
pub struct Config {
    pub fifo_path: PathBuf,
    pub apm_window: Duration,
    pub publish_interval: Duration,
    pub connect: ConnectPolicy,
    /// Explicit devices; empty means auto-detect.
    pub devices: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fifo_path: PathBuf::from(DEFAULT_FIFO_PATH),
            apm_window: Duration::from_secs(DEFAULT_APM_WINDOW_SECS),
            publish_interval: Duration::from_secs(DEFAULT_PUBLISH_INTERVAL_SECS),
            connect: ConnectPolicy::default(),
            devices: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        Args::try_parse_from(std::iter::once("faps-daemon").chain(args.iter().copied()))
            .map(Args::into_config)
    }

    #[test]
    fn args_are_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_without_arguments() {
        // Skip when the environment overrides the fifo path.
        if std::env::var_os("FAPS_FIFO_PATH").is_some() {
            return;
        }

        let config = parse(&[]).unwrap();
        let default = Config::default();
        assert_eq!(config.fifo_path, default.fifo_path);
        assert_eq!(config.fifo_path, PathBuf::from("/tmp/faps.fifo"));
        assert_eq!(config.apm_window, Duration::from_secs(10));
        assert_eq!(config.publish_interval, Duration::from_secs(1));
        assert_eq!(config.connect, ConnectPolicy::default());
        assert!(config.devices.is_empty());
    }

    #[test]
    fn short_flags_override_defaults() {
        let config = parse(&["-t", "/run/faps.fifo", "-i", "30", "-v", "2"]).unwrap();
        assert_eq!(config.fifo_path, PathBuf::from("/run/faps.fifo"));
        assert_eq!(config.apm_window, Duration::from_secs(30));
        assert_eq!(config.publish_interval, Duration::from_secs(2));
    }

    #[test]
    fn devices_can_be_repeated() {
        let config = parse(&["-d", "/dev/input/event2", "--device", "/dev/input/event5"]).unwrap();
        assert_eq!(
            config.devices,
            vec![PathBuf::from("/dev/input/event2"), PathBuf::from("/dev/input/event5")]
        );
    }

    #[test]
    fn connect_attempts_keep_one_second_backoff() {
        let config = parse(&["--connect-attempts", "3"]).unwrap();
        assert_eq!(config.connect.attempts, 3);
        assert_eq!(config.connect.backoff, Duration::from_secs(1));
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert!(parse(&["-i", "0"]).is_err());
        assert!(parse(&["-v", "0"]).is_err());
        assert!(parse(&["--connect-attempts", "0"]).is_err());
        assert!(parse(&["-i", "ten"]).is_err());
    }
}
