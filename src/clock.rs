use std::time::Instant;

/// Milliseconds elapsed since the daemon started.
pub type Timestamp = u64;

/// The process-wide time reference. Created once at startup and copied into
/// every unit that stamps or samples key presses.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}
