use std::time::{Duration, Instant};

/// Tic/toc stopwatch. Each instance keeps its own start mark.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::tic()
    }
}

impl Stopwatch {
    /// Start a new stopwatch.
    #[must_use]
    pub fn tic() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Restart from now.
    pub fn reset(&mut self) {
        self.started = Instant::now();
    }

    /// Seconds since the last `tic`/`reset`.
    #[must_use]
    pub fn toc(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
