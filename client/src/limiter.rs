// client/src/limiter.rs
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// Matches the BFF frontend's toast/logout cool-down
pub const DEFAULT_UNAUTHORIZED_WINDOW: Duration = Duration::from_millis(2500);

/// Lets one signal through per window; everything else inside the window is
/// swallowed. Used to collapse bursts of 401s into a single logout.
#[derive(Debug)]
pub struct UnauthorizedLimiter {
    window: Duration,
    last_fired: Mutex<Option<Instant>>,
}

impl Default for UnauthorizedLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_UNAUTHORIZED_WINDOW)
    }
}

impl UnauthorizedLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` if the caller should act on this signal.
    pub fn notify_once(&self) -> bool {
        self.notify_once_at(Instant::now())
    }

    pub fn notify_once_at(&self, now: Instant) -> bool {
        let mut last = self.last_fired.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.window {
                tracing::debug!("Suppressing unauthorized signal inside {:?} window", self.window);
                return false;
            }
        }

        *last = Some(now);
        true
    }
}
