use std::time::Duration;

use tokio::time::Instant;

/// Deadline for the next inbound message on an open stream
#[derive(Debug, Clone)]
pub(crate) struct IdleTimer {
    timeout: Duration,
    deadline: Instant,
}

impl IdleTimer {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(test)]
    pub(crate) fn is_expired(&self) -> bool {
        self.deadline <= Instant::now()
    }
}
