use std::time::Duration;

use async_trait::async_trait;

/// Pause taken after every oracle call.
#[async_trait]
pub trait Cooldown: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a fixed interval regardless of how the call went.
#[derive(Debug, Clone, Copy)]
pub struct FixedCooldown {
    interval: Duration,
}

impl FixedCooldown {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Cooldown for FixedCooldown {
    async fn pause(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pause_waits_for_the_full_interval() {
        let cooldown = FixedCooldown::from_millis(1000);
        let started = tokio::time::Instant::now();
        cooldown.pause().await;
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
