//! Mandatory inter-call pacing for the enrichment provider.
//!
//! The provider enforces a concurrency ceiling, so the sync path waits a
//! fixed delay after every enrichment call, success or failure. The trait
//! exists so tests can swap in a pacer that records calls instead of
//! sleeping.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Real pacer: one fixed tokio sleep per call.
#[derive(Debug, Clone, Copy)]
pub struct DelayPacer {
    delay: Duration,
}

impl DelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for DelayPacer {
    async fn pause(&self) {
        trace!(delay_ms = self.delay.as_millis() as u64, "enrichment pacing pause");
        tokio::time::sleep(self.delay).await;
    }
}

/// Pacer that never waits. Tests only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn delay_pacer_waits_at_least_the_configured_delay() {
        let pacer = DelayPacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn noop_pacer_returns_immediately() {
        let start = Instant::now();
        NoopPacer.pause().await;
        assert!(start.elapsed() < Duration::from_millis(5));
    }
}
