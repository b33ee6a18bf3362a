//! Suspension points for the polling loops.
//!
//! Production code sleeps on the Tokio timer; tests use [`VirtualScheduler`],
//! which advances a virtual clock instantly and can mutate a fixture page on
//! every tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

type TickHook = Box<dyn Fn(Duration) + Send + Sync>;

/// Virtual time: every sleep advances the clock, runs the hook, and yields.
pub struct VirtualScheduler {
    elapsed: Mutex<Duration>,
    sleeps: AtomicU64,
    hook: Option<TickHook>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self {
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: AtomicU64::new(0),
            hook: None,
        }
    }

    /// Run `hook(elapsed)` after every sleep, with the clock already advanced.
    pub fn with_hook(hook: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            ..Self::new()
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }

    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for VirtualScheduler {
    async fn sleep(&self, duration: Duration) {
        let now = {
            let mut elapsed = self.elapsed.lock();
            *elapsed += duration;
            *elapsed
        };
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook(now);
        }
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_virtual_clock_advances() {
        let scheduler = VirtualScheduler::new();
        scheduler.sleep(Duration::from_millis(500)).await;
        scheduler.sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.elapsed(), Duration::from_millis(1500));
        assert_eq!(scheduler.sleep_count(), 2);
    }

    #[tokio::test]
    async fn test_hook_sees_advanced_clock() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let scheduler = VirtualScheduler::with_hook(move |t| sink.lock().push(t));
        scheduler.sleep(Duration::from_secs(1)).await;
        scheduler.sleep(Duration::from_secs(1)).await;
        assert_eq!(
            *seen.lock(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }
}
