use std::time::Duration;

use rand::Rng;

use super::responder::BoxFuture;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1_000);

/// How long a reply waits before it resolves, modelling backend latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    Fixed(Duration),
    /// Inclusive millisecond range.
    Uniform { min: Duration, max: Duration },
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::Uniform {
            min: DEFAULT_MIN_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl DelayPolicy {
    /// Builds a uniform policy, swapping the bounds when they arrive reversed.
    pub fn uniform(min: Duration, max: Duration) -> Self {
        if min == max {
            return Self::Fixed(min);
        }
        if min > max {
            return Self::Uniform { min: max, max: min };
        }
        Self::Uniform { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Uniform { min, max } => {
                let min_ms = millis(min);
                let max_ms = millis(max);
                if min_ms >= max_ms {
                    return min;
                }
                Duration::from_millis(rng.random_range(min_ms..=max_ms))
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Suspension point used by reply workers. Swap it out to run without real waiting.
pub trait DelaySource: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Sleeps on the tokio timer, so paused test clocks apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl DelaySource for TokioDelay {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Resolves immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelaySource for NoDelay {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}
