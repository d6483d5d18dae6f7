//! Process-wide admission gate (token bucket).
//!
//! A single global gate in front of the whole pipeline: it bounds the rate at
//! which requests may touch the downstream stores, not per-user or per-goods
//! fairness. A request either takes a token immediately, waits up to the
//! configured timeout for one to accrue, or is rejected without touching any
//! inventory state.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct RateGateConfig {
    /// Sustained admission rate. `0` disables the gate entirely.
    pub permits_per_sec: u64,
    /// Bucket capacity; admissions beyond the sustained rate allowed in a burst.
    pub burst: u64,
    /// Maximum time a request may wait for a token.
    pub admit_timeout: Duration,
}

impl RateGateConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let permits_per_sec = std::env::var("SECKILL_PERMITS_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.permits_per_sec);
        let admit_timeout = std::env::var("SECKILL_ADMIT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.admit_timeout);
        Self {
            permits_per_sec,
            burst: permits_per_sec.max(1),
            admit_timeout,
        }
    }

    pub fn enabled(&self) -> bool {
        self.permits_per_sec > 0
    }
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            permits_per_sec: 10,
            burst: 10,
            admit_timeout: Duration::from_millis(1000),
        }
    }
}

/// Token-bucket rate gate shared by all request handlers.
#[derive(Debug)]
pub struct RateGate {
    config: RateGateConfig,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateGate {
    pub fn new(config: RateGateConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: config.burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> RateGateConfig {
        self.config
    }

    /// Take a token if one is available right now.
    pub fn try_admit(&self) -> bool {
        if !self.config.enabled() {
            return true;
        }
        self.take_or_eta().is_ok()
    }

    /// Take a token, waiting up to the configured timeout for one to accrue.
    ///
    /// Returns `false` when no token became available within the timeout; the
    /// caller must reject the request without touching inventory state.
    pub async fn admit_within_timeout(&self) -> bool {
        self.admit_within(self.config.admit_timeout).await
    }

    pub async fn admit_within(&self, timeout: Duration) -> bool {
        if !self.config.enabled() {
            return true;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.take_or_eta() {
                Ok(()) => return true,
                Err(eta) => {
                    if Instant::now() + eta > deadline {
                        return false;
                    }
                    tokio::time::sleep(eta).await;
                }
            }
        }
    }

    /// Take a token, or report how long until the next one accrues.
    fn take_or_eta(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - state.tokens;
        Err(Duration::from_secs_f64(
            deficit / self.config.permits_per_sec as f64,
        ))
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let add = elapsed * self.config.permits_per_sec as f64;
        state.tokens = (state.tokens + add).min(self.config.burst as f64);
        state.last_refill = now;
    }
}
