//! Passive health tracking for outbound calls.
//!
//! Every guarded probe call reports its outcome here. A long run of
//! unreachable upstreams is the first sign that the host has lost outbound
//! network, which no single verdict can tell the caller.

use crate::error::ProbeFailure;
use crate::types::HealthStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unreachable calls in a row before the engine reports itself degraded.
pub const DEGRADED_AFTER: u64 = 5;

/// Unreachable calls in a row before the engine reports itself down.
pub const DOWN_AFTER: u64 = 20;

#[derive(Debug, Default)]
pub struct HealthMonitor {
    consecutive_unreachable: AtomicU64,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one outbound call.
    ///
    /// Only `Unreachable` extends the streak. Any answer at all, even a
    /// throttling or garbled one, proves the network path works.
    pub fn record<T>(&self, result: &Result<T, ProbeFailure>) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        match result {
            Err(failure) => {
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                if *failure == ProbeFailure::Unreachable {
                    self.consecutive_unreachable.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.consecutive_unreachable.store(0, Ordering::Relaxed);
                }
            }
            Ok(_) => self.consecutive_unreachable.store(0, Ordering::Relaxed),
        }
    }

    pub fn consecutive_unreachable(&self) -> u64 {
        self.consecutive_unreachable.load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    /// Combine passive and active signals into one status.
    pub fn assess(&self, outbound: bool, rate_limiter: bool, throttled: usize) -> HealthStatus {
        let streak = self.consecutive_unreachable();
        if !rate_limiter || (!outbound && streak >= DOWN_AFTER) {
            HealthStatus::Down
        } else if !outbound {
            // Active check failed but recent calls still got through
            if streak == 0 && self.total_calls() > 0 {
                HealthStatus::Degraded
            } else {
                HealthStatus::Down
            }
        } else if streak >= DEGRADED_AFTER || throttled > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        }
    }
}
