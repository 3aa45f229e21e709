//! Circuit breaker for external adapters
//!
//! After `failure_threshold` consecutive transient failures the circuit opens
//! and calls fail fast with `ServiceUnavailable`. Once `reset_timeout_secs`
//! have passed, calls are let through again (half-open); `success_threshold`
//! consecutive successes close the circuit, and any failure re-opens it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

use core_kernel::{CircuitBreakerConfig, PortError};

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            opened_at: RwLock::new(None),
        }
    }

    /// Returns true if a call may proceed
    pub async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        let opened_at = self.opened_at.read().await;
        match *opened_at {
            // Half-open
            Some(time) => time.elapsed() >= Duration::from_secs(self.config.reset_timeout_secs),
            None => false,
        }
    }

    /// Returns true while the circuit is open
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if !self.is_open.load(Ordering::Relaxed) {
            return;
        }
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= self.config.success_threshold as u64 {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    pub async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.is_open.load(Ordering::Relaxed) || failures >= self.config.failure_threshold as u64 {
            if !self.is_open.swap(true, Ordering::Relaxed) {
                warn!(adapter = %self.name, failures, "Circuit breaker opened");
            }
            *self.opened_at.write().await = Some(Instant::now());
        }
    }

    /// Runs `call` through the breaker
    ///
    /// Only transient failures count against the circuit; a `NotFound` or a
    /// rejected request says nothing about the health of the remote side.
    pub async fn call<T, F>(&self, call: F) -> Result<T, PortError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        if !self.is_available().await {
            return Err(PortError::unavailable(format!(
                "{} (circuit breaker is open)",
                self.name
            )));
        }

        let result = call.await;
        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.is_transient() => self.record_failure().await,
            Err(_) => {}
        }
        result
    }
}

/// Runs `call` through an optional breaker
pub(crate) async fn guarded<T, F>(breaker: Option<&CircuitBreaker>, call: F) -> Result<T, PortError>
where
    F: Future<Output = Result<T, PortError>>,
{
    match breaker {
        Some(breaker) => breaker.call(call).await,
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(reset_timeout_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout_secs,
                success_threshold: 1,
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), PortError> {
        breaker
            .call(async { Err::<(), _>(PortError::unavailable("remote")) })
            .await
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let breaker = breaker(60);
        assert!(fail(&breaker).await.is_err());
        assert!(!breaker.is_open());
        assert!(fail(&breaker).await.is_err());
        assert!(breaker.is_open());

        let err = breaker.call(async { Ok::<_, PortError>(1) }).await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker is open"));
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip() {
        let breaker = breaker(60);
        for _ in 0..5 {
            let _ = breaker
                .call(async { Err::<(), _>(PortError::not_found("Code", "X00")) })
                .await;
        }
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = breaker(0);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert!(breaker.is_open());

        assert_eq!(breaker.call(async { Ok::<_, PortError>(7) }).await.unwrap(), 7);
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(60);
        let _ = fail(&breaker).await;
        breaker.call(async { Ok::<_, PortError>(()) }).await.unwrap();
        let _ = fail(&breaker).await;
        assert!(!breaker.is_open());
    }
}
