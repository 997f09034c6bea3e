//! Circuit breaker for upstream protection.
//!
//! # Phases
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast without contacting it
//! - Half-Open: a limited number of probes test whether it recovered
//!
//! # Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first call after cooldown (before that call runs)
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails (cooldown restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream, shared by every route that reaches it
//! - All state lives behind a single mutex; each admission and each outcome
//!   is one serialized read-modify-write
//! - An admitted call holds a [`BreakerPermit`]. Every transition bumps a
//!   generation and outcomes from an older generation are ignored
//! - Counters reset on every transition and only then

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Open,
    HalfOpen,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Closed => "closed",
            Phase::Open => "open",
            Phase::HalfOpen => "half-open",
        }
    }

    fn level(&self) -> u8 {
        match self {
            Phase::Closed => 0,
            Phase::HalfOpen => 1,
            Phase::Open => 2,
        }
    }
}

/// Call outcome counters for the current phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// Why a call was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    #[error("circuit breaker is open for {0}")]
    Open(String),

    #[error("too many requests: {0} is half-open and already probing")]
    TooManyRequests(String),
}

/// Read-only view for admin introspection.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: &'static str,
    pub counts: Counts,
    /// Seconds since the current phase was entered.
    pub phase_age_secs: f64,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    counts: Counts,
    entered_at: Instant,
    generation: u64,
    probes_in_flight: u32,
}

/// A circuit breaker guarding one upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                counts: Counts::default(),
                entered_at: Instant::now(),
                generation: 0,
                probes_in_flight: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current phase, applying an elapsed cooldown first.
    pub fn phase(&self) -> Phase {
        let mut inner = self.lock();
        self.expire_cooldown(&mut inner);
        inner.phase
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.expire_cooldown(&mut inner);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.phase.as_str(),
            counts: inner.counts,
            phase_age_secs: inner.entered_at.elapsed().as_secs_f64(),
        }
    }

    /// Ask to make a call. The returned permit must be settled with the
    /// call's outcome; dropping it unsettled releases any probe slot without
    /// counting anything.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BreakerPermit, BreakerError> {
        let mut inner = self.lock();
        self.expire_cooldown(&mut inner);

        let probe = match inner.phase {
            Phase::Closed => false,
            Phase::Open => return Err(BreakerError::Open(self.name.clone())),
            Phase::HalfOpen => {
                if inner.probes_in_flight >= self.config.half_open_max_probes {
                    return Err(BreakerError::TooManyRequests(self.name.clone()));
                }
                inner.probes_in_flight += 1;
                true
            }
        };
        inner.counts.on_request();

        Ok(BreakerPermit {
            breaker: self.clone(),
            generation: inner.generation,
            probe,
            settled: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expire_cooldown(&self, inner: &mut Inner) {
        if inner.phase == Phase::Open && inner.entered_at.elapsed() >= self.config.cooldown() {
            self.transition(inner, Phase::HalfOpen);
        }
    }

    fn settle(&self, generation: u64, probe: bool, outcome: Option<bool>) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        if probe {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        let Some(success) = outcome else {
            return;
        };

        match (inner.phase, success) {
            (Phase::Closed, true) => inner.counts.on_success(),
            (Phase::Closed, false) => {
                inner.counts.on_failure();
                if inner.counts.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, Phase::Open);
                }
            }
            (Phase::HalfOpen, true) => {
                inner.counts.on_success();
                self.transition(&mut inner, Phase::Closed);
            }
            (Phase::HalfOpen, false) => {
                inner.counts.on_failure();
                self.transition(&mut inner, Phase::Open);
            }
            // Entering Open bumps the generation, so no permit can land here.
            (Phase::Open, _) => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: Phase) {
        let from = inner.phase;
        if from == to {
            return;
        }
        inner.phase = to;
        inner.counts = Counts::default();
        inner.entered_at = Instant::now();
        inner.generation += 1;
        inner.probes_in_flight = 0;

        match to {
            Phase::Open => tracing::warn!(upstream = %self.name, from = from.as_str(), "Circuit breaker opened"),
            _ => tracing::info!(upstream = %self.name, from = from.as_str(), to = to.as_str(), "Circuit breaker state change"),
        }
        metrics::record_breaker_transition(&self.name, from.as_str(), to.as_str(), to.level());
    }
}

/// Admission ticket for one call through a breaker.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl BreakerPermit {
    pub fn success(mut self) {
        self.finish(Some(true));
    }

    pub fn failure(mut self) {
        self.finish(Some(false));
    }

    /// Settle from an upstream HTTP status: 5xx fails, anything else succeeds.
    pub fn record_status(self, status: u16) {
        if status >= 500 {
            self.failure();
        } else {
            self.success();
        }
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }

    fn finish(&mut self, outcome: Option<bool>) {
        if !self.settled {
            self.settled = true;
            self.breaker.settle(self.generation, self.probe, outcome);
        }
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        self.finish(None);
    }
}

/// Breakers keyed by upstream name, created on first use.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, upstream: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(upstream) {
            return existing.clone();
        }
        self.breakers
            .entry(upstream.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(upstream, self.config.clone())))
            .clone()
    }

    pub fn get(&self, upstream: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(upstream).map(|b| b.clone())
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut all: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
