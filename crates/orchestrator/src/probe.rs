use account_escrow_types::{ProbeReport, SafeTransfer};
use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("account status source unavailable: {0}")]
    Unavailable(String),

    #[error("probe timed out")]
    Timeout,

    #[error("probe internal error: {0}")]
    Internal(String),
}

/// Reads the current state of the account under transfer.
///
/// Implementations must not mutate the transfer; the orchestrator owns all
/// writes and decides what a report means.
#[async_trait]
pub trait MonitoringProbe: Send + Sync {
    async fn check(&self, transfer: &SafeTransfer) -> Result<ProbeReport, ProbeError>;
}

/// Replays queued outcomes in order, then reports clean
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<ProbeReport, ProbeError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering, for exercising the probe timeout
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, outcome: Result<ProbeReport, ProbeError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    pub fn push_clean(&self) {
        self.push(Ok(ProbeReport::clean()));
    }

    pub fn push_suspicious(&self, notes: &str) {
        self.push(Ok(ProbeReport::suspicious(notes)));
    }

    pub fn push_failure(&self, reason: &str) {
        self.push(Err(ProbeError::Unavailable(reason.to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MonitoringProbe for ScriptedProbe {
    async fn check(&self, _transfer: &SafeTransfer) -> Result<ProbeReport, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| Ok(ProbeReport::clean()))
    }
}

/// Stand-in probe for local runs: random outcomes at fixed ratios
#[derive(Debug, Clone, Copy)]
pub struct RandomProbe {
    pub suspicious_ratio: f64,
    pub error_ratio: f64,
}

impl Default for RandomProbe {
    fn default() -> Self {
        Self {
            suspicious_ratio: 0.05,
            error_ratio: 0.01,
        }
    }
}

#[async_trait]
impl MonitoringProbe for RandomProbe {
    async fn check(&self, transfer: &SafeTransfer) -> Result<ProbeReport, ProbeError> {
        let roll: f64 = {
            let mut rng = rand::thread_rng();
            rng.gen()
        };

        if roll < self.error_ratio {
            return Err(ProbeError::Unavailable(format!(
                "status lookup for account {} failed",
                transfer.account_id
            )));
        }
        if roll < self.error_ratio + self.suspicious_ratio {
            return Ok(ProbeReport::suspicious("Unusual login location detected"));
        }
        Ok(ProbeReport::clean())
    }
}
