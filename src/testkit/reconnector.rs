//! Scripted [`Reconnector`] for supervisor tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::port::{ReconnectRequest, Reconnector};

/// What one scripted attempt does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    /// Report an unsuccessful handshake (`Ok(false)`).
    Fail,
    /// Raise a connection error with this message.
    Error(String),
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub request: ReconnectRequest,
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    calls: Vec<Call>,
}

/// A reconnector that pops the next scripted outcome on every call.
///
/// When the script runs out every further attempt returns [`Outcome::Fail`].
/// Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct ScriptedReconnector {
    script: Arc<Mutex<Script>>,
    latency: Duration,
}

impl ScriptedReconnector {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                outcomes: outcomes.into(),
                calls: Vec::new(),
            })),
            latency: Duration::ZERO,
        }
    }

    /// Always fails.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Succeeds after `failures` unsuccessful attempts.
    pub fn succeeding_after(failures: usize) -> Self {
        let mut outcomes = vec![Outcome::Fail; failures];
        outcomes.push(Outcome::Succeed);
        Self::new(outcomes)
    }

    /// Each attempt takes `latency` before returning its outcome.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    /// As an injectable port.
    pub fn shared(&self) -> Arc<dyn Reconnector> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Reconnector for ScriptedReconnector {
    async fn reconnect(&self, request: &ReconnectRequest) -> Result<bool> {
        let outcome = {
            let mut script = self.script.lock();
            script.calls.push(Call {
                at: Instant::now(),
                request: request.clone(),
            });
            script.outcomes.pop_front().unwrap_or(Outcome::Fail)
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match outcome {
            Outcome::Succeed => Ok(true),
            Outcome::Fail => Ok(false),
            Outcome::Error(message) => Err(Error::Connection(message)),
        }
    }
}
