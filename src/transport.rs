//! Delivery of envelopes to the host
//!
//! The host supplies the send capability. It is fallible and the recorder never
//! assumes delivery: failures are logged and the payload is dropped, unless the
//! capability is wrapped in a [`RetryingTransport`].

use crate::clock::Clock;
use log::{debug, warn};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// The host's send capability
pub trait Transport: Send {
    fn send(&mut self, payload: Value) -> anyhow::Result<()>;
}

impl<F> Transport for F
where
    F: FnMut(Value) -> anyhow::Result<()> + Send,
{
    fn send(&mut self, payload: Value) -> anyhow::Result<()> {
        self(payload)
    }
}

/// Collects payloads in memory; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Value>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything sent so far
    pub fn take(&self) -> Vec<Value> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: Value) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("memory transport poisoned"))?
            .push(payload);
        Ok(())
    }
}

/// Exponential backoff state
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial_ms: u64,
    pub factor: u32,
    pub max_ms: u64,
    current_ms: Option<u64>,
}

impl Backoff {
    pub fn new(initial_ms: u64, factor: u32, max_ms: u64) -> Self {
        Self {
            initial_ms,
            factor: factor.max(1),
            max_ms,
            current_ms: None,
        }
    }

    /// Delay before the next attempt after one more failure
    pub fn next_delay(&mut self) -> u64 {
        let next = match self.current_ms {
            None => self.initial_ms,
            Some(current) => current.saturating_mul(u64::from(self.factor)),
        }
        .min(self.max_ms);
        self.current_ms = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current_ms = None;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(500, 2, 30_000)
    }
}

/// Wraps a transport with a bounded backlog and retry backoff
///
/// `send` always accepts the payload; delivery happens in `flush`, which is
/// also attempted on every `send`. When the backlog is full the oldest
/// payload is dropped.
pub struct RetryingTransport<T> {
    inner: T,
    clock: Arc<dyn Clock>,
    backlog: VecDeque<Value>,
    capacity: usize,
    backoff: Backoff,
    retry_at_ms: Option<i64>,
    dropped: usize,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, clock: Arc<dyn Clock>, capacity: usize, backoff: Backoff) -> Self {
        Self {
            inner,
            clock,
            backlog: VecDeque::new(),
            capacity: capacity.max(1),
            backoff,
            retry_at_ms: None,
            dropped: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    /// Payloads discarded because the backlog overflowed
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn retry_at_ms(&self) -> Option<i64> {
        self.retry_at_ms
    }

    /// Deliver queued payloads in order until one fails. Returns how many
    /// were delivered.
    pub fn flush(&mut self, now_ms: i64) -> usize {
        if self.retry_at_ms.is_some_and(|at| now_ms < at) {
            return 0;
        }
        let mut delivered = 0;
        while let Some(payload) = self.backlog.front() {
            match self.inner.send(payload.clone()) {
                Ok(()) => {
                    self.backlog.pop_front();
                    self.backoff.reset();
                    self.retry_at_ms = None;
                    delivered += 1;
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    self.retry_at_ms =
                        Some(now_ms.saturating_add(i64::try_from(delay).unwrap_or(i64::MAX)));
                    warn!(
                        "Send failed, {} queued, retrying in {}ms: {}",
                        self.backlog.len(),
                        delay,
                        e
                    );
                    break;
                }
            }
        }
        delivered
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn send(&mut self, payload: Value) -> anyhow::Result<()> {
        if self.backlog.len() >= self.capacity {
            self.backlog.pop_front();
            self.dropped += 1;
            debug!("Backlog full, dropped oldest payload");
        }
        self.backlog.push_back(payload);
        let now = self.clock.now_ms();
        self.flush(now);
        Ok(())
    }
}
