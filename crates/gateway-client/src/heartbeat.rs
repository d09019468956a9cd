//! Heartbeat ticker
//!
//! Hello configures the interval. The ticker sends op 1 with the last seen
//! sequence until its scope ends; a new Hello replaces the running ticker.

use crate::connection::{Outbound, SendError};
use crate::protocol::Payload;
use gateway_core::SessionStore;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Heartbeat state shared by the ticker and the heartbeat handlers
pub struct Heartbeat {
    session: Arc<dyn SessionStore>,
    ticker: Mutex<Option<CancellationToken>>,
    interval_ms: AtomicU64,
    last_sent: Mutex<Option<Instant>>,
    latency: Mutex<Option<Duration>>,
}

impl Heartbeat {
    #[must_use]
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self {
            session,
            ticker: Mutex::new(None),
            interval_ms: AtomicU64::new(0),
            last_sent: Mutex::new(None),
            latency: Mutex::new(None),
        }
    }

    /// Interval announced by the last Hello
    pub fn interval(&self) -> Option<Duration> {
        match self.interval_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }

    /// Whether a ticker is currently running
    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start a ticker under `scope`, stopping any previous one
    ///
    /// The first beat is jittered within one interval.
    pub fn reconfigure(self: &Arc<Self>, scope: &CancellationToken, interval_ms: u64, outbound: Outbound) {
        let token = scope.child_token();
        if let Some(previous) = self.ticker.lock().replace(token.clone()) {
            previous.cancel();
        }
        self.interval_ms.store(interval_ms, Ordering::Release);
        *self.last_sent.lock() = None;

        let period = Duration::from_millis(interval_ms);
        let jitter = period.mul_f64(rand::thread_rng().gen_range(0.0..1.0));
        tracing::debug!(
            interval_ms,
            first_beat_ms = jitter.as_millis() as u64,
            "Heartbeat configured"
        );

        let heartbeat = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + jitter, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticks.tick() => {
                        if heartbeat.awaiting_ack() {
                            tracing::warn!("Previous heartbeat was not acknowledged");
                        }
                        match heartbeat.beat_now(&token, &outbound).await {
                            Ok(()) => {}
                            Err(e) if e.is_cancelled() || e == SendError::Closed => break,
                            Err(e) => tracing::warn!(error = %e, "Heartbeat send failed"),
                        }
                    }
                }
            }
            tracing::debug!("Heartbeat stopped");
        });
    }

    /// Send a heartbeat immediately
    pub async fn beat_now(&self, scope: &CancellationToken, outbound: &Outbound) -> Result<(), SendError> {
        let sequence = match self.session.last_sequence() {
            0 => None,
            seq => Some(seq),
        };
        // stamped before enqueueing so a fast ack always finds it
        *self.last_sent.lock() = Some(Instant::now());
        if let Err(e) = outbound.send(scope, &Payload::heartbeat(sequence)).await {
            *self.last_sent.lock() = None;
            return Err(e);
        }
        tracing::trace!(?sequence, "Heartbeat sent");
        Ok(())
    }

    /// Record an acknowledgement, returning the measured latency
    pub fn ack(&self) -> Option<Duration> {
        let sent = self.last_sent.lock().take()?;
        let latency = sent.elapsed();
        *self.latency.lock() = Some(latency);
        Some(latency)
    }

    /// Stop the running ticker, if any
    pub fn stop(&self) {
        if let Some(token) = self.ticker.lock().take() {
            token.cancel();
        }
    }

    fn awaiting_ack(&self) -> bool {
        self.last_sent.lock().is_some()
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("interval", &self.interval())
            .field("latency", &self.latency())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
