//! In-process counters for frames, opcodes and dispatch events
//!
//! Recording never blocks; event names come from the remote side, so the
//! number of distinct series is capped.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default cap on distinct names per counter family
pub const DEFAULT_MAX_SERIES: usize = 512;

/// Telemetry sink used by the transport and dispatcher
pub trait Telemetry: Send + Sync {
    /// Count one received frame of the given kind ("binary", "text", ...)
    fn record_frame(&self, kind: &str) -> Result<(), TelemetryError>;

    /// Count one dispatch event by name
    fn record_event(&self, name: &str) -> Result<(), TelemetryError>;

    /// Count one received opcode by name
    fn record_opcode(&self, opcode: &str) -> Result<(), TelemetryError>;
}

/// Telemetry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("Counter name must not be empty")]
    EmptyName,

    #[error("Too many distinct {family} series (limit {limit})")]
    CardinalityExceeded { family: &'static str, limit: usize },
}

/// Telemetry that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_frame(&self, _kind: &str) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn record_event(&self, _name: &str) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn record_opcode(&self, _opcode: &str) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Lock-free counters keyed by name
#[derive(Debug)]
pub struct Counters {
    frames: DashMap<String, AtomicU64>,
    events: DashMap<String, AtomicU64>,
    opcodes: DashMap<String, AtomicU64>,
    max_series: usize,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_series(DEFAULT_MAX_SERIES)
    }

    #[must_use]
    pub fn with_max_series(max_series: usize) -> Self {
        Self {
            frames: DashMap::new(),
            events: DashMap::new(),
            opcodes: DashMap::new(),
            max_series,
        }
    }

    fn bump(
        &self,
        family: &'static str,
        map: &DashMap<String, AtomicU64>,
        name: &str,
    ) -> Result<(), TelemetryError> {
        if name.is_empty() {
            return Err(TelemetryError::EmptyName);
        }

        if let Some(counter) = map.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        if map.len() >= self.max_series {
            return Err(TelemetryError::CardinalityExceeded {
                family,
                limit: self.max_series,
            });
        }

        map.entry(name.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current value of a single event counter
    #[must_use]
    pub fn event_count(&self, name: &str) -> u64 {
        read(&self.events, name)
    }

    /// Current value of a single opcode counter
    #[must_use]
    pub fn opcode_count(&self, opcode: &str) -> u64 {
        read(&self.opcodes, opcode)
    }

    /// Current value of a single frame counter
    #[must_use]
    pub fn frame_count(&self, kind: &str) -> u64 {
        read(&self.frames, kind)
    }

    /// Point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames: collect(&self.frames),
            events: collect(&self.events),
            opcodes: collect(&self.opcodes),
        }
    }
}

fn read(map: &DashMap<String, AtomicU64>, name: &str) -> u64 {
    map.get(name).map_or(0, |c| c.load(Ordering::Relaxed))
}

fn collect(map: &DashMap<String, AtomicU64>) -> BTreeMap<String, u64> {
    map.iter()
        .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
        .collect()
}

impl Telemetry for Counters {
    fn record_frame(&self, kind: &str) -> Result<(), TelemetryError> {
        self.bump("frame", &self.frames, kind)
    }

    fn record_event(&self, name: &str) -> Result<(), TelemetryError> {
        self.bump("event", &self.events, name)
    }

    fn record_opcode(&self, opcode: &str) -> Result<(), TelemetryError> {
        self.bump("opcode", &self.opcodes, opcode)
    }
}

/// Serializable view of [`Counters`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub frames: BTreeMap<String, u64>,
    pub events: BTreeMap<String, u64>,
    pub opcodes: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counts_accumulate() {
        let counters = Counters::new();
        counters.record_event("READY").unwrap();
        counters.record_event("READY").unwrap();
        counters.record_event("GUILD_CREATE").unwrap();
        counters.record_opcode("Dispatch").unwrap();
        counters.record_frame("binary").unwrap();

        assert_eq!(counters.event_count("READY"), 2);
        assert_eq!(counters.event_count("GUILD_CREATE"), 1);
        assert_eq!(counters.event_count("RESUMED"), 0);
        assert_eq!(counters.opcode_count("Dispatch"), 1);
        assert_eq!(counters.frame_count("binary"), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let counters = Counters::new();
        assert_eq!(counters.record_event(""), Err(TelemetryError::EmptyName));
    }

    #[test]
    fn test_cardinality_cap() {
        let counters = Counters::with_max_series(2);
        counters.record_event("A").unwrap();
        counters.record_event("B").unwrap();

        assert_eq!(
            counters.record_event("C"),
            Err(TelemetryError::CardinalityExceeded {
                family: "event",
                limit: 2
            })
        );
        // existing series keep counting
        counters.record_event("A").unwrap();
        assert_eq!(counters.event_count("A"), 2);
        // families are capped independently
        counters.record_opcode("Hello").unwrap();
    }

    #[test]
    fn test_snapshot_serializes() {
        let counters = Counters::new();
        counters.record_opcode("Hello").unwrap();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.opcodes.get("Hello"), Some(&1));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["opcodes"]["Hello"], 1);
        assert!(json["events"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_recording() {
        let counters = Arc::new(Counters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_frame("binary").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.frame_count("binary"), 8000);
    }

    #[test]
    fn test_noop() {
        let telemetry: &dyn Telemetry = &NoopTelemetry;
        assert!(telemetry.record_event("").is_ok());
    }
}
