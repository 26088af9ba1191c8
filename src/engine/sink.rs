//! Outbound metric port
//!
//! The engine publishes through this single capability instead of holding
//! a transport client, so tests can drive the whole advertise path with a
//! recording fake.

use super::types::Measurement;
use std::sync::{Arc, Mutex};

/// Destination for aggregate metrics
///
/// `true` means the transport accepted the metric; only then does the
/// engine advance the advertisement clock. `false` leaves the state
/// untouched so the next due cycle retries with the latest total.
pub trait MetricSink: Send {
    fn send(&mut self, metric: &Measurement) -> bool;
}

/// Test sink that records everything it is asked to send
///
/// `accept` controls the return value, to exercise the publish-failure
/// path. The sent list is shared so tests keep a handle after the sink
/// moves into the engine.
pub struct RecordingSink {
    pub sent: Arc<Mutex<Vec<Measurement>>>,
    pub accept: Arc<Mutex<bool>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(Mutex::new(true)),
        }
    }

    /// Handles for inspecting/steering the sink after handing it over
    pub fn handles(&self) -> (Arc<Mutex<Vec<Measurement>>>, Arc<Mutex<bool>>) {
        (Arc::clone(&self.sent), Arc::clone(&self.accept))
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSink for RecordingSink {
    fn send(&mut self, metric: &Measurement) -> bool {
        let accepted = *self.accept.lock().unwrap();
        if accepted {
            self.sent.lock().unwrap().push(metric.clone());
        }
        accepted
    }
}
