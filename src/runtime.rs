//! Host event loop
//!
//! Drives the engine the way it expects to be driven: one event source,
//! one timer. The sleep is re-armed from `poll_interval_ms()` after
//! every processed event, so the loop always wakes exactly when the
//! nearest advertisement or reload deadline comes due.

use crate::engine::{AggregationEngine, EngineEvent};
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the engine until the event channel closes
///
/// All engine mutation happens on this task; nothing else touches it.
/// Shutdown is immediate: the engine holds no durable state to drain.
pub async fn run_engine_loop(
    mut engine: AggregationEngine,
    mut rx: mpsc::Receiver<EngineEvent>,
) {
    log::info!("engine loop started");

    loop {
        let timeout = Duration::from_millis(engine.poll_interval_ms());

        tokio::select! {
            maybe_event = rx.recv() => match maybe_event {
                Some(EngineEvent::Metric { topic, measurement }) => {
                    log::debug!("got metric '{}'", topic);
                    engine.process_metric(&topic, measurement);
                }
                Some(EngineEvent::Asset(event)) => {
                    engine.process_asset(&event);
                }
                None => {
                    log::info!("event channel closed, engine loop stopping");
                    break;
                }
            },
            _ = tokio::time::sleep(timeout) => {
                engine.on_poll();
            }
        }
    }
}
