//! MQTT transport adapter
//!
//! Bridges the broker to the engine's two seams: inbound publishes are
//! decoded into `EngineEvent`s and fed through the event channel, and
//! outbound aggregate metrics leave through `MqttMetricSink`. The engine
//! itself never sees MQTT types.
//!
//! Wire layout under the configured prefix:
//! - `<prefix>/metrics/<quantity>@<device>` - metric readings (JSON)
//! - `<prefix>/assets/<name>` - asset change events (JSON)

use crate::config::Config;
use crate::engine::types::{parse_metric_value, parse_topic};
use crate::engine::{AssetEvent, EngineEvent, Measurement, MetricSink};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Inbound metric payload
///
/// `value` travels as a string and is validated here; a missing
/// timestamp defaults to arrival time, matching producers that leave
/// stamping to the bus.
#[derive(Debug, Deserialize)]
pub struct MetricPayload {
    pub value: String,
    pub unit: String,
    pub ttl: u32,
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub element_source: String,
}

/// Outbound aggregate payload, same schema as `MetricPayload`
///
/// `element_source` carries the aggregate name, so our own publishes
/// echoed back by the broker decode fine and simply match no device.
#[derive(Debug, Serialize)]
struct OutboundPayload<'a> {
    value: String,
    unit: &'a str,
    ttl: u32,
    timestamp: i64,
    element_source: &'a str,
}

/// Decode one inbound metric publish
///
/// `subject` is the part of the MQTT topic after the metrics prefix,
/// i.e. `<quantity>@<device>`. Returns None (after logging) for
/// anything malformed; a bad reading must never reach the engine.
pub fn decode_metric(subject: &str, payload: &[u8], now: i64) -> Option<EngineEvent> {
    if parse_topic(subject).is_none() {
        log::warn!("ignoring metric on malformed subject '{}'", subject);
        return None;
    }

    let wire: MetricPayload = match serde_json::from_slice(payload) {
        Ok(wire) => wire,
        Err(e) => {
            log::warn!("cannot decode metric payload on '{}': {}", subject, e);
            return None;
        }
    };

    let Some(value) = parse_metric_value(&wire.value) else {
        log::error!(
            "cannot convert value '{}' on '{}' to a number, ignoring message",
            wire.value,
            subject
        );
        return None;
    };

    let (quantity, _) = parse_topic(subject)?;
    Some(EngineEvent::Metric {
        topic: subject.to_string(),
        measurement: Measurement {
            quantity: quantity.to_string(),
            device: wire.element_source,
            value,
            unit: wire.unit,
            ttl: wire.ttl,
            timestamp: wire.timestamp.unwrap_or(now),
        },
    })
}

/// Decode one inbound asset publish
///
/// Events with operations outside create/update/delete/retire fail to
/// decode and are dropped, which is exactly the ignore semantics the
/// engine wants for them.
pub fn decode_asset(payload: &[u8]) -> Option<EngineEvent> {
    match serde_json::from_slice::<AssetEvent>(payload) {
        Ok(event) => Some(EngineEvent::Asset(event)),
        Err(e) => {
            log::debug!("ignoring asset event: {}", e);
            None
        }
    }
}

/// Connect to the broker and spawn the ingest task
///
/// The returned client is shared with `MqttMetricSink`; the spawned task
/// owns the event loop, so it drives both inbound publishes and the
/// sink's outbound queue. Broker errors back off and reconnect, they
/// never take the agent down.
pub fn spawn_mqtt(config: &Config, tx: mpsc::Sender<EngineEvent>) -> AsyncClient {
    let mut opts = MqttOptions::new("powerflow", &config.mqtt_host, config.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(15));
    let (client, mut eventloop) = AsyncClient::new(opts, 100);

    let metrics_filter = format!("{}/metrics/#", config.topic_prefix);
    let assets_filter = format!("{}/assets/#", config.topic_prefix);
    let metrics_prefix = format!("{}/metrics/", config.topic_prefix);
    let assets_prefix = format!("{}/assets/", config.topic_prefix);

    let subscriber = client.clone();
    tokio::spawn(async move {
        if let Err(e) = subscriber.subscribe(&metrics_filter, QoS::AtLeastOnce).await {
            log::error!("subscribe to '{}' failed: {}", metrics_filter, e);
            return;
        }
        if let Err(e) = subscriber.subscribe(&assets_filter, QoS::AtLeastOnce).await {
            log::error!("subscribe to '{}' failed: {}", assets_filter, e);
            return;
        }
        log::info!(
            "subscribed to '{}' and '{}'",
            metrics_filter,
            assets_filter
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    let now = chrono::Utc::now().timestamp();
                    let event = if let Some(subject) =
                        publish.topic.strip_prefix(&metrics_prefix)
                    {
                        decode_metric(subject, &publish.payload, now)
                    } else if publish.topic.strip_prefix(&assets_prefix).is_some() {
                        decode_asset(&publish.payload)
                    } else {
                        None
                    };

                    if let Some(event) = event {
                        if tx.send(event).await.is_err() {
                            log::info!("engine channel closed, stopping MQTT ingest");
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("MQTT connection error: {}, reconnecting", e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    client
}

/// Publish sink pushing aggregate metrics back onto the bus
pub struct MqttMetricSink {
    client: AsyncClient,
    metrics_prefix: String,
}

impl MqttMetricSink {
    pub fn new(client: AsyncClient, topic_prefix: &str) -> Self {
        Self {
            client,
            metrics_prefix: format!("{}/metrics/", topic_prefix),
        }
    }
}

impl MetricSink for MqttMetricSink {
    fn send(&mut self, metric: &Measurement) -> bool {
        let topic = format!("{}{}", self.metrics_prefix, metric.topic());
        let payload = OutboundPayload {
            value: metric.value.to_string(),
            unit: &metric.unit,
            ttl: metric.ttl,
            timestamp: metric.timestamp,
            element_source: &metric.device,
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                log::error!("cannot encode metric {}: {}", topic, e);
                return false;
            }
        };

        match self.client.try_publish(&topic, QoS::AtLeastOnce, false, body) {
            Ok(()) => {
                log::info!(
                    "metric sent: topic = {}, time = {}",
                    metric.topic(),
                    metric.timestamp
                );
                true
            }
            Err(e) => {
                log::warn!("publish of {} failed: {}", topic, e);
                false
            }
        }
    }
}
