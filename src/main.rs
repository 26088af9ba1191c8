use powerflow::config::Config;
use powerflow::engine::AggregationEngine;
use powerflow::engine::EngineEvent;
use powerflow::runtime::run_engine_loop;
use powerflow::topology_db::SqliteTopologyProvider;
use powerflow::transport::{spawn_mqtt, MqttMetricSink};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    log::info!("starting powerflow");
    log::info!("  broker:   {}:{}", config.mqtt_host, config.mqtt_port);
    log::info!("  prefix:   {}", config.topic_prefix);
    log::info!("  asset db: {}", config.db_path);
    log::info!("  rack quantities: {:?}", config.rack_quantities);
    log::info!("  DC quantities:   {:?}", config.dc_quantities);

    let provider = SqliteTopologyProvider::new(&config.db_path);
    if let Err(e) = provider.ensure_schema() {
        log::error!("cannot prepare asset database: {}", e);
    }

    let (tx, rx) = mpsc::channel::<EngineEvent>(config.channel_buffer);
    let client = spawn_mqtt(&config, tx);
    let sink = MqttMetricSink::new(client, &config.topic_prefix);

    let mut engine = AggregationEngine::new(
        config.engine_config(),
        Box::new(provider),
        Box::new(sink),
    );

    // Initial topology load. A failure here is not fatal: the engine
    // starts with an empty snapshot and retries on its backoff.
    if !engine.reload() {
        log::warn!("initial topology load failed, starting empty with retry scheduled");
    }

    run_engine_loop(engine, rx).await;
}
