mod config;
mod error;
mod kafka;
mod models;
mod notice;
mod parser;
mod processor;
mod store;

use config::AppConfig;
use notice::KafkaNoticePublisher;
use parser::TextParser;
use processor::correlator::Correlator;
use processor::engine::Engine;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Alert Relay...");

    // Outbound notices
    let publisher = KafkaNoticePublisher::new(&config)?;
    info!("Publishing notices to topic: {}", config.notice_topic);

    // All tracking state lives in the engine task for the lifetime of the process
    let engine = Engine::new(
        publisher,
        TextParser::new(&config.pre_alert_prefix),
        Correlator::default(),
        config.expiry_windows(),
    );
    let (events_tx, events_rx) = mpsc::channel(256);
    let engine_task = tokio::spawn(engine.run(events_rx));

    // Start Kafka
    kafka::start_kafka_consumer(&config, events_tx).await?;

    engine_task.await?;
    Ok(())
}
