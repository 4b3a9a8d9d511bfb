use crate::config::AppConfig;
use crate::models::message::ControlMessage;
use crate::models::record::ChannelClass;
use crate::processor::engine::EngineEvent;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Connection settings shared by the feed consumer and the notice publisher.
pub fn base_client_config(config: &AppConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("security.protocol", &config.kafka_security_protocol);

    if config.uses_sasl() {
        client_config
            .set("sasl.mechanism", &config.kafka_sasl_mechanism)
            .set("sasl.username", &config.kafka_username)
            .set("sasl.password", &config.kafka_password);
    }

    client_config
}

/// Maps the topics the service listens on to engine events.
#[derive(Debug, Clone)]
pub struct FeedTopics {
    pub pre_alert: String,
    pub dispatch: String,
    pub interaction: String,
}

impl FeedTopics {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pre_alert: config.pre_alert_topic.clone(),
            dispatch: config.dispatch_topic.clone(),
            interaction: config.interaction_topic.clone(),
        }
    }

    /// Turns one Kafka payload into an engine event, or `None` if it should be skipped.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Option<EngineEvent> {
        let channel = if topic == self.pre_alert {
            Some(ChannelClass::PreAlertFeed)
        } else if topic == self.dispatch {
            Some(ChannelClass::DispatchFeed)
        } else {
            None
        };

        if let Some(channel) = channel {
            return match std::str::from_utf8(payload) {
                Ok(text) if !text.trim().is_empty() => Some(EngineEvent::Text {
                    channel,
                    text: text.to_string(),
                }),
                Ok(_) => {
                    debug!("Skipping blank message on {}", topic);
                    None
                }
                Err(e) => {
                    warn!("Skipping non UTF-8 message on {}: {}", topic, e);
                    None
                }
            };
        }

        if topic == self.interaction {
            return match serde_json::from_slice::<ControlMessage>(payload) {
                Ok(ControlMessage::Rsvp(press)) => Some(EngineEvent::Rsvp(press)),
                Ok(ControlMessage::Callout(request)) => Some(EngineEvent::Callout(request)),
                Err(e) => {
                    warn!("Failed to parse interaction message: {}", e);
                    None
                }
            };
        }

        warn!("Received message on unexpected topic {}", topic);
        None
    }
}

/// Consumes the feed topics and forwards events to the engine in arrival order.
///
/// Messages are handed over one by one instead of being processed on spawned
/// tasks, which keeps events for the same record ordered.
pub async fn start_kafka_consumer(
    config: &AppConfig,
    events: mpsc::Sender<EngineEvent>,
) -> anyhow::Result<()> {
    let topics = FeedTopics::from_config(config);
    info!(
        "Initializing Kafka consumer for topics: {}, {}, {}",
        topics.pre_alert, topics.dispatch, topics.interaction
    );

    let consumer: StreamConsumer = base_client_config(config)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        .create()?;

    consumer.subscribe(&[
        topics.pre_alert.as_str(),
        topics.dispatch.as_str(),
        topics.interaction.as_str(),
    ])?;
    info!("Subscribed to feed topics");

    let mut stream = consumer.stream();
    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        // Circuit Breaker Check
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        let event = match stream.next().await {
            Some(Ok(m)) => {
                consecutive_failures = 0;

                match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(payload) => topics.route(m.topic(), payload),
                }
            }
            Some(Err(e)) => {
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                consecutive_failures += 1;

                // Small delay to prevent tight loop in case of minor network glitches
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
            None => {
                warn!("Kafka message stream ended");
                return Ok(());
            }
        };

        if let Some(event) = event {
            if events.send(event).await.is_err() {
                warn!("Engine is gone, stopping Kafka consumer");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> FeedTopics {
        FeedTopics {
            pre_alert: "alerts-pre".to_string(),
            dispatch: "alerts-dispatch".to_string(),
            interaction: "alerts-interactions".to_string(),
        }
    }

    #[test]
    fn test_route_feed_text_by_topic() {
        match topics().route("alerts-pre", "Brand PLZ 2700".as_bytes()) {
            Some(EngineEvent::Text { channel, text }) => {
                assert_eq!(channel, ChannelClass::PreAlertFeed);
                assert_eq!(text, "Brand PLZ 2700");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            topics().route("alerts-dispatch", b"Dispatch number: 1"),
            Some(EngineEvent::Text {
                channel: ChannelClass::DispatchFeed,
                ..
            })
        ));
    }

    #[test]
    fn test_route_interactions() {
        let payload = br#"{"type":"rsvp","notice_id":"n1","custom_id":"come_no","responder_id":"U1"}"#;
        assert!(matches!(
            topics().route("alerts-interactions", payload),
            Some(EngineEvent::Rsvp(_))
        ));

        let payload = br#"{"type":"callout","alarm_type":"Stiller Alarm","keyword":"Brand","address":"Hauptplatz 1"}"#;
        assert!(matches!(
            topics().route("alerts-interactions", payload),
            Some(EngineEvent::Callout(_))
        ));
    }

    #[test]
    fn test_route_skips_garbage() {
        assert!(topics().route("alerts-interactions", b"not json").is_none());
        assert!(topics().route("alerts-pre", &[0xff, 0xfe]).is_none());
        assert!(topics().route("alerts-pre", b"   ").is_none());
        assert!(topics().route("somewhere-else", b"Brand PLZ 2700").is_none());
    }
}
