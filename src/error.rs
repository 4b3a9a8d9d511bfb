use thiserror::Error;

/// Errors surfaced by the correlation engine and its outbound publisher.
///
/// Text that does not parse and dispatches without a pre-alert are not errors;
/// they are filtered or handled as fresh records.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The interaction targets a record that expired or never existed.
    #[error("record {0} is no longer active")]
    StaleReference(String),

    /// The renderer could not post or edit a notice.
    #[error("render failed: {0}")]
    Render(String),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
