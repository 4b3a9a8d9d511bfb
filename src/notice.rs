//! Outbound side: what the engine asks the chat-side renderer to show.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::kafka;
use crate::models::record::{CalloutRecord, DispatchRecord, NoticeHandle, PreAlertRecord};
use crate::models::rsvp::RsvpState;

/// Snapshot of a record as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeView {
    PreAlert {
        description: String,
        keyword: String,
        postal_code: String,
        time_text: Option<String>,
        received_at: DateTime<Local>,
        rsvp: RsvpState,
    },
    Dispatch {
        dispatch_number: String,
        alarm_code: String,
        keyword: String,
        postal_code: String,
        vehicles: Vec<String>,
        /// Pre-alert notice this dispatch took over, if it was correlated.
        merged_from: Option<NoticeHandle>,
        rsvp: RsvpState,
    },
    Callout {
        alarm_type: String,
        keyword: String,
        address: String,
        info: Option<String>,
        rsvp: RsvpState,
    },
}

impl NoticeView {
    #[cfg(test)]
    pub fn rsvp(&self) -> &RsvpState {
        match self {
            NoticeView::PreAlert { rsvp, .. }
            | NoticeView::Dispatch { rsvp, .. }
            | NoticeView::Callout { rsvp, .. } => rsvp,
        }
    }
}

impl From<&PreAlertRecord> for NoticeView {
    fn from(record: &PreAlertRecord) -> Self {
        NoticeView::PreAlert {
            description: record.description.clone(),
            keyword: record.keyword.clone(),
            postal_code: record.postal_code.clone(),
            time_text: record.time_text.clone(),
            received_at: record.received_at,
            rsvp: record.rsvp.clone(),
        }
    }
}

impl From<&DispatchRecord> for NoticeView {
    fn from(record: &DispatchRecord) -> Self {
        NoticeView::Dispatch {
            dispatch_number: record.dispatch_number.clone(),
            alarm_code: record.alarm_code.clone(),
            keyword: record.keyword.clone(),
            postal_code: record.postal_code.clone(),
            vehicles: record.vehicles.clone(),
            merged_from: record.merged_from.clone(),
            rsvp: record.rsvp.clone(),
        }
    }
}

impl From<&CalloutRecord> for NoticeView {
    fn from(record: &CalloutRecord) -> Self {
        NoticeView::Callout {
            alarm_type: record.alarm_type.clone(),
            keyword: record.keyword.clone(),
            address: record.address.clone(),
            info: record.info.clone(),
            rsvp: record.rsvp.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A pre-alert ran out before any dispatch details arrived.
    NoFurtherDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    Saved,
    NoLongerActive,
}

/// Private reply to the responder who pressed a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub interaction_id: Option<String>,
    pub notice_id: String,
    pub responder_id: String,
    pub outcome: AckOutcome,
}

#[async_trait]
pub trait NoticeRenderer: Send + Sync {
    /// Posts a new notice and returns its handle.
    async fn render_notice(&self, view: &NoticeView) -> Result<NoticeHandle, EngineError>;

    async fn update_notice(&self, handle: &str, view: &NoticeView) -> Result<(), EngineError>;

    /// Strips the interactive controls and marks the notice stale.
    async fn close_notice(
        &self,
        handle: &str,
        view: &NoticeView,
        reason: CloseReason,
    ) -> Result<(), EngineError>;

    async fn acknowledge(&self, ack: &Acknowledgement) -> Result<(), EngineError>;
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum NoticeCommand<'a> {
    Render {
        handle: &'a str,
        view: &'a NoticeView,
    },
    Update {
        handle: &'a str,
        view: &'a NoticeView,
    },
    Close {
        handle: &'a str,
        view: &'a NoticeView,
        reason: CloseReason,
    },
    Acknowledge(&'a Acknowledgement),
}

/// Publishes notice commands as JSON to the notice topic. Handles are UUIDs
/// minted here and used as the message key, so every command for one notice
/// lands on the same partition.
pub struct KafkaNoticePublisher {
    producer: FutureProducer,
    topic: String,
    queue_timeout: Duration,
}

impl KafkaNoticePublisher {
    pub fn new(config: &AppConfig) -> Result<Self, EngineError> {
        let producer: FutureProducer = kafka::base_client_config(config)
            .set("message.timeout.ms", "10000")
            .create()?;
        Ok(Self {
            producer,
            topic: config.notice_topic.clone(),
            queue_timeout: Duration::from_secs(5),
        })
    }

    async fn publish(&self, key: &str, command: &NoticeCommand<'_>) -> Result<(), EngineError> {
        let payload = serde_json::to_vec(command)?;
        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        self.producer
            .send(record, self.queue_timeout)
            .await
            .map_err(|(e, _)| EngineError::Render(e.to_string()))?;
        debug!("Published notice command for {} to {}", key, self.topic);
        Ok(())
    }
}

#[async_trait]
impl NoticeRenderer for KafkaNoticePublisher {
    async fn render_notice(&self, view: &NoticeView) -> Result<NoticeHandle, EngineError> {
        let handle = Uuid::new_v4().to_string();
        self.publish(&handle, &NoticeCommand::Render { handle: &handle, view })
            .await?;
        Ok(handle)
    }

    async fn update_notice(&self, handle: &str, view: &NoticeView) -> Result<(), EngineError> {
        self.publish(handle, &NoticeCommand::Update { handle, view }).await
    }

    async fn close_notice(
        &self,
        handle: &str,
        view: &NoticeView,
        reason: CloseReason,
    ) -> Result<(), EngineError> {
        self.publish(handle, &NoticeCommand::Close { handle, view, reason })
            .await
    }

    async fn acknowledge(&self, ack: &Acknowledgement) -> Result<(), EngineError> {
        self.publish(&ack.notice_id, &NoticeCommand::Acknowledge(ack)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::ActiveStatus;
    use crate::models::rsvp::Choice;

    #[test]
    fn test_notice_command_wire_format() {
        let mut rsvp = RsvpState::new();
        rsvp.set("U1", Choice::Later);
        let record = DispatchRecord {
            dispatch_number: "9608".to_string(),
            alarm_code: "A1".to_string(),
            keyword: "Brandmeldeanlage".to_string(),
            postal_code: "2700".to_string(),
            vehicles: vec!["Tank 6".to_string()],
            rsvp,
            notice: Some("n1".to_string()),
            merged_from: Some("n1".to_string()),
            status: ActiveStatus::Active,
        };
        let view = NoticeView::from(&record);
        let command = NoticeCommand::Update {
            handle: "n1",
            view: &view,
        };

        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["action"], "update");
        assert_eq!(json["handle"], "n1");
        assert_eq!(json["view"]["kind"], "dispatch");
        assert_eq!(json["view"]["vehicles"][0], "Tank 6");
        assert_eq!(json["view"]["merged_from"], "n1");
        assert_eq!(json["view"]["rsvp"]["later"][0], "U1");
        assert_eq!(json["view"]["rsvp"]["coming"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_acknowledgement_wire_format() {
        let ack = Acknowledgement {
            interaction_id: Some("i-1".to_string()),
            notice_id: "n1".to_string(),
            responder_id: "U1".to_string(),
            outcome: AckOutcome::NoLongerActive,
        };
        let json = serde_json::to_value(NoticeCommand::Acknowledge(&ack)).unwrap();
        assert_eq!(json["action"], "acknowledge");
        assert_eq!(json["outcome"], "no_longer_active");
        assert_eq!(json["responder_id"], "U1");
    }
}
