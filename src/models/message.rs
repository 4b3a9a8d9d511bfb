use serde::{Deserialize, Deserializer};

use super::record::RecordRef;
use super::rsvp::Choice;

/// JSON messages arriving on the interaction topic.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Rsvp(RsvpPress),
    Callout(CalloutRequest),
}

/// A button press forwarded by the chat side.
#[derive(Debug, Clone, Deserialize)]
pub struct RsvpPress {
    pub notice_id: String,
    pub custom_id: String,
    pub responder_id: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub interaction_id: Option<String>,
}

impl RsvpPress {
    /// Decodes `come_<yes|no|late>[_<dispatchNumber>]` into the addressed record and choice.
    ///
    /// Buttons without a number belong to the notice they were pressed on.
    pub fn target(&self) -> Option<(RecordRef, Choice)> {
        let rest = self.custom_id.strip_prefix("come_")?;
        let (action, number) = match rest.split_once('_') {
            Some((action, number)) => (action, Some(number)),
            None => (rest, None),
        };
        let choice = Choice::from_action(action)?;
        let target = match number {
            Some(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                RecordRef::Dispatch(n.to_string())
            }
            Some(_) => return None,
            None => RecordRef::Notice(self.notice_id.clone()),
        };
        Some((target, choice))
    }
}

/// Operator request for a manual call-out.
#[derive(Debug, Clone, Deserialize)]
pub struct CalloutRequest {
    #[serde(default = "unknown_alarm_type")]
    pub alarm_type: String,
    pub keyword: String,
    pub address: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub info: Option<String>,
}

fn unknown_alarm_type() -> String {
    "Unbekannt".to_string()
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}
