use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

use super::rsvp::RsvpState;

/// Opaque id of a posted notice, handed out by the renderer.
pub type NoticeHandle = String;

/// Which feed a piece of raw text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    PreAlertFeed,
    DispatchFeed,
}

/// How an interaction addresses a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordRef {
    /// The notice the button was pressed on.
    Notice(NoticeHandle),
    Dispatch(String),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Notice(handle) => write!(f, "notice {}", handle),
            RecordRef::Dispatch(number) => write!(f, "dispatch #{}", number),
        }
    }
}

/// Key under which the expiry manager tracks a record's timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    PreAlert(NoticeHandle),
    Dispatch(String),
    Callout(NoticeHandle),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::PreAlert(handle) => write!(f, "pre-alert {}", handle),
            RecordKey::Dispatch(number) => write!(f, "dispatch #{}", number),
            RecordKey::Callout(handle) => write!(f, "call-out {}", handle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreAlertStatus {
    Pending,
    Matched,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone)]
pub struct PreAlertRecord {
    pub id: NoticeHandle,
    pub keyword: String,
    pub postal_code: String,
    pub time_text: Option<String>,
    pub description: String,
    pub received_at: DateTime<Local>,
    pub rsvp: RsvpState,
    pub status: PreAlertStatus,
}

#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub dispatch_number: String,
    pub alarm_code: String,
    pub keyword: String,
    pub postal_code: String,
    pub vehicles: Vec<String>,
    pub rsvp: RsvpState,
    pub notice: Option<NoticeHandle>,
    pub merged_from: Option<NoticeHandle>,
    pub status: ActiveStatus,
}

impl DispatchRecord {
    /// Adds a vehicle unless it is already listed. Returns whether it was new.
    pub fn add_vehicle(&mut self, vehicle: &str) -> bool {
        if self.vehicles.iter().any(|v| v == vehicle) {
            return false;
        }
        self.vehicles.push(vehicle.to_string());
        true
    }
}

/// A manual call-out posted by an operator. Takes no part in correlation.
#[derive(Debug, Clone)]
pub struct CalloutRecord {
    pub id: NoticeHandle,
    pub alarm_type: String,
    pub keyword: String,
    pub address: String,
    pub info: Option<String>,
    pub rsvp: RsvpState,
    pub status: ActiveStatus,
}
