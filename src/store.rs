use indexmap::IndexMap;

use crate::models::record::{
    CalloutRecord, DispatchRecord, NoticeHandle, PreAlertRecord, PreAlertStatus, RecordRef,
};
use crate::models::rsvp::RsvpState;

/// In-memory tracking state for every live record.
///
/// Maps keep insertion order; removals use `shift_remove` so the remaining
/// pre-alerts stay in arrival order for the correlator's scan.
#[derive(Debug, Default)]
pub struct RecordStore {
    pre_alerts: IndexMap<NoticeHandle, PreAlertRecord>,
    dispatches: IndexMap<String, DispatchRecord>,
    callouts: IndexMap<NoticeHandle, CalloutRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pre_alert(&mut self, record: PreAlertRecord) {
        self.pre_alerts.insert(record.id.clone(), record);
    }

    pub fn pre_alert(&self, id: &str) -> Option<&PreAlertRecord> {
        self.pre_alerts.get(id)
    }

    pub fn remove_pre_alert(&mut self, id: &str) -> Option<PreAlertRecord> {
        self.pre_alerts.shift_remove(id)
    }

    /// Pending pre-alerts in arrival order.
    pub fn pending_pre_alerts(&self) -> impl Iterator<Item = &PreAlertRecord> {
        self.pre_alerts
            .values()
            .filter(|p| p.status == PreAlertStatus::Pending)
    }

    pub fn insert_dispatch(&mut self, record: DispatchRecord) {
        self.dispatches.insert(record.dispatch_number.clone(), record);
    }

    pub fn dispatch(&self, number: &str) -> Option<&DispatchRecord> {
        self.dispatches.get(number)
    }

    pub fn dispatch_mut(&mut self, number: &str) -> Option<&mut DispatchRecord> {
        self.dispatches.get_mut(number)
    }

    pub fn remove_dispatch(&mut self, number: &str) -> Option<DispatchRecord> {
        self.dispatches.shift_remove(number)
    }

    pub fn insert_callout(&mut self, record: CalloutRecord) {
        self.callouts.insert(record.id.clone(), record);
    }

    pub fn callout(&self, id: &str) -> Option<&CalloutRecord> {
        self.callouts.get(id)
    }

    pub fn remove_callout(&mut self, id: &str) -> Option<CalloutRecord> {
        self.callouts.shift_remove(id)
    }

    /// Resolves an interaction target to the record it currently points at.
    ///
    /// A notice handle may belong to a pre-alert, a call-out, or a dispatch
    /// that took the notice over when it was merged.
    pub fn locate(&self, target: &RecordRef) -> Option<Located> {
        match target {
            RecordRef::Dispatch(number) => self
                .dispatches
                .contains_key(number)
                .then(|| Located::Dispatch(number.clone())),
            RecordRef::Notice(handle) => {
                if self.pre_alerts.contains_key(handle) {
                    Some(Located::PreAlert(handle.clone()))
                } else if self.callouts.contains_key(handle) {
                    Some(Located::Callout(handle.clone()))
                } else {
                    self.dispatches
                        .values()
                        .find(|d| d.notice.as_deref() == Some(handle.as_str()))
                        .map(|d| Located::Dispatch(d.dispatch_number.clone()))
                }
            }
        }
    }

    pub fn rsvp_mut(&mut self, located: &Located) -> Option<&mut RsvpState> {
        match located {
            Located::PreAlert(id) => self.pre_alerts.get_mut(id).map(|p| &mut p.rsvp),
            Located::Dispatch(number) => self.dispatches.get_mut(number).map(|d| &mut d.rsvp),
            Located::Callout(id) => self.callouts.get_mut(id).map(|c| &mut c.rsvp),
        }
    }

    pub fn len(&self) -> usize {
        self.pre_alerts.len() + self.dispatches.len() + self.callouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A record found in the store, by its primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    PreAlert(NoticeHandle),
    Dispatch(String),
    Callout(NoticeHandle),
}
