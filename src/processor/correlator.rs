use std::time::Duration;
use tracing::{debug, info};

use crate::models::record::{
    ActiveStatus, DispatchRecord, NoticeHandle, PreAlertStatus, RecordKey,
};
use crate::models::rsvp::RsvpState;
use crate::parser::ParsedDispatch;
use crate::processor::expiry::ExpiryManager;
use crate::store::RecordStore;

/// Decides whether a pre-alert keyword and a dispatch keyword describe the same incident.
pub trait KeywordMatcher: Send + Sync {
    fn matches(&self, pre_alert: &str, dispatch: &str) -> bool;
}

/// Case-insensitive substring containment in either direction.
///
/// Absorbs the paraphrasing between the two feeds ("Brand" vs
/// "Brandmeldeanlage") but also matches short unrelated substrings.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainmentMatcher;

impl KeywordMatcher for ContainmentMatcher {
    fn matches(&self, pre_alert: &str, dispatch: &str) -> bool {
        if pre_alert.is_empty() || dispatch.is_empty() {
            return false;
        }
        let a = pre_alert.to_lowercase();
        let b = dispatch.to_lowercase();
        a.contains(&b) || b.contains(&a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Another message for a dispatch that is already tracked.
    FollowUp { vehicle_added: bool },
    Merged(NoticeHandle),
    CreatedFresh,
}

pub struct Correlator {
    matcher: Box<dyn KeywordMatcher>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(Box::new(ContainmentMatcher))
    }
}

impl Correlator {
    pub fn new(matcher: Box<dyn KeywordMatcher>) -> Self {
        Self { matcher }
    }

    /// First pending pre-alert with the same postal code and a matching keyword.
    pub fn find_match<'a>(
        &self,
        store: &'a RecordStore,
        dispatch: &ParsedDispatch,
    ) -> Option<&'a NoticeHandle> {
        store
            .pending_pre_alerts()
            .find(|p| {
                p.postal_code == dispatch.postal_code
                    && self.matcher.matches(&p.keyword, &dispatch.keyword)
            })
            .map(|p| &p.id)
    }

    /// Folds a parsed dispatch into the store.
    ///
    /// Runs start to finish without awaiting, so no other event can observe a
    /// half-merged state.
    pub fn on_dispatch_parsed(
        &self,
        store: &mut RecordStore,
        expiry: &mut ExpiryManager,
        dispatch: ParsedDispatch,
        retention: Duration,
    ) -> MergeOutcome {
        if let Some(existing) = store.dispatch_mut(&dispatch.dispatch_number) {
            existing.alarm_code = dispatch.alarm_code;
            existing.keyword = dispatch.keyword;
            existing.postal_code = dispatch.postal_code;
            let vehicle_added = match dispatch.vehicle.as_deref() {
                Some(vehicle) => existing.add_vehicle(vehicle),
                None => false,
            };
            debug!(
                "Follow-up for dispatch #{} (new vehicle: {})",
                existing.dispatch_number, vehicle_added
            );
            return MergeOutcome::FollowUp { vehicle_added };
        }

        let matched = self.find_match(store, &dispatch).cloned();
        let (rsvp, notice, outcome) = match matched.and_then(|id| store.remove_pre_alert(&id)) {
            Some(mut pre_alert) => {
                expiry.cancel(&RecordKey::PreAlert(pre_alert.id.clone()));
                pre_alert.status = PreAlertStatus::Matched;
                info!(
                    "Dispatch #{} matched pre-alert {} ({} / {}), pre-alert now {:?}",
                    dispatch.dispatch_number,
                    pre_alert.id,
                    pre_alert.keyword,
                    pre_alert.postal_code,
                    pre_alert.status
                );
                if !pre_alert.rsvp.is_empty() {
                    debug!(
                        "Carrying {} responses over to dispatch #{}",
                        pre_alert.rsvp.len(),
                        dispatch.dispatch_number
                    );
                }
                let id = pre_alert.id;
                (pre_alert.rsvp, Some(id.clone()), MergeOutcome::Merged(id))
            }
            None => {
                info!(
                    "Dispatch #{} has no pending pre-alert, tracking it fresh",
                    dispatch.dispatch_number
                );
                (RsvpState::new(), None, MergeOutcome::CreatedFresh)
            }
        };

        let mut record = DispatchRecord {
            dispatch_number: dispatch.dispatch_number,
            alarm_code: dispatch.alarm_code,
            keyword: dispatch.keyword,
            postal_code: dispatch.postal_code,
            vehicles: Vec::new(),
            rsvp,
            merged_from: notice.clone(),
            notice,
            status: ActiveStatus::Active,
        };
        if let Some(vehicle) = dispatch.vehicle.as_deref() {
            record.add_vehicle(vehicle);
        }

        let key = RecordKey::Dispatch(record.dispatch_number.clone());
        store.insert_dispatch(record);
        expiry.schedule(key, retention);

        outcome
    }
}
