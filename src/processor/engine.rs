use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ExpiryWindows;
use crate::error::EngineError;
use crate::models::message::{CalloutRequest, RsvpPress};
use crate::models::record::{
    ActiveStatus, CalloutRecord, ChannelClass, NoticeHandle, PreAlertRecord, PreAlertStatus,
    RecordKey, RecordRef,
};
use crate::models::rsvp::{Choice, RsvpState};
use crate::notice::{AckOutcome, Acknowledgement, CloseReason, NoticeRenderer, NoticeView};
use crate::parser::TextParser;
use crate::processor::correlator::{Correlator, MergeOutcome};
use crate::processor::expiry::{Expired, ExpiryManager};
use crate::processor::rsvp_tracker;
use crate::store::{Located, RecordStore};

/// Inbound events, in the order the feed consumer received them.
#[derive(Debug)]
pub enum EngineEvent {
    Text { channel: ChannelClass, text: String },
    Rsvp(RsvpPress),
    Callout(CalloutRequest),
}

/// Owns all tracking state and processes one event at a time.
///
/// Store mutations never straddle an `.await`: each handler reads and writes
/// the store synchronously and only then talks to the renderer. Render
/// failures are logged and leave the store as it is, so the next update of
/// the same record tries again.
pub struct Engine<R: NoticeRenderer> {
    store: RecordStore,
    expiry: ExpiryManager,
    expired_rx: mpsc::UnboundedReceiver<Expired>,
    correlator: Correlator,
    parser: TextParser,
    renderer: R,
    windows: ExpiryWindows,
}

impl<R: NoticeRenderer> Engine<R> {
    pub fn new(
        renderer: R,
        parser: TextParser,
        correlator: Correlator,
        windows: ExpiryWindows,
    ) -> Self {
        let (expiry, expired_rx) = ExpiryManager::new();
        Self {
            store: RecordStore::new(),
            expiry,
            expired_rx,
            correlator,
            parser,
            renderer,
            windows,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Processes inbound events and fired timers until the event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!("Correlation engine started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(fired) = self.expired_rx.recv() => self.on_expired(fired).await,
            }
        }
        if self.store.is_empty() {
            info!("Event channel closed, nothing tracked");
        } else {
            info!(
                "Event channel closed, dropping {} tracked records and {} timers",
                self.store.len(),
                self.expiry.pending()
            );
        }
    }

    pub async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Text { channel, text } => {
                self.on_text(channel, &text).await;
            }
            EngineEvent::Rsvp(press) => self.on_rsvp_press(press).await,
            EngineEvent::Callout(request) => {
                self.on_callout(request).await;
            }
        }
    }

    pub async fn on_text(&mut self, channel: ChannelClass, text: &str) {
        match channel {
            ChannelClass::PreAlertFeed => {
                self.on_pre_alert_text(text).await;
            }
            ChannelClass::DispatchFeed => {
                self.on_dispatch_text(text).await;
            }
        }
    }

    /// Posts and tracks a pre-alert. Returns the notice handle it was posted under.
    pub async fn on_pre_alert_text(&mut self, text: &str) -> Option<NoticeHandle> {
        let Some(parsed) = self.parser.parse_pre_alert(text) else {
            debug!("Ignoring pre-alert feed text without keyword/postal code: {:?}", text);
            return None;
        };

        let mut record = PreAlertRecord {
            id: NoticeHandle::new(),
            keyword: parsed.keyword,
            postal_code: parsed.postal_code,
            time_text: parsed.time_text,
            description: parsed.description,
            received_at: Local::now(),
            rsvp: RsvpState::new(),
            status: PreAlertStatus::Pending,
        };

        let handle = match self.renderer.render_notice(&NoticeView::from(&record)).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Could not post pre-alert {} / {}: {}", record.keyword, record.postal_code, e);
                return None;
            }
        };

        info!(
            "Pre-alert received: {} / {} (notice {})",
            record.keyword, record.postal_code, handle
        );
        record.id = handle.clone();
        self.store.insert_pre_alert(record);
        self.expiry
            .schedule(RecordKey::PreAlert(handle.clone()), self.windows.pre_alert);
        Some(handle)
    }

    pub async fn on_dispatch_text(&mut self, text: &str) -> Option<MergeOutcome> {
        let Some(parsed) = self.parser.parse_dispatch(text) else {
            debug!("Ignoring dispatch feed text without dispatch fields: {:?}", text);
            return None;
        };

        let number = parsed.dispatch_number.clone();
        let outcome = self.correlator.on_dispatch_parsed(
            &mut self.store,
            &mut self.expiry,
            parsed,
            self.windows.dispatch,
        );
        match &outcome {
            MergeOutcome::FollowUp { vehicle_added } => {
                debug!("Follow-up for dispatch #{} (new vehicle: {})", number, vehicle_added)
            }
            MergeOutcome::Merged(notice) => {
                debug!("Dispatch #{} continues notice {}", number, notice)
            }
            MergeOutcome::CreatedFresh => debug!("Dispatch #{} has no pre-alert", number),
        }
        self.refresh_dispatch(&number).await;
        Some(outcome)
    }

    pub async fn on_callout(&mut self, request: CalloutRequest) -> Option<NoticeHandle> {
        let mut record = CalloutRecord {
            id: NoticeHandle::new(),
            alarm_type: request.alarm_type,
            keyword: request.keyword,
            address: request.address,
            info: request.info,
            rsvp: RsvpState::new(),
            status: ActiveStatus::Active,
        };

        let handle = match self.renderer.render_notice(&NoticeView::from(&record)).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Could not post call-out {}: {}", record.keyword, e);
                return None;
            }
        };

        info!("Call-out {} posted: {} at {}", handle, record.keyword, record.address);
        record.id = handle.clone();
        self.store.insert_callout(record);
        self.expiry
            .schedule(RecordKey::Callout(handle.clone()), self.windows.callout);
        Some(handle)
    }

    /// Applies a response and re-renders the affected notice.
    pub async fn on_interaction(
        &mut self,
        target: &RecordRef,
        responder: &str,
        choice: Choice,
    ) -> Result<RsvpState, EngineError> {
        let (located, state) =
            rsvp_tracker::set_response(&mut self.store, target, responder, choice)?;
        debug!(
            "{} answered {:?} on {} (coming {}, not coming {}, later {})",
            responder,
            choice,
            target,
            state.coming().len(),
            state.not_coming().len(),
            state.later().len()
        );

        match &located {
            Located::Dispatch(number) => self.refresh_dispatch(number).await,
            Located::PreAlert(id) => {
                if let Some(view) = self.store.pre_alert(id).map(NoticeView::from) {
                    self.push_update(id, &view).await;
                }
            }
            Located::Callout(id) => {
                if let Some(view) = self.store.callout(id).map(NoticeView::from) {
                    self.push_update(id, &view).await;
                }
            }
        }
        Ok(state)
    }

    async fn on_rsvp_press(&mut self, press: RsvpPress) {
        let Some((target, choice)) = press.target() else {
            debug!("Ignoring unrecognised button {:?}", press.custom_id);
            return;
        };

        let outcome = match self.on_interaction(&target, &press.responder_id, choice).await {
            Ok(_) => AckOutcome::Saved,
            Err(e) => {
                info!("Rejected response from {}: {}", press.responder_id, e);
                AckOutcome::NoLongerActive
            }
        };

        let ack = Acknowledgement {
            interaction_id: press.interaction_id,
            notice_id: press.notice_id,
            responder_id: press.responder_id,
            outcome,
        };
        if let Err(e) = self.renderer.acknowledge(&ack).await {
            warn!("Could not acknowledge interaction on notice {}: {}", ack.notice_id, e);
        }
    }

    pub async fn on_expired(&mut self, fired: Expired) {
        if !self.expiry.claim(&fired) {
            debug!("Ignoring superseded expiry for {}", fired.key);
            return;
        }

        match fired.key {
            RecordKey::PreAlert(id) => {
                let Some(mut record) = self.store.remove_pre_alert(&id) else {
                    return;
                };
                record.status = PreAlertStatus::Expired;
                info!("Pre-alert {} ({}) expired without dispatch details", id, record.keyword);
                let view = NoticeView::from(&record);
                if let Err(e) = self
                    .renderer
                    .close_notice(&id, &view, CloseReason::NoFurtherDetails)
                    .await
                {
                    warn!("Could not close notice {}: {}", id, e);
                }
            }
            RecordKey::Dispatch(number) => {
                if let Some(mut record) = self.store.remove_dispatch(&number) {
                    record.status = ActiveStatus::Expired;
                    info!(
                        "Dispatch #{} {:?} after retention window ({} responses dropped)",
                        number,
                        record.status,
                        record.rsvp.len()
                    );
                }
            }
            RecordKey::Callout(id) => {
                if let Some(mut record) = self.store.remove_callout(&id) {
                    record.status = ActiveStatus::Expired;
                    info!("Call-out {} {:?} after retention window", id, record.status);
                }
            }
        }
    }

    /// Re-renders a dispatch notice, posting it first if that never succeeded.
    async fn refresh_dispatch(&mut self, number: &str) {
        let Some(record) = self.store.dispatch(number) else {
            return;
        };
        let view = NoticeView::from(record);

        match record.notice.clone() {
            Some(handle) => self.push_update(&handle, &view).await,
            None => match self.renderer.render_notice(&view).await {
                Ok(handle) => {
                    info!("Dispatch #{} posted as notice {}", number, handle);
                    if let Some(record) = self.store.dispatch_mut(number) {
                        record.notice = Some(handle);
                    }
                }
                Err(e) => warn!("Could not post dispatch #{}: {}", number, e),
            },
        }
    }

    async fn push_update(&self, handle: &str, view: &NoticeView) {
        if let Err(e) = self.renderer.update_notice(handle, view).await {
            warn!("Could not update notice {}: {}", handle, e);
        }
    }
}
