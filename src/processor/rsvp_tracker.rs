use crate::error::EngineError;
use crate::models::record::RecordRef;
use crate::models::rsvp::{Choice, RsvpState};
use crate::store::{Located, RecordStore};

/// Records `responder`'s choice on the record `target` points at.
///
/// Lookup and mutation happen in one synchronous step. An unknown or expired
/// target is reported as [`EngineError::StaleReference`].
pub fn set_response(
    store: &mut RecordStore,
    target: &RecordRef,
    responder: &str,
    choice: Choice,
) -> Result<(Located, RsvpState), EngineError> {
    let located = store
        .locate(target)
        .ok_or_else(|| EngineError::StaleReference(target.to_string()))?;
    let rsvp = store
        .rsvp_mut(&located)
        .ok_or_else(|| EngineError::StaleReference(target.to_string()))?;
    rsvp.set(responder, choice);
    let snapshot = rsvp.clone();
    Ok((located, snapshot))
}
