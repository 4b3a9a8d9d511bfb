pub mod correlator;
pub mod engine;
pub mod expiry;
pub mod rsvp_tracker;
