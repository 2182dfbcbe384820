//! Device-side orchestration of the access approval flow.
//!
//! The requesting device drives a [`RequestClient`]; the partner device uses
//! an [`ApproverClient`]. Both talk to the state machine through an
//! [`AccessApi`], which is either the HTTP relay or an in-process machine.

pub mod api;
pub mod approver;
pub mod http;
pub mod requester;
pub mod signal;

#[cfg(test)]
mod testing;

pub use api::{AccessApi, LocalAccessApi};
pub use approver::{ApprovalOutcome, ApproverClient};
pub use http::HttpAccessApi;
pub use requester::RequestClient;
pub use signal::{PollTimer, PushSignal, ResolutionSignal};
