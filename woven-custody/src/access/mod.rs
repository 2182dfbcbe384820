//! Access request lifecycle.
//!
//! An [`AccessRequest`] moves `Pending → Approved | Denied | Expired` exactly
//! once. The [`AccessRequestMachine`] owns every transition; storage,
//! membership lookup and approver wake-up are injected seams.

pub mod directory;
pub mod error;
pub mod machine;
pub mod model;
pub mod notify;
pub mod store;

pub use directory::{StaticDirectory, VaultDirectory, VaultMembership, VaultMode};
pub use error::{RequestError, RequestResult};
pub use machine::AccessRequestMachine;
pub use model::{
    AccessRequest, ApproveAccessRequest, CreateAccessRequest, RequestId, RequestStatus, UserId,
};
pub use notify::{AccessEvent, BroadcastNotifier, Notifier, TracingNotifier};
pub use store::{MemoryRequestStore, NewAccessRequest, RequestStore, Resolution};
