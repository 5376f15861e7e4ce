//! Group invitation manager.
//!
//! This module is the entry point for applications. It ties the role
//! engines to storage and exposes the operations a UI and a sync layer
//! need.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            GroupInvitationManager            │
//! │  (local actions, transport hooks, listing)   │
//! └──────────────┬─────────────────┬─────────────┘
//!                │                 │
//!        ┌───────▼───────┐  ┌──────▼───────┐
//!        │    router     │  │   deletion   │
//!        │ (role lookup) │  │ (per session)│
//!        └───────┬───────┘  └──────────────┘
//!                │
//!   ┌────────────┼──────────────┐
//!   ▼            ▼              ▼
//! Creator     Invitee         Peer
//! engine      engine          engine
//! ```
//!
//! Each public operation runs in one storage transaction. Events raised
//! during the operation reach [`EventListener`]s only after it commits.

mod deletion;
#[allow(clippy::module_inception)]
mod manager;
mod router;
pub mod types;

pub use manager::GroupInvitationManager;
pub use types::{
    DeletionResult, EventListener, GroupInvitationItem, InvitationEvent, InvitationMessage,
    InvitationRequest, InvitationResponse,
};
