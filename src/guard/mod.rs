//! Route guards.
//!
//! Thin consumers of the gate: each guard calls `decide` on a settled
//! snapshot and either renders the corresponding view or redirects. The
//! `Navigator` seam carries redirects and the history-entry-scoped bypass
//! payload.

pub mod guards;
pub mod navigator;

pub use guards::{GuardOutcome, RouteGuards, View};
pub use navigator::{HistoryEntry, InMemoryNavigator, Navigator};
