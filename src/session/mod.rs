//! Session probe.
//!
//! Owns the authentication state for the whole client and exposes the
//! documented read/command contract: `state`/`subscribe` for reads,
//! `refetch` and `sign_out` for commands. Everything downstream treats the
//! published `SessionState` as read-only.

pub mod probe;

pub use probe::{SessionProbe, SessionState};
