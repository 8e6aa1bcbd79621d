//! Onboarding gate.
//!
//! The decision function that turns the three probes' settled states (plus
//! an optional one-shot bypass) into exactly one render decision. Pure by
//! construction: probes commit state, the gate only reads it.

pub mod bypass;
pub mod decision;

pub use bypass::TransientBypass;
pub use decision::{decide, GateInputs, RouteDecision};
