//! Async data cache primitives.
//!
//! A `GatedQuery` is a key-addressed slot for one asynchronous read. Its
//! fetch dispatches only while the enabling predicate holds, concurrent
//! subscribers share a single in-flight request, and resolutions that lose a
//! race (disable, invalidate, supersede) are discarded instead of applied.
//! The `QueryCache` registry exposes invalidation by key, the only mutation
//! contract other parts of the app rely on.

pub mod query;
pub mod registry;

pub use query::{GatedQuery, QueryState};
pub use registry::{Invalidate, QueryCache, QueryKey};
