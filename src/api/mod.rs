//! Backend service contract and implementations.
//!
//! The whole client reaches the CRUD/auth service through the single
//! `Backend` trait; probes never talk to a transport directly.

pub mod http;
pub mod memory;
pub mod model;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use model::{
    CharacterClass, Identity, ProfileRecord, SessionMeta, SessionPayload, UsageSnapshot,
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiError;

/// Client-side contract for the Questlog CRUD/auth service.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the current session. `None` means no active session.
    async fn fetch_session(&self) -> Result<Option<SessionPayload>, ApiError>;

    /// Read the usage snapshot for an authenticated user.
    async fn fetch_usage(&self, user_id: Uuid) -> Result<UsageSnapshot, ApiError>;

    /// Read the derived character profile. `None` if no profile exists.
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, ApiError>;

    /// Best-effort sign-out of the current session.
    async fn sign_out(&self) -> Result<(), ApiError>;
}
