//! Wire-facing models for the Questlog backend service.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The signed-in user, as reported by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Metadata attached to an active session.
///
/// The token is wrapped in `SecretString` and never serialized back out.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionMeta {
    pub id: Uuid,
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// A full session payload from the session read.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    pub identity: Identity,
    #[serde(rename = "session_meta")]
    pub meta: SessionMeta,
}

/// Usage snapshot for an authenticated user.
///
/// The gate only reads `character_generated`; the counters ride along for
/// other consumers of the same endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub character_generated: bool,
    #[serde(default)]
    pub quests_created: u32,
    #[serde(default)]
    pub quests_completed: u32,
    #[serde(default)]
    pub logins: u32,
}

/// Character archetype chosen during onboarding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Warrior,
    Mage,
    Ranger,
    Bard,
}

impl Default for CharacterClass {
    fn default() -> Self {
        Self::Warrior
    }
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Warrior => "warrior",
            Self::Mage => "mage",
            Self::Ranger => "ranger",
            Self::Bard => "bard",
        };
        write!(f, "{s}")
    }
}

/// Derived character profile, generated once onboarding completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub user_id: Uuid,
    pub character_name: String,
    pub class: CharacterClass,
    pub level: u32,
    pub xp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Create a fresh level-1 profile for a newly onboarded user.
    pub fn new(user_id: Uuid, character_name: impl Into<String>, class: CharacterClass) -> Self {
        Self {
            user_id,
            character_name: character_name.into(),
            class,
            level: 1,
            xp: 0,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }
}
