use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Permission Grant Models
// ============================================================================

/// Privilege level a user holds on a pet.
///
/// Variants are declared from least to most privileged so the derived `Ord`
/// matches OWNER > EDITOR > VIEWER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Viewer,
    Editor,
    Owner,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Viewer => "viewer",
            PermissionLevel::Editor => "editor",
            PermissionLevel::Owner => "owner",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission level: {0}")]
pub struct UnknownPermissionLevel(pub String);

impl FromStr for PermissionLevel {
    type Err = UnknownPermissionLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(PermissionLevel::Viewer),
            "editor" => Ok(PermissionLevel::Editor),
            "owner" => Ok(PermissionLevel::Owner),
            other => Err(UnknownPermissionLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: String,
    pub pet_id: String,
    pub user_id: String,
    pub level: PermissionLevel,
    pub granted_at: NaiveDateTime,
}

impl PermissionGrant {
    /// Build a fresh grant with a new id, stamped with the current time.
    pub fn new(pet_id: &str, user_id: &str, level: PermissionLevel) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pet_id: pet_id.to_string(),
            user_id: user_id.to_string(),
            level,
            granted_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.level == PermissionLevel::Owner
    }
}

/// Change notification emitted by a grant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantChange {
    Granted(PermissionGrant),
    LevelChanged(PermissionGrant),
    Revoked { pet_id: String, user_id: String },
}

impl GrantChange {
    /// The user whose access this change concerns.
    pub fn user_id(&self) -> &str {
        match self {
            GrantChange::Granted(g) | GrantChange::LevelChanged(g) => &g.user_id,
            GrantChange::Revoked { user_id, .. } => user_id,
        }
    }

    pub fn pet_id(&self) -> &str {
        match self {
            GrantChange::Granted(g) | GrantChange::LevelChanged(g) => &g.pet_id,
            GrantChange::Revoked { pet_id, .. } => pet_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GrantChange::Granted(_) => "granted",
            GrantChange::LevelChanged(_) => "level_changed",
            GrantChange::Revoked { .. } => "revoked",
        }
    }
}
