use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Health Record / Food Models
// ============================================================================

pub const RECORD_KINDS: &[&str] = &["vet_visit", "vaccination", "weight", "other"];

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: String,
    pub pet_id: String,
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub recorded_at: NaiveDateTime,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHealthRecord {
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub recorded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    pub pet_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub portion: Option<String>,
    pub times_per_day: Option<i64>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFood {
    pub name: String,
    pub brand: Option<String>,
    pub portion: Option<String>,
    pub times_per_day: Option<i64>,
    pub notes: Option<String>,
}
