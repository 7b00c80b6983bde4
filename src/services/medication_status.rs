use chrono::NaiveDateTime;
use serde::Serialize;

/// Lifecycle status of a medication, derived from its date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicationStatus {
    /// No date range: taken on a regular, open-ended basis.
    Regular,
    Ongoing,
    Scheduled,
    Completed,
}

impl MedicationStatus {
    /// Whether a medication in this status is currently being given.
    pub fn is_active(&self) -> bool {
        matches!(self, MedicationStatus::Regular | MedicationStatus::Ongoing)
    }
}

/// Derive the status at `now`. Comparisons are strict: a course whose end
/// equals `now` is still ongoing when it has a start date, and completed when
/// it only has an end date.
pub fn status(
    now: NaiveDateTime,
    start_date: Option<NaiveDateTime>,
    end_date: Option<NaiveDateTime>,
) -> MedicationStatus {
    match (start_date, end_date) {
        (None, None) => MedicationStatus::Regular,
        (None, Some(end)) => {
            if now < end {
                MedicationStatus::Ongoing
            } else {
                MedicationStatus::Completed
            }
        }
        (Some(start), Some(end)) => {
            if now > end {
                MedicationStatus::Completed
            } else if now < start {
                MedicationStatus::Scheduled
            } else {
                MedicationStatus::Ongoing
            }
        }
        (Some(start), None) => {
            if now < start {
                MedicationStatus::Scheduled
            } else {
                MedicationStatus::Ongoing
            }
        }
    }
}
