//! Shared timed-item fields and store identity primitives.
//!
//! # Responsibility
//! - Define the field set common to projects and tasks.
//! - Define the transient/persistent store identity convention.
//!
//! # Invariants
//! - A store identity is either `TRANSIENT_ID` or a positive integer
//!   assigned by the external store; it never moves back to transient.
//! - Zero min/max duration estimates default to the likely estimate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Identity assigned by the external store once an insert is accepted.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type StoreId = i64;

/// Placeholder identity held by an entity before the store accepts it.
pub const TRANSIENT_ID: StoreId = -1;

/// Returns whether a store identity has been assigned by the store.
pub fn is_persisted(id: StoreId) -> bool {
    id > 0
}

/// Current wall-clock time as epoch milliseconds, 0 if the clock is
/// before the epoch.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Field validation failures, detected before any mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Name is empty after trimming.
    BlankName,
    /// End date is earlier than start date.
    EndBeforeStart { start: i64, end: i64 },
    /// Duration estimates are not ordered `min <= likely <= max`.
    DurationOrder { min: i32, likely: i32, max: i32 },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::EndBeforeStart { start, end } => {
                write!(f, "end date {end} is before start date {start}")
            }
            Self::DurationOrder { min, likely, max } => write!(
                f,
                "duration estimates must satisfy min <= likely <= max, got {min}/{likely}/{max}"
            ),
        }
    }
}

impl Error for ItemValidationError {}

/// Field set shared by the project record and every task record.
///
/// Dates are epoch milliseconds; duration estimates are whole days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    /// Display name, unique within the owning container.
    pub name: String,
    /// Scheduled start, epoch ms.
    pub start_date: i64,
    /// Optional scheduled end, epoch ms. Must be >= `start_date` when set.
    pub end_date: Option<i64>,
    /// Free-form description.
    pub description: String,
    /// Creation timestamp, epoch ms. Authoritative value comes from the store.
    pub created_at: i64,
    /// Username of the creator, when known.
    pub creator: Option<String>,
    /// Usernames assigned to work on the item.
    pub workers: BTreeSet<String>,
    /// Most likely duration estimate, days.
    pub likely_duration: i32,
    /// Minimum duration estimate, days.
    pub min_duration: i32,
    /// Maximum duration estimate, days.
    pub max_duration: i32,
}

impl ItemFields {
    /// Creates a field set with estimate defaulting applied.
    ///
    /// Zero `min_duration`/`max_duration` are taken to mean "unspecified"
    /// and default to `likely_duration`.
    pub fn new(
        name: impl Into<String>,
        start_date: i64,
        end_date: Option<i64>,
        likely_duration: i32,
    ) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            description: String::new(),
            created_at: 0,
            creator: None,
            workers: BTreeSet::new(),
            likely_duration,
            min_duration: likely_duration,
            max_duration: likely_duration,
        }
    }

    /// Sets the description, builder style.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets min/max estimates, builder style. Zero means "use likely".
    pub fn with_estimates(mut self, min_duration: i32, max_duration: i32) -> Self {
        self.min_duration = if min_duration == 0 {
            self.likely_duration
        } else {
            min_duration
        };
        self.max_duration = if max_duration == 0 {
            self.likely_duration
        } else {
            max_duration
        };
        self
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::BlankName);
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ItemValidationError::EndBeforeStart {
                    start: self.start_date,
                    end,
                });
            }
        }
        if self.min_duration > self.likely_duration || self.likely_duration > self.max_duration {
            return Err(ItemValidationError::DurationOrder {
                min: self.min_duration,
                likely: self.likely_duration,
                max: self.max_duration,
            });
        }
        Ok(())
    }

    /// Latest projected end: explicit end date, or start plus max estimate.
    pub fn projected_end(&self) -> i64 {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        let estimate = self.start_date + i64::from(self.max_duration) * DAY_MS;
        match self.end_date {
            Some(end) if end >= estimate => end,
            _ => estimate,
        }
    }
}
