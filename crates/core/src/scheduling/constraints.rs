use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::TimeSlot;

/// One declarative restriction on candidate slots.
///
/// The filtering variants are checked against the slot start in the user's
/// timezone. `Deadline`, `MustEndBefore`, and `ReferenceEvent` are metadata
/// carried for deadline-anchored searches; they shape the search window
/// upstream and never filter slots here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotConstraint {
    TimeRange { start_hour: u32, end_hour: u32 },
    NotBefore { hour: u32 },
    NotAfter { hour: u32 },
    WeekdaysOnly,
    WeekendsOnly,
    ExcludedDays { days: Vec<Weekday> },
    Deadline { at: DateTime<Utc> },
    MustEndBefore { at: DateTime<Utc> },
    ReferenceEvent { summary: String },
}

impl SlotConstraint {
    fn kind(&self) -> u8 {
        match self {
            Self::TimeRange { .. } => 0,
            Self::NotBefore { .. } => 1,
            Self::NotAfter { .. } => 2,
            Self::WeekdaysOnly => 3,
            Self::WeekendsOnly => 4,
            Self::ExcludedDays { .. } => 5,
            Self::Deadline { .. } => 6,
            Self::MustEndBefore { .. } => 7,
            Self::ReferenceEvent { .. } => 8,
        }
    }
}

/// A set of constraints with at most one entry per constraint kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: Vec<SlotConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a constraint, replacing any existing one of the same kind.
    /// Excluded-day sets are merged instead of replaced.
    pub fn insert(&mut self, constraint: SlotConstraint) {
        if let SlotConstraint::ExcludedDays { days: new_days } = &constraint {
            if let Some(SlotConstraint::ExcludedDays { days }) = self
                .constraints
                .iter_mut()
                .find(|existing| matches!(existing, SlotConstraint::ExcludedDays { .. }))
            {
                for day in new_days {
                    if !days.contains(day) {
                        days.push(*day);
                    }
                }
                return;
            }
        }

        self.constraints.retain(|existing| existing.kind() != constraint.kind());
        self.constraints.push(constraint);
    }

    pub fn with(mut self, constraint: SlotConstraint) -> Self {
        self.insert(constraint);
        self
    }

    /// Fold another set into this one, later entries winning per kind.
    pub fn merge(&mut self, other: ConstraintSet) {
        for constraint in other.constraints {
            self.insert(constraint);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotConstraint> {
        self.constraints.iter()
    }

    pub fn weekends_only(&self) -> bool {
        self.constraints.iter().any(|c| matches!(c, SlotConstraint::WeekendsOnly))
    }

    pub fn must_end_before(&self) -> Option<DateTime<Utc>> {
        self.constraints.iter().find_map(|c| match c {
            SlotConstraint::MustEndBefore { at } => Some(*at),
            _ => None,
        })
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.constraints.iter().find_map(|c| match c {
            SlotConstraint::Deadline { at } => Some(*at),
            _ => None,
        })
    }

    pub fn time_range(&self) -> Option<(u32, u32)> {
        self.constraints.iter().find_map(|c| match c {
            SlotConstraint::TimeRange { start_hour, end_hour } => Some((*start_hour, *end_hour)),
            _ => None,
        })
    }

    pub fn reference_event(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            SlotConstraint::ReferenceEvent { summary } => Some(summary.as_str()),
            _ => None,
        })
    }

    /// Keep only the slots satisfying every constraint. Order-preserving and
    /// monotonic: the result is always a subset of the input.
    pub fn apply(&self, slots: &[TimeSlot], tz: Tz) -> Vec<TimeSlot> {
        slots.iter().filter(|slot| self.admits(slot, tz)).copied().collect()
    }

    fn admits(&self, slot: &TimeSlot, tz: Tz) -> bool {
        let local_start = slot.start.with_timezone(&tz);
        let hour = local_start.hour();
        let weekday = local_start.weekday();

        self.constraints.iter().all(|constraint| match constraint {
            SlotConstraint::TimeRange { start_hour, end_hour } => {
                hour_in_range(hour, *start_hour, *end_hour)
            }
            SlotConstraint::NotBefore { hour: bound } => hour >= *bound,
            SlotConstraint::NotAfter { hour: bound } => hour < *bound,
            SlotConstraint::WeekdaysOnly => weekday.num_days_from_monday() < 5,
            SlotConstraint::WeekendsOnly => weekday.num_days_from_monday() >= 5,
            SlotConstraint::ExcludedDays { days } => !days.contains(&weekday),
            SlotConstraint::Deadline { .. }
            | SlotConstraint::MustEndBefore { .. }
            | SlotConstraint::ReferenceEvent { .. } => true,
        })
    }
}

/// Half-open hour-of-day check. Ranges may wrap midnight: (22, 6) admits
/// 22:00 through 05:59.
fn hour_in_range(hour: u32, start: u32, end: u32) -> bool {
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}
