use serde::{Deserialize, Serialize};

use crate::domain::calendar::TimeSlot;
use crate::scheduling::constraints::ConstraintSet;

/// Everything the scheduler has learned so far about the meeting being
/// negotiated. Accumulated across turns; a turn may fill in any subset of
/// fields without clobbering the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequest {
    pub duration_minutes: Option<i64>,
    pub preferred_time: Option<String>,
    pub preferred_date: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub constraints: ConstraintSet,
    #[serde(default)]
    pub available_slots: Vec<TimeSlot>,
    pub selected_slot: Option<TimeSlot>,
}

/// Set-if-provided update for a [`MeetingRequest`]; absent fields leave the
/// current value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeetingRequestPatch {
    pub duration_minutes: Option<i64>,
    pub preferred_time: Option<String>,
    pub preferred_date: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub constraints: Option<ConstraintSet>,
    pub available_slots: Option<Vec<TimeSlot>>,
    pub selected_slot: Option<TimeSlot>,
}

impl MeetingRequest {
    pub fn apply(&mut self, patch: MeetingRequestPatch) {
        if let Some(duration_minutes) = patch.duration_minutes {
            self.duration_minutes = Some(duration_minutes);
        }
        if let Some(preferred_time) = patch.preferred_time {
            self.preferred_time = Some(preferred_time);
        }
        if let Some(preferred_date) = patch.preferred_date {
            self.preferred_date = Some(preferred_date);
        }
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(attendees) = patch.attendees {
            self.attendees = attendees;
        }
        if let Some(constraints) = patch.constraints {
            self.constraints = constraints;
        }
        if let Some(available_slots) = patch.available_slots {
            self.available_slots = available_slots;
        }
        if let Some(selected_slot) = patch.selected_slot {
            self.selected_slot = Some(selected_slot);
        }
    }

    /// A request is complete enough to search once it has a duration and any
    /// time signal (preference text, date, or already-found slots).
    pub fn is_complete(&self) -> bool {
        self.duration_minutes.is_some()
            && (self.preferred_time.is_some()
                || self.preferred_date.is_some()
                || !self.available_slots.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::calendar::TimeSlot;

    use super::{MeetingRequest, MeetingRequestPatch};

    #[test]
    fn patch_only_overwrites_provided_fields() {
        let mut request = MeetingRequest {
            duration_minutes: Some(30),
            preferred_time: Some("next tuesday".to_string()),
            ..MeetingRequest::default()
        };

        request.apply(MeetingRequestPatch {
            title: Some("Quarterly sync".to_string()),
            ..MeetingRequestPatch::default()
        });

        assert_eq!(request.duration_minutes, Some(30));
        assert_eq!(request.preferred_time.as_deref(), Some("next tuesday"));
        assert_eq!(request.title.as_deref(), Some("Quarterly sync"));
    }

    #[test]
    fn completeness_requires_duration_and_a_time_signal() {
        let mut request = MeetingRequest::default();
        assert!(!request.is_complete());

        request.apply(MeetingRequestPatch {
            duration_minutes: Some(45),
            ..MeetingRequestPatch::default()
        });
        assert!(!request.is_complete());

        let start = Utc.with_ymd_and_hms(2026, 8, 11, 14, 0, 0).unwrap();
        request.apply(MeetingRequestPatch {
            available_slots: Some(vec![TimeSlot::starting_at(start, 45).unwrap()]),
            ..MeetingRequestPatch::default()
        });
        assert!(request.is_complete());
    }
}
