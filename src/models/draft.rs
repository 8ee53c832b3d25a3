use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::reservation::TimeSlot;
use super::venue::{ServiceId, VenueId};

/// In-progress booking held by one wizard session. Every field may still be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingDraft {
    pub venue_id: VenueId,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub guest_count: Option<u32>,
    pub service_ids: BTreeSet<ServiceId>,
    pub special_requests: String,
}

impl BookingDraft {
    pub fn new(venue_id: VenueId) -> Self {
        Self {
            venue_id,
            ..Default::default()
        }
    }

    /// Requested interval, `None` if either bound is missing or the bounds are inverted.
    pub fn slot(&self) -> Option<TimeSlot> {
        TimeSlot::new(self.start_time?, self.end_time?)
    }

    pub fn special_requests(&self) -> Option<String> {
        let trimmed = self.special_requests.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
