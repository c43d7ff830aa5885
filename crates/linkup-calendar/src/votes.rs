//! Vote tallying and availability overlays.
//!
//! A user has at most one effective response per proposal. When a list
//! carries several responses from the same user, the one with the latest
//! `created_at` wins; equal timestamps fall back to list order, later entry
//! winning.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::CalendarError;
use crate::types::{ResponseKind, VoteFormData, VoteProposal, VoteResponse};

/// Response counts for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: usize,
    pub maybe: usize,
    pub no: usize,
    pub total: usize,
    /// `yes / total * 100`, or 0 when nobody has responded.
    pub yes_percentage: f64,
}

/// Count the responses recorded on `proposal`.
pub fn tally(proposal: &VoteProposal) -> VoteTally {
    let mut tally = VoteTally::default();

    for response in &proposal.vote_responses {
        match response.response {
            ResponseKind::Yes => tally.yes += 1,
            ResponseKind::Maybe => tally.maybe += 1,
            ResponseKind::No => tally.no += 1,
        }
    }

    tally.total = proposal.vote_responses.len();
    tally.yes_percentage = if tally.total > 0 {
        tally.yes as f64 / tally.total as f64 * 100.0
    } else {
        0.0
    };
    tally
}

/// The effective response entry of `user_id`, if any.
pub fn latest_response<'a>(
    responses: &'a [VoteResponse],
    user_id: &str,
) -> Option<&'a VoteResponse> {
    responses
        .iter()
        .filter(|r| r.user_id == user_id)
        .fold(None, |best: Option<&VoteResponse>, r| match best {
            Some(b) if b.created_at > r.created_at => Some(b),
            _ => Some(r),
        })
}

/// What `user_id` answered on `proposal`, if anything.
pub fn current_user_response(proposal: &VoteProposal, user_id: &str) -> Option<ResponseKind> {
    latest_response(&proposal.vote_responses, user_id).map(|r| r.response)
}

/// Collapse `responses` to one entry per user.
///
/// Surviving entries keep their relative order.
pub fn normalize_responses(responses: Vec<VoteResponse>) -> Vec<VoteResponse> {
    let mut winner: HashMap<&str, usize> = HashMap::new();
    for (idx, r) in responses.iter().enumerate() {
        match winner.get(r.user_id.as_str()) {
            Some(&prev) if responses[prev].created_at > r.created_at => {}
            _ => {
                winner.insert(r.user_id.as_str(), idx);
            }
        }
    }

    let keep: Vec<bool> = responses
        .iter()
        .enumerate()
        .map(|(idx, r)| winner.get(r.user_id.as_str()) == Some(&idx))
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        tracing::debug!("Dropped {} superseded vote responses", dropped);
    }

    responses
        .into_iter()
        .zip(keep)
        .filter_map(|(r, keep)| keep.then_some(r))
        .collect()
}

impl VoteProposal {
    /// Record `response`, replacing whatever its user answered before.
    pub fn record_response(&mut self, response: VoteResponse) -> Result<(), CalendarError> {
        if !self.is_active() {
            return Err(CalendarError::VoteClosed(self.id.clone()));
        }
        self.vote_responses.retain(|r| r.user_id != response.user_id);
        self.vote_responses.push(response);
        Ok(())
    }

    /// Drop superseded duplicate responses.
    pub fn normalize(&mut self) {
        let responses = std::mem::take(&mut self.vote_responses);
        self.vote_responses = normalize_responses(responses);
    }
}

/// A votable time marker on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub timestamp: DateTime<Utc>,
    pub is_voted_by_viewer: bool,
}

/// Proposals still open for responses.
pub fn active_proposals<'a, I>(proposals: I) -> impl Iterator<Item = &'a VoteProposal>
where
    I: IntoIterator<Item = &'a VoteProposal>,
{
    proposals.into_iter().filter(|p| p.is_active())
}

/// One slot per proposal at its proposed start.
///
/// Callers pass active proposals. Slots sharing a start time are kept apart.
pub fn build_availability_overlay<'a, I>(proposals: I, viewer_id: &str) -> Vec<AvailabilitySlot>
where
    I: IntoIterator<Item = &'a VoteProposal>,
{
    proposals
        .into_iter()
        .map(|p| AvailabilitySlot {
            timestamp: p.proposed_start,
            is_voted_by_viewer: current_user_response(p, viewer_id).is_some(),
        })
        .collect()
}

/// True when both instants share year, month, day and hour in `a`'s zone.
pub fn same_hour<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    a.date_naive() == b.date_naive() && a.hour() == b.hour()
}

/// Whether `slot` falls inside the calendar hour containing `hour`.
pub fn is_slot_in_hour<Tz: TimeZone>(slot: &AvailabilitySlot, hour: &DateTime<Tz>) -> bool {
    let local = slot.timestamp.with_timezone(&hour.timezone());
    same_hour(&local, hour)
}

/// Whether any slot lies inside the calendar hour containing `hour`.
pub fn is_hour_available<Tz: TimeZone>(slots: &[AvailabilitySlot], hour: &DateTime<Tz>) -> bool {
    slots.iter().any(|s| is_slot_in_hour(s, hour))
}

/// Whether the viewer has voted on any slot inside that hour.
pub fn is_slot_voted_in_hour<Tz: TimeZone>(
    slots: &[AvailabilitySlot],
    hour: &DateTime<Tz>,
) -> bool {
    slots
        .iter()
        .any(|s| s.is_voted_by_viewer && is_slot_in_hour(s, hour))
}

/// Truncate `at` to the start of its hour in its own zone.
pub fn start_of_hour<Tz: TimeZone>(at: &DateTime<Tz>) -> Result<DateTime<Tz>, CalendarError> {
    at.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| CalendarError::InvalidTimestamp(at.naive_local().to_string()))
}

impl VoteFormData {
    /// One-hour proposal prefilled from a clicked day-grid hour.
    pub fn for_time_slot<Tz: TimeZone>(
        group_id: &str,
        at: &DateTime<Tz>,
    ) -> Result<Self, CalendarError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let start = start_of_hour(at)?;
        let title = format!("Availability vote for {}", start.format("%B %-d, %-I:%M %p"));
        let proposed_start = start.with_timezone(&Utc);

        Ok(Self {
            title,
            description: None,
            proposed_start,
            proposed_end: proposed_start + Duration::hours(1),
            group_id: group_id.to_string(),
        })
    }
}
