//! Domain types and data structures.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CalendarError;

/// Maximum length of titles and names entered through forms.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Years that survive an RFC 3339 round trip.
const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Calendar event owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub external_event_id: Option<String>,
}

/// Form data for creating or editing an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFormData {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl EventFormData {
    pub fn validate(&self) -> Result<(), CalendarError> {
        validate_title("title", &self.title)?;
        validate_range(self.start_time, self.end_time)
    }
}

impl CalendarEvent {
    /// Apply edited form values, keeping identity and ownership.
    pub fn apply_form(&mut self, form: EventFormData) {
        self.title = form.title;
        self.description = form.description;
        self.start_time = form.start_time;
        self.end_time = form.end_time;
        self.location = form.location;
        self.color = form.color;
        self.is_private = form.is_private;
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        validate_title("title", &self.title)?;
        validate_range(self.start_time, self.end_time)
    }
}

/// A group of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl Group {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

/// Form data for creating a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFormData {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl GroupFormData {
    pub fn validate(&self) -> Result<(), CalendarError> {
        validate_title("name", &self.name)
    }
}

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Friendship status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for FriendStatus {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(CalendarError::InvalidEventData(format!(
                "unknown friend status: {}",
                other
            ))),
        }
    }
}

/// A friendship between two users. `user_id` sent the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// External calendar provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    #[default]
    Google,
}

impl CalendarProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

impl FromStr for CalendarProvider {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            other => Err(CalendarError::InvalidEventData(format!(
                "unknown calendar provider: {}",
                other
            ))),
        }
    }
}

/// A connection to an external calendar.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConnection {
    pub id: String,
    pub user_id: String,
    pub provider: CalendarProvider,
    pub external_calendar_id: String,
    pub calendar_name: Option<String>,
    pub sync_token: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
}

// Tokens stay out of logs.
impl fmt::Debug for CalendarConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarConnection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("external_calendar_id", &self.external_calendar_id)
            .field("calendar_name", &self.calendar_name)
            .field("last_synced_at", &self.last_synced_at)
            .field("token_expires_at", &self.token_expires_at)
            .finish_non_exhaustive()
    }
}

impl CalendarConnection {
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at <= now
    }
}

/// Vote proposal lifecycle state. Transitions are driven externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl VoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for VoteStatus {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CalendarError::InvalidEventData(format!(
                "unknown vote status: {}",
                other
            ))),
        }
    }
}

/// A single yes/maybe/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Yes,
    No,
    Maybe,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Maybe => "maybe",
        }
    }
}

impl FromStr for ResponseKind {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "maybe" => Ok(Self::Maybe),
            other => Err(CalendarError::InvalidEventData(format!(
                "unknown vote response: {}",
                other
            ))),
        }
    }
}

/// A user's response to a vote proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub id: String,
    pub vote_id: String,
    pub user_id: String,
    pub response: ResponseKind,
    pub created_at: DateTime<Utc>,
}

/// A proposed meeting time put to a group vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteProposal {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: Option<String>,
    pub proposed_start: DateTime<Utc>,
    pub proposed_end: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub status: VoteStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub vote_responses: Vec<VoteResponse>,
}

impl VoteProposal {
    pub fn is_active(&self) -> bool {
        self.status == VoteStatus::Active
    }
}

/// Form data for creating a vote proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteFormData {
    pub title: String,
    pub description: Option<String>,
    pub proposed_start: DateTime<Utc>,
    pub proposed_end: DateTime<Utc>,
    pub group_id: String,
}

impl VoteFormData {
    pub fn validate(&self) -> Result<(), CalendarError> {
        validate_title("title", &self.title)?;
        if self.group_id.trim().is_empty() {
            return Err(CalendarError::InvalidEventData(
                "group_id cannot be empty".to_string(),
            ));
        }
        validate_range(self.proposed_start, self.proposed_end)
    }
}

/// Parse an RFC 3339 timestamp, rejecting anything else.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CalendarError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CalendarError::InvalidTimestamp(value.to_string()))
}

fn validate_title(field: &str, value: &str) -> Result<(), CalendarError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CalendarError::InvalidEventData(format!(
            "{} cannot be empty",
            field
        )));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CalendarError::InvalidEventData(format!(
            "{} exceeds {} characters",
            field, MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), CalendarError> {
    for at in [start, end] {
        if !TIMESTAMP_YEARS.contains(&at.year()) {
            return Err(CalendarError::InvalidTimestamp(at.to_rfc3339()));
        }
    }
    if end <= start {
        return Err(CalendarError::InvalidTimeRange(format!(
            "end {} is not after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}
