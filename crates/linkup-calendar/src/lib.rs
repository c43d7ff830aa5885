//! Scheduling domain for LinkUp.
//!
//! Entity types, vote tallying, the availability overlay and the
//! month/day calendar grids. Everything here is pure; persistence lives
//! in `linkup-store`.

pub mod error;
pub mod grid;
pub mod types;
pub mod votes;

pub use error::CalendarError;
pub use grid::{day_grid, month_grid, DayGrid, DayRow, GridOptions, MonthCell, MonthGrid};
pub use types::{
    parse_timestamp, CalendarConnection, CalendarEvent, CalendarProvider, EventFormData, Friend,
    FriendStatus, Group, GroupFormData, GroupMember, ResponseKind, User, VoteFormData,
    VoteProposal, VoteResponse, VoteStatus,
};
pub use votes::{
    active_proposals, build_availability_overlay, current_user_response, is_hour_available,
    is_slot_in_hour, is_slot_voted_in_hour, tally, AvailabilitySlot, VoteTally,
};
