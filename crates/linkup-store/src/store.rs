//! Data store trait.
//!
//! `DataStore` is the row-level seam between the application state layer and
//! persistence. Each method maps to a single table operation (or a short
//! sequence of them); caching and optimistic updates live in `AppState`.
//!
//! Implementations don't need to be Sync - the `StoreHandle` wrapper handles
//! thread-safe access via Mutex.

use chrono::{DateTime, Utc};
use linkup_calendar::{
    CalendarConnection, CalendarEvent, EventFormData, Friend, FriendStatus, Group, GroupFormData,
    GroupMember, ResponseKind, User, VoteFormData, VoteProposal, VoteResponse,
};

use crate::error::{StoreError, StoreResult};

pub trait DataStore: Send {
    // Profiles

    fn get_profile(&self, id: &str) -> StoreResult<Option<User>>;

    /// Insert a profile. Fails with `Conflict` if the id or username is taken.
    fn insert_profile(&self, profile: &User) -> StoreResult<User>;

    fn find_profile_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    fn list_profiles(&self) -> StoreResult<Vec<User>>;

    // Events

    /// Events owned by `user_id`, ordered by start time.
    fn list_events(&self, user_id: &str) -> StoreResult<Vec<CalendarEvent>>;

    fn insert_event(&self, user_id: &str, form: &EventFormData) -> StoreResult<CalendarEvent>;

    /// Overwrite the stored row with `event`. Fails with `NotFound` if absent.
    fn update_event(&self, event: &CalendarEvent) -> StoreResult<CalendarEvent>;

    fn delete_event(&self, id: &str) -> StoreResult<()>;

    // Groups and memberships

    /// Insert a group row. The returned group has no members yet.
    fn insert_group(&self, created_by: &str, form: &GroupFormData) -> StoreResult<Group>;

    /// Groups with the given ids, each carrying its member ids.
    fn list_groups(&self, ids: &[String]) -> StoreResult<Vec<Group>>;

    fn get_group(&self, id: &str) -> StoreResult<Option<Group>> {
        let mut groups = self.list_groups(&[id.to_string()])?;
        Ok(groups.pop())
    }

    /// Memberships of `user_id` across all groups.
    fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<GroupMember>>;

    /// Add members in one transaction. Fails with `Conflict` if any is already a member.
    fn insert_members(
        &self,
        group_id: &str,
        user_ids: &[String],
        is_admin: bool,
    ) -> StoreResult<Vec<GroupMember>>;

    fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<()>;

    // Votes

    /// Active proposals in the given groups, with their responses in insertion order.
    fn list_active_votes(&self, group_ids: &[String]) -> StoreResult<Vec<VoteProposal>>;

    fn get_vote(&self, id: &str) -> StoreResult<Option<VoteProposal>>;

    fn insert_vote(&self, created_by: &str, form: &VoteFormData) -> StoreResult<VoteProposal>;

    /// Append a response row.
    ///
    /// Fails with `NotFound` for an unknown vote and `Conflict` when the vote
    /// is no longer active. Earlier responses by the same user are kept as
    /// history; readers collapse them.
    fn insert_vote_response(
        &self,
        vote_id: &str,
        user_id: &str,
        response: ResponseKind,
    ) -> StoreResult<VoteResponse>;

    // Friends

    /// Friendships where `user_id` is either side.
    fn list_friendships(&self, user_id: &str) -> StoreResult<Vec<Friend>>;

    /// The friendship between `a` and `b` in either direction.
    fn find_friendship(&self, a: &str, b: &str) -> StoreResult<Option<Friend>> {
        Ok(self
            .list_friendships(a)?
            .into_iter()
            .find(|f| (f.user_id == a && f.friend_id == b) || (f.user_id == b && f.friend_id == a)))
    }

    fn insert_friend_request(&self, user_id: &str, friend_id: &str) -> StoreResult<Friend>;

    fn update_friend_status(&self, id: &str, status: FriendStatus) -> StoreResult<Friend>;

    fn delete_friendship(&self, id: &str) -> StoreResult<()>;

    // Calendar connections

    fn list_connections(&self, user_id: &str) -> StoreResult<Vec<CalendarConnection>>;

    fn insert_connection(&self, connection: &CalendarConnection) -> StoreResult<CalendarConnection>;

    fn delete_connection(&self, id: &str) -> StoreResult<()>;

    /// Stamp `last_synced_at` on every connection of `user_id`. Returns the count.
    fn touch_connections(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<usize>;
}

/// Fail with `NotFound` unless a row was affected.
pub(crate) fn expect_affected(affected: usize, what: impl Into<String>) -> StoreResult<()> {
    if affected == 0 {
        return Err(StoreError::not_found(what));
    }
    Ok(())
}
