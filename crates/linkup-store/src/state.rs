//! Application state layer.
//!
//! `AppState` caches the viewer's events, groups, memberships, votes, users
//! and calendar connections, and routes every write through the data store.
//!
//! Writes are optimistic: the change is applied to the cache first, with a
//! snapshot of the touched collection kept as a [`PendingChange`]. When the
//! store confirms, the provisional entry is replaced by the persisted row;
//! when it fails, the snapshot is restored and the error returned.

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use linkup_calendar::{
    active_proposals, build_availability_overlay, tally, AvailabilitySlot, CalendarConnection,
    CalendarError, CalendarEvent, EventFormData, Group, GroupFormData, GroupMember, ResponseKind,
    User, VoteFormData, VoteProposal, VoteResponse, VoteStatus, VoteTally,
};

use crate::error::{StoreError, StoreResult};
use crate::handle::StoreHandle;
use crate::store::DataStore;

/// Profile name used when the viewer has no email to derive one from.
pub const DEFAULT_PROFILE_NAME: &str = "User";

/// Cached collections a pending change can restore.
#[derive(Debug, Clone, Copy)]
enum Collection {
    Events,
    Groups,
    Votes,
    Connections,
}

enum Snapshot {
    Events(Vec<CalendarEvent>),
    Groups {
        groups: Vec<Group>,
        members: Vec<GroupMember>,
    },
    Votes(Vec<VoteProposal>),
    Connections(Vec<CalendarConnection>),
}

/// A locally applied write awaiting store confirmation.
struct PendingChange {
    operation: &'static str,
    snapshot: Snapshot,
}

/// Everything `load` reads in one store call.
struct Loaded {
    profile: User,
    events: Vec<CalendarEvent>,
    memberships: Vec<GroupMember>,
    groups: Vec<Group>,
    votes: Vec<VoteProposal>,
    users: Vec<User>,
    connections: Vec<CalendarConnection>,
}

pub struct AppState {
    pub(crate) store: StoreHandle,
    pub(crate) viewer_id: String,
    viewer_email: Option<String>,
    current_user: Option<User>,
    events: Vec<CalendarEvent>,
    groups: Vec<Group>,
    group_members: Vec<GroupMember>,
    votes: Vec<VoteProposal>,
    users: Vec<User>,
    calendar_connections: Vec<CalendarConnection>,
}

impl AppState {
    pub fn new(store: StoreHandle, viewer_id: impl Into<String>) -> Self {
        Self {
            store,
            viewer_id: viewer_id.into(),
            viewer_email: None,
            current_user: None,
            events: Vec::new(),
            groups: Vec::new(),
            group_members: Vec::new(),
            votes: Vec::new(),
            users: Vec::new(),
            calendar_connections: Vec::new(),
        }
    }

    /// Email used to name a freshly created profile.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.viewer_email = Some(email.into());
        self
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn group_members(&self) -> &[GroupMember] {
        &self.group_members
    }

    pub fn votes(&self) -> &[VoteProposal] {
        &self.votes
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn calendar_connections(&self) -> &[CalendarConnection] {
        &self.calendar_connections
    }

    /// Replace every cached collection with a fresh read from the store.
    ///
    /// Creates the viewer's profile on first load.
    #[instrument(skip_all, fields(viewer = %self.viewer_id))]
    pub async fn load(&mut self) -> StoreResult<()> {
        let viewer = self.viewer_id.clone();
        let email = self.viewer_email.clone();
        let loaded = self
            .store
            .run(move |s| load_snapshot(s, &viewer, email.as_deref()))
            .await?;

        tracing::info!(
            "Loaded {} events, {} groups, {} active votes, {} calendar connections",
            loaded.events.len(),
            loaded.groups.len(),
            loaded.votes.len(),
            loaded.connections.len()
        );

        self.current_user = Some(loaded.profile);
        self.events = loaded.events;
        self.group_members = loaded.memberships;
        self.groups = loaded.groups;
        self.votes = loaded.votes;
        self.users = loaded.users;
        self.calendar_connections = loaded.connections;
        Ok(())
    }

    fn pending(&self, operation: &'static str, collection: Collection) -> PendingChange {
        let snapshot = match collection {
            Collection::Events => Snapshot::Events(self.events.clone()),
            Collection::Groups => Snapshot::Groups {
                groups: self.groups.clone(),
                members: self.group_members.clone(),
            },
            Collection::Votes => Snapshot::Votes(self.votes.clone()),
            Collection::Connections => Snapshot::Connections(self.calendar_connections.clone()),
        };
        PendingChange {
            operation,
            snapshot,
        }
    }

    fn rollback(&mut self, change: PendingChange) {
        tracing::warn!("Rolling back optimistic {}", change.operation);
        match change.snapshot {
            Snapshot::Events(events) => self.events = events,
            Snapshot::Groups { groups, members } => {
                self.groups = groups;
                self.group_members = members;
            }
            Snapshot::Votes(votes) => self.votes = votes,
            Snapshot::Connections(connections) => self.calendar_connections = connections,
        }
    }

    /// Confirm or roll back `change` depending on the store's answer.
    fn settle<T>(&mut self, change: PendingChange, result: StoreResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                tracing::debug!("Store confirmed {}", change.operation);
                Ok(value)
            }
            Err(err) => {
                tracing::error!("{} failed: {}", change.operation, err);
                self.rollback(change);
                Err(err)
            }
        }
    }

    // Events

    #[instrument(skip_all, fields(viewer = %self.viewer_id))]
    pub async fn add_event(&mut self, form: EventFormData) -> StoreResult<CalendarEvent> {
        form.validate()?;

        let change = self.pending("add_event", Collection::Events);
        let provisional = provisional_id();
        self.events.push(CalendarEvent {
            id: provisional.clone(),
            user_id: self.viewer_id.clone(),
            title: form.title.trim().to_string(),
            description: form.description.clone(),
            start_time: form.start_time,
            end_time: form.end_time,
            location: form.location.clone(),
            color: form.color.clone(),
            is_private: form.is_private,
            created_at: None,
            external_event_id: None,
        });

        let viewer = self.viewer_id.clone();
        let result = self.store.run(move |s| s.insert_event(&viewer, &form)).await;
        let event = self.settle(change, result)?;

        replace_by_id(&mut self.events, &provisional, event.clone(), |e| &e.id);
        tracing::info!("Event created: {}", event.id);
        Ok(event)
    }

    /// Save an edited copy of one of the viewer's events.
    #[instrument(skip_all, fields(viewer = %self.viewer_id, event = %event.id))]
    pub async fn update_event(&mut self, event: CalendarEvent) -> StoreResult<CalendarEvent> {
        event.validate()?;
        let Some(idx) = self.events.iter().position(|e| e.id == event.id) else {
            return Err(StoreError::not_found(format!("event {}", event.id)));
        };

        let change = self.pending("update_event", Collection::Events);
        self.events[idx] = event.clone();

        let result = self.store.run(move |s| s.update_event(&event)).await;
        let stored = self.settle(change, result)?;

        replace_by_id(&mut self.events, &stored.id, stored.clone(), |e| &e.id);
        Ok(stored)
    }

    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn delete_event(&mut self, event_id: &str) -> StoreResult<()> {
        if !self.events.iter().any(|e| e.id == event_id) {
            return Err(StoreError::not_found(format!("event {}", event_id)));
        }

        let change = self.pending("delete_event", Collection::Events);
        self.events.retain(|e| e.id != event_id);

        let id = event_id.to_string();
        let result = self.store.run(move |s| s.delete_event(&id)).await;
        self.settle(change, result)
    }

    /// Cached events owned by members of `group_id`.
    pub fn group_events(&self, group_id: &str) -> Vec<&CalendarEvent> {
        let Some(group) = self.group(group_id) else {
            return Vec::new();
        };
        self.events
            .iter()
            .filter(|e| group.has_member(&e.user_id))
            .collect()
    }

    // Groups

    /// Create a group with the viewer as admin.
    ///
    /// Extra members listed on the form are added afterwards; if that step
    /// fails the group is still kept and the failure only logged.
    #[instrument(skip_all, fields(viewer = %self.viewer_id))]
    pub async fn add_group(&mut self, form: GroupFormData) -> StoreResult<Group> {
        form.validate()?;

        let viewer = self.viewer_id.clone();
        let mut extras: Vec<String> = Vec::new();
        for id in &form.members {
            if *id != viewer && !extras.contains(id) {
                extras.push(id.clone());
            }
        }

        let change = self.pending("add_group", Collection::Groups);
        let provisional = provisional_id();
        let mut members = vec![viewer.clone()];
        members.extend(extras.iter().cloned());
        self.groups.push(Group {
            id: provisional.clone(),
            name: form.name.trim().to_string(),
            description: form.description.clone(),
            created_by: viewer.clone(),
            created_at: Utc::now(),
            members,
        });

        let result = self
            .store
            .run(move |s| {
                let group = s.insert_group(&viewer, &form)?;
                let admin = s.insert_members(&group.id, &[viewer], true)?;
                let added = if extras.is_empty() {
                    Ok(Vec::new())
                } else {
                    s.insert_members(&group.id, &extras, false)
                };
                Ok((group, admin, added))
            })
            .await;
        let (mut group, admin, added) = self.settle(change, result)?;

        group.members = admin.iter().map(|m| m.user_id.clone()).collect();
        match added {
            Ok(added) => group.members.extend(added.into_iter().map(|m| m.user_id)),
            Err(err) => tracing::warn!("Group {} created but adding members failed: {}", group.id, err),
        }
        self.group_members.extend(admin);

        replace_by_id(&mut self.groups, &provisional, group.clone(), |g| &g.id);
        tracing::info!("Group created: {} ({} members)", group.id, group.members.len());
        Ok(group)
    }

    /// Join `group_id`, fetching the group and its active votes if not cached.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn join_group(&mut self, group_id: &str) -> StoreResult<()> {
        let change = self.pending("join_group", Collection::Groups);
        let viewer = self.viewer_id.clone();

        let cached = match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => {
                if !group.has_member(&viewer) {
                    group.members.push(viewer.clone());
                }
                true
            }
            None => false,
        };

        let id = group_id.to_string();
        let result = self
            .store
            .run(move |s| {
                let members = s.insert_members(&id, &[viewer], false)?;
                if cached {
                    return Ok((members, None, Vec::new()));
                }
                let group = s.get_group(&id)?;
                let votes = s.list_active_votes(&[id])?;
                Ok((members, group, votes))
            })
            .await;
        let (members, fetched, votes) = self.settle(change, result)?;

        self.group_members.extend(members);
        if let Some(group) = fetched {
            self.groups.push(group);
        }
        self.votes.extend(votes.into_iter().map(normalized));
        tracing::info!("Joined group {}", group_id);
        Ok(())
    }

    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn leave_group(&mut self, group_id: &str) -> StoreResult<()> {
        let change = self.pending("leave_group", Collection::Groups);
        let viewer = self.viewer_id.clone();

        if let Some(group) = self.groups.iter_mut().find(|g| g.id == group_id) {
            group.members.retain(|m| *m != viewer);
        }
        self.group_members
            .retain(|m| !(m.group_id == group_id && m.user_id == viewer));

        let id = group_id.to_string();
        let result = self.store.run(move |s| s.delete_member(&id, &viewer)).await;
        self.settle(change, result)?;
        tracing::info!("Left group {}", group_id);
        Ok(())
    }

    /// Add `member_ids` to a cached group. Returns the ids actually added.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn add_members_to_group(
        &mut self,
        group_id: &str,
        member_ids: &[String],
    ) -> StoreResult<Vec<String>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let group = self
            .group(group_id)
            .ok_or_else(|| StoreError::not_found(format!("group {}", group_id)))?;

        let mut new_ids: Vec<String> = Vec::new();
        for id in member_ids {
            if !group.has_member(id) && !new_ids.contains(id) {
                new_ids.push(id.clone());
            }
        }
        if new_ids.is_empty() {
            tracing::info!("Selected users are already members of group {}", group_id);
            return Ok(new_ids);
        }

        let change = self.pending("add_members_to_group", Collection::Groups);
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == group_id) {
            group.members.extend(new_ids.iter().cloned());
        }

        let id = group_id.to_string();
        let ids = new_ids.clone();
        let result = self
            .store
            .run(move |s| s.insert_members(&id, &ids, false))
            .await;
        self.settle(change, result)?;

        tracing::info!("{} members added to group {}", new_ids.len(), group_id);
        Ok(new_ids)
    }

    // Votes

    #[instrument(skip_all, fields(viewer = %self.viewer_id, group = %form.group_id))]
    pub async fn create_vote_proposal(&mut self, form: VoteFormData) -> StoreResult<VoteProposal> {
        form.validate()?;

        let change = self.pending("create_vote_proposal", Collection::Votes);
        let provisional = provisional_id();
        self.votes.push(VoteProposal {
            id: provisional.clone(),
            group_id: form.group_id.clone(),
            title: form.title.trim().to_string(),
            description: form.description.clone(),
            proposed_start: form.proposed_start,
            proposed_end: form.proposed_end,
            created_by: self.viewer_id.clone(),
            status: VoteStatus::Active,
            created_at: Utc::now(),
            vote_responses: Vec::new(),
        });

        let viewer = self.viewer_id.clone();
        let result = self.store.run(move |s| s.insert_vote(&viewer, &form)).await;
        let vote = self.settle(change, result)?;

        replace_by_id(&mut self.votes, &provisional, vote.clone(), |v| &v.id);
        tracing::info!("Vote proposal created: {}", vote.id);
        Ok(vote)
    }

    /// Record the viewer's answer, replacing any earlier one.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn submit_vote(
        &mut self,
        vote_id: &str,
        response: ResponseKind,
    ) -> StoreResult<VoteResponse> {
        let Some(idx) = self.votes.iter().position(|v| v.id == vote_id) else {
            return Err(StoreError::not_found(format!("vote {}", vote_id)));
        };
        if !self.votes[idx].is_active() {
            return Err(CalendarError::VoteClosed(vote_id.to_string()).into());
        }

        let change = self.pending("submit_vote", Collection::Votes);
        let provisional = VoteResponse {
            id: provisional_id(),
            vote_id: vote_id.to_string(),
            user_id: self.viewer_id.clone(),
            response,
            created_at: Utc::now(),
        };
        self.votes[idx].record_response(provisional)?;

        let (id, viewer) = (vote_id.to_string(), self.viewer_id.clone());
        let result = self
            .store
            .run(move |s| s.insert_vote_response(&id, &viewer, response))
            .await;
        let stored = self.settle(change, result)?;

        if let Some(vote) = self.votes.iter_mut().find(|v| v.id == vote_id) {
            vote.record_response(stored.clone())?;
        }
        tracing::info!("Vote submitted: {} on {}", response.as_str(), vote_id);
        Ok(stored)
    }

    /// Active proposals of `group_id`.
    pub fn active_proposals(&self, group_id: &str) -> Vec<&VoteProposal> {
        active_proposals(&self.votes)
            .filter(|v| v.group_id == group_id)
            .collect()
    }

    /// Availability slots for `group_id` as seen by the viewer.
    pub fn availability_overlay(&self, group_id: &str) -> Vec<AvailabilitySlot> {
        build_availability_overlay(self.active_proposals(group_id), &self.viewer_id)
    }

    pub fn tally_for(&self, vote_id: &str) -> Option<VoteTally> {
        self.votes.iter().find(|v| v.id == vote_id).map(tally)
    }

    // Users

    pub fn user_by_id(&self, user_id: &str) -> Option<&User> {
        if let Some(user) = self.current_user.as_ref().filter(|u| u.id == user_id) {
            return Some(user);
        }
        self.users.iter().find(|u| u.id == user_id)
    }

    // Calendar connections

    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn disconnect_calendar(&mut self, connection_id: &str) -> StoreResult<()> {
        if !self.calendar_connections.iter().any(|c| c.id == connection_id) {
            return Err(StoreError::not_found(format!(
                "calendar connection {}",
                connection_id
            )));
        }

        let change = self.pending("disconnect_calendar", Collection::Connections);
        self.calendar_connections.retain(|c| c.id != connection_id);

        let id = connection_id.to_string();
        let result = self.store.run(move |s| s.delete_connection(&id)).await;
        self.settle(change, result)?;
        tracing::info!("Calendar disconnected: {}", connection_id);
        Ok(())
    }

    /// Mark every connection of the viewer as synced now.
    ///
    /// Event import from the provider is not performed. Returns the number
    /// of connections stamped.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn sync_calendars(&mut self) -> StoreResult<usize> {
        let now = Utc::now();
        let change = self.pending("sync_calendars", Collection::Connections);
        for connection in &mut self.calendar_connections {
            connection.last_synced_at = Some(now);
        }

        let viewer = self.viewer_id.clone();
        let result = self
            .store
            .run(move |s| {
                let count = s.touch_connections(&viewer, now)?;
                Ok((count, s.list_connections(&viewer)?))
            })
            .await;
        let (count, connections) = self.settle(change, result)?;

        self.calendar_connections = connections;
        tracing::info!("Calendar sync complete: {} connections", count);
        Ok(count)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("viewer_id", &self.viewer_id)
            .field("events", &self.events.len())
            .field("groups", &self.groups.len())
            .field("votes", &self.votes.len())
            .finish_non_exhaustive()
    }
}

fn load_snapshot(store: &dyn DataStore, viewer: &str, email: Option<&str>) -> StoreResult<Loaded> {
    let profile = match store.get_profile(viewer)? {
        Some(profile) => profile,
        None => {
            tracing::info!("Creating profile for {}", viewer);
            store.insert_profile(&User {
                id: viewer.to_string(),
                name: profile_name_from_email(email),
                username: None,
                avatar_url: None,
                created_at: None,
            })?
        }
    };

    let events = store.list_events(viewer)?;
    let memberships = store.list_memberships(viewer)?;
    let group_ids: Vec<String> = memberships.iter().map(|m| m.group_id.clone()).collect();
    let groups = store.list_groups(&group_ids)?;
    let votes = store
        .list_active_votes(&group_ids)?
        .into_iter()
        .map(normalized)
        .collect();
    let users = store.list_profiles()?;
    let connections = store.list_connections(viewer)?;

    Ok(Loaded {
        profile,
        events,
        memberships,
        groups,
        votes,
        users,
        connections,
    })
}

/// The part of `email` before `@`, or [`DEFAULT_PROFILE_NAME`].
pub fn profile_name_from_email(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_PROFILE_NAME)
        .to_string()
}

fn normalized(mut vote: VoteProposal) -> VoteProposal {
    vote.normalize();
    vote
}

fn provisional_id() -> String {
    format!("pending-{}", Uuid::new_v4())
}

fn replace_by_id<T>(items: &mut [T], id: &str, value: T, key: fn(&T) -> &String) {
    if let Some(slot) = items.iter_mut().find(|item| key(item) == id) {
        *slot = value;
    }
}
