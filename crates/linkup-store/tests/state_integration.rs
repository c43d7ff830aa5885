//! Integration tests for AppState over an on-disk SQLite store.
//!
//! `FlakyStore` wraps the SQLite store and fails writes on demand so the
//! optimistic rollback path can be exercised.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use linkup_calendar::{
    is_slot_in_hour, is_slot_voted_in_hour, month_grid, CalendarConnection, CalendarEvent,
    CalendarProvider, EventFormData, Friend, FriendStatus, Group, GroupFormData, GroupMember,
    GridOptions, ResponseKind, User, VoteFormData, VoteProposal, VoteResponse,
};
use linkup_store::{
    AppState, DataStore, SqliteDataStore, StoreError, StoreHandle, StoreResult,
};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Switches {
    fail_writes: Arc<AtomicBool>,
    fail_extra_members: Arc<AtomicBool>,
}

impl Switches {
    fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn fail_extra_members(&self, on: bool) {
        self.fail_extra_members.store(on, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::storage("injected write failure"));
        }
        Ok(())
    }
}

struct FlakyStore {
    inner: SqliteDataStore,
    switches: Switches,
}

impl DataStore for FlakyStore {
    fn get_profile(&self, id: &str) -> StoreResult<Option<User>> {
        self.inner.get_profile(id)
    }

    fn insert_profile(&self, profile: &User) -> StoreResult<User> {
        self.switches.check()?;
        self.inner.insert_profile(profile)
    }

    fn find_profile_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_profile_by_username(username)
    }

    fn list_profiles(&self) -> StoreResult<Vec<User>> {
        self.inner.list_profiles()
    }

    fn list_events(&self, user_id: &str) -> StoreResult<Vec<CalendarEvent>> {
        self.inner.list_events(user_id)
    }

    fn insert_event(&self, user_id: &str, form: &EventFormData) -> StoreResult<CalendarEvent> {
        self.switches.check()?;
        self.inner.insert_event(user_id, form)
    }

    fn update_event(&self, event: &CalendarEvent) -> StoreResult<CalendarEvent> {
        self.switches.check()?;
        self.inner.update_event(event)
    }

    fn delete_event(&self, id: &str) -> StoreResult<()> {
        self.switches.check()?;
        self.inner.delete_event(id)
    }

    fn insert_group(&self, created_by: &str, form: &GroupFormData) -> StoreResult<Group> {
        self.switches.check()?;
        self.inner.insert_group(created_by, form)
    }

    fn list_groups(&self, ids: &[String]) -> StoreResult<Vec<Group>> {
        self.inner.list_groups(ids)
    }

    fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<GroupMember>> {
        self.inner.list_memberships(user_id)
    }

    fn insert_members(
        &self,
        group_id: &str,
        user_ids: &[String],
        is_admin: bool,
    ) -> StoreResult<Vec<GroupMember>> {
        self.switches.check()?;
        if !is_admin && self.switches.fail_extra_members.load(Ordering::SeqCst) {
            return Err(StoreError::storage("injected member failure"));
        }
        self.inner.insert_members(group_id, user_ids, is_admin)
    }

    fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        self.switches.check()?;
        self.inner.delete_member(group_id, user_id)
    }

    fn list_active_votes(&self, group_ids: &[String]) -> StoreResult<Vec<VoteProposal>> {
        self.inner.list_active_votes(group_ids)
    }

    fn get_vote(&self, id: &str) -> StoreResult<Option<VoteProposal>> {
        self.inner.get_vote(id)
    }

    fn insert_vote(&self, created_by: &str, form: &VoteFormData) -> StoreResult<VoteProposal> {
        self.switches.check()?;
        self.inner.insert_vote(created_by, form)
    }

    fn insert_vote_response(
        &self,
        vote_id: &str,
        user_id: &str,
        response: ResponseKind,
    ) -> StoreResult<VoteResponse> {
        self.switches.check()?;
        self.inner.insert_vote_response(vote_id, user_id, response)
    }

    fn list_friendships(&self, user_id: &str) -> StoreResult<Vec<Friend>> {
        self.inner.list_friendships(user_id)
    }

    fn insert_friend_request(&self, user_id: &str, friend_id: &str) -> StoreResult<Friend> {
        self.switches.check()?;
        self.inner.insert_friend_request(user_id, friend_id)
    }

    fn update_friend_status(&self, id: &str, status: FriendStatus) -> StoreResult<Friend> {
        self.switches.check()?;
        self.inner.update_friend_status(id, status)
    }

    fn delete_friendship(&self, id: &str) -> StoreResult<()> {
        self.switches.check()?;
        self.inner.delete_friendship(id)
    }

    fn list_connections(&self, user_id: &str) -> StoreResult<Vec<CalendarConnection>> {
        self.inner.list_connections(user_id)
    }

    fn insert_connection(&self, connection: &CalendarConnection) -> StoreResult<CalendarConnection> {
        self.switches.check()?;
        self.inner.insert_connection(connection)
    }

    fn delete_connection(&self, id: &str) -> StoreResult<()> {
        self.switches.check()?;
        self.inner.delete_connection(id)
    }

    fn touch_connections(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<usize> {
        self.switches.check()?;
        self.inner.touch_connections(user_id, at)
    }
}

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap()
}

fn db_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("linkup.db")
}

fn flaky_handle(path: &Path) -> (StoreHandle, Switches) {
    let switches = Switches::default();
    let store = FlakyStore {
        inner: SqliteDataStore::open(path).unwrap(),
        switches: switches.clone(),
    };
    (StoreHandle::new(store), switches)
}

async fn state_for(handle: &StoreHandle, user: &str) -> AppState {
    let mut state =
        AppState::new(handle.clone(), user).with_email(format!("{}@example.com", user));
    state.load().await.unwrap();
    state
}

async fn set_username(handle: &StoreHandle, user: &str, username: &str) {
    let (user, username) = (user.to_string(), username.to_string());
    handle
        .run(move |s| {
            s.insert_profile(&User {
                id: user,
                name: username.clone(),
                username: Some(username),
                avatar_url: None,
                created_at: None,
            })
        })
        .await
        .unwrap();
}

fn event_form(title: &str, start: DateTime<Utc>) -> EventFormData {
    EventFormData {
        title: title.to_string(),
        description: None,
        start_time: start,
        end_time: start + Duration::hours(1),
        location: None,
        color: None,
        is_private: false,
    }
}

fn named_group(name: &str, members: &[&str]) -> GroupFormData {
    GroupFormData {
        name: name.to_string(),
        description: None,
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

fn vote_form(group_id: &str, start: DateTime<Utc>) -> VoteFormData {
    VoteFormData {
        title: "Dinner".to_string(),
        description: None,
        proposed_start: start,
        proposed_end: start + Duration::hours(2),
        group_id: group_id.to_string(),
    }
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);

    let group_id = {
        let handle = StoreHandle::sqlite(&path).unwrap();
        let mut state = state_for(&handle, "u1").await;
        state.add_event(event_form("Gym", at(5, 7))).await.unwrap();
        let group = state.add_group(named_group("Runners", &[])).await.unwrap();
        state
            .create_vote_proposal(vote_form(&group.id, at(7, 18)))
            .await
            .unwrap();
        group.id
    };

    let handle = StoreHandle::sqlite(&path).unwrap();
    let state = state_for(&handle, "u1").await;
    assert_eq!(state.current_user().unwrap().name, "u1");
    assert_eq!(state.events().len(), 1);
    assert_eq!(state.groups().len(), 1);
    assert_eq!(state.group(&group_id).unwrap().members, vec!["u1"]);
    assert!(state.group_members()[0].is_admin);
    assert_eq!(state.active_proposals(&group_id).len(), 1);
}

#[tokio::test]
async fn test_add_event_rolls_back_on_store_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));
    let mut state = state_for(&handle, "u1").await;
    state.add_event(event_form("Kept", at(3, 9))).await.unwrap();

    switches.fail_writes(true);
    let result = state.add_event(event_form("Lost", at(4, 9))).await;

    assert!(matches!(result, Err(StoreError::Storage(_))));
    let titles: Vec<&str> = state.events().iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Kept"]);
}

#[tokio::test]
async fn test_update_and_delete_restore_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));
    let mut state = state_for(&handle, "u1").await;
    let event = state.add_event(event_form("Standup", at(3, 9))).await.unwrap();

    switches.fail_writes(true);

    let mut edited = event.clone();
    edited.title = "Renamed".to_string();
    assert!(state.update_event(edited).await.is_err());
    assert_eq!(state.events()[0].title, "Standup");

    assert!(state.delete_event(&event.id).await.is_err());
    assert_eq!(state.events().len(), 1);

    switches.fail_writes(false);
    state.delete_event(&event.id).await.unwrap();
    assert!(state.events().is_empty());
}

#[tokio::test]
async fn test_update_unknown_event_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();
    let mut owner = state_for(&handle, "u1").await;
    let event = owner.add_event(event_form("Private", at(3, 9))).await.unwrap();

    // Another viewer never has the event cached
    let mut other = state_for(&handle, "u2").await;
    let result = other.update_event(event).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_far_future_forms_are_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    let far = Utc.with_ymd_and_hms(10000, 1, 1, 9, 0, 0).unwrap();

    let handle = StoreHandle::sqlite(&path).unwrap();
    let mut state = state_for(&handle, "u1").await;
    let group = state.add_group(named_group("Runners", &[])).await.unwrap();

    let result = state.add_event(event_form("Someday", far)).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
    let result = state.create_vote_proposal(vote_form(&group.id, far)).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));

    let rows = handle.run(|s| s.list_events("u1")).await.unwrap();
    assert!(rows.is_empty());

    // Nothing unreadable reached the database
    let reopened = StoreHandle::sqlite(&path).unwrap();
    let state = state_for(&reopened, "u1").await;
    assert!(state.events().is_empty());
    assert!(state.active_proposals(&group.id).is_empty());
}

#[tokio::test]
async fn test_add_group_keeps_group_when_extra_members_fail() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));
    let mut state = state_for(&handle, "u1").await;

    switches.fail_extra_members(true);
    let group = state
        .add_group(named_group("Hikers", &["u2", "u3"]))
        .await
        .unwrap();

    assert_eq!(group.members, vec!["u1"]);
    assert_eq!(state.group(&group.id).unwrap().members, vec!["u1"]);
    assert_eq!(state.group_members().len(), 1);
}

#[tokio::test]
async fn test_add_group_with_members() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();
    let mut state = state_for(&handle, "u1").await;

    let group = state
        .add_group(named_group("Hikers", &["u2", "u1", "u2"]))
        .await
        .unwrap();
    assert_eq!(group.members, vec!["u1", "u2"]);

    let added = state
        .add_members_to_group(&group.id, &["u2".to_string(), "u3".to_string()])
        .await
        .unwrap();
    assert_eq!(added, vec!["u3"]);

    let none = state
        .add_members_to_group(&group.id, &["u3".to_string()])
        .await
        .unwrap();
    assert!(none.is_empty());

    let missing = state
        .add_members_to_group("no-such-group", &["u4".to_string()])
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_leave_group_restores_membership_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));
    let mut state = state_for(&handle, "u1").await;
    let group = state.add_group(named_group("Band", &["u2"])).await.unwrap();

    switches.fail_writes(true);
    assert!(state.leave_group(&group.id).await.is_err());
    assert_eq!(state.group(&group.id).unwrap().members, vec!["u1", "u2"]);
    assert_eq!(state.group_members().len(), 1);
}

#[tokio::test]
async fn test_join_group_fetches_group_and_votes() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();

    let mut owner = state_for(&handle, "u1").await;
    let group = owner.add_group(named_group("Chess", &[])).await.unwrap();
    owner
        .create_vote_proposal(vote_form(&group.id, at(12, 19)))
        .await
        .unwrap();

    let mut joiner = state_for(&handle, "u2").await;
    assert!(joiner.group(&group.id).is_none());

    joiner.join_group(&group.id).await.unwrap();
    assert_eq!(joiner.group(&group.id).unwrap().members, vec!["u1", "u2"]);
    assert_eq!(joiner.active_proposals(&group.id).len(), 1);

    let again = joiner.join_group(&group.id).await;
    assert!(matches!(again, Err(StoreError::Conflict(_))));
    assert_eq!(joiner.group(&group.id).unwrap().members, vec!["u1", "u2"]);
}

#[tokio::test]
async fn test_submit_vote_rolls_back_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));
    let mut state = state_for(&handle, "u1").await;
    let group = state.add_group(named_group("Film", &[])).await.unwrap();
    let vote = state
        .create_vote_proposal(vote_form(&group.id, at(14, 20)))
        .await
        .unwrap();
    state.submit_vote(&vote.id, ResponseKind::Maybe).await.unwrap();

    switches.fail_writes(true);
    assert!(state.submit_vote(&vote.id, ResponseKind::No).await.is_err());

    let tally = state.tally_for(&vote.id).unwrap();
    assert_eq!((tally.maybe, tally.no, tally.total), (1, 0, 1));
}

#[tokio::test]
async fn test_completed_vote_rejects_responses() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    let handle = StoreHandle::sqlite(&path).unwrap();
    let mut state = state_for(&handle, "u1").await;
    let group = state.add_group(named_group("Film", &[])).await.unwrap();
    let vote = state
        .create_vote_proposal(vote_form(&group.id, at(14, 20)))
        .await
        .unwrap();

    // Status transitions happen outside the app
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE votes SET status = 'completed' WHERE id = ?1",
        [&vote.id],
    )
    .unwrap();

    let result = state.submit_vote(&vote.id, ResponseKind::Yes).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
    assert_eq!(state.tally_for(&vote.id).unwrap().total, 0);

    state.load().await.unwrap();
    assert!(state.active_proposals(&group.id).is_empty());
    assert!(state.votes().is_empty());
}

#[tokio::test]
async fn test_tally_across_members() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();

    let mut alice = state_for(&handle, "alice").await;
    let group = alice
        .add_group(named_group("Trip", &["bob", "carol"]))
        .await
        .unwrap();
    let vote = alice
        .create_vote_proposal(vote_form(&group.id, at(20, 10)))
        .await
        .unwrap();
    alice.submit_vote(&vote.id, ResponseKind::Yes).await.unwrap();

    let mut bob = state_for(&handle, "bob").await;
    bob.submit_vote(&vote.id, ResponseKind::Yes).await.unwrap();
    let mut carol = state_for(&handle, "carol").await;
    carol.submit_vote(&vote.id, ResponseKind::No).await.unwrap();

    alice.load().await.unwrap();
    let tally = alice.tally_for(&vote.id).unwrap();
    assert_eq!((tally.yes, tally.maybe, tally.no, tally.total), (2, 0, 1, 3));
    assert!((tally.yes_percentage - 66.666).abs() < 0.01);
}

#[tokio::test]
async fn test_overlay_on_month_grid() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();
    let mut state = state_for(&handle, "u1").await;
    let group = state.add_group(named_group("Picnic", &[])).await.unwrap();
    let vote = state
        .create_vote_proposal(vote_form(&group.id, at(30, 12)))
        .await
        .unwrap();
    state.submit_vote(&vote.id, ResponseKind::Yes).await.unwrap();

    let events: Vec<CalendarEvent> = state.group_events(&group.id).into_iter().cloned().collect();
    let slots = state.availability_overlay(&group.id);
    let grid = month_grid(2024, 6, &events, &slots, &Utc, &GridOptions::default()).unwrap();

    let marked: Vec<NaiveDate> = grid
        .cells
        .iter()
        .filter(|c| c.has_availability)
        .map(|c| c.date)
        .collect();
    assert_eq!(marked, vec![NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()]);
    assert!(grid.cell(marked[0]).unwrap().has_voted);

    let noon = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
    assert!(is_slot_in_hour(&slots[0], &noon));
    assert!(!is_slot_in_hour(&slots[0], &(noon + Duration::hours(1))));
    assert!(is_slot_voted_in_hour(&slots, &noon));
}

#[tokio::test]
async fn test_calendar_connections() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, switches) = flaky_handle(&db_path(&dir));

    let connection = CalendarConnection {
        id: String::new(),
        user_id: "u1".to_string(),
        provider: CalendarProvider::Google,
        external_calendar_id: "primary".to_string(),
        calendar_name: None,
        sync_token: None,
        last_synced_at: None,
        created_at: None,
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        token_expires_at: at(30, 0),
    };
    handle
        .run(move |s| s.insert_connection(&connection))
        .await
        .unwrap();

    let mut state = state_for(&handle, "u1").await;
    assert_eq!(state.calendar_connections().len(), 1);

    switches.fail_writes(true);
    assert!(state.sync_calendars().await.is_err());
    assert!(state.calendar_connections()[0].last_synced_at.is_none());

    switches.fail_writes(false);
    assert_eq!(state.sync_calendars().await.unwrap(), 1);
    assert!(state.calendar_connections()[0].last_synced_at.is_some());

    let id = state.calendar_connections()[0].id.clone();
    switches.fail_writes(true);
    assert!(state.disconnect_calendar(&id).await.is_err());
    assert_eq!(state.calendar_connections().len(), 1);

    switches.fail_writes(false);
    state.disconnect_calendar(&id).await.unwrap();
    assert!(state.calendar_connections().is_empty());
    assert!(matches!(
        state.disconnect_calendar(&id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_friend_requests() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();
    set_username(&handle, "u1", "ada").await;
    set_username(&handle, "u2", "grace").await;

    let ada = state_for(&handle, "u1").await;
    let grace = state_for(&handle, "u2").await;

    assert!(matches!(
        ada.send_friend_request("  ").await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        ada.send_friend_request("nobody").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        ada.send_friend_request("ada").await,
        Err(StoreError::Validation(_))
    ));

    let request = ada.send_friend_request("grace").await.unwrap();
    assert_eq!(request.status, FriendStatus::Pending);

    // Either direction counts as an existing request
    assert!(matches!(
        grace.send_friend_request("ada").await,
        Err(StoreError::Conflict(_))
    ));

    let overview = grace.friend_overview().await.unwrap();
    assert_eq!(overview.incoming.len(), 1);
    assert!(overview.outgoing.is_empty());
    assert_eq!(ada.friend_overview().await.unwrap().outgoing.len(), 1);

    // Only the recipient can answer
    assert!(matches!(
        ada.respond_to_friend_request(&request.id, true).await,
        Err(StoreError::NotFound(_))
    ));

    let accepted = grace
        .respond_to_friend_request(&request.id, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(accepted.status, FriendStatus::Accepted);
    assert_eq!(ada.friend_overview().await.unwrap().accepted.len(), 1);
}

#[tokio::test]
async fn test_rejected_request_is_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let handle = StoreHandle::sqlite(db_path(&dir)).unwrap();
    set_username(&handle, "u1", "ada").await;
    set_username(&handle, "u2", "grace").await;

    let ada = state_for(&handle, "u1").await;
    let grace = state_for(&handle, "u2").await;

    let request = ada.send_friend_request("grace").await.unwrap();
    let outcome = grace
        .respond_to_friend_request(&request.id, false)
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(grace.friend_overview().await.unwrap(), Default::default());

    // A fresh request is allowed after rejection
    ada.send_friend_request("grace").await.unwrap();
}
