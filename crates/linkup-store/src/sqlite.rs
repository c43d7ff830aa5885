//! SQLite-based data store implementation.
//!
//! Timestamps are stored as UTC RFC 3339 text with fixed microsecond
//! precision so that text ordering matches time ordering. Ids are UUID v4.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use linkup_calendar::{
    parse_timestamp, CalendarConnection, CalendarError, CalendarEvent, EventFormData, Friend,
    FriendStatus, Group, GroupFormData, GroupMember, ResponseKind, User, VoteFormData,
    VoteProposal, VoteResponse, VoteStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{expect_affected, DataStore};

const PROFILE_COLUMNS: &str = "id, name, username, avatar_url, created_at";
const EVENT_COLUMNS: &str = "id, user_id, title, description, start_time, end_time, location, \
                             color, is_private, created_at, external_event_id";
const GROUP_COLUMNS: &str = "id, name, description, created_by, created_at";
const MEMBER_COLUMNS: &str = "id, group_id, user_id, is_admin, created_at";
const VOTE_COLUMNS: &str = "id, group_id, title, description, proposed_start, proposed_end, \
                            created_by, status, created_at";
const RESPONSE_COLUMNS: &str = "id, vote_id, user_id, response, created_at";
const FRIEND_COLUMNS: &str = "id, user_id, friend_id, status, created_at, updated_at";
const CONNECTION_COLUMNS: &str = "id, user_id, provider, external_calendar_id, calendar_name, \
                                  sync_token, last_synced_at, created_at, access_token, \
                                  refresh_token, token_expires_at";

/// SQLite-based storage for all LinkUp tables.
pub struct SqliteDataStore {
    conn: Connection,
}

impl SqliteDataStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT UNIQUE,
                avatar_url TEXT,
                created_at TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                location TEXT,
                color TEXT,
                is_private INTEGER NOT NULL DEFAULT 0,
                created_at TEXT,
                external_event_id TEXT
            );

            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS group_members (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE (group_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS votes (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                proposed_start TEXT NOT NULL,
                proposed_end TEXT NOT NULL,
                created_by TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vote_responses (
                id TEXT PRIMARY KEY,
                vote_id TEXT NOT NULL REFERENCES votes(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS friends (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                friend_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS calendar_connections (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                external_calendar_id TEXT NOT NULL,
                calendar_name TEXT,
                sync_token TEXT,
                last_synced_at TEXT,
                created_at TEXT,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                token_expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_user_start ON events(user_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_members_user ON group_members(user_id);
            CREATE INDEX IF NOT EXISTS idx_votes_group_status ON votes(group_id, status);
            CREATE INDEX IF NOT EXISTS idx_responses_vote ON vote_responses(vote_id);
            "#,
        )?;
        Ok(())
    }

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> StoreResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_opt<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row) -> rusqlite::Result<T>,
    ) -> StoreResult<Option<T>> {
        Ok(self.conn.query_row(sql, params, map).optional()?)
    }

    fn get_event(&self, id: &str) -> StoreResult<Option<CalendarEvent>> {
        self.query_opt(
            &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS),
            params![id],
            row_to_event,
        )
    }

    fn get_friendship(&self, id: &str) -> StoreResult<Option<Friend>> {
        self.query_opt(
            &format!("SELECT {} FROM friends WHERE id = ?1", FRIEND_COLUMNS),
            params![id],
            row_to_friend,
        )
    }

    fn get_connection(&self, id: &str) -> StoreResult<Option<CalendarConnection>> {
        self.query_opt(
            &format!("SELECT {} FROM calendar_connections WHERE id = ?1", CONNECTION_COLUMNS),
            params![id],
            row_to_connection,
        )
    }

    /// Responses for `vote_ids`, keyed by vote, in insertion order.
    fn responses_for(&self, vote_ids: &[String]) -> StoreResult<HashMap<String, Vec<VoteResponse>>> {
        let mut by_vote: HashMap<String, Vec<VoteResponse>> = HashMap::new();
        if vote_ids.is_empty() {
            return Ok(by_vote);
        }

        let sql = format!(
            "SELECT {} FROM vote_responses WHERE vote_id IN ({}) ORDER BY created_at, rowid",
            RESPONSE_COLUMNS,
            placeholders(vote_ids.len())
        );
        for response in self.query_all(&sql, params_from_iter(vote_ids.iter()), row_to_response)? {
            by_vote.entry(response.vote_id.clone()).or_default().push(response);
        }
        Ok(by_vote)
    }

    fn attach_responses(&self, mut votes: Vec<VoteProposal>) -> StoreResult<Vec<VoteProposal>> {
        let ids: Vec<String> = votes.iter().map(|v| v.id.clone()).collect();
        let mut by_vote = self.responses_for(&ids)?;
        for vote in &mut votes {
            vote.vote_responses = by_vote.remove(&vote.id).unwrap_or_default();
        }
        Ok(votes)
    }
}

impl DataStore for SqliteDataStore {
    fn get_profile(&self, id: &str) -> StoreResult<Option<User>> {
        self.query_opt(
            &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
            params![id],
            row_to_user,
        )
    }

    fn insert_profile(&self, profile: &User) -> StoreResult<User> {
        let created_at = profile.created_at.unwrap_or_else(now);
        self.conn.execute(
            "INSERT INTO profiles (id, name, username, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id,
                profile.name,
                profile.username,
                profile.avatar_url,
                fmt_time(created_at)
            ],
        )?;
        tracing::debug!("Created profile: {}", profile.id);

        self.get_profile(&profile.id)?
            .ok_or_else(|| StoreError::not_found(format!("profile {}", profile.id)))
    }

    fn find_profile_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.query_opt(
            &format!("SELECT {} FROM profiles WHERE username = ?1", PROFILE_COLUMNS),
            params![username],
            row_to_user,
        )
    }

    fn list_profiles(&self) -> StoreResult<Vec<User>> {
        self.query_all(
            &format!("SELECT {} FROM profiles ORDER BY name", PROFILE_COLUMNS),
            [],
            row_to_user,
        )
    }

    fn list_events(&self, user_id: &str) -> StoreResult<Vec<CalendarEvent>> {
        self.query_all(
            &format!(
                "SELECT {} FROM events WHERE user_id = ?1 ORDER BY start_time",
                EVENT_COLUMNS
            ),
            params![user_id],
            row_to_event,
        )
    }

    fn insert_event(&self, user_id: &str, form: &EventFormData) -> StoreResult<CalendarEvent> {
        form.validate()?;

        let id = new_id();
        self.conn.execute(
            "INSERT INTO events (id, user_id, title, description, start_time, end_time, location, color, is_private, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                user_id,
                form.title.trim(),
                form.description,
                fmt_time(form.start_time),
                fmt_time(form.end_time),
                form.location,
                form.color,
                form.is_private,
                fmt_time(now()),
            ],
        )?;
        tracing::debug!("Created event: {}", id);

        self.get_event(&id)?
            .ok_or_else(|| StoreError::not_found(format!("event {}", id)))
    }

    fn update_event(&self, event: &CalendarEvent) -> StoreResult<CalendarEvent> {
        event.validate()?;

        let affected = self.conn.execute(
            "UPDATE events
             SET title = ?1, description = ?2, start_time = ?3, end_time = ?4, location = ?5,
                 color = ?6, is_private = ?7, external_event_id = ?8
             WHERE id = ?9",
            params![
                event.title.trim(),
                event.description,
                fmt_time(event.start_time),
                fmt_time(event.end_time),
                event.location,
                event.color,
                event.is_private,
                event.external_event_id,
                event.id,
            ],
        )?;
        expect_affected(affected, format!("event {}", event.id))?;
        tracing::debug!("Updated event: {}", event.id);

        self.get_event(&event.id)?
            .ok_or_else(|| StoreError::not_found(format!("event {}", event.id)))
    }

    fn delete_event(&self, id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        expect_affected(affected, format!("event {}", id))?;
        tracing::debug!("Deleted event: {}", id);
        Ok(())
    }

    fn insert_group(&self, created_by: &str, form: &GroupFormData) -> StoreResult<Group> {
        form.validate()?;

        let id = new_id();
        self.conn.execute(
            "INSERT INTO groups (id, name, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, form.name.trim(), form.description, created_by, fmt_time(now())],
        )?;
        tracing::debug!("Created group: {}", id);

        self.get_group(&id)?
            .ok_or_else(|| StoreError::not_found(format!("group {}", id)))
    }

    fn list_groups(&self, ids: &[String]) -> StoreResult<Vec<Group>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM groups WHERE id IN ({}) ORDER BY created_at, rowid",
            GROUP_COLUMNS,
            placeholders(ids.len())
        );
        let mut groups = self.query_all(&sql, params_from_iter(ids.iter()), row_to_group)?;

        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY created_at, rowid",
        )?;
        for group in &mut groups {
            group.members = stmt
                .query_map(params![group.id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(groups)
    }

    fn list_memberships(&self, user_id: &str) -> StoreResult<Vec<GroupMember>> {
        self.query_all(
            &format!(
                "SELECT {} FROM group_members WHERE user_id = ?1 ORDER BY created_at, rowid",
                MEMBER_COLUMNS
            ),
            params![user_id],
            row_to_member,
        )
    }

    fn insert_members(
        &self,
        group_id: &str,
        user_ids: &[String],
        is_admin: bool,
    ) -> StoreResult<Vec<GroupMember>> {
        if self.get_group(group_id)?.is_none() {
            return Err(StoreError::not_found(format!("group {}", group_id)));
        }

        let tx = self.conn.unchecked_transaction()?;
        let created_at = now();
        let mut members = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let member = GroupMember {
                id: new_id(),
                group_id: group_id.to_string(),
                user_id: user_id.clone(),
                is_admin,
                created_at,
            };
            tx.execute(
                "INSERT INTO group_members (id, group_id, user_id, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    member.id,
                    member.group_id,
                    member.user_id,
                    member.is_admin,
                    fmt_time(member.created_at)
                ],
            )?;
            members.push(member);
        }
        tx.commit()?;

        tracing::debug!("Added {} members to group {}", members.len(), group_id);
        Ok(members)
    }

    fn delete_member(&self, group_id: &str, user_id: &str) -> StoreResult<()> {
        let affected = self.conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
        )?;
        expect_affected(affected, format!("member {} of group {}", user_id, group_id))
    }

    fn list_active_votes(&self, group_ids: &[String]) -> StoreResult<Vec<VoteProposal>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM votes WHERE status = 'active' AND group_id IN ({})
             ORDER BY proposed_start, rowid",
            VOTE_COLUMNS,
            placeholders(group_ids.len())
        );
        let votes = self.query_all(&sql, params_from_iter(group_ids.iter()), row_to_vote)?;
        self.attach_responses(votes)
    }

    fn get_vote(&self, id: &str) -> StoreResult<Option<VoteProposal>> {
        let vote = self.query_opt(
            &format!("SELECT {} FROM votes WHERE id = ?1", VOTE_COLUMNS),
            params![id],
            row_to_vote,
        )?;
        match vote {
            Some(vote) => Ok(self.attach_responses(vec![vote])?.pop()),
            None => Ok(None),
        }
    }

    fn insert_vote(&self, created_by: &str, form: &VoteFormData) -> StoreResult<VoteProposal> {
        form.validate()?;

        let id = new_id();
        self.conn.execute(
            "INSERT INTO votes (id, group_id, title, description, proposed_start, proposed_end, created_by, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                form.group_id,
                form.title.trim(),
                form.description,
                fmt_time(form.proposed_start),
                fmt_time(form.proposed_end),
                created_by,
                VoteStatus::Active.as_str(),
                fmt_time(now()),
            ],
        )?;
        tracing::debug!("Created vote proposal: {}", id);

        self.get_vote(&id)?
            .ok_or_else(|| StoreError::not_found(format!("vote {}", id)))
    }

    fn insert_vote_response(
        &self,
        vote_id: &str,
        user_id: &str,
        response: ResponseKind,
    ) -> StoreResult<VoteResponse> {
        let status = self.query_opt(
            "SELECT status FROM votes WHERE id = ?1",
            params![vote_id],
            |row| enum_col::<VoteStatus>(row, 0),
        )?;
        match status {
            None => return Err(StoreError::not_found(format!("vote {}", vote_id))),
            Some(VoteStatus::Active) => {}
            Some(_) => return Err(CalendarError::VoteClosed(vote_id.to_string()).into()),
        }

        let row = VoteResponse {
            id: new_id(),
            vote_id: vote_id.to_string(),
            user_id: user_id.to_string(),
            response,
            created_at: now(),
        };
        self.conn.execute(
            "INSERT INTO vote_responses (id, vote_id, user_id, response, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.id,
                row.vote_id,
                row.user_id,
                row.response.as_str(),
                fmt_time(row.created_at)
            ],
        )?;
        tracing::debug!("Recorded {} response on vote {}", row.response.as_str(), vote_id);
        Ok(row)
    }

    fn list_friendships(&self, user_id: &str) -> StoreResult<Vec<Friend>> {
        self.query_all(
            &format!(
                "SELECT {} FROM friends WHERE user_id = ?1 OR friend_id = ?1 ORDER BY created_at, rowid",
                FRIEND_COLUMNS
            ),
            params![user_id],
            row_to_friend,
        )
    }

    fn insert_friend_request(&self, user_id: &str, friend_id: &str) -> StoreResult<Friend> {
        let at = now();
        let friend = Friend {
            id: new_id(),
            user_id: user_id.to_string(),
            friend_id: friend_id.to_string(),
            status: FriendStatus::Pending,
            created_at: Some(at),
            updated_at: Some(at),
        };
        self.conn.execute(
            "INSERT INTO friends (id, user_id, friend_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                friend.id,
                friend.user_id,
                friend.friend_id,
                friend.status.as_str(),
                fmt_time(at)
            ],
        )?;
        tracing::debug!("Created friend request: {}", friend.id);
        Ok(friend)
    }

    fn update_friend_status(&self, id: &str, status: FriendStatus) -> StoreResult<Friend> {
        let affected = self.conn.execute(
            "UPDATE friends SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), fmt_time(now()), id],
        )?;
        expect_affected(affected, format!("friend request {}", id))?;

        self.get_friendship(id)?
            .ok_or_else(|| StoreError::not_found(format!("friend request {}", id)))
    }

    fn delete_friendship(&self, id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM friends WHERE id = ?1", params![id])?;
        expect_affected(affected, format!("friend request {}", id))
    }

    fn list_connections(&self, user_id: &str) -> StoreResult<Vec<CalendarConnection>> {
        self.query_all(
            &format!(
                "SELECT {} FROM calendar_connections WHERE user_id = ?1 ORDER BY created_at, rowid",
                CONNECTION_COLUMNS
            ),
            params![user_id],
            row_to_connection,
        )
    }

    fn insert_connection(&self, connection: &CalendarConnection) -> StoreResult<CalendarConnection> {
        let id = new_id();
        self.conn.execute(
            &format!(
                "INSERT INTO calendar_connections ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                CONNECTION_COLUMNS
            ),
            params![
                id,
                connection.user_id,
                connection.provider.as_str(),
                connection.external_calendar_id,
                connection.calendar_name,
                connection.sync_token,
                connection.last_synced_at.map(fmt_time),
                fmt_time(connection.created_at.unwrap_or_else(now)),
                connection.access_token,
                connection.refresh_token,
                fmt_time(connection.token_expires_at),
            ],
        )?;
        tracing::debug!("Stored calendar connection: {}", id);

        self.get_connection(&id)?
            .ok_or_else(|| StoreError::not_found(format!("calendar connection {}", id)))
    }

    fn delete_connection(&self, id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM calendar_connections WHERE id = ?1", params![id])?;
        expect_affected(affected, format!("calendar connection {}", id))?;
        tracing::debug!("Deleted calendar connection: {}", id);
        Ok(())
    }

    fn touch_connections(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<usize> {
        let affected = self.conn.execute(
            "UPDATE calendar_connections SET last_synced_at = ?1 WHERE user_id = ?2",
            params![fmt_time(at), user_id],
        )?;
        Ok(affected)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time at the precision stored on disk.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn corrupt(idx: usize, err: CalendarError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn time_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| corrupt(idx, e))
}

fn opt_time_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(&s).map_err(|e| corrupt(idx, e)))
        .transpose()
}

fn enum_col<T: FromStr<Err = CalendarError>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| corrupt(idx, e))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: opt_time_col(row, 4)?,
    })
}

fn row_to_event(row: &Row) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: time_col(row, 4)?,
        end_time: time_col(row, 5)?,
        location: row.get(6)?,
        color: row.get(7)?,
        is_private: row.get(8)?,
        created_at: opt_time_col(row, 9)?,
        external_event_id: row.get(10)?,
    })
}

fn row_to_group(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        created_at: time_col(row, 4)?,
        members: Vec::new(),
    })
}

fn row_to_member(row: &Row) -> rusqlite::Result<GroupMember> {
    Ok(GroupMember {
        id: row.get(0)?,
        group_id: row.get(1)?,
        user_id: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: time_col(row, 4)?,
    })
}

fn row_to_vote(row: &Row) -> rusqlite::Result<VoteProposal> {
    Ok(VoteProposal {
        id: row.get(0)?,
        group_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        proposed_start: time_col(row, 4)?,
        proposed_end: time_col(row, 5)?,
        created_by: row.get(6)?,
        status: enum_col(row, 7)?,
        created_at: time_col(row, 8)?,
        vote_responses: Vec::new(),
    })
}

fn row_to_response(row: &Row) -> rusqlite::Result<VoteResponse> {
    Ok(VoteResponse {
        id: row.get(0)?,
        vote_id: row.get(1)?,
        user_id: row.get(2)?,
        response: enum_col(row, 3)?,
        created_at: time_col(row, 4)?,
    })
}

fn row_to_friend(row: &Row) -> rusqlite::Result<Friend> {
    Ok(Friend {
        id: row.get(0)?,
        user_id: row.get(1)?,
        friend_id: row.get(2)?,
        status: enum_col(row, 3)?,
        created_at: opt_time_col(row, 4)?,
        updated_at: opt_time_col(row, 5)?,
    })
}

fn row_to_connection(row: &Row) -> rusqlite::Result<CalendarConnection> {
    Ok(CalendarConnection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: enum_col(row, 2)?,
        external_calendar_id: row.get(3)?,
        calendar_name: row.get(4)?,
        sync_token: row.get(5)?,
        last_synced_at: opt_time_col(row, 6)?,
        created_at: opt_time_col(row, 7)?,
        access_token: row.get(8)?,
        refresh_token: row.get(9)?,
        token_expires_at: time_col(row, 10)?,
    })
}
