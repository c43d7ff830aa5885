//! Friend requests.
//!
//! Friendships are not cached on `AppState`; each call goes straight to the
//! store.

use serde::Serialize;
use tracing::instrument;

use linkup_calendar::{Friend, FriendStatus};

use crate::error::{StoreError, StoreResult};
use crate::state::AppState;

/// The viewer's friendships, split the way the friends screen shows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FriendOverview {
    /// Pending requests sent to the viewer.
    pub incoming: Vec<Friend>,
    /// Pending requests the viewer sent.
    pub outgoing: Vec<Friend>,
    pub accepted: Vec<Friend>,
}

impl FriendOverview {
    fn from_rows(rows: Vec<Friend>, viewer: &str) -> Self {
        let mut overview = Self::default();
        for row in rows {
            match row.status {
                FriendStatus::Pending if row.friend_id == viewer => overview.incoming.push(row),
                FriendStatus::Pending => overview.outgoing.push(row),
                FriendStatus::Accepted => overview.accepted.push(row),
                FriendStatus::Rejected => {}
            }
        }
        overview
    }
}

/// The other side of `friend` from `viewer`'s point of view.
pub fn counterpart<'a>(friend: &'a Friend, viewer: &str) -> &'a str {
    if friend.user_id == viewer {
        &friend.friend_id
    } else {
        &friend.user_id
    }
}

impl AppState {
    /// Send a friend request to the user with `username`.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn send_friend_request(&self, username: &str) -> StoreResult<Friend> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(StoreError::validation("Please enter a username"));
        }

        let viewer = self.viewer_id.clone();
        let request = self
            .store
            .run(move |s| {
                let target = s
                    .find_profile_by_username(&username)?
                    .ok_or_else(|| StoreError::not_found(format!("user {}", username)))?;
                if target.id == viewer {
                    return Err(StoreError::validation("You cannot add yourself as a friend"));
                }
                if s.find_friendship(&viewer, &target.id)?.is_some() {
                    return Err(StoreError::conflict("Friend request already exists"));
                }
                s.insert_friend_request(&viewer, &target.id)
            })
            .await?;

        tracing::info!("Friend request sent: {}", request.id);
        Ok(request)
    }

    /// Accept or reject a pending request addressed to the viewer.
    ///
    /// Accepting returns the updated friendship; rejecting deletes it.
    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn respond_to_friend_request(
        &self,
        request_id: &str,
        accept: bool,
    ) -> StoreResult<Option<Friend>> {
        let viewer = self.viewer_id.clone();
        let id = request_id.to_string();
        let outcome = self
            .store
            .run(move |s| {
                let pending = s
                    .list_friendships(&viewer)?
                    .into_iter()
                    .any(|f| f.id == id && f.friend_id == viewer && f.status == FriendStatus::Pending);
                if !pending {
                    return Err(StoreError::not_found(format!("friend request {}", id)));
                }

                if accept {
                    s.update_friend_status(&id, FriendStatus::Accepted).map(Some)
                } else {
                    s.delete_friendship(&id).map(|_| None)
                }
            })
            .await?;

        tracing::info!(
            "Friend request {} {}",
            request_id,
            if accept { "accepted" } else { "rejected" }
        );
        Ok(outcome)
    }

    #[instrument(skip(self), fields(viewer = %self.viewer_id))]
    pub async fn friend_overview(&self) -> StoreResult<FriendOverview> {
        let viewer = self.viewer_id.clone();
        self.store
            .run(move |s| {
                let rows = s.list_friendships(&viewer)?;
                Ok(FriendOverview::from_rows(rows, &viewer))
            })
            .await
    }
}
