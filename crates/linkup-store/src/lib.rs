//! Persistence and application state for LinkUp.

pub mod error;
pub mod friends;
pub mod handle;
pub mod sqlite;
pub mod state;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use friends::{counterpart, FriendOverview};
pub use handle::StoreHandle;
pub use sqlite::SqliteDataStore;
pub use state::{profile_name_from_email, AppState};
pub use store::DataStore;
