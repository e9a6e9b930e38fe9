use serde::{Deserialize, Serialize};

use crate::auth::user::User;

/// Table holding one record per user, keyed `user:<id>`.
pub const USER_TABLE: &str = "user";

/// Inverse ownership index, keyed `paper_owner:<paper id>`.
pub const PAPER_OWNER_TABLE: &str = "paper_owner";

/// Monotonic counters, e.g. `counter:user` for user ids.
pub const COUNTER_TABLE: &str = "counter";

/// Persisted user record.
///
/// The numeric id is duplicated in `uid` so that it can be filtered and
/// sorted on without parsing the record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Numeric user id (also the key of the record id).
    pub uid: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    /// Papers owned by this user
    #[serde(default)]
    pub owns: Vec<i64>,
    /// Papers this user can read
    #[serde(default)]
    pub can_see: Vec<i64>,
    /// Papers this user can modify
    #[serde(default)]
    pub can_edit: Vec<i64>,
    #[serde(default)]
    pub bookmarks: Vec<i64>,
}

impl UserRecord {
    /// Build the stored form of `user` under the given id.
    pub fn from_user(uid: i64, user: &User) -> Self {
        Self {
            uid,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            owns: user.owns.iter().copied().collect(),
            can_see: user.can_see.iter().copied().collect(),
            can_edit: user.can_edit.iter().copied().collect(),
            bookmarks: user.bookmarks.iter().copied().collect(),
        }
    }

    pub fn into_user(self) -> User {
        User {
            id: self.uid,
            name: self.name,
            email: self.email,
            is_admin: self.is_admin,
            owns: self.owns.into_iter().collect(),
            can_see: self.can_see.into_iter().collect(),
            can_edit: self.can_edit.into_iter().collect(),
            bookmarks: self.bookmarks.into_iter().collect(),
        }
    }
}

/// Counter record advanced by `UPSERT ... SET seq += 1`.
#[derive(Debug, Clone, Deserialize)]
pub struct CounterRecord {
    pub seq: i64,
}
