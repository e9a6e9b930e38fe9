//! User storage and management.
//!
//! `UserRepository` is the storage capability the rest of the service is
//! written against. `UserStore` implements it on SurrealDB; the in-memory
//! variant lives in `memory_store`.
//!
//! Contract shared by every implementation:
//! - `upsert` with `id == 0` allocates the next id atomically and writes it
//!   back into the record; otherwise it overwrites the record at `id`.
//! - `get`/`get_by_email` return `User::default()` for absent records.
//! - `delete` is idempotent.
//! - `paper_owner` returns 0 when nobody owns the paper. At most one user
//!   owns a paper: the last `upsert` claiming it wins and the paper leaves
//!   the previous owner's `owns` set.
//! - Ids never pass `MAX_USER_ID`. Larger explicit ids are refused, and
//!   allocation fails with `StoreError::Storage` once the counter reaches it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use surrealdb::{RecordId, Response};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::auth::user::User;
use crate::db::Db;
use crate::db::schema::{COUNTER_TABLE, CounterRecord, PAPER_OWNER_TABLE, USER_TABLE, UserRecord};

/// Default deadline applied to every storage operation.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest id a user can hold. One below `i64::MAX` so that advancing the
/// counter past it can never overflow.
pub const MAX_USER_ID: i64 = i64::MAX - 1;

/// Error returned when no further user id can be handed out.
pub(crate) fn id_space_exhausted() -> StoreError {
    StoreError::Storage("user id space exhausted".to_string())
}

pub(crate) fn check_explicit_id(id: i64) -> Result<(), StoreError> {
    if id > MAX_USER_ID {
        return Err(StoreError::Storage(format!("user id {} is out of range", id)));
    }
    Ok(())
}

/// Fields read back for a user, in record order.
const USER_FIELDS: &str = "uid, name, email, is_admin, owns, can_see, can_edit, bookmarks";

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O or (de)serialisation failure.
    Storage(String),
    /// The operation did not finish before its deadline.
    Timeout(Duration),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Timeout(after) => write!(f, "Storage error: timed out after {:?}", after),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Boxed future returned by repository operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Persistence capability for users and the paper ownership index.
pub trait UserRepository: Send + Sync {
    /// Insert (`user.id == 0`) or overwrite a user. Assigned ids are written
    /// back into `user`.
    fn upsert<'a>(&'a self, user: &'a mut User) -> StoreFuture<'a, ()>;

    /// Get a user, or the zero-value user if `id` is unknown.
    fn get(&self, id: i64) -> StoreFuture<'_, User>;

    /// Get the first user with this email, or the zero-value user.
    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, User>;

    /// Remove a user and release the papers they owned.
    fn delete(&self, id: i64) -> StoreFuture<'_, ()>;

    /// All users, in no particular order.
    fn list(&self) -> StoreFuture<'_, Vec<User>>;

    /// Id of the user owning `paper_id`, or 0.
    fn paper_owner(&self, paper_id: i64) -> StoreFuture<'_, i64>;
}

/// SurrealDB-backed user store.
///
/// Ids come from the `counter:user` record. Each mutation runs as
/// a single SurrealDB transaction that also maintains the `paper_owner`
/// index. Writers are serialised through `write_lock`.
///
/// Reads and the wait for `write_lock` are cut off at the deadline. A write
/// that holds the lock is never abandoned halfway: its statements carry a
/// SurrealQL `TIMEOUT`, so the engine either commits the whole transaction
/// or cancels it and reports the failure.
pub struct UserStore {
    db: Db,
    write_lock: Mutex<()>,
    timeout: Duration,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Set the deadline applied to each operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deadline for reads. Dropping a read has no side effects.
    async fn with_deadline<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    /// Wait for the writer lock, giving up at the deadline.
    async fn lock_writer(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        tokio::time::timeout(self.timeout, self.write_lock.lock())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))
    }

    /// `TIMEOUT` clause bounding each write statement inside the engine.
    fn timeout_clause(&self) -> String {
        format!("TIMEOUT {}ms", self.timeout.as_millis().max(1))
    }

    /// Turn the per-statement results of a write into one outcome. A
    /// statement that hit its `TIMEOUT` cancels the transaction and is
    /// reported as `StoreError::Timeout`.
    fn check_write(&self, mut res: Response) -> Result<(), StoreError> {
        let mut errors: Vec<_> = res.take_errors().into_iter().collect();
        if errors.is_empty() {
            return Ok(());
        }

        let timed_out = errors.iter().any(|(_, err)| {
            matches!(err, surrealdb::Error::Db(surrealdb::error::Db::QueryTimedout))
        });
        if timed_out {
            return Err(StoreError::Timeout(self.timeout));
        }

        errors.sort_by_key(|(index, _)| *index);
        let (_, first) = errors.swap_remove(0);
        Err(first.into())
    }

    /// Advance the user id counter and return the new value. Runs under
    /// the writer lock.
    async fn next_id(&self) -> Result<i64, StoreError> {
        let current = format!("SELECT VALUE seq FROM {}:user", COUNTER_TABLE);
        let mut res = self.db.query(current).await?;
        let seq: Option<i64> = res.take(0)?;
        if seq.unwrap_or(0) >= MAX_USER_ID {
            return Err(id_space_exhausted());
        }

        let query = format!(
            "UPSERT {}:user SET seq += 1 RETURN AFTER {}",
            COUNTER_TABLE,
            self.timeout_clause()
        );

        let mut res = self.db.query(query).await?;
        let seq: Option<CounterRecord> = res.take(0)?;

        seq.map(|s| s.seq)
            .filter(|id| *id > 0)
            .ok_or_else(|| StoreError::Storage("user id counter returned no value".to_string()))
    }

    async fn upsert_user(&self, user: &mut User) -> Result<(), StoreError> {
        if user.id > 0 {
            check_explicit_id(user.id)?;
        }

        let _guard = self.lock_writer().await?;

        let id = if user.id <= 0 { self.next_id().await? } else { user.id };

        let query = format!(
            r#"
            BEGIN TRANSACTION;
            UPDATE {users} SET owns = array::complement(owns, $owns)
                WHERE uid != $uid AND owns CONTAINSANY $owns {timeout};
            DELETE {owners} WHERE user_id = $uid OR paper_id INSIDE $owns {timeout};
            UPSERT $rid CONTENT $record {timeout};
            UPSERT {counter}:user SET seq = math::max([seq OR 0, $uid]) {timeout};
            FOR $paper IN $owns {{
                CREATE type::thing('{owners}', $paper)
                    CONTENT {{ paper_id: $paper, user_id: $uid }} {timeout};
            }};
            COMMIT TRANSACTION;
            "#,
            users = USER_TABLE,
            owners = PAPER_OWNER_TABLE,
            counter = COUNTER_TABLE,
            timeout = self.timeout_clause(),
        );

        let record = UserRecord::from_user(id, user);
        let owns = record.owns.clone();

        let res = self
            .db
            .query(query)
            .bind(("uid", id))
            .bind(("rid", RecordId::from_table_key(USER_TABLE, id)))
            .bind(("owns", owns))
            .bind(("record", record))
            .await?;
        self.check_write(res)?;

        if user.id != id {
            debug!(user_id = id, "Assigned new user id");
        }
        user.id = id;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        let query = format!("SELECT {} FROM $rid", USER_FIELDS);

        let mut res = self
            .db
            .query(query)
            .bind(("rid", RecordId::from_table_key(USER_TABLE, id)))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next().map(UserRecord::into_user).unwrap_or_default())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = format!(
            "SELECT {} FROM {} WHERE email = $email ORDER BY uid LIMIT 1",
            USER_FIELDS, USER_TABLE
        );

        let mut res = self
            .db
            .query(query)
            .bind(("email", email.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next().map(UserRecord::into_user).unwrap_or_default())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let _guard = self.lock_writer().await?;

        let query = format!(
            r#"
            BEGIN TRANSACTION;
            DELETE {owners} WHERE user_id = $uid {timeout};
            DELETE $rid {timeout};
            COMMIT TRANSACTION;
            "#,
            owners = PAPER_OWNER_TABLE,
            timeout = self.timeout_clause(),
        );

        let res = self
            .db
            .query(query)
            .bind(("uid", id))
            .bind(("rid", RecordId::from_table_key(USER_TABLE, id)))
            .await?;
        self.check_write(res)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {} FROM {} ORDER BY uid", USER_FIELDS, USER_TABLE);

        let mut res = self.db.query(query).await?;
        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().map(UserRecord::into_user).collect())
    }

    async fn owner_of(&self, paper_id: i64) -> Result<i64, StoreError> {
        let mut res = self
            .db
            .query("SELECT VALUE user_id FROM $pid")
            .bind(("pid", RecordId::from_table_key(PAPER_OWNER_TABLE, paper_id)))
            .await?;

        let owners: Vec<i64> = res.take(0)?;
        Ok(owners.into_iter().next().unwrap_or(0))
    }
}

impl UserRepository for UserStore {
    fn upsert<'a>(&'a self, user: &'a mut User) -> StoreFuture<'a, ()> {
        Box::pin(self.upsert_user(user))
    }

    fn get(&self, id: i64) -> StoreFuture<'_, User> {
        Box::pin(self.with_deadline(self.get_user(id)))
    }

    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, User> {
        Box::pin(self.with_deadline(self.get_user_by_email(email)))
    }

    fn delete(&self, id: i64) -> StoreFuture<'_, ()> {
        Box::pin(self.delete_user(id))
    }

    fn list(&self) -> StoreFuture<'_, Vec<User>> {
        Box::pin(self.with_deadline(self.list_users()))
    }

    fn paper_owner(&self, paper_id: i64) -> StoreFuture<'_, i64> {
        Box::pin(self.with_deadline(self.owner_of(paper_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use std::sync::Arc;

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_user_repository_contract() {
        let store = UserStore::new(setup_test_db().await);
        testutil::test_user_repository(&store).await;
    }

    #[tokio::test]
    async fn test_ownership_is_exclusive() {
        let store = UserStore::new(setup_test_db().await);
        testutil::test_ownership_exclusivity(&store).await;
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_distinct_ids() {
        let store: Arc<dyn UserRepository> = Arc::new(UserStore::new(setup_test_db().await));
        testutil::test_concurrent_inserts(store, 16).await;
    }

    #[tokio::test]
    async fn test_ids_continue_after_delete() {
        let store = UserStore::new(setup_test_db().await);

        let mut first = User::new("Pizza", "pizza@paper.net");
        store.upsert(&mut first).await.unwrap();
        store.delete(first.id).await.unwrap();

        let mut second = User::new("Yolo", "yolo@paper.net");
        store.upsert(&mut second).await.unwrap();
        assert!(second.id > first.id, "ids must never be reused");
    }

    #[tokio::test]
    async fn test_upsert_with_explicit_id_creates_record() {
        let store = UserStore::new(setup_test_db().await);

        let mut user = User::new("Pizza", "pizza@paper.net");
        user.id = 42;
        store.upsert(&mut user).await.unwrap();

        assert_eq!(user.id, 42);
        assert_eq!(store.get(42).await.unwrap().name, "Pizza");

        let mut next = User::new("Yolo", "yolo@paper.net");
        store.upsert(&mut next).await.unwrap();
        assert_eq!(next.id, 43);
    }

    #[tokio::test]
    async fn test_deadline_turns_into_timeout_error() {
        let store =
            UserStore::new(setup_test_db().await).with_timeout(Duration::from_millis(10));

        let result = store
            .with_deadline(std::future::pending::<Result<(), StoreError>>())
            .await;
        assert_eq!(result, Err(StoreError::Timeout(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn test_id_space_is_bounded() {
        let store = UserStore::new(setup_test_db().await);
        testutil::test_id_space_exhaustion(&store).await;
    }

    #[tokio::test]
    async fn test_waiting_writer_gives_up_without_writing() {
        let db = setup_test_db().await;
        let store = UserStore::new(db.clone()).with_timeout(Duration::from_millis(20));

        let held = store.write_lock.lock().await;
        let mut user = User::new("Pizza", "pizza@paper.net");
        let result = store.upsert(&mut user).await;
        assert_eq!(result, Err(StoreError::Timeout(Duration::from_millis(20))));
        assert_eq!(user.id, 0);
        assert_eq!(
            store.delete(1).await,
            Err(StoreError::Timeout(Duration::from_millis(20)))
        );
        drop(held);

        let untimed = UserStore::new(db);
        assert!(untimed.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_outcome_matches_what_was_stored() {
        let db = setup_test_db().await;
        let store = UserStore::new(db.clone()).with_timeout(Duration::from_millis(1));
        let untimed = UserStore::new(db);

        for id in 1..=50 {
            let mut user = User::new(format!("user{}", id), "tight@paper.net");
            user.id = id;
            user.owns = [id].into_iter().collect();

            let stored = store.upsert(&mut user).await.is_ok();
            let found = untimed.get(id).await.unwrap();
            assert_eq!(!found.is_empty(), stored, "user {} reported {}", id, stored);
            let owner = untimed.paper_owner(id).await.unwrap();
            assert_eq!(owner == id, stored, "paper {} index out of step", id);
        }

        let mut fresh = User::new("Fresh", "fresh@paper.net");
        if store.upsert(&mut fresh).await.is_ok() {
            assert_eq!(untimed.get(fresh.id).await.unwrap().name, "Fresh");
        } else {
            assert_eq!(fresh.id, 0);
        }
    }

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Storage("disk full".to_string()).to_string(),
            "Storage error: disk full"
        );
        assert!(
            StoreError::Timeout(Duration::from_secs(1))
                .to_string()
                .starts_with("Storage error: timed out")
        );
    }
}
