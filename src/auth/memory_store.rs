//! In-memory `UserRepository`.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::user::User;
use crate::auth::user_store::{
    MAX_USER_ID, StoreError, StoreFuture, UserRepository, check_explicit_id, id_space_exhausted,
};

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<i64, User>,
    /// paper id -> owner id
    owners: HashMap<i64, i64>,
    last_id: i64,
}

/// Process-local user store with the same semantics as `UserStore`.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: RwLock<State>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn upsert(&mut self, user: &mut User) -> Result<(), StoreError> {
        let id = if user.id <= 0 {
            self.last_id = self
                .last_id
                .checked_add(1)
                .filter(|id| *id <= MAX_USER_ID)
                .ok_or_else(id_space_exhausted)?;
            debug!(user_id = self.last_id, "Assigned new user id");
            self.last_id
        } else {
            check_explicit_id(user.id)?;
            self.last_id = self.last_id.max(user.id);
            user.id
        };
        user.id = id;

        // Papers claimed by this write leave their previous owner
        for paper_id in &user.owns {
            if let Some(previous) = self.owners.insert(*paper_id, id) {
                if previous != id {
                    if let Some(other) = self.users.get_mut(&previous) {
                        other.owns.remove(paper_id);
                    }
                }
            }
        }
        self.owners
            .retain(|paper_id, owner| *owner != id || user.owns.contains(paper_id));

        self.users.insert(id, user.clone());
        Ok(())
    }

    fn delete(&mut self, id: i64) {
        if self.users.remove(&id).is_some() {
            self.owners.retain(|_, owner| *owner != id);
        }
    }
}

impl UserRepository for MemoryUserStore {
    fn upsert<'a>(&'a self, user: &'a mut User) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.state.write().await.upsert(user)
        })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, User> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state.users.get(&id).cloned().unwrap_or_default())
        })
    }

    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, User> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state
                .users
                .values()
                .find(|u| u.email == email)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn delete(&self, id: i64) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.state.write().await.delete(id);
            Ok(())
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<User>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state.users.values().cloned().collect())
        })
    }

    fn paper_owner(&self, paper_id: i64) -> StoreFuture<'_, i64> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state.owners.get(&paper_id).copied().unwrap_or(0))
        })
    }
}
