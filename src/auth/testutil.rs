//! Conformance checks run against every `UserRepository` implementation.

use std::sync::Arc;

use crate::auth::user::User;
use crate::auth::user_store::{MAX_USER_ID, StoreError, UserRepository};

fn papers(ids: &[i64]) -> crate::auth::user::PaperSet {
    ids.iter().copied().collect()
}

pub(crate) fn pizza() -> User {
    let mut user = User::new("Pizza", "pizza@paper.net");
    user.is_admin = true;
    user
}

pub(crate) fn yolo() -> User {
    let mut user = User::new("Yolo", "yolo@paper.net");
    user.owns = papers(&[1, 10]);
    user.can_see = papers(&[1, 10]);
    user.can_edit = papers(&[1, 10]);
    user.bookmarks = papers(&[1, 10]);
    user
}

/// Insert, read, update, list, look up by email and delete.
pub(crate) async fn test_user_repository(repo: &dyn UserRepository) {
    let mut users = vec![pizza(), yolo()];

    for user in users.iter_mut() {
        repo.upsert(user).await.unwrap();
        assert_ne!(user.id, 0, "id must be set by insert of {}", user.name);
    }
    assert_ne!(users[0].id, users[1].id, "all ids must be different");

    for user in &users {
        assert_eq!(&repo.get(user.id).await.unwrap(), user);
    }

    // Update pizza's email
    users[0].email = "pizza@yolo.space".to_string();
    let id = users[0].id;
    repo.upsert(&mut users[0]).await.unwrap();
    assert_eq!(users[0].id, id, "id must not change on update");

    // Update yolo's owns and bookmarks
    users[1].owns = papers(&[1, 2, 3]);
    users[1].bookmarks = papers(&[1, 2]);
    let id = users[1].id;
    repo.upsert(&mut users[1]).await.unwrap();
    assert_eq!(users[1].id, id, "id must not change on update");
    assert_eq!(repo.get(id).await.unwrap(), users[1]);

    let mut listed = repo.list().await.unwrap();
    listed.sort_by_key(|u| u.id);
    assert_eq!(listed, users);

    assert_eq!(repo.paper_owner(1).await.unwrap(), users[1].id);
    assert_eq!(repo.paper_owner(2).await.unwrap(), users[1].id);
    assert_eq!(repo.paper_owner(10).await.unwrap(), 0, "10 left yolo's owns");
    assert_eq!(repo.paper_owner(999).await.unwrap(), 0);

    assert_eq!(repo.get_by_email("pizza@yolo.space").await.unwrap(), users[0]);
    assert!(repo.get_by_email("nobody@paper.net").await.unwrap().is_empty());

    let yolo_id = users[1].id;
    repo.delete(yolo_id).await.unwrap();
    assert!(repo.get(yolo_id).await.unwrap().is_empty());
    assert_eq!(repo.paper_owner(1).await.unwrap(), 0);

    // Deleting again is not an error
    repo.delete(yolo_id).await.unwrap();
    assert_eq!(repo.list().await.unwrap(), vec![users[0].clone()]);
}

/// A paper claimed by a second user leaves the first user's `owns`.
pub(crate) async fn test_ownership_exclusivity(repo: &dyn UserRepository) {
    let mut first = yolo();
    repo.upsert(&mut first).await.unwrap();

    let mut second = User::new("Pizza", "pizza@paper.net");
    second.owns = papers(&[10, 20]);
    repo.upsert(&mut second).await.unwrap();

    assert_eq!(repo.paper_owner(1).await.unwrap(), first.id);
    assert_eq!(repo.paper_owner(10).await.unwrap(), second.id);
    assert_eq!(repo.paper_owner(20).await.unwrap(), second.id);

    let first = repo.get(first.id).await.unwrap();
    assert_eq!(first.owns, papers(&[1]));
    // Only ownership moves; read and write grants stay
    assert!(first.can_see.contains(&10));
}

/// `count` concurrent inserts all receive distinct ids.
pub(crate) async fn test_concurrent_inserts(repo: Arc<dyn UserRepository>, count: usize) {
    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let mut user = User::new(format!("user-{}", i), format!("user-{}@paper.net", i));
            repo.upsert(&mut user).await.unwrap();
            user.id
        }));
    }

    let mut ids = Vec::with_capacity(count);
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), count, "all ids must be different");
    assert!(ids.iter().all(|id| *id > 0));
    assert_eq!(repo.list().await.unwrap().len(), count);
}

/// Ids stop at `MAX_USER_ID`: the store refuses to go past it and keeps
/// working afterwards.
pub(crate) async fn test_id_space_exhaustion(repo: &dyn UserRepository) {
    let mut top = User::new("Top", "top@paper.net");
    top.id = i64::MAX;
    assert!(matches!(repo.upsert(&mut top).await, Err(StoreError::Storage(_))));
    assert!(repo.get(i64::MAX).await.unwrap().is_empty());

    let mut high = User::new("High", "high@paper.net");
    high.id = MAX_USER_ID - 1;
    repo.upsert(&mut high).await.unwrap();

    let mut last = User::new("Last", "last@paper.net");
    repo.upsert(&mut last).await.unwrap();
    assert_eq!(last.id, MAX_USER_ID);

    // The last id can still be updated in place
    repo.upsert(&mut last).await.unwrap();

    let mut overflow = User::new("Overflow", "overflow@paper.net");
    assert!(matches!(repo.upsert(&mut overflow).await, Err(StoreError::Storage(_))));
    assert_eq!(overflow.id, 0);

    // Still usable
    high.name = "Renamed".to_string();
    repo.upsert(&mut high).await.unwrap();
    assert_eq!(repo.get(high.id).await.unwrap().name, "Renamed");
    assert_eq!(repo.list().await.unwrap().len(), 2);
}
