//! The user entity and its access-control sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Paper identifiers a user relates to through one ACL set.
pub type PaperSet = BTreeSet<i64>;

/// Identity and access-control record.
///
/// An `id` of 0 means the record has not been stored yet (or, when returned
/// by a repository, that no record exists). The four paper sets serialise as
/// integer arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub owns: PaperSet,
    #[serde(default)]
    pub can_see: PaperSet,
    #[serde(default)]
    pub can_edit: PaperSet,
    #[serde(default)]
    pub bookmarks: PaperSet,
}

impl User {
    /// Create an unsaved user.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// Whether this is the zero-value record repositories return for
    /// absent ids.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Record ownership of a paper: the owner can also see and edit it.
    pub fn grant_ownership(&mut self, paper_id: i64) {
        self.owns.insert(paper_id);
        self.can_see.insert(paper_id);
        self.can_edit.insert(paper_id);
    }

    /// Add or remove a bookmark. Returns whether the set changed.
    pub fn set_bookmark(&mut self, paper_id: i64, bookmark: bool) -> bool {
        if bookmark {
            self.bookmarks.insert(paper_id)
        } else {
            self.bookmarks.remove(&paper_id)
        }
    }

    /// Whether the user may read the paper. Admins see everything.
    pub fn can_see_paper(&self, paper_id: i64) -> bool {
        self.is_admin || self.can_see.contains(&paper_id)
    }

    /// Whether the user may modify the paper. Admins edit everything.
    pub fn can_edit_paper(&self, paper_id: i64) -> bool {
        self.is_admin || self.can_edit.contains(&paper_id)
    }
}
