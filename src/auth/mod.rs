//! Identity and access control.
//!
//! - `token`: signs and verifies bearer tokens
//! - `user` / `user_store` / `memory_store`: the user record and its storage
//! - `gate` / `context`: request authentication and the caller identity it
//!   attaches
//! - `service`: the operations behind the HTTP surface

pub mod context;
pub mod gate;
pub mod memory_store;
pub mod service;
pub mod token;
pub mod user;
pub mod user_store;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::{Identity, UserContext};
pub use gate::{AuthError, AuthGate, AuthMode, optional_auth, require_auth};
pub use memory_store::MemoryUserStore;
pub use service::{ServiceError, UserService};
pub use token::{TokenCodec, TokenError};
pub use user::{PaperSet, User};
pub use user_store::{MAX_USER_ID, StoreError, StoreFuture, UserRepository, UserStore};
