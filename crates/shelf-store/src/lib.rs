//! User and session persistence for Shelf.
//!
//! The [`Driver`] trait is the persistence seam: [`SqliteDriver`] is the
//! production backend and [`MockDriver`] an in-memory stand-in for tests.
//! [`Store`] sits on top of a driver and fronts the id-keyed lookups the
//! authentication path performs on every call with [`shelf_cache::TtlCache`].

pub mod error;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use sqlite::SqliteDriver;
pub use storage::{Driver, MockDriver, Operation};
pub use store::Store;
pub use types::{
    NewUser, Role, RoleParseError, SESSION_WINDOW_SECS, Session, User, UserFilter,
    session_window,
};
