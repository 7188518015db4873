// store

mod auth_session_store;

pub use auth_session_store::*;

// repo

mod user_repo;

pub use user_repo::*;

mod clock;

pub use clock::*;
