mod user_repo_postgres;

pub use user_repo_postgres::*;

mod util;
