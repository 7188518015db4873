mod role;
mod token;
mod user;

pub use role::*;
pub use token::*;
pub use user::*;
