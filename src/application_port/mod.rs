mod auth_service;
mod token_service;

pub use auth_service::*;
pub use token_service::*;
