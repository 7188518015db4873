mod auth_gate;
mod auth_service_impl;
mod credential_hasher_argon2;
mod token_codec_jwt;
mod token_service_impl;

pub use auth_gate::*;
pub use auth_service_impl::*;
pub use credential_hasher_argon2::*;
pub use token_codec_jwt::*;
pub use token_service_impl::*;
