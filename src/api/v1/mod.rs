mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::RefreshCookie;
pub use error::{ApiError, ApiErrorCode, recover_error};
pub use handler::ApiResponse;
pub use router::routes;
