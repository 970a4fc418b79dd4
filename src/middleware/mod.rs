pub mod auth;
pub mod response;

pub use auth::{authenticate, AuthUser};
pub use response::{ApiResponse, ApiResult, ListResponse};
