pub mod auth;
pub mod body;
pub mod response;

pub use auth::{authorize, method_name, AuthorizationGate, CallerIdentity};
pub use body::JsonBody;
pub use response::{ApiResponse, ApiResult};
