pub mod password;
pub mod token;

pub use password::CredentialCodec;
pub use token::{Claims, TokenManager, TokenPurpose};
