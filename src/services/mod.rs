pub mod account_service;
pub mod feed_service;
pub mod identity_service;
pub mod ownership_service;

pub use account_service::AccountService;
pub use feed_service::FeedService;
pub use identity_service::{Credential, IdentityResolver, SignReply, SignUp};
pub use ownership_service::OwnershipCoordinator;
