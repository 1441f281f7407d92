pub mod account;
pub mod feed;
pub mod pet;
pub mod update;

pub use account::{
    Account, AccountCredential, AccountField, AccountView, OAuthIdentity, OAUTH_PROVIDER_GOOGLE,
    OAUTH_PROVIDER_KAKAO,
};
pub use feed::{Feed, FeedView, NewFeed};
pub use pet::{NewPet, Pet};
pub use update::{AccountUpdate, FeedUpdate, FieldUpdateGuard, PetUpdate, Updatable};
