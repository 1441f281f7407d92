// handlers/public/mod.rs - Public handlers
//
// Endpoints named in the default bypass list: token acquisition and probes.
// They still pass through the authorization gate, which lets them through
// unauthenticated by route name.

pub mod health;
pub mod sign;

pub use health::{health, root};
pub use sign::{sign_in, sign_refresh, sign_up};
