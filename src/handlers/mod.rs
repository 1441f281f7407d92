// handlers/mod.rs - two-tier handler layout
//
// Public (bypass list) → Protected (auth token). Both tiers sit behind the
// same authorization gate; the tier only says which routes the default
// bypass list names.

pub mod protected;
pub mod public;
