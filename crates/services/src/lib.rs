pub mod auth;
pub mod billing;
pub mod entitlement;
pub mod generation;
pub mod profile;
pub mod types;
pub mod usage;

pub use types::{SessionId, UserId};
