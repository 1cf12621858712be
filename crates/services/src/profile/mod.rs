pub mod ports;
pub mod test_helpers;

pub use ports::{ProfileRepository, SubscriptionState, UsageKind, UserProfile};
