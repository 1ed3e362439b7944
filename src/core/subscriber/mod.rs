//! Subscriber identity and the receiving half handed to transport sessions.

#[allow(clippy::module_inception)]
pub mod subscriber;

pub use subscriber::{SubscriberId, Subscription};
