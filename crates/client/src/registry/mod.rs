//! Shared state behind the facade
//!
//! Each registry guards its own maps with a `parking_lot` lock and never
//! calls user code while holding it.

pub mod services;
pub mod sessions;
pub mod topics;

pub use services::ServiceCallCorrelator;
pub use sessions::{Identifier, SessionRegistry};
pub use topics::TopicSubscriptionRegistry;
