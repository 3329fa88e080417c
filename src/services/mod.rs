//! Clients for the external collaborators: the upstream transit API and
//! the discussion platform.

pub mod topics;
pub mod transit;

// Re-export for convenience
pub use topics::{TopicClient, TopicPublisher};
pub use transit::{TransitClient, TransitSource};
