//! Command observability.
//!
//! Every command the runtime executes is published to the context's
//! [`EventRegistry`] before it reaches the driver.

mod event;
mod registry;

#[cfg(test)]
mod tests;

use sha2::{Digest, Sha256};

pub use event::CommandEvent;
pub use registry::{CommandObserver, EventRegistry, SubscriptionId};

/// Hex SHA-256 of a connection string; events carry this instead of the
/// string itself.
#[must_use]
pub fn connection_hash(connection_string: &str) -> String {
    let digest = Sha256::digest(connection_string.as_bytes());

    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
