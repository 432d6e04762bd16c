//! Outbound delivery seam. Real email/SMS transports live behind this
//! trait; the auth flows only see `send`.

use anyhow::Result;
use refuge_types::models::{Destination, MagicLinkPurpose};
use tracing::info;

pub trait Notifier: Send + Sync {
    /// Deliver a magic link token to its destination. Callers treat a
    /// failure as non-fatal: the link is already committed.
    fn send(&self, token: &str, destination: &Destination, purpose: MagicLinkPurpose)
    -> Result<()>;
}

/// Development stand-in that writes the link to the log instead of
/// sending it.
pub struct LogNotifier {
    pub base_url: String,
}

impl LogNotifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

impl Notifier for LogNotifier {
    fn send(
        &self,
        token: &str,
        destination: &Destination,
        purpose: MagicLinkPurpose,
    ) -> Result<()> {
        info!(
            channel = %destination,
            purpose = purpose.as_str(),
            "magic link issued: {}/auth/verify?token={}",
            self.base_url,
            token
        );
        Ok(())
    }
}
