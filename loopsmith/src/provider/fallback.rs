//! Primary/secondary provider pair with a single retry.

use tracing::{info, instrument, warn};

use super::{ChatProvider, ChatRequest, ProviderCapabilities, ProviderError};
use crate::core::message::Message;

/// Sends each request to `primary`; if that endpoint is unavailable or
/// rejects the request shape, retries exactly once on `secondary`.
///
/// Each endpoint shapes the request for its own capabilities, so memory that
/// went inline to the primary is moved into the hidden system message for a
/// secondary that lacks the parameter.
pub struct FallbackProvider {
    primary: Box<dyn ChatProvider>,
    secondary: Box<dyn ChatProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Box<dyn ChatProvider>, secondary: Box<dyn ChatProvider>) -> Self {
        Self { primary, secondary }
    }
}

impl ChatProvider for FallbackProvider {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.primary.capabilities()
    }

    #[instrument(skip_all, fields(primary = self.primary.name(), secondary = self.secondary.name()))]
    fn complete(&self, request: &ChatRequest) -> Result<Message, ProviderError> {
        match self.primary.complete(request) {
            Ok(reply) => Ok(reply),
            Err(err) if err.allows_fallback() => {
                warn!(err = %err, "primary provider failed, trying secondary");
                let reply = self.secondary.complete(request)?;
                info!("secondary provider answered");
                Ok(reply)
            }
            Err(err) => Err(err),
        }
    }
}
