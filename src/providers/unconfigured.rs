//! Placeholder provider for servers without a recognizable URL

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::providers::{Provider, ProviderContext};
use crate::types::{EnumerateOutcome, Message, StatusCallbacks};

/// Provider for servers whose URL matches no known vendor
pub(crate) struct Unconfigured;

#[async_trait]
impl Provider for Unconfigured {
    async fn enumerate(&self, _ctx: &ProviderContext) -> Result<EnumerateOutcome> {
        // Never touches the network; the registry short-circuits these
        // servers anyway.
        Ok(EnumerateOutcome::Queue(Vec::new()))
    }

    async fn apply(
        &self,
        _ctx: &ProviderContext,
        _messages: &[Message],
        _callbacks: &dyn StatusCallbacks,
    ) -> Result<()> {
        Err(Error::Submission(
            "server is not configured for moderation".into(),
        ))
    }

    fn individual_moderation(&self) -> bool {
        false
    }
}
