//! Synthetic provider for demos and UI testing
//!
//! Reachable only through the `dummy:` URL scheme. Fabricates a small random
//! queue after a random delay, and fails outright one time in five so error
//! handling paths get exercised without a real server.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Error, Result};
use crate::providers::{Provider, ProviderContext};
use crate::types::{Decision, EnumerateOutcome, Message, RemoteRef, StatusCallbacks};

/// Synthetic backend provider
pub(crate) struct Dummy;

#[async_trait]
impl Provider for Dummy {
    async fn enumerate(&self, ctx: &ProviderContext) -> Result<EnumerateOutcome> {
        // Draw everything up front; the rng handle must not live across awaits.
        let (fail, count, delay_ms) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_bool(0.2),
                rng.gen_range(2..10usize),
                rng.gen_range(0..4000u64),
            )
        };
        sleep(Duration::from_millis(delay_ms)).await;

        if fail {
            return Err(Error::Transport("something bad happened".into()));
        }

        debug!(list = %ctx.list, count, "fabricating dummy queue");
        let messages = (0..count)
            .map(|i| {
                Message::new(
                    RemoteRef::None,
                    "sender@dummy.example",
                    "Dummy message subject",
                    format!("Dummy message body {} for list {}", i + 1, ctx.list),
                )
            })
            .collect();
        Ok(EnumerateOutcome::Queue(messages))
    }

    async fn apply(
        &self,
        _ctx: &ProviderContext,
        messages: &[Message],
        callbacks: &dyn StatusCallbacks,
    ) -> Result<()> {
        let flagged = messages
            .iter()
            .filter(|m| m.decision() != Decision::Defer)
            .count();
        if flagged == 0 {
            return Err(Error::Submission(
                "no messages are flagged for moderation".into(),
            ));
        }

        callbacks.set_message_count(flagged);
        for i in 0..flagged {
            callbacks.set_status_message(&format!("Moderating message {} of {}", i + 1, flagged));
            sleep(Duration::from_millis(750)).await;
            callbacks.set_progress_value(i + 1);
        }
        Ok(())
    }

    fn individual_moderation(&self) -> bool {
        true
    }
}
