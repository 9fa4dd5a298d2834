//! A single configured mailing list endpoint
//!
//! A [`Server`] binds a configuration record to its resolved provider and a
//! fetcher carrying the server's trust policy, and tracks the lifecycle of
//! its moderation queue across populate and apply operations.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::providers::{Provider, ProviderContext, ProviderKind};
use crate::types::{Decision, EnumerateOutcome, Message, ServerState, StatusCallbacks};

/// One mailing list endpoint and its in-memory moderation queue
pub struct Server {
    config: ServerConfig,
    kind: ProviderKind,
    provider: Arc<dyn Provider>,
    fetcher: Fetcher,
    state: ServerState,
    status: String,
    messages: Vec<Message>,
}

impl Server {
    /// Build a server from its configuration record.
    ///
    /// Resolves the provider from the URL shape and constructs the fetcher
    /// with the record's trust policy. Fails only if the trust policy is
    /// malformed.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let kind = ProviderKind::resolve(&config.url);
        let fetcher = Fetcher::new(config.trust_policy())?;
        debug!(name = %config.name, provider = %kind, "configured server");
        Ok(Self {
            config,
            kind,
            provider: kind.instantiate(),
            fetcher,
            state: ServerState::Unpopulated,
            status: String::new(),
            messages: Vec::new(),
        })
    }

    /// The list name; unique key across the registry
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The provider this server resolved to
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Number of messages in the current queue
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The current queue, read-only
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The current queue, for queuing decisions
    pub fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.messages
    }

    /// Whether any message carries a non-Defer decision
    pub fn has_changes(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.decision() != Decision::Defer)
    }

    /// Whether this server's provider submits decisions one request per
    /// message
    pub fn individual_moderation(&self) -> bool {
        self.provider.individual_moderation()
    }

    /// Human-readable status line for this server.
    ///
    /// Errored servers prefix their stored status with `Exception: `;
    /// servers that have never finished populating report `loading...`.
    pub fn status(&self) -> String {
        match self.state {
            ServerState::Errored => format!("Exception: {}", self.status),
            ServerState::Populated => self.status.clone(),
            ServerState::Unpopulated | ServerState::Populating => "loading...".into(),
        }
    }

    fn context(&self) -> ProviderContext {
        ProviderContext {
            list: self.config.name.clone(),
            root_url: self.config.url.clone(),
            password: self.config.password.clone(),
            fetcher: self.fetcher.clone(),
        }
    }

    /// Discard the queue and enter the Populating state.
    pub(crate) fn begin_populate(&mut self) {
        self.messages.clear();
        self.state = ServerState::Populating;
        self.status.clear();
    }

    /// Snapshot everything an enumerate needs, so the fetch can run without
    /// any lock on this server.
    ///
    /// Returns `None` for unconfigured servers, which never hit the network.
    pub(crate) fn enumerate_work(&self) -> Option<(Arc<dyn Provider>, ProviderContext)> {
        if self.kind == ProviderKind::Unconfigured {
            return None;
        }
        Some((Arc::clone(&self.provider), self.context()))
    }

    /// Absorb an enumerate result into server state.
    pub(crate) fn finish_populate(&mut self, result: Result<EnumerateOutcome>) {
        if self.kind == ProviderKind::Unconfigured {
            self.state = ServerState::Populated;
            self.status = "Unconfigured list".into();
            self.messages.clear();
            return;
        }
        match result {
            Ok(EnumerateOutcome::Queue(messages)) => {
                self.status = format!("{} unmoderated messages", messages.len());
                self.messages = messages;
                self.state = ServerState::Populated;
            }
            Ok(EnumerateOutcome::NotFound(status)) | Ok(EnumerateOutcome::AuthFailed(status)) => {
                warn!(name = %self.config.name, %status, "population refused");
                self.status = status;
                self.messages.clear();
                self.state = ServerState::Errored;
            }
            Err(e) => {
                warn!(name = %self.config.name, error = %e, "population failed");
                self.status = e.to_string();
                self.messages.clear();
                self.state = ServerState::Errored;
            }
        }
    }

    /// Fetch this server's queue, replacing any previous one.
    pub async fn populate(&mut self) {
        self.begin_populate();
        let result = match self.enumerate_work() {
            Some((provider, ctx)) => provider.enumerate(&ctx).await,
            None => Ok(EnumerateOutcome::Queue(Vec::new())),
        };
        self.finish_populate(result);
    }

    /// Submit all queued decisions, then repopulate.
    ///
    /// Fails without a network request when nothing is flagged. On submission
    /// failure the error is surfaced through the callbacks and returned; the
    /// queue is left as-is so the user can retry.
    pub async fn apply_changes(&mut self, callbacks: &dyn StatusCallbacks) -> Result<()> {
        if !self.has_changes() {
            return Err(Error::Submission(
                "no messages are flagged for moderation".into(),
            ));
        }
        if let Err(e) = self
            .provider
            .apply(&self.context(), &self.messages, callbacks)
            .await
        {
            callbacks.show_error(&e.to_string());
            return Err(e);
        }
        callbacks.set_status_message("Reloading moderation queue...");
        self.populate().await;
        callbacks.set_message_count(self.message_count());
        Ok(())
    }

    /// Force state and queue contents, bypassing the provider.
    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: ServerState, messages: Vec<Message>) {
        self.state = state;
        self.messages = messages;
    }
}
