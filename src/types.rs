//! Core types for modqueue

use serde::{Deserialize, Serialize};

/// Maximum number of characters of message content kept in memory.
///
/// Queue pages can carry arbitrarily large bodies; everything beyond this
/// bound is dropped once at construction so rendering stays cheap.
pub const MAX_CONTENT_CHARS: usize = 255;

/// Per-message moderation decision
///
/// `Defer` is the default and means "no action": deferred messages are left
/// untouched on the server when changes are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Let the message through to the list
    Accept,
    /// Reject (or discard, depending on the vendor) the message
    Reject,
    /// Leave the message in the queue
    #[default]
    Defer,
}

/// Vendor-specific identity a provider needs to submit a decision later.
///
/// This is deliberately not part of the public contract; only the provider
/// that created a message knows how to correlate it back to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RemoteRef {
    /// No identifying data (synthetic messages)
    None,
    /// Mailman's numeric request id
    MailmanId(u64),
    /// Majordomo2's opaque moderation token
    Majordomo2Token(String),
}

/// One queued item awaiting moderation
///
/// Created during enumeration, mutated only through [`Message::set_decision`],
/// consumed read-only when changes are applied, and discarded wholesale when
/// the owning server repopulates.
#[derive(Clone, Debug)]
pub struct Message {
    sender: String,
    subject: String,
    content: String,
    decision: Decision,
    pub(crate) remote: RemoteRef,
}

impl Message {
    /// Create a message, truncating the content to [`MAX_CONTENT_CHARS`].
    pub(crate) fn new(
        remote: RemoteRef,
        sender: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content: String = content.into();
        let content = if content.chars().count() > MAX_CONTENT_CHARS {
            content.chars().take(MAX_CONTENT_CHARS).collect()
        } else {
            content
        };
        Self {
            sender: sender.into(),
            subject: subject.into(),
            content,
            decision: Decision::Defer,
            remote,
        }
    }

    /// The message sender as shown on the vendor's queue page
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// The message subject; providers substitute a placeholder when the
    /// vendor page omits it
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Message body text, truncated to [`MAX_CONTENT_CHARS`]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The currently queued moderation decision
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Queue a moderation decision for this message.
    ///
    /// Nothing is sent to the server until the owning server's
    /// `apply_changes` runs.
    pub fn set_decision(&mut self, decision: Decision) {
        self.decision = decision;
    }
}

/// Lifecycle state of a configured server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// Not yet queried
    Unpopulated,
    /// A populate operation is in flight
    Populating,
    /// Queue fetched and parsed successfully
    Populated,
    /// Population failed (transport error or vendor-recognized failure page)
    Errored,
}

/// Typed outcome of a provider's enumerate operation.
///
/// Vendor pages can signal two structured, expected failures that are
/// distinct from transport exceptions; modelling them as variants keeps the
/// two failure classes type-distinguishable.
#[derive(Clone, Debug)]
pub enum EnumerateOutcome {
    /// The parsed moderation queue (possibly empty)
    Queue(Vec<Message>),
    /// The vendor page says the list does not exist; carries the status text
    NotFound(String),
    /// The vendor page says the password was rejected; carries the status text
    AuthFailed(String),
}

/// Events broadcast by the registry while population runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// `populate_all` started; every server now reports a loading status
    PopulationStarted,
    /// A server finished (or started) populating and the sort order was refreshed
    ServersChanged,
    /// All population tasks have completed
    PopulationFinished,
}

/// Callback sink consumed during apply operations.
///
/// Implementations must tolerate being called from background tasks.
pub trait StatusCallbacks: Send + Sync {
    /// Update the human-readable status line
    fn set_status_message(&self, msg: &str);
    /// Advance the progress indicator (1-based tick per submitted message)
    fn set_progress_value(&self, value: usize);
    /// Report how many messages will be (or remain) moderated
    fn set_message_count(&self, count: usize);
    /// Surface an error to the user
    fn show_error(&self, msg: &str);
}
