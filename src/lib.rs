//! Moderation queue client for mailing list servers.
//!
//! `modqueue` talks to the web admin interfaces of GNU Mailman and
//! Majordomo2 installations, scrapes their pending moderation queues, and
//! submits accept/reject decisions back. A [`ServerRegistry`] holds any
//! number of configured servers, populates them concurrently, and keeps them
//! sorted with the busiest queues first.
//!
//! Per-server transport trust can be customized with a pinned certificate
//! fingerprint or an expected certificate hostname, for self-hosted list
//! servers with self-signed certificates.
//!
//! ```no_run
//! use modqueue::{Decision, ServerConfig, ServerRegistry};
//!
//! # async fn run() -> modqueue::Result<()> {
//! let registry = ServerRegistry::new();
//! registry
//!     .add(ServerConfig::new(
//!         "announce",
//!         "https://lists.example.org/mailman/admindb",
//!         "secret",
//!     ))
//!     .await?;
//! registry.populate_all().await;
//!
//! if let Some(server) = registry.get("announce").await {
//!     let mut server = server.write().await;
//!     if let Some(message) = server.messages_mut().first_mut() {
//!         message.set_decision(Decision::Accept);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod providers;
pub mod registry;
pub mod server;
pub mod types;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use fetch::{Fetcher, TrustPolicy};
pub use providers::ProviderKind;
pub use registry::{ServerRegistry, ServerSnapshot};
pub use server::Server;
pub use types::{
    Decision, EnumerateOutcome, Event, MAX_CONTENT_CHARS, Message, ServerState, StatusCallbacks,
};
