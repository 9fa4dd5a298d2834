//! Vendor providers and provider resolution
//!
//! A provider is the vendor-specific strategy for enumerating and moderating
//! a list's pending queue. Which provider a server speaks is resolved purely
//! from the shape of its root URL; no network access is involved.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::types::{EnumerateOutcome, Message, StatusCallbacks};

mod dummy;
mod mailman;
mod majordomo2;
mod unconfigured;

pub(crate) use dummy::Dummy;
pub(crate) use mailman::Mailman;
pub(crate) use majordomo2::Majordomo2;
pub(crate) use unconfigured::Unconfigured;

/// The provider variant a server resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Synthetic test/demo backend, reachable only via the `dummy:` scheme
    Dummy,
    /// GNU Mailman admin queue (`/admindb` URLs)
    Mailman,
    /// Majordomo2 web admin (`mj_wwwadm` URLs)
    Majordomo2,
    /// Placeholder for servers whose URL has not been filled in yet
    Unconfigured,
}

impl ProviderKind {
    /// Resolve a provider from a root URL.
    ///
    /// Pure and deterministic; rules are checked in order.
    pub fn resolve(url: &str) -> Self {
        if url.starts_with("dummy:") {
            ProviderKind::Dummy
        } else if url.contains("/admindb") {
            ProviderKind::Mailman
        } else if url.contains("mj_wwwadm") {
            ProviderKind::Majordomo2
        } else {
            ProviderKind::Unconfigured
        }
    }

    /// Instantiate the provider implementation for this variant.
    ///
    /// Shared so enumeration can run without holding the owning server's
    /// lock across the fetch.
    pub(crate) fn instantiate(self) -> Arc<dyn Provider> {
        match self {
            ProviderKind::Dummy => Arc::new(Dummy),
            ProviderKind::Mailman => Arc::new(Mailman),
            ProviderKind::Majordomo2 => Arc::new(Majordomo2),
            ProviderKind::Unconfigured => Arc::new(Unconfigured),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderKind::Dummy => "dummy",
            ProviderKind::Mailman => "mailman",
            ProviderKind::Majordomo2 => "majordomo2",
            ProviderKind::Unconfigured => "unconfigured",
        };
        write!(f, "{name}")
    }
}

/// Everything a provider needs to talk to one server
#[derive(Clone, Debug)]
pub(crate) struct ProviderContext {
    /// List name (also the server's registry key)
    pub list: String,
    /// Root URL of the list manager installation
    pub root_url: String,
    /// Shared password
    pub password: String,
    /// Fetcher with the server's trust policy applied
    pub fetcher: Fetcher,
}

/// Vendor-specific enumeration and moderation behavior
#[async_trait]
pub(crate) trait Provider: Send + Sync {
    /// Fetch and parse the pending queue.
    ///
    /// Vendor-recognized failure pages are returned as structured outcomes;
    /// transport failures propagate as errors.
    async fn enumerate(&self, ctx: &ProviderContext) -> Result<EnumerateOutcome>;

    /// Submit all non-Defer decisions, reporting progress through the sink.
    async fn apply(
        &self,
        ctx: &ProviderContext,
        messages: &[Message],
        callbacks: &dyn StatusCallbacks,
    ) -> Result<()>;

    /// Whether decisions are submitted one request per message (true) or as
    /// a single batch request (false); individual moderation gets per-item
    /// progress ticks.
    fn individual_moderation(&self) -> bool;
}
