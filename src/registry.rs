//! The server registry and population orchestration
//!
//! Holds every configured server behind shared locks, fans population out to
//! one task per server, and keeps the collection sorted as results arrive.
//! Observers subscribe to a broadcast channel to hear about ordering and
//! state changes.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::server::Server;
use crate::types::{EnumerateOutcome, Event, ServerState, StatusCallbacks};

const EVENT_CAPACITY: usize = 64;

/// Point-in-time view of one server, for rendering
#[derive(Clone, Debug, Serialize)]
pub struct ServerSnapshot {
    /// List name
    pub name: String,
    /// Lifecycle state
    pub state: ServerState,
    /// Human-readable status line
    pub status: String,
    /// Number of messages in the current queue
    pub message_count: usize,
}

/// The ordered collection of configured servers
pub struct ServerRegistry {
    servers: Arc<RwLock<Vec<Arc<RwLock<Server>>>>>,
    event_tx: broadcast::Sender<Event>,
}

impl ServerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            servers: Arc::new(RwLock::new(Vec::new())),
            event_tx,
        }
    }

    /// Subscribe to registry events.
    ///
    /// Slow subscribers may observe lag; every event is safe to coalesce.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Add a server from its configuration record.
    ///
    /// Names are unique; adding a second server with an existing name fails.
    pub async fn add(&self, config: ServerConfig) -> Result<()> {
        let mut servers = self.servers.write().await;
        for existing in servers.iter() {
            if existing.read().await.name() == config.name {
                return Err(Error::Config(format!(
                    "duplicate server name '{}'",
                    config.name
                )));
            }
        }
        debug!(name = %config.name, "adding server");
        servers.push(Arc::new(RwLock::new(Server::from_config(config)?)));
        drop(servers);
        let _ = self.event_tx.send(Event::ServersChanged);
        Ok(())
    }

    /// Number of configured servers
    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    /// Whether the registry holds no servers
    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }

    /// Look up a server by name.
    pub async fn get(&self, name: &str) -> Option<Arc<RwLock<Server>>> {
        let servers = self.servers.read().await;
        for server in servers.iter() {
            if server.read().await.name() == name {
                return Some(Arc::clone(server));
            }
        }
        None
    }

    /// Snapshot every server in current display order.
    pub async fn snapshot(&self) -> Vec<ServerSnapshot> {
        let servers = self.servers.read().await;
        let mut out = Vec::with_capacity(servers.len());
        for server in servers.iter() {
            let server = server.read().await;
            out.push(ServerSnapshot {
                name: server.name().to_string(),
                state: server.state(),
                status: server.status(),
                message_count: server.message_count(),
            });
        }
        out
    }

    /// Repopulate every server concurrently.
    ///
    /// One task per server; a failing server never blocks the others. The
    /// collection is resorted after each server finishes, so observers can
    /// refresh incrementally on every [`Event::ServersChanged`]. Returns
    /// once all servers have finished.
    pub async fn populate_all(&self) {
        let _ = self.event_tx.send(Event::PopulationStarted);
        let servers: Vec<Arc<RwLock<Server>>> = self.servers.read().await.clone();
        info!(count = servers.len(), "populating all servers");

        for server in &servers {
            server.write().await.begin_populate();
        }
        let _ = self.event_tx.send(Event::ServersChanged);

        let mut handles = Vec::with_capacity(servers.len());
        for server in servers {
            let collection = Arc::clone(&self.servers);
            let event_tx = self.event_tx.clone();
            handles.push(tokio::spawn(async move {
                // The fetch runs with no lock on the server. A hung
                // connection must not block snapshot or resort, so the lock
                // is only taken briefly to clone the work out and to write
                // the result back.
                let work = { server.read().await.enumerate_work() };
                let result = match work {
                    Some((provider, ctx)) => provider.enumerate(&ctx).await,
                    None => Ok(EnumerateOutcome::Queue(Vec::new())),
                };
                server.write().await.finish_populate(result);
                resort(&collection).await;
                let _ = event_tx.send(Event::ServersChanged);
            }));
        }
        for result in join_all(handles).await {
            if result.is_err() {
                warn!("population task panicked");
            }
        }
        let _ = self.event_tx.send(Event::PopulationFinished);
    }

    /// Submit one server's queued decisions, then resort.
    pub async fn apply_changes(&self, name: &str, callbacks: &dyn StatusCallbacks) -> Result<()> {
        let server = self
            .get(name)
            .await
            .ok_or_else(|| Error::Config(format!("no such server '{name}'")))?;
        let result = server.write().await.apply_changes(callbacks).await;
        resort(&self.servers).await;
        let _ = self.event_tx.send(Event::ServersChanged);
        result
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct SortKey {
    populated: bool,
    count: usize,
    name: String,
}

/// Display order: populated servers first, busiest queue on top, name as the
/// tiebreak; everything else trails alphabetically.
fn compare(a: &SortKey, b: &SortKey) -> Ordering {
    match (a.populated, b.populated) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.name.cmp(&b.name),
        (true, true) => b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)),
    }
}

async fn resort(servers: &RwLock<Vec<Arc<RwLock<Server>>>>) {
    let mut guard = servers.write().await;
    let mut keyed = Vec::with_capacity(guard.len());
    for server in guard.iter() {
        let key = {
            let server = server.read().await;
            SortKey {
                populated: server.state() == ServerState::Populated,
                count: server.message_count(),
                name: server.name().to_string(),
            }
        };
        keyed.push((key, Arc::clone(server)));
    }
    keyed.sort_by(|a, b| compare(&a.0, &b.0));
    *guard = keyed.into_iter().map(|(_, server)| server).collect();
}
