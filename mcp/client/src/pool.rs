//! The mutex-guarded client pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crucible_config::McpServerConfig;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::ClientFactory;
use crate::client::McpClient;
use crate::client::McpError;
use crate::client::Result;

/// Idle clients older than this are evicted on next access when the server
/// definition sets no TTL of its own.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

struct PooledEntry {
    client: Arc<dyn McpClient>,
    created_at: Instant,
    last_used: Instant,
}

impl PooledEntry {
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        if let Some(ttl) = ttl {
            if now.duration_since(self.created_at) >= ttl {
                return true;
            }
        }
        now.duration_since(self.last_used) >= DEFAULT_IDLE_TIMEOUT
    }
}

/// One pooled client per configured server, created on demand.
pub struct McpPool {
    definitions: HashMap<String, McpServerConfig>,
    factory: ClientFactory,
    clients: Mutex<HashMap<String, PooledEntry>>,
}

impl McpPool {
    pub fn new(definitions: Vec<McpServerConfig>, factory: ClientFactory) -> Self {
        let definitions = definitions
            .into_iter()
            .map(|definition| (definition.name.clone(), definition))
            .collect();
        Self {
            definitions,
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// A pool with no configured servers; every lookup fails with
    /// `UnknownServer`.
    pub fn empty() -> Self {
        let factory: ClientFactory = Arc::new(|definition: McpServerConfig| {
            Box::pin(async move {
                Err(McpError::UnknownServer {
                    server: definition.name,
                })
            })
        });
        Self::new(Vec::new(), factory)
    }

    /// Names of every configured server.
    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Return a healthy pooled client, creating one when needed.
    ///
    /// The factory runs with the pool lock released; when two tasks race to
    /// create the same client the first insertion wins and the loser's
    /// client is shut down.
    pub async fn get_client(&self, server: &str) -> Result<Arc<dyn McpClient>> {
        let definition = self
            .definitions
            .get(server)
            .ok_or_else(|| McpError::UnknownServer {
                server: server.to_string(),
            })?;
        let ttl = definition.ttl_seconds.map(Duration::from_secs);

        let expired = {
            let mut clients = self.clients.lock().await;
            let now = Instant::now();
            match clients.get_mut(server) {
                Some(entry) if !entry.is_expired(ttl, now) => {
                    entry.last_used = now;
                    return Ok(Arc::clone(&entry.client));
                }
                Some(_) => clients.remove(server),
                None => None,
            }
        };
        if let Some(entry) = expired {
            debug!(server, "evicting expired MCP client");
            entry.client.shutdown(Duration::from_secs(2)).await;
        }

        info!(server, "starting MCP client");
        let created = (self.factory)(definition.clone()).await?;

        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        if let Some(existing) = clients.get_mut(server) {
            // Another task created the client while we were outside the
            // lock; keep theirs and discard ours.
            existing.last_used = now;
            let winner = Arc::clone(&existing.client);
            drop(clients);
            created.shutdown(Duration::ZERO).await;
            return Ok(winner);
        }
        clients.insert(
            server.to_string(),
            PooledEntry {
                client: Arc::clone(&created),
                created_at: now,
                last_used: now,
            },
        );
        Ok(created)
    }

    /// Evict and shut down a client after a transport failure.
    pub async fn mark_unhealthy(&self, server: &str) {
        let entry = self.clients.lock().await.remove(server);
        if let Some(entry) = entry {
            warn!(server, "marking MCP client unhealthy");
            entry.client.shutdown(Duration::from_secs(2)).await;
        }
    }

    /// Shut down every pooled client, waiting up to `grace` for each.
    pub async fn close_all(&self, grace: Duration) {
        let entries: Vec<(String, PooledEntry)> =
            self.clients.lock().await.drain().collect();
        for (server, entry) in entries {
            debug!(server, "shutting down MCP client");
            entry.client.shutdown(grace).await;
        }
    }

    /// Number of currently pooled clients.
    pub async fn pooled_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl std::fmt::Debug for McpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpPool")
            .field("servers", &self.server_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "pool.test.rs"]
mod tests;
