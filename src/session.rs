//! In-memory MCP session store.
//!
//! A session is created by a successful `initialize` call and lives until it is
//! deleted (or, when a capacity is configured, evicted as the oldest entry).
//! The store is owned by whoever builds the HTTP service and handed to the
//! dispatcher behind an `Arc`; nothing is persisted.

use std::collections::{HashMap, VecDeque};

use rmcp::model::JsonObject;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque session identifier, as sent in the `mcp-session-id` header.
pub type SessionId = String;

/// State negotiated by one client's `initialize` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub protocol_version: String,
    pub capabilities: JsonObject,
    pub client_info: JsonObject,
    pub initialized: bool,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    // Creation order, oldest first. Only consulted when a capacity is set.
    order: VecDeque<SessionId>,
}

/// Thread-safe session map shared by all in-flight requests.
///
/// Every operation takes the lock once and never awaits while holding it, so
/// a lookup racing a delete sees either the whole record or nothing.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Inner>,
    max_sessions: Option<usize>,
}

impl SessionStore {
    /// An unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `max_sessions` live sessions. Creating one more
    /// evicts the oldest.
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            inner: RwLock::default(),
            max_sessions: Some(max_sessions.max(1)),
        }
    }

    pub async fn create(
        &self,
        protocol_version: String,
        capabilities: JsonObject,
        client_info: JsonObject,
    ) -> SessionId {
        let mut inner = self.inner.write().await;

        let mut id = Uuid::new_v4().to_string();
        while inner.sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        if let Some(max) = self.max_sessions {
            while inner.sessions.len() >= max {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if inner.sessions.remove(&oldest).is_some() {
                    tracing::info!(session_id = %oldest, "Evicted oldest session at capacity");
                }
            }
            inner.order.push_back(id.clone());
        }

        inner.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                protocol_version,
                capabilities,
                client_info,
                initialized: true,
            },
        );

        id
    }

    pub async fn lookup(&self, id: &str) -> Option<Session> {
        self.inner.read().await.sessions.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.sessions.contains_key(id)
    }

    /// Removes a session, reporting whether it existed. Deleting twice is fine.
    pub async fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let existed = inner.sessions.remove(id).is_some();
        if existed && self.max_sessions.is_some() {
            inner.order.retain(|s| s != id);
        }
        existed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
