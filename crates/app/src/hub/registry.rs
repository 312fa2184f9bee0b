use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Live-session bookkeeping for one device connection.
pub struct SessionEntry {
    pub session_id: String,
    pub client_id: String,
    pub started_at: Instant,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSummary {
    pub device_id: String,
    pub session_id: String,
    pub client_id: String,
    pub uptime_secs: u64,
}

/// Concurrent device-id → session index. Inserted on a successful hello,
/// removed when the connection closes. Read side is diagnostics and the
/// hook for server-initiated push.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A previous entry for the same device (a stale
    /// connection racing a reconnect) is cancelled and replaced.
    pub fn insert(&self, device_id: &str, entry: SessionEntry) {
        if let Some(stale) = self.inner.write().insert(device_id.to_string(), entry) {
            tracing::warn!(device_id, stale_session = %stale.session_id, "replacing stale session");
            stale.cancel.cancel();
        }
    }

    pub fn remove(&self, device_id: &str) {
        self.inner.write().remove(device_id);
    }

    /// Remove only if the entry still belongs to `session_id`. A session
    /// replaced by a reconnect must not evict its successor on the way
    /// out.
    pub fn remove_session(&self, device_id: &str, session_id: &str) {
        let mut inner = self.inner.write();
        if inner
            .get(device_id)
            .map(|entry| entry.session_id == session_id)
            .unwrap_or(false)
        {
            inner.remove(device_id);
        }
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.inner.read().contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn summary(&self, device_id: &str) -> Option<SessionSummary> {
        self.inner.read().get(device_id).map(|entry| SessionSummary {
            device_id: device_id.to_string(),
            session_id: entry.session_id.clone(),
            client_id: entry.client_id.clone(),
            uptime_secs: entry.started_at.elapsed().as_secs(),
        })
    }

    pub fn snapshot(&self) -> Vec<SessionSummary> {
        self.inner
            .read()
            .iter()
            .map(|(device_id, entry)| SessionSummary {
                device_id: device_id.clone(),
                session_id: entry.session_id.clone(),
                client_id: entry.client_id.clone(),
                uptime_secs: entry.started_at.elapsed().as_secs(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session_id: &str) -> SessionEntry {
        SessionEntry {
            session_id: session_id.to_string(),
            client_id: "client".to_string(),
            started_at: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn insert_and_lookup() {
        let registry = SessionRegistry::new();
        registry.insert("dev-1", entry("s-1"));

        assert!(registry.contains("dev-1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.summary("dev-1").unwrap().session_id, "s-1");
    }

    #[test]
    fn remove_clears_entry() {
        let registry = SessionRegistry::new();
        registry.insert("dev-1", entry("s-1"));
        registry.remove("dev-1");
        assert!(registry.is_empty());
        assert!(registry.summary("dev-1").is_none());
    }

    #[test]
    fn remove_session_spares_a_successor() {
        let registry = SessionRegistry::new();
        registry.insert("dev-1", entry("s-old"));
        registry.insert("dev-1", entry("s-new"));

        // The replaced session cleaning up must not evict the new one.
        registry.remove_session("dev-1", "s-old");
        assert!(registry.contains("dev-1"));

        registry.remove_session("dev-1", "s-new");
        assert!(!registry.contains("dev-1"));
    }

    #[test]
    fn reinsert_cancels_stale_session() {
        let registry = SessionRegistry::new();
        let stale = entry("s-old");
        let stale_cancel = stale.cancel.clone();
        registry.insert("dev-1", stale);

        registry.insert("dev-1", entry("s-new"));
        assert!(stale_cancel.is_cancelled());
        assert_eq!(registry.summary("dev-1").unwrap().session_id, "s-new");
    }
}
