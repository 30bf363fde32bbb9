use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{message}")]
    Persistence { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub tenant_id: String,
    /// Derived lookup token: hex HMAC-SHA256 of the raw bearer key under
    /// the server pepper. The raw key never reaches storage.
    pub key_id: String,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentKeyRecord {
    pub tenant_id: String,
    pub agent_id: String,
    /// Base64-encoded DER/SPKI blob holding the agent's Ed25519
    /// verification key.
    pub public_key_der: String,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceRecord {
    pub tenant_id: String,
    pub agent_id: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub tenant_id: String,
    pub sender: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
    pub thread_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TenantLimits {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterScope {
    Tenant,
    ApiKey,
}

impl CounterScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::ApiKey => "api_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Minute,
    Hour,
    Day,
}

impl WindowType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    pub const fn duration_seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3600,
            Self::Day => 86_400,
        }
    }

    /// Aligned window start: the timestamp truncated to the window
    /// boundary, as unix seconds.
    pub fn window_start(self, at: DateTime<Utc>) -> i64 {
        let epoch = at.timestamp();
        epoch - epoch.rem_euclid(self.duration_seconds())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterKey {
    pub scope: CounterScope,
    pub scope_id: String,
    pub window: WindowType,
    pub window_start: i64,
}

impl CounterKey {
    fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.scope.as_str(),
            self.scope_id,
            self.window.as_str(),
            self.window_start
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceInsert {
    /// The nonce was new for (tenant, agent) and is now recorded.
    Recorded,
    /// A live row with the same (tenant, agent, nonce) already exists.
    Replayed,
}

/// Storage seam for everything that must be correct across concurrent
/// requests and across process instances. `insert_nonce` and
/// `increment_counter` are the two coordination points: each must behave
/// as a single atomic operation under concurrent callers (a uniqueness
/// constraint and an atomic upsert-with-return in a production backend).
#[async_trait]
pub trait RelayStore: Send + Sync {
    async fn find_api_key(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Advisory usage tracking. Callers dispatch this without awaiting the
    /// outcome in the response path.
    async fn touch_api_key_last_used(
        &self,
        api_key_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_agent_key(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<Option<AgentKeyRecord>, StoreError>;

    /// Records a nonce, enforcing single use among live rows. A stored row
    /// whose `expires_at` has passed no longer blocks reuse.
    async fn insert_nonce(
        &self,
        record: NonceRecord,
        now: DateTime<Utc>,
    ) -> Result<NonceInsert, StoreError>;

    /// Best-effort housekeeping; correctness does not depend on it.
    async fn purge_expired_nonces(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Atomically increments the counter for the window and returns the
    /// new count.
    async fn increment_counter(&self, key: &CounterKey) -> Result<u64, StoreError>;

    async fn tenant_limits(&self, tenant_id: &str) -> Result<Option<TenantLimits>, StoreError>;

    async fn insert_message(&self, message: MessageRecord) -> Result<(), StoreError>;

    /// Messages where the agent is sender or recipient, newest first,
    /// at most `limit`.
    async fn messages_involving(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// All messages of a thread, oldest first.
    async fn messages_in_thread(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Marks unread thread messages addressed to `recipient` as read,
    /// returning how many rows changed. Idempotent.
    async fn mark_thread_read(
        &self,
        tenant_id: &str,
        thread_id: &str,
        recipient: &str,
    ) -> Result<u64, StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RelayState {
    api_keys: HashMap<String, ApiKeyRecord>,
    agent_keys: HashMap<String, AgentKeyRecord>,
    nonces: HashMap<String, NonceRecord>,
    counters: HashMap<String, u64>,
    messages: Vec<MessageRecord>,
    tenant_limits: HashMap<String, TenantLimits>,
}

fn agent_key_index(tenant_id: &str, agent_id: &str) -> String {
    format!("{tenant_id}:{agent_id}")
}

fn nonce_index(tenant_id: &str, agent_id: &str, nonce: &str) -> String {
    format!("{tenant_id}:{agent_id}:{nonce}")
}

/// In-memory reference store with optional JSON snapshot persistence.
/// All cross-request invariants live behind the single write lock, which
/// stands in for the uniqueness constraints and atomic upserts of a
/// production backend.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<RelayState>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RelayState::default())),
            path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let path = config.store_snapshot_path.clone();
        let state = path
            .as_deref()
            .map(Self::load_snapshot)
            .unwrap_or_default();
        Self {
            state: Arc::new(RwLock::new(state)),
            path,
        }
    }

    fn load_snapshot(path: &Path) -> RelayState {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(error) => {
                    tracing::warn!(?path, %error, "failed to parse relay store snapshot");
                    RelayState::default()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => RelayState::default(),
            Err(error) => {
                tracing::warn!(?path, %error, "failed to read relay store snapshot");
                RelayState::default()
            }
        }
    }

    fn persist(&self, state: &RelayState) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(state).map_err(|error| StoreError::Persistence {
            message: format!("failed to encode relay store snapshot: {error}"),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| StoreError::Persistence {
                message: format!("failed to create snapshot directory: {error}"),
            })?;
        }

        std::fs::write(path, bytes).map_err(|error| StoreError::Persistence {
            message: format!("failed to write relay store snapshot: {error}"),
        })
    }

    // Provisioning is out-of-band tenant administration: it operates on the
    // concrete store, not on the request-path trait.

    pub async fn provision_api_key(&self, tenant_id: &str, key_id: &str) -> ApiKeyRecord {
        let record = ApiKeyRecord {
            id: format!("key_{}", Uuid::new_v4().simple()),
            tenant_id: tenant_id.to_string(),
            key_id: key_id.to_string(),
            revoked_at: None,
            last_used_at: None,
        };
        let mut state = self.state.write().await;
        state
            .api_keys
            .insert(record.key_id.clone(), record.clone());
        let _ = self.persist(&state);
        record
    }

    pub async fn revoke_api_key(&self, key_id: &str, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        if let Some(record) = state.api_keys.get_mut(key_id) {
            record.revoked_at = Some(at);
        }
        let _ = self.persist(&state);
    }

    pub async fn provision_agent_key(
        &self,
        tenant_id: &str,
        agent_id: &str,
        public_key_der: &str,
    ) -> AgentKeyRecord {
        let record = AgentKeyRecord {
            tenant_id: tenant_id.to_string(),
            agent_id: agent_id.to_lowercase(),
            public_key_der: public_key_der.to_string(),
            revoked_at: None,
        };
        let mut state = self.state.write().await;
        state.agent_keys.insert(
            agent_key_index(tenant_id, &record.agent_id),
            record.clone(),
        );
        let _ = self.persist(&state);
        record
    }

    pub async fn revoke_agent_key(&self, tenant_id: &str, agent_id: &str, at: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let index = agent_key_index(tenant_id, &agent_id.to_lowercase());
        if let Some(record) = state.agent_keys.get_mut(&index) {
            record.revoked_at = Some(at);
        }
        let _ = self.persist(&state);
    }

    pub async fn set_tenant_limits(&self, tenant_id: &str, limits: TenantLimits) {
        let mut state = self.state.write().await;
        state.tenant_limits.insert(tenant_id.to_string(), limits);
        let _ = self.persist(&state);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn find_api_key(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.api_keys.get(key_id).cloned())
    }

    async fn touch_api_key_last_used(
        &self,
        api_key_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(record) = state
            .api_keys
            .values_mut()
            .find(|record| record.id == api_key_id)
        {
            record.last_used_at = Some(at);
        }
        self.persist(&state)
    }

    async fn find_agent_key(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<Option<AgentKeyRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .agent_keys
            .get(&agent_key_index(tenant_id, agent_id))
            .cloned())
    }

    async fn insert_nonce(
        &self,
        record: NonceRecord,
        now: DateTime<Utc>,
    ) -> Result<NonceInsert, StoreError> {
        let index = nonce_index(&record.tenant_id, &record.agent_id, &record.nonce);
        let mut state = self.state.write().await;

        if let Some(existing) = state.nonces.get(&index) {
            if existing.expires_at > now {
                return Ok(NonceInsert::Replayed);
            }
        }

        state.nonces.insert(index, record);
        self.persist(&state)?;
        Ok(NonceInsert::Recorded)
    }

    async fn purge_expired_nonces(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.nonces.len();
        state.nonces.retain(|_, record| record.expires_at > now);
        let purged = (before - state.nonces.len()) as u64;
        if purged > 0 {
            self.persist(&state)?;
        }
        Ok(purged)
    }

    async fn increment_counter(&self, key: &CounterKey) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let count = state
            .counters
            .entry(key.storage_key())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        let count = *count;
        self.persist(&state)?;
        Ok(count)
    }

    async fn tenant_limits(&self, tenant_id: &str) -> Result<Option<TenantLimits>, StoreError> {
        let state = self.state.read().await;
        Ok(state.tenant_limits.get(tenant_id).copied())
    }

    async fn insert_message(&self, message: MessageRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.messages.push(message);
        self.persist(&state)
    }

    async fn messages_involving(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let state = self.state.read().await;
        let mut messages: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter(|message| {
                message.tenant_id == tenant_id
                    && (message.sender == agent_id || message.recipient == agent_id)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn messages_in_thread(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let state = self.state.read().await;
        let mut messages: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter(|message| message.tenant_id == tenant_id && message.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn mark_thread_read(
        &self,
        tenant_id: &str,
        thread_id: &str,
        recipient: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut updated = 0u64;
        for message in state.messages.iter_mut() {
            if message.tenant_id == tenant_id
                && message.thread_id == thread_id
                && message.recipient == recipient
                && !message.read
            {
                message.read = true;
                updated += 1;
            }
        }
        if updated > 0 {
            self.persist(&state)?;
        }
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _ = self.state.read().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn nonce_record(nonce: &str, expires_at: DateTime<Utc>) -> NonceRecord {
        NonceRecord {
            tenant_id: "tenant-1".to_string(),
            agent_id: "alice".to_string(),
            nonce: nonce.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn nonce_single_use_is_enforced() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let record = nonce_record("n-1", now + Duration::seconds(300));

        let first = store.insert_nonce(record.clone(), now).await.expect("insert");
        assert_eq!(first, NonceInsert::Recorded);

        let second = store.insert_nonce(record, now).await.expect("insert");
        assert_eq!(second, NonceInsert::Replayed);
    }

    #[tokio::test]
    async fn expired_nonce_rows_do_not_block_reuse() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stale = nonce_record("n-1", now - Duration::seconds(1));
        store
            .insert_nonce(stale, now - Duration::seconds(400))
            .await
            .expect("insert");

        let fresh = nonce_record("n-1", now + Duration::seconds(300));
        let outcome = store.insert_nonce(fresh, now).await.expect("insert");
        assert_eq!(outcome, NonceInsert::Recorded);
    }

    #[tokio::test]
    async fn concurrent_nonce_inserts_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let record = nonce_record("contended", now + Duration::seconds(300));
            handles.push(tokio::spawn(async move {
                store.insert_nonce(record, now).await.expect("insert")
            }));
        }

        let mut recorded = 0;
        for handle in handles {
            if handle.await.expect("join") == NonceInsert::Recorded {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn counter_increments_are_atomic_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let key = CounterKey {
            scope: CounterScope::Tenant,
            scope_id: "tenant-1".to_string(),
            window: WindowType::Minute,
            window_start: 0,
        };

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.increment_counter(&key).await.expect("increment")
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.expect("join"));
        }
        counts.sort_unstable();
        let expected: Vec<u64> = (1..=50).collect();
        assert_eq!(counts, expected, "each increment observes a unique count");
    }

    #[tokio::test]
    async fn window_start_truncates_to_aligned_boundaries() {
        let at = DateTime::parse_from_rfc3339("2026-08-05T13:42:17Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let minute = WindowType::Minute.window_start(at);
        let hour = WindowType::Hour.window_start(at);
        let day = WindowType::Day.window_start(at);

        assert_eq!(minute % 60, 0);
        assert_eq!(hour % 3600, 0);
        assert_eq!(day % 86_400, 0);
        assert_eq!(at.timestamp() - minute, 17);
        assert_eq!(at.timestamp() - hour, 42 * 60 + 17);
    }

    #[tokio::test]
    async fn mark_thread_read_is_idempotent() {
        let store = MemoryStore::new();
        let message = MessageRecord {
            id: "m-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            sender: "alice".to_string(),
            recipient: "bob".to_string(),
            subject: None,
            body: "hi".to_string(),
            thread_id: "t-1".to_string(),
            read: false,
            created_at: Utc::now(),
        };
        store.insert_message(message).await.expect("insert");

        let first = store
            .mark_thread_read("tenant-1", "t-1", "bob")
            .await
            .expect("mark");
        assert_eq!(first, 1);

        let second = store
            .mark_thread_read("tenant-1", "t-1", "bob")
            .await
            .expect("mark");
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay-store.json");

        let mut config = Config::for_tests();
        config.store_snapshot_path = Some(path.clone());

        let store = MemoryStore::from_config(&config);
        store.provision_api_key("tenant-1", "key-id-hex").await;
        store
            .provision_agent_key("tenant-1", "Alice", "c3BraQ")
            .await;

        let reloaded = MemoryStore::from_config(&config);
        let api_key = reloaded
            .find_api_key("key-id-hex")
            .await
            .expect("lookup")
            .expect("record");
        assert_eq!(api_key.tenant_id, "tenant-1");

        let agent_key = reloaded
            .find_agent_key("tenant-1", "alice")
            .await
            .expect("lookup")
            .expect("record");
        assert_eq!(agent_key.agent_id, "alice");
    }
}
