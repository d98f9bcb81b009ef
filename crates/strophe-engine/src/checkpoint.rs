//! Durable per-session Context snapshots
//!
//! Every save is a full-state overwrite; the latest save is
//! authoritative. Saves go through a temp file and an atomic rename so a
//! crash mid-write never leaves a partial snapshot — the prior
//! checkpoint stays intact. Loading an unknown session yields nothing,
//! not an error: first-use sessions start fresh.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use strophe_core::{Context, Result, StropheError};

/// Injected checkpoint capability
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist a full snapshot, overwriting any previous one
    async fn save(&self, session_id: &str, ctx: &Context) -> Result<()>;

    /// Load the latest snapshot, or None for an unknown session
    async fn load(&self, session_id: &str) -> Result<Option<Context>>;
}

/// Session ids that are safe as file names
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !session_id.starts_with('.')
}

/// One JSON file per session under a root directory
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    root: PathBuf,
}

impl FileCheckpointer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if !is_valid_session_id(session_id) {
            return Err(StropheError::Checkpoint(format!(
                "Invalid session id: {}",
                session_id
            )));
        }
        Ok(self.root.join(format!("{}.json", session_id)))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, session_id: &str, ctx: &Context) -> Result<()> {
        let path = self.path_for(session_id)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StropheError::Checkpoint(format!("create {:?}: {}", self.root, e)))?;

        let payload = serde_json::to_vec_pretty(ctx)?;
        let tmp = self.root.join(format!("{}.json.tmp", session_id));
        tokio::fs::write(&tmp, &payload)
            .await
            .map_err(|e| StropheError::Checkpoint(format!("write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StropheError::Checkpoint(format!("rename {:?}: {}", path, e)))?;

        tracing::debug!("Checkpointed session {} at stage {}", session_id, ctx.stage);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Context>> {
        let path = self.path_for(session_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StropheError::Checkpoint(format!("read {:?}: {}", path, e)));
            }
        };
        let ctx = serde_json::from_str(&raw)
            .map_err(|e| StropheError::Checkpoint(format!("parse {:?}: {}", path, e)))?;
        Ok(Some(ctx))
    }
}

/// In-memory checkpointer for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointer {
    store: Arc<Mutex<HashMap<String, Context>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently stored
    pub fn session_count(&self) -> usize {
        self.store.lock().expect("store lock").len()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, session_id: &str, ctx: &Context) -> Result<()> {
        self.store
            .lock()
            .expect("store lock")
            .insert(session_id.to_string(), ctx.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Context>> {
        Ok(self
            .store
            .lock()
            .expect("store lock")
            .get(session_id)
            .cloned())
    }
}

/// Checkpointer that fails every save; exercises the fatal I/O path
#[derive(Debug, Clone, Default)]
pub struct FailingCheckpointer;

#[async_trait]
impl Checkpointer for FailingCheckpointer {
    async fn save(&self, _session_id: &str, _ctx: &Context) -> Result<()> {
        Err(StropheError::Checkpoint("disk full".to_string()))
    }

    async fn load(&self, _session_id: &str) -> Result<Option<Context>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strophe_core::{Stage, Stanza};

    fn sample_context() -> Context {
        let mut ctx = Context::default();
        ctx.stage = Stage::Present;
        ctx.stanzas.push(Stanza {
            k: 1,
            text: "rain on the last train".to_string(),
        });
        ctx
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ck = FileCheckpointer::new(dir.path());

        ck.save("session-1", &sample_context()).await.unwrap();
        let loaded = ck.load("session-1").await.unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Present);
        assert_eq!(loaded.stanzas.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_session_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ck = FileCheckpointer::new(dir.path());
        assert!(ck.load("never-seen").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ck = FileCheckpointer::new(dir.path());
        ck.save("s", &sample_context()).await.unwrap();

        let first = ck.load("s").await.unwrap().unwrap();
        let second = ck.load("s").await.unwrap().unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_save_wins() {
        let dir = tempfile::tempdir().unwrap();
        let ck = FileCheckpointer::new(dir.path());

        let mut ctx = sample_context();
        ck.save("s", &ctx).await.unwrap();
        ctx.stanzas.push(Stanza {
            k: 2,
            text: "second".to_string(),
        });
        ck.save("s", &ctx).await.unwrap();

        let loaded = ck.load("s").await.unwrap().unwrap();
        assert_eq!(loaded.stanzas.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_session_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ck = FileCheckpointer::new(dir.path());
        assert!(ck.save("../escape", &sample_context()).await.is_err());
        assert!(ck.load("a/b").await.is_err());
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_session_id("demo_1.v2"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id(".hidden"));
        assert!(!is_valid_session_id("has space"));
        assert!(!is_valid_session_id("slash/y"));
    }

    #[tokio::test]
    async fn test_memory_checkpointer() {
        let ck = MemoryCheckpointer::new();
        assert!(ck.load("x").await.unwrap().is_none());
        ck.save("x", &sample_context()).await.unwrap();
        assert_eq!(ck.session_count(), 1);
        assert!(ck.load("x").await.unwrap().is_some());
    }
}
