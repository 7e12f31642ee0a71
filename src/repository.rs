// =============================================================================
// repository.rs — THE DISPUTE VAULT
// =============================================================================
//
// Durable keyed storage for dispute records. The ancestral system kept a
// global mutable blob behind load/save free functions, which is the kind of
// architecture you confess to, not document. Here the repository is an
// explicit capability — get, list, put, modify — injected into the state
// machine, the scheduler, and analytics, so storage backends are swappable
// and tests are deterministic.
//
// The in-memory implementation is a HashMap behind a parking_lot RwLock.
// Last-write-wins, no transactions, no optimistic concurrency. Two writers
// racing on the same dispute id can lose an update; the original system
// had the same hole and we are not quietly papering over it with locking
// semantics it never promised. `modify` at least makes each single-record
// read-modify-write atomic, which is all the scheduler's tag re-check needs.
//
// Disputes are never physically deleted here. Archival is someone else's
// problem, and that someone has a much better relationship with lawyers.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::models::Dispute;

/// The storage capability. Every component that touches persisted disputes
/// goes through this trait — there is no back door.
pub trait DisputeRepository: Send + Sync {
    /// Fetch a single dispute by id. `None` if unknown.
    fn get(&self, id: &str) -> Option<Dispute>;

    /// Snapshot of every dispute in the store, in no particular order.
    fn list(&self) -> Vec<Dispute>;

    /// Insert or replace a dispute wholesale. Last write wins.
    fn put(&self, dispute: Dispute);

    /// Atomically read-modify-write a single dispute under the store's
    /// lock. Returns the post-modification record, or `None` if the id is
    /// unknown (in which case the closure is never called). Sub-collection
    /// appends and the scheduler's marker re-check ride through here so
    /// check and append happen under one lock acquisition.
    fn modify(&self, id: &str, f: &mut dyn FnMut(&mut Dispute)) -> Option<Dispute>;

    /// How many disputes the store holds.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory repository with JSON snapshot persistence. The daemon loads
/// one at startup and saves it after mutating ticks; tests build empty
/// ones by the dozen.
pub struct MemoryRepository {
    records: RwLock<HashMap<String, Dispute>>,
}

impl MemoryRepository {
    /// A fresh, empty repository. No disputes, no drama. Yet.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Load a repository from a JSON snapshot file. A missing file is not
    /// an error — it just means this consumer's fight is only beginning.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found — starting with an empty repository");
            return Ok(Self::new());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let disputes: Vec<Dispute> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;

        let mut records = HashMap::with_capacity(disputes.len());
        for dispute in disputes {
            records.insert(dispute.id.clone(), dispute);
        }

        info!(
            path = %path.display(),
            disputes = records.len(),
            "Repository snapshot loaded"
        );

        Ok(Self {
            records: RwLock::new(records),
        })
    }

    /// Serialize the entire repository to a JSON snapshot file. Written
    /// atomically-ish via a temp file + rename, because a half-written
    /// dispute corpus is worse than no dispute corpus.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let disputes: Vec<Dispute> = self.list();
        let json = serde_json::to_string_pretty(&disputes)
            .context("failed to serialize repository snapshot")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into place at {}", path.display()))?;

        debug!(path = %path.display(), disputes = disputes.len(), "Repository snapshot saved");
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl DisputeRepository for MemoryRepository {
    fn get(&self, id: &str) -> Option<Dispute> {
        self.records.read().get(id).cloned()
    }

    fn list(&self) -> Vec<Dispute> {
        self.records.read().values().cloned().collect()
    }

    fn put(&self, dispute: Dispute) {
        self.records.write().insert(dispute.id.clone(), dispute);
    }

    fn modify(&self, id: &str, f: &mut dyn FnMut(&mut Dispute)) -> Option<Dispute> {
        let mut records = self.records.write();
        let dispute = records.get_mut(id)?;
        f(dispute);
        Some(dispute.clone())
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, DisputeStatus, DisputeType};
    use chrono::Utc;

    fn sample(id: &str) -> Dispute {
        Dispute {
            id: id.into(),
            account: Account {
                creditor: "Sample Bank".into(),
                collector: None,
                value: 1200.0,
                account_type: "credit_card".into(),
            },
            dispute_type: DisputeType::Bureau,
            bureau: None,
            status: DisputeStatus::Submitted,
            submission_date: Utc::now(),
            response_deadline: Utc::now(),
            reason: "inaccurate balance".into(),
            violation_ids: vec![],
            status_history: vec![],
            communications: vec![],
            documents: vec![],
            outcome: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let repo = MemoryRepository::new();
        repo.put(sample("d1"));
        let fetched = repo.get("d1").unwrap();
        assert_eq!(fetched.account.creditor, "Sample Bank");
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let repo = MemoryRepository::new();
        assert!(repo.get("ghost").is_none());
    }

    #[test]
    fn test_modify_unknown_id_never_calls_closure() {
        let repo = MemoryRepository::new();
        let mut called = false;
        let result = repo.modify("ghost", &mut |_| called = true);
        assert!(result.is_none());
        assert!(!called);
    }

    #[test]
    fn test_modify_persists_change() {
        let repo = MemoryRepository::new();
        repo.put(sample("d1"));
        repo.modify("d1", &mut |d| d.notes = Some("annotated".into()));
        assert_eq!(repo.get("d1").unwrap().notes.as_deref(), Some("annotated"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = std::env::temp_dir().join("dispute_doom_repo_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshot.json");

        let repo = MemoryRepository::new();
        repo.put(sample("d1"));
        repo.put(sample("d2"));
        repo.save_snapshot(&path).unwrap();

        let reloaded = MemoryRepository::load_snapshot(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get("d1").is_some());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_snapshot_is_empty() {
        let repo = MemoryRepository::load_snapshot("/nonexistent/nowhere.json").unwrap();
        assert!(repo.is_empty());
    }
}
