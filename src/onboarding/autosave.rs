//! Autosave scheduler — debounced background persistence of live drafts.
//!
//! Every change restarts a per-(user, step) timer. When it fires, the draft is
//! saved with whatever `completed` flag is already recorded, so an autosave
//! never commits a step and never un-commits one.
//!
//! Autosave and explicit commits share one lock per key. A commit takes the
//! lock through [`AutosaveScheduler::begin_commit`], which cancels any pending
//! save before the commit writes anything. A save that wakes up after the
//! commit sees a newer epoch and drops itself.
//!
//! A key's slot is dropped from the map once nothing refers to it and no save
//! is waiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::drafts::DraftStore;
use super::steps::StepId;

/// Identifies one draft record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub user_id: String,
    pub step: StepId,
}

impl DraftKey {
    pub fn new(user_id: &str, step: StepId) -> Self {
        Self {
            user_id: user_id.to_string(),
            step,
        }
    }
}

#[derive(Default)]
struct Slot {
    /// Bumped on every schedule and every commit; a timer only fires if the
    /// epoch it was started under is still current.
    epoch: u64,
    pending: Option<JoinHandle<()>>,
}

impl Slot {
    fn invalidate(&mut self) -> u64 {
        self.epoch += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.epoch
    }
}

type Slots = Arc<RwLock<HashMap<DraftKey, Arc<Mutex<Slot>>>>>;

/// Remove the slot for `key` if only the map holds it and no save is waiting.
///
/// Callers hold the map's write lock, so no one can clone the slot meanwhile.
fn prune_idle(slots: &mut HashMap<DraftKey, Arc<Mutex<Slot>>>, key: &DraftKey) {
    let idle = slots.get(key).is_some_and(|slot| {
        Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.pending.is_none())
    });
    if idle {
        slots.remove(key);
    }
}

/// Exclusive hold on a draft key for the duration of a commit.
///
/// While held, no autosave for the key can run. Dropping it releases the key.
pub struct CommitGuard {
    slot: Option<OwnedMutexGuard<Slot>>,
    slots: Slots,
    key: DraftKey,
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        self.slot.take();
        // Best effort: a contended map just keeps the slot until the next prune.
        if let Ok(mut slots) = self.slots.try_write() {
            prune_idle(&mut slots, &self.key);
        }
    }
}

/// Debounced draft writer.
#[derive(Clone)]
pub struct AutosaveScheduler {
    drafts: DraftStore,
    debounce: Duration,
    slots: Slots,
}

impl AutosaveScheduler {
    pub fn new(drafts: DraftStore, debounce: Duration) -> Self {
        Self {
            drafts,
            debounce,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    async fn slot(&self, key: &DraftKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Restart the debounce timer for `key` with the latest payload.
    pub async fn schedule(&self, key: DraftKey, payload: Value) {
        let slot = self.slot(&key).await;
        let mut guard = slot.lock().await;
        let epoch = guard.invalidate();
        debug!(user_id = %key.user_id, step = %key.step, epoch, "Autosave scheduled");

        let drafts = self.drafts.clone();
        let debounce = self.debounce;
        let slots = self.slots.clone();
        let timer_slot = slot.clone();
        guard.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            let mut slot = timer_slot.lock().await;
            if slot.epoch != epoch {
                return;
            }
            slot.pending = None;
            flush(&drafts, &key, &payload).await;
            drop(slot);
            drop(timer_slot);

            prune_idle(&mut *slots.write().await, &key);
        }));
    }

    /// Cancel any pending save for `key` and hold the key until the guard drops.
    pub async fn begin_commit(&self, key: &DraftKey) -> CommitGuard {
        let slot = self.slot(key).await;
        let mut guard = slot.lock_owned().await;
        guard.invalidate();
        CommitGuard {
            slot: Some(guard),
            slots: self.slots.clone(),
            key: key.clone(),
        }
    }

    /// Whether a save is waiting to fire for `key`.
    pub async fn has_pending(&self, key: &DraftKey) -> bool {
        let Some(slot) = self.slots.read().await.get(key).cloned() else {
            return false;
        };
        let slot = slot.lock().await;
        slot.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Save with the recorded completed flag. Failures are logged, not returned.
async fn flush(drafts: &DraftStore, key: &DraftKey, payload: &Value) {
    let completed = match drafts.load_draft(&key.user_id, key.step).await {
        Ok(record) => record.is_some_and(|r| r.completed),
        Err(e) => {
            warn!(user_id = %key.user_id, step = %key.step, error = %e, "Autosave could not read draft");
            return;
        }
    };

    match drafts
        .save_draft(&key.user_id, key.step, payload, completed)
        .await
    {
        Ok(()) => debug!(user_id = %key.user_id, step = %key.step, "Autosaved draft"),
        Err(e) => {
            warn!(user_id = %key.user_id, step = %key.step, error = %e, "Autosave failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::LibSqlBackend;

    const DEBOUNCE: Duration = Duration::from_millis(40);
    const SETTLE: Duration = Duration::from_millis(250);

    async fn test_scheduler() -> (AutosaveScheduler, DraftStore) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let drafts = DraftStore::new(db);
        (AutosaveScheduler::new(drafts.clone(), DEBOUNCE), drafts)
    }

    #[tokio::test]
    async fn saves_after_debounce() {
        let (autosave, drafts) = test_scheduler().await;
        let key = DraftKey::new("u1", StepId::Identity);

        autosave
            .schedule(key.clone(), json!({"statements": ["I run"]}))
            .await;
        assert!(drafts.load_draft("u1", StepId::Identity).await.unwrap().is_none());
        assert!(autosave.has_pending(&key).await);

        tokio::time::sleep(SETTLE).await;
        let record = drafts.load_draft("u1", StepId::Identity).await.unwrap().unwrap();
        assert_eq!(record.payload, json!({"statements": ["I run"]}));
        assert!(!record.completed);
        assert!(!autosave.has_pending(&key).await);
    }

    #[tokio::test]
    async fn rapid_changes_keep_last_payload() {
        let (autosave, drafts) = test_scheduler().await;
        let key = DraftKey::new("u1", StepId::YearTheme);

        for theme in ["M", "Mo", "Momentum"] {
            autosave.schedule(key.clone(), json!({"theme": theme})).await;
        }
        tokio::time::sleep(SETTLE).await;

        let record = drafts.load_draft("u1", StepId::YearTheme).await.unwrap().unwrap();
        assert_eq!(record.payload, json!({"theme": "Momentum"}));
    }

    #[tokio::test]
    async fn keeps_recorded_completed_flag() {
        let (autosave, drafts) = test_scheduler().await;
        drafts
            .save_draft("u1", StepId::Values, &json!({"values": ["A", "B", "C"]}), true)
            .await
            .unwrap();

        autosave
            .schedule(
                DraftKey::new("u1", StepId::Values),
                json!({"values": ["A", "B", "C", "D"]}),
            )
            .await;
        tokio::time::sleep(SETTLE).await;

        let record = drafts.load_draft("u1", StepId::Values).await.unwrap().unwrap();
        assert!(record.completed);
        assert_eq!(record.payload, json!({"values": ["A", "B", "C", "D"]}));
    }

    #[tokio::test]
    async fn commit_cancels_pending_save() {
        let (autosave, drafts) = test_scheduler().await;
        let key = DraftKey::new("u1", StepId::Goals);

        autosave
            .schedule(key.clone(), json!({"goals": [{"title": "stale"}]}))
            .await;
        {
            let _guard = autosave.begin_commit(&key).await;
            drafts
                .save_draft("u1", StepId::Goals, &json!({"goals": [{"title": "fresh"}]}), true)
                .await
                .unwrap();
        }
        assert!(!autosave.has_pending(&key).await);

        tokio::time::sleep(SETTLE).await;
        let record = drafts.load_draft("u1", StepId::Goals).await.unwrap().unwrap();
        assert_eq!(record.payload, json!({"goals": [{"title": "fresh"}]}));
        assert!(record.completed);
    }

    #[tokio::test]
    async fn idle_slots_are_released() {
        let (autosave, _drafts) = test_scheduler().await;
        let key = DraftKey::new("u1", StepId::Habits);

        autosave.schedule(key.clone(), json!({"habits": []})).await;
        assert_eq!(autosave.slots.read().await.len(), 1);
        tokio::time::sleep(SETTLE).await;
        assert!(autosave.slots.read().await.is_empty());

        drop(autosave.begin_commit(&key).await);
        assert!(autosave.slots.read().await.is_empty());

        let _guard = autosave.begin_commit(&key).await;
        assert_eq!(autosave.slots.read().await.len(), 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (autosave, drafts) = test_scheduler().await;
        autosave
            .schedule(DraftKey::new("u1", StepId::Capture), json!({"brain_dump": "a"}))
            .await;
        autosave
            .schedule(DraftKey::new("u2", StepId::Capture), json!({"brain_dump": "b"}))
            .await;
        let _guard = autosave
            .begin_commit(&DraftKey::new("u3", StepId::Capture))
            .await;
        tokio::time::sleep(SETTLE).await;

        assert!(drafts.load_draft("u1", StepId::Capture).await.unwrap().is_some());
        assert!(drafts.load_draft("u2", StepId::Capture).await.unwrap().is_some());
    }
}
