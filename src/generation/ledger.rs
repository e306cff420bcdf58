//! Usage ledger: how recently each scripture reference was used.
//!
//! Three scopes are tracked. The global scope mirrors the persisted
//! `verse_usage` table inside the retention window, the session scope holds
//! references accepted during the current provisioning run, and the batch
//! scope holds references handed out for the wave being generated.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, SystemTime},
};

use tracing::{debug, info};

use crate::dao::{game_store::GameStore, models::UsageRecordEntity, storage::StorageResult};

/// Per-run view of reference usage.
#[derive(Debug, Clone)]
pub struct UsageLedger {
    global: HashMap<String, UsageRecordEntity>,
    session: HashSet<String>,
    batch: HashSet<String>,
    retention: Duration,
}

impl UsageLedger {
    /// Ledger with no history.
    pub fn empty(retention: Duration) -> Self {
        Self {
            global: HashMap::new(),
            session: HashSet::new(),
            batch: HashSet::new(),
            retention,
        }
    }

    /// Purge records older than the retention window, then load the rest.
    pub async fn load(
        store: &dyn GameStore,
        retention: Duration,
        now: SystemTime,
    ) -> StorageResult<Self> {
        let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);
        let purged = store.purge_usage(cutoff).await?;
        let records = store.load_usage(cutoff).await?;
        info!(purged, loaded = records.len(), "usage ledger loaded");

        let mut ledger = Self::empty(retention);
        ledger.global = records
            .into_iter()
            .map(|record| (record.reference.clone(), record))
            .collect();
        Ok(ledger)
    }

    /// Used by any game inside the retention window.
    pub fn is_recent(&self, reference: &str, now: SystemTime) -> bool {
        self.global.get(reference).is_some_and(|record| {
            record.frequency > 0
                && now
                    .duration_since(record.last_used)
                    .map(|age| age < self.retention)
                    .unwrap_or(true)
        })
    }

    /// Free to hand out: not recent globally and not taken in this run.
    pub fn is_available(&self, reference: &str, now: SystemTime) -> bool {
        !self.is_recent(reference, now)
            && !self.session.contains(reference)
            && !self.batch.contains(reference)
    }

    pub fn frequency(&self, reference: &str) -> u32 {
        self.global
            .get(reference)
            .map(|record| record.frequency)
            .unwrap_or(0)
    }

    /// Start a new wave.
    pub fn begin_batch(&mut self) {
        self.batch.clear();
    }

    /// Hold a reference for the wave in flight.
    pub fn reserve(&mut self, reference: &str) {
        self.batch.insert(reference.to_owned());
    }

    /// Mark a reference as already present in the game (resumed runs).
    pub fn note_existing(&mut self, reference: &str) {
        self.session.insert(reference.to_owned());
    }

    /// Record an accepted item in memory and persist it right away.
    ///
    /// The in-memory scopes are updated even when persistence fails, so the
    /// current run never re-selects the reference.
    pub async fn record_acceptance(
        &mut self,
        store: &dyn GameStore,
        reference: &str,
        now: SystemTime,
    ) -> StorageResult<()> {
        self.session.insert(reference.to_owned());
        let record = self
            .global
            .entry(reference.to_owned())
            .or_insert_with(|| UsageRecordEntity {
                reference: reference.to_owned(),
                last_used: now,
                frequency: 0,
            });
        record.frequency += 1;
        record.last_used = now;
        debug!(reference, frequency = record.frequency, "reference used");

        store.record_usage(reference.to_owned(), now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::sqlite::SqliteGameStore;

    const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    #[tokio::test]
    async fn acceptance_is_visible_in_memory_and_in_storage() {
        let store = SqliteGameStore::open_in_memory().unwrap();
        let now = SystemTime::now();
        let mut ledger = UsageLedger::load(&store, MONTH, now).await.unwrap();
        assert!(ledger.is_available("John 3:16", now));

        ledger
            .record_acceptance(&store, "John 3:16", now)
            .await
            .unwrap();
        assert!(!ledger.is_available("John 3:16", now));

        let reloaded = UsageLedger::load(&store, MONTH, now).await.unwrap();
        assert!(reloaded.is_recent("John 3:16", now));
        assert_eq!(reloaded.frequency("John 3:16"), 1);
    }

    #[tokio::test]
    async fn records_past_retention_are_purged_on_load() {
        let store = SqliteGameStore::open_in_memory().unwrap();
        let now = SystemTime::now();
        let old = now - MONTH - Duration::from_secs(60);
        store.record_usage("Ruth 1:16".into(), old).await.unwrap();

        let ledger = UsageLedger::load(&store, MONTH, now).await.unwrap();
        assert!(ledger.is_available("Ruth 1:16", now));
        assert!(store.load_usage(SystemTime::UNIX_EPOCH).await.unwrap().is_empty());
    }

    #[test]
    fn batch_reservations_clear_between_waves() {
        let now = SystemTime::now();
        let mut ledger = UsageLedger::empty(MONTH);
        ledger.reserve("Mark 1:1");
        assert!(!ledger.is_available("Mark 1:1", now));
        ledger.begin_batch();
        assert!(ledger.is_available("Mark 1:1", now));
    }
}
