//! Pull/push reconciliation between the local store and the remote mirror.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use super::rows;
use super::{
    RemoteMirror, SyncError, SETTING_ACCESS_TOKEN, SETTING_LAST_SYNC_TIME,
    SETTING_TOKEN_EXPIRES_AT,
};
use crate::models::{format_instant, parse_instant};
use crate::store::LocalStore;

/// Counts from one pull phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    pub new_entries: usize,
    pub updated_entries: usize,
}

/// Counts from one push phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub synced: usize,
}

/// Outcome of one bidirectional cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pulled: PullReport,
    pub pushed: PushReport,
    /// True when the cycle was a no-op: nothing changed locally since the
    /// last sync, or another cycle was already in flight.
    pub skipped: bool,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Reconciles the local store with a remote mirror.
///
/// Conflict resolution is per entry by timestamp: a remote row wins only
/// when its `LastSynced` stamp is newer than both the local entry's
/// `timestamp` and our own sync horizon (so rows this device pushed itself
/// never bounce back as phantom updates). Remote rows absent locally are
/// always pulled in. Rows removed remotely are never deleted locally:
/// destructive sync is out of scope.
pub struct SyncCoordinator<M: RemoteMirror> {
    store: LocalStore,
    mirror: M,
    sync_in_progress: AtomicBool,
}

impl<M: RemoteMirror> SyncCoordinator<M> {
    pub fn new(store: LocalStore, mirror: M) -> Self {
        Self {
            store,
            mirror,
            sync_in_progress: AtomicBool::new(false),
        }
    }

    /// When this device last completed a pull or push, if ever.
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get_setting(SETTING_LAST_SYNC_TIME).await?;
        parse_instant(&raw)
    }

    async fn record_sync_time(&self, at: DateTime<Utc>) {
        self.store
            .set_setting(SETTING_LAST_SYNC_TIME, &format_instant(at))
            .await;
    }

    /// An expired token pauses sync: the cached token is dropped so every
    /// subsequent cycle short-circuits to `AuthExpired` until the user
    /// signs in again.
    async fn clear_auth(&self) {
        self.store.set_setting(SETTING_ACCESS_TOKEN, "").await;
        self.store.set_setting(SETTING_TOKEN_EXPIRES_AT, "").await;
        tracing::warn!("authentication expired, sync paused until re-login");
    }

    async fn guard<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(SyncError::AuthExpired) = &result {
            self.clear_auth().await;
        }
        result
    }

    /// Pull phase: reads every remote row and reconciles it into the local
    /// store. The store is only touched per winning row, so a transport
    /// failure mid-phase leaves it exactly as it was.
    pub async fn sync_from_remote(&self) -> Result<PullReport, SyncError> {
        let read = self.mirror.read_rows().await;
        let remote_rows = self.guard(read).await?;
        let horizon = self.last_sync_time().await;

        let mut report = PullReport::default();
        for cells in &remote_rows {
            let Some(remote) = rows::parse_row(cells) else {
                tracing::warn!("skipping malformed remote row");
                continue;
            };

            match self.store.get_entry_by_id(remote.entry.id).await {
                None => {
                    if self.store.add_entry(&remote.entry).await.is_some() {
                        report.new_entries += 1;
                    }
                }
                Some(local) => {
                    let newer_than_local = remote.last_synced > local.timestamp;
                    let newer_than_horizon =
                        horizon.map_or(true, |h| remote.last_synced > h);
                    if newer_than_local && newer_than_horizon {
                        let patch = remote.as_patch(Utc::now());
                        if self.store.update_entry(local.id, &patch).await.is_some() {
                            report.updated_entries += 1;
                        }
                    }
                }
            }
        }

        self.record_sync_time(Utc::now()).await;
        tracing::info!(
            "pulled {} new, {} updated from remote",
            report.new_entries,
            report.updated_entries
        );
        Ok(report)
    }

    /// Push phase: rewrites the entire remote range from the full local
    /// entry set, stamping every row with one `LastSynced` instant. An
    /// empty store pushes nothing and makes no remote call. A failure
    /// between the remote clear and write can leave the range empty; local
    /// data is the source of truth for the re-push, so nothing is lost.
    pub async fn sync_to_remote(&self) -> Result<PushReport, SyncError> {
        let entries = self.store.get_all_entries().await;
        if entries.is_empty() {
            tracing::debug!("no entries to push");
            return Ok(PushReport { synced: 0 });
        }

        let now = Utc::now();
        let remote_rows: Vec<Vec<String>> = entries
            .iter()
            .map(|entry| rows::entry_to_row(entry, now))
            .collect();

        let write = self.mirror.overwrite_rows(remote_rows).await;
        self.guard(write).await?;

        self.record_sync_time(now).await;
        tracing::info!("pushed {} entries to remote", entries.len());
        Ok(PushReport {
            synced: entries.len(),
        })
    }

    /// One pull followed by one push, unless nothing changed locally since
    /// the last sync, in which case the whole cycle is skipped without a
    /// single remote call. Re-entrant invocations (the auto-sync timer
    /// racing a manual sync) also return a skipped report.
    pub async fn bidirectional_sync(&self) -> Result<SyncReport, SyncError> {
        if self.sync_in_progress.swap(true, Ordering::SeqCst) {
            tracing::debug!("sync already in progress, skipping");
            return Ok(SyncReport::skipped());
        }
        let result = self.run_bidirectional().await;
        self.sync_in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn run_bidirectional(&self) -> Result<SyncReport, SyncError> {
        let entries = self.store.get_all_entries().await;
        let last_sync = self.last_sync_time().await;

        let has_new_data = entries.iter().any(|entry| match last_sync {
            None => true,
            Some(at) => entry.timestamp > at,
        });
        if !has_new_data && !entries.is_empty() {
            tracing::debug!("no local changes since last sync, skipping");
            return Ok(SyncReport::skipped());
        }

        let pulled = self.sync_from_remote().await?;
        let pushed = self.sync_to_remote().await?;
        Ok(SyncReport {
            pulled,
            pushed,
            skipped: false,
        })
    }

    /// Runs `bidirectional_sync` immediately and then on every `interval`
    /// tick, until `shutdown` flips or authentication expires. This loop is
    /// the only source of unsolicited background work.
    pub async fn run_auto_sync(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.bidirectional_sync().await {
                        Ok(report) if report.skipped => {
                            tracing::debug!("auto-sync: nothing to do");
                        }
                        Ok(report) => {
                            tracing::info!(
                                "auto-sync: pulled {}/{}, pushed {}",
                                report.pulled.new_entries,
                                report.pulled.updated_entries,
                                report.pushed.synced
                            );
                        }
                        Err(SyncError::AuthExpired) => {
                            tracing::warn!("auto-sync stopped: authentication expired");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("auto-sync failed: {}", e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::debug!("auto-sync stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FuelEntry;
    use crate::store::FlatTextEngine;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory mirror that counts calls and can be primed to fail.
    #[derive(Default)]
    struct FakeMirror {
        rows: Mutex<Vec<Vec<String>>>,
        read_calls: AtomicUsize,
        write_calls: AtomicUsize,
        fail_auth: AtomicBool,
    }

    impl FakeMirror {
        fn with_rows(rows: Vec<Vec<String>>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        fn total_calls(&self) -> usize {
            self.read_calls.load(Ordering::SeqCst) + self.write_calls.load(Ordering::SeqCst)
        }
    }

    impl<'a> RemoteMirror for &'a FakeMirror {
        async fn read_rows(&self) -> Result<Vec<Vec<String>>, SyncError> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth.load(Ordering::SeqCst) {
                return Err(SyncError::AuthExpired);
            }
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn overwrite_rows(&self, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth.load(Ordering::SeqCst) {
                return Err(SyncError::AuthExpired);
            }
            *self.rows.lock().unwrap() = rows;
            Ok(())
        }
    }

    async fn test_store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let engine = FlatTextEngine::open(temp.path().join("data.json")).await;
        (LocalStore::from_flat(engine), temp)
    }

    // Fixture instants sit safely in the past so "now" stamps always win.
    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 14, hour, minute, 0).unwrap()
    }

    fn entry(id: i64, liters: f64, timestamp: DateTime<Utc>) -> FuelEntry {
        FuelEntry::new(id)
            .with_operator("Amadou")
            .with_equipment("Generator")
            .with_metrics(8.0, 0.0, liters)
            .with_timestamp(timestamp)
    }

    #[tokio::test]
    async fn test_skip_if_idle_makes_zero_remote_calls() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();
        store
            .set_setting(SETTING_LAST_SYNC_TIME, &format_instant(at(9, 0)))
            .await;

        let mirror = FakeMirror::default();
        let coordinator = SyncCoordinator::new(store, &mirror);

        let report = coordinator.bidirectional_sync().await.unwrap();
        assert!(report.skipped);
        assert_eq!(mirror.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_first_sync_of_empty_store_still_pulls() {
        let (store, _temp) = test_store().await;
        let remote_entry = entry(42, 20.0, at(8, 0));
        let mirror =
            FakeMirror::with_rows(vec![rows::entry_to_row(&remote_entry, at(9, 0))]);
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        let report = coordinator.bidirectional_sync().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.pulled.new_entries, 1);

        let pulled = store.get_entry_by_id(42).await.unwrap();
        assert_eq!(pulled.liters, 20.0);
    }

    #[tokio::test]
    async fn test_remote_wins_on_newer_last_synced() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();

        let remote = entry(1, 20.0, at(8, 0));
        let mirror = FakeMirror::with_rows(vec![rows::entry_to_row(&remote, at(10, 0))]);
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        let report = coordinator.sync_from_remote().await.unwrap();
        assert_eq!(report.updated_entries, 1);
        assert_eq!(report.new_entries, 0);

        let merged = store.get_entry_by_id(1).await.unwrap();
        assert_eq!(merged.liters, 20.0);
        // The merge counts as a local modification.
        assert!(merged.timestamp > at(10, 0));
    }

    #[tokio::test]
    async fn test_local_wins_on_newer_or_equal_local_timestamp() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(10, 0))).await.unwrap();

        let remote = entry(1, 20.0, at(8, 0));
        for last_synced in [at(9, 0), at(10, 0)] {
            let mirror =
                FakeMirror::with_rows(vec![rows::entry_to_row(&remote, last_synced)]);
            let coordinator = SyncCoordinator::new(store.clone(), &mirror);

            let report = coordinator.sync_from_remote().await.unwrap();
            assert_eq!(report.updated_entries, 0);
            assert_eq!(store.get_entry_by_id(1).await.unwrap().liters, 10.0);
        }
    }

    #[tokio::test]
    async fn test_push_then_pull_is_quiet() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();
        store.add_entry(&entry(2, 15.0, at(8, 30))).await.unwrap();

        let mirror = FakeMirror::default();
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        let pushed = coordinator.sync_to_remote().await.unwrap();
        assert_eq!(pushed.synced, 2);

        let pulled = coordinator.sync_from_remote().await.unwrap();
        assert_eq!(pulled, PullReport::default());
        assert_eq!(store.get_entry_by_id(1).await.unwrap().liters, 10.0);
    }

    #[tokio::test]
    async fn test_push_of_empty_store_makes_no_remote_call() {
        let (store, _temp) = test_store().await;
        let mirror = FakeMirror::default();
        let coordinator = SyncCoordinator::new(store, &mirror);

        let report = coordinator.sync_to_remote().await.unwrap();
        assert_eq!(report.synced, 0);
        assert_eq!(mirror.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_pull_ignores_malformed_rows() {
        let (store, _temp) = test_store().await;
        let good = entry(7, 12.0, at(8, 0));
        let mirror = FakeMirror::with_rows(vec![
            vec!["not-an-id".to_string(), "Depot".to_string()],
            rows::entry_to_row(&good, at(9, 0)),
        ]);
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        let report = coordinator.sync_from_remote().await.unwrap();
        assert_eq!(report.new_entries, 1);
        assert!(store.get_entry_by_id(7).await.is_some());
    }

    #[tokio::test]
    async fn test_auth_expired_clears_cached_token() {
        let (store, _temp) = test_store().await;
        store.set_setting(SETTING_ACCESS_TOKEN, "tok").await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();

        let mirror = FakeMirror::default();
        mirror.fail_auth.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        let result = coordinator.sync_from_remote().await;
        assert!(matches!(result, Err(SyncError::AuthExpired)));
        assert_eq!(store.get_setting(SETTING_ACCESS_TOKEN).await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_bidirectional_updates_last_sync_time() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();

        let mirror = FakeMirror::default();
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);
        assert!(coordinator.last_sync_time().await.is_none());

        let report = coordinator.bidirectional_sync().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.pushed.synced, 1);
        assert!(coordinator.last_sync_time().await.is_some());

        // Second cycle with no local changes is idle.
        let report = coordinator.bidirectional_sync().await.unwrap();
        assert!(report.skipped);
    }

    #[tokio::test]
    async fn test_pull_failure_leaves_store_untouched() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1, 10.0, at(8, 0))).await.unwrap();
        let before = store.get_all_entries().await;

        let mirror = FakeMirror::default();
        mirror.fail_auth.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(store.clone(), &mirror);

        assert!(coordinator.sync_from_remote().await.is_err());
        assert_eq!(store.get_all_entries().await, before);
    }
}
