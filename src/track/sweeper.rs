//! Background sweeper for finished track records
//!
//! Runs periodically and removes records of operations that completed longer
//! ago than the retention window. Records that cannot be parsed are logged
//! and kept for inspection.

use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::{GatewayError, Result};
use crate::track::store::TrackFileStore;

pub struct TrackSweeper {
    store: Arc<TrackFileStore>,
    interval: Duration,
    retention: Duration,
}

impl TrackSweeper {
    pub fn new(store: Arc<TrackFileStore>, interval: Duration, retention: Duration) -> Self {
        Self {
            store,
            interval,
            retention,
        }
    }

    /// Spawn the sweep loop on the current runtime
    pub fn start_background(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!(
            "Starting track sweeper with {}s interval, {}s retention",
            self.interval.as_secs(),
            self.retention.as_secs()
        );
        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;

            let store = Arc::clone(&self.store);
            let retention = self.retention;
            match tokio::task::spawn_blocking(move || sweep(&store, retention)).await {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => info!("Swept {} completed track records", n),
                Ok(Err(e)) => error!("Error sweeping track records: {}", e),
                Err(e) => error!("Track sweep task failed: {}", e),
            }
        }
    }

    /// One pass over the store; returns the number of records removed
    pub fn sweep_once(&self) -> Result<usize> {
        sweep(&self.store, self.retention)
    }
}

fn sweep(store: &TrackFileStore, retention: Duration) -> Result<usize> {
    let retention = ChronoDuration::from_std(retention)
        .map_err(|e| GatewayError::Config(format!("retention out of range: {}", e)))?;
    let cutoff = Utc::now() - retention;

    let mut removed = 0;
    for key in store.list()? {
        let record = match store.read_record(key.as_str()) {
            Ok(record) => record,
            // deleted between list and read
            Err(GatewayError::NotFound(_)) => continue,
            Err(e) => {
                warn!("Keeping unreadable track record {}: {}", key, e);
                continue;
            }
        };

        if record.completed && record.updated_at <= cutoff {
            debug!("Removing track record {} completed at {}", key, record.updated_at);
            store.delete(key.as_str());
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::record::{TrackOperation, TrackRecord};
    use crate::types::{FileHash, FILE_HASH_LEN};
    use tempfile::tempdir;

    fn fid(c: char) -> FileHash {
        FileHash::parse(&c.to_string().repeat(FILE_HASH_LEN)).unwrap()
    }

    #[test]
    fn test_sweep_removes_only_expired_completed_records() {
        let dir = tempdir().unwrap();
        let store = Arc::new(TrackFileStore::new(dir.path()).unwrap());

        let mut old_done = TrackRecord::new(fid('a'), TrackOperation::Upload);
        old_done.completed = true;
        old_done.updated_at = Utc::now() - ChronoDuration::hours(2);
        store.write_record(&old_done).unwrap();

        let mut fresh_done = TrackRecord::new(fid('b'), TrackOperation::Delete);
        fresh_done.mark_completed();
        store.write_record(&fresh_done).unwrap();

        let mut old_pending = TrackRecord::new(fid('c'), TrackOperation::Upload);
        old_pending.updated_at = Utc::now() - ChronoDuration::hours(2);
        store.write_record(&old_pending).unwrap();

        store.write(fid('d').as_str(), b"garbage").unwrap();

        let sweeper = TrackSweeper::new(Arc::clone(&store), Duration::from_secs(300), Duration::from_secs(3600));
        assert_eq!(sweeper.sweep_once().unwrap(), 1);

        assert!(!store.exists(fid('a').as_str()));
        assert!(store.exists(fid('b').as_str()));
        assert!(store.exists(fid('c').as_str()));
        assert!(store.exists(fid('d').as_str()));

        // nothing left to sweep
        assert_eq!(sweeper.sweep_once().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_background_loop_sweeps_on_first_tick() {
        let dir = tempdir().unwrap();
        let store = Arc::new(TrackFileStore::new(dir.path()).unwrap());
        let mut record = TrackRecord::new(fid('e'), TrackOperation::Delete);
        record.mark_completed();
        store.write_record(&record).unwrap();

        let handle = TrackSweeper::new(Arc::clone(&store), Duration::from_secs(3600), Duration::ZERO).start_background();
        for _ in 0..100 {
            if !store.exists(fid('e').as_str()) {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(!store.exists(fid('e').as_str()));
    }
}
