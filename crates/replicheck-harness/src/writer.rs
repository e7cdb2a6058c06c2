//! Continuous background write stream.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use replicheck_client::NodeHandle;
use replicheck_types::{AckLevel, WriteRecord};

/// Sleep granularity of the write loop. A stop request is honored within
/// at most one slice.
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Issues a sequence-numbered write stream at a fixed cadence from a
/// background task, recording per-attempt outcome and latency.
///
/// The record log is append-only with a single appender (the task) and any
/// number of readers: [`Self::records`] always observes a consistent
/// prefix. Individual write failures are recorded, never raised.
///
/// Sequence numbers are exactly the contiguous range `[0, attempted)` —
/// one record per attempt, no duplicates, no gaps, regardless of outcome.
pub struct WriteDriver {
    records: Arc<RwLock<Vec<WriteRecord>>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl WriteDriver {
    /// Launches the write loop against `handle` (typically opened on the
    /// seed endpoint so writes follow the primary). The loop runs until
    /// `total` attempts have been made or [`Self::stop`] is requested.
    pub fn start(
        handle: NodeHandle,
        collection: &str,
        total: u64,
        interval: Duration,
        ack: AckLevel,
    ) -> Self {
        // Capacity is a hint only: the configured total is unbounded and
        // must not turn into an up-front allocation.
        let records = Arc::new(RwLock::new(Vec::with_capacity(total.min(4096) as usize)));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(write_loop(
            handle,
            collection.to_string(),
            total,
            interval,
            ack,
            Arc::clone(&records),
            stop_rx,
        ));

        Self {
            records,
            stop_tx,
            task: Some(task),
        }
    }

    /// Snapshot of the record log so far. Safe to call at any time from
    /// any task; the returned prefix is consistent.
    pub fn records(&self) -> Vec<WriteRecord> {
        self.records.read().expect("record log lock poisoned").clone()
    }

    /// Number of attempts made so far.
    pub fn attempted(&self) -> u64 {
        self.records.read().expect("record log lock poisoned").len() as u64
    }

    /// Requests graceful termination. Advisory: the loop notices within at
    /// most one sleep slice (or after the in-flight write completes).
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Waits for the write loop to terminate. Returns `true` if it did,
    /// `false` if `deadline` elapsed first (the loop keeps running; call
    /// again to keep waiting).
    pub async fn join(&mut self, deadline: Duration) -> bool {
        let Some(task) = self.task.as_mut() else {
            return true; // already joined
        };
        match timeout(deadline, task).await {
            Ok(result) => {
                if let Err(err) = result {
                    tracing::error!(%err, "write loop task failed");
                }
                self.task = None;
                true
            }
            Err(_) => false,
        }
    }

    /// Whether the loop has already been joined.
    pub fn is_finished(&self) -> bool {
        self.task.is_none()
    }
}

async fn write_loop(
    mut handle: NodeHandle,
    collection: String,
    total: u64,
    interval: Duration,
    ack: AckLevel,
    records: Arc<RwLock<Vec<WriteRecord>>>,
    stop_rx: watch::Receiver<bool>,
) {
    let mut seq = 0u64;

    while seq < total && !*stop_rx.borrow() {
        let issued_at = Utc::now();
        let start = Instant::now();
        let outcome = handle.write(&collection, seq, ack).await;
        let latency = start.elapsed();

        tracing::debug!(seq, ok = outcome.is_success(), ?latency, "write attempt");
        records
            .write()
            .expect("record log lock poisoned")
            .push(WriteRecord {
                seq,
                issued_at,
                outcome,
                latency,
            });
        seq += 1;

        // Sleep in slices so a stop request is honored promptly.
        let mut slept = Duration::ZERO;
        while slept < interval && !*stop_rx.borrow() {
            let slice = SLEEP_SLICE.min(interval - slept);
            sleep(slice).await;
            slept += slice;
        }
    }

    tracing::info!(attempted = seq, total, "write loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use replicheck_client::{ConnectError, ReadError, StoreConnector, StoreSession, Timeouts};
    use replicheck_types::{ClusterEndpoint, Role, WriteOutcome};
    use std::collections::BTreeSet;

    struct AlwaysOk;

    #[async_trait]
    impl StoreSession for AlwaysOk {
        async fn ping(&self) -> bool {
            true
        }

        async fn insert(&self, _c: &str, _id: u64, _ack: AckLevel) -> WriteOutcome {
            WriteOutcome::Success
        }

        async fn read_ids(&self, _c: &str) -> Result<BTreeSet<u64>, ReadError> {
            Ok(BTreeSet::new())
        }

        async fn role(&self) -> Result<Role, ReadError> {
            Ok(Role::Primary)
        }
    }

    struct AlwaysOkConnector;

    #[async_trait]
    impl StoreConnector for AlwaysOkConnector {
        async fn connect(
            &self,
            _endpoint: &ClusterEndpoint,
            _timeouts: Timeouts,
        ) -> Result<Box<dyn StoreSession>, ConnectError> {
            Ok(Box::new(AlwaysOk))
        }
    }

    async fn seed_handle() -> NodeHandle {
        NodeHandle::open(
            &AlwaysOkConnector,
            ClusterEndpoint::seed("cluster", "sim://cluster"),
            Timeouts::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn runs_to_completion_with_contiguous_sequence() {
        let handle = seed_handle().await;
        let mut driver = WriteDriver::start(handle, "c", 20, Duration::ZERO, AckLevel::One);

        assert!(driver.join(Duration::from_secs(10)).await);
        let records = driver.records();
        assert_eq!(records.len(), 20);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.seq, i as u64);
        }
    }

    #[tokio::test]
    async fn stop_is_honored_within_a_slice_and_log_is_final_after_join() {
        let handle = seed_handle().await;
        let mut driver = WriteDriver::start(
            handle,
            "c",
            1_000_000,
            Duration::from_secs(3600),
            AckLevel::One,
        );

        // Let at least one attempt land.
        while driver.attempted() == 0 {
            sleep(Duration::from_millis(5)).await;
        }

        driver.stop();
        let joined = driver.join(SLEEP_SLICE + Duration::from_secs(1)).await;
        assert!(joined, "stop must be honored within one sleep slice");

        let after_join = driver.records();
        sleep(SLEEP_SLICE * 2).await;
        assert_eq!(driver.records(), after_join, "no appends after join");
    }

    #[tokio::test]
    async fn timestamps_are_monotonic() {
        let handle = seed_handle().await;
        let mut driver = WriteDriver::start(handle, "c", 10, Duration::from_millis(1), AckLevel::One);
        assert!(driver.join(Duration::from_secs(10)).await);

        let records = driver.records();
        for pair in records.windows(2) {
            assert!(pair[0].issued_at <= pair[1].issued_at);
        }
    }

    #[tokio::test]
    async fn extreme_total_does_not_preallocate() {
        // The old eager Vec::with_capacity(total) aborted here before a
        // single write was attempted.
        let handle = seed_handle().await;
        let mut driver = WriteDriver::start(
            handle,
            "c",
            u64::MAX,
            Duration::from_secs(3600),
            AckLevel::One,
        );

        while driver.attempted() == 0 {
            sleep(Duration::from_millis(5)).await;
        }
        driver.stop();
        assert!(driver.join(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn join_without_stop_times_out_and_can_be_retried() {
        let handle = seed_handle().await;
        let mut driver = WriteDriver::start(
            handle,
            "c",
            1_000_000,
            Duration::from_secs(3600),
            AckLevel::One,
        );

        assert!(!driver.join(Duration::from_millis(50)).await);
        driver.stop();
        assert!(driver.join(Duration::from_secs(2)).await);
    }
}
