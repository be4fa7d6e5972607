// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::rank::{IdolRank, SearchCountMessage};
use crate::models::settings::WorkerSettings;
use crate::services::count_queue::CountQueue;
use crate::services::counter_store::CounterStore;
use crate::services::scheduler::{retry_with_fixed_delay, run_on_schedule, Schedule};
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one drain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages that were in flight from an earlier, interrupted drain
    pub recovered: usize,
    /// Valid messages tallied
    pub tallied: usize,
    /// Messages dropped because they could not be parsed
    pub malformed: usize,
    /// Per-member tallies written to the counter store
    pub tallies: BTreeMap<i64, i64>,
    /// Tallied member ids with no counter row
    pub unknown_members: Vec<i64>,
    /// The batch cap stopped the drain; the rest waits for the next firing
    pub cap_reached: bool,
    /// Another drain held the lock, so nothing was popped
    pub skipped: bool,
}

static DRAIN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique per drain invocation, across processes and within one
fn drain_token() -> String {
    format!(
        "{}-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        DRAIN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

/// Aggregates search-count events into idol member counters and rankings
pub struct SearchCountWorker {
    queue: Arc<dyn CountQueue>,
    store: Arc<dyn CounterStore>,
    settings: WorkerSettings,
}

impl SearchCountWorker {
    pub fn new(
        queue: Arc<dyn CountQueue>,
        store: Arc<dyn CounterStore>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            settings,
        }
    }

    /// Pop up to the batch cap of valid messages, tally them per member and
    /// add the tallies to the members' temporary counts.
    ///
    /// Popped messages are acknowledged only after the tallies are persisted.
    /// If persisting fails they stay in flight and the next drain requeues them.
    ///
    /// Runs under the queue's drain lock. When another drain holds it this
    /// firing is skipped.
    pub async fn drain(&self) -> Result<DrainReport> {
        let token = drain_token();
        if !self
            .queue
            .try_lock_drain(&token, self.settings.drain_lock_ttl)
            .await?
        {
            warn!("another drain holds the drain lock, skipping this firing");
            return Ok(DrainReport {
                skipped: true,
                ..Default::default()
            });
        }

        let result = self.drain_locked().await;

        if let Err(e) = self.queue.unlock_drain(&token).await {
            warn!(error = %format!("{:#}", e), "failed to release drain lock, it will expire");
        }
        result
    }

    async fn drain_locked(&self) -> Result<DrainReport> {
        let mut report = DrainReport {
            recovered: self.queue.requeue_unacked().await?,
            ..Default::default()
        };
        if report.recovered > 0 {
            warn!(
                recovered = report.recovered,
                "requeued messages left in flight by an interrupted drain"
            );
        }

        while report.tallied < self.settings.drain_batch_size {
            let Some(payload) = self.queue.pop().await? else {
                break;
            };

            match serde_json::from_slice::<SearchCountMessage>(&payload) {
                Ok(message) => {
                    *report.tallies.entry(message.member_id).or_insert(0) += 1;
                    report.tallied += 1;
                }
                Err(e) => {
                    report.malformed += 1;
                    warn!(bytes = payload.len(), error = %e, "dropping malformed search count message");
                }
            }
        }
        report.cap_reached = report.tallied >= self.settings.drain_batch_size;

        if !report.tallies.is_empty() {
            report.unknown_members = self.store.add_search_counts(&report.tallies).await?;
            for member_id in &report.unknown_members {
                warn!(
                    member_id,
                    count = report.tallies.get(member_id).copied().unwrap_or_default(),
                    "discarding search counts of unknown idol member"
                );
            }
        }

        self.queue.ack().await?;

        info!(
            tallied = report.tallied,
            malformed = report.malformed,
            members = report.tallies.len(),
            cap_reached = report.cap_reached,
            "search count drain finished"
        );

        Ok(report)
    }

    /// Commit the temporary counts and snapshot today's ranking, once
    pub async fn rollup(&self) -> Result<IdolRank> {
        let rank = self.store.commit_daily_rollup().await?;
        info!(
            female = ?rank.female,
            male = ?rank.male,
            "idol ranking snapshot written"
        );
        Ok(rank)
    }

    /// [`Self::rollup`] under the configured retry policy.
    /// Every attempt starts from scratch; a failed attempt commits nothing.
    pub async fn rollup_with_retry(&self) -> Result<IdolRank> {
        retry_with_fixed_delay(
            "daily rollup",
            self.settings.rollup_max_attempts,
            self.settings.rollup_retry_delay,
            move || self.rollup(),
        )
        .await
    }

    /// Run the drain and rollup jobs on their schedules until the process exits
    pub async fn start(self: Arc<Self>) {
        info!(
            drain_every_hours = self.settings.drain_every_hours,
            batch_size = self.settings.drain_batch_size,
            rollup_at = %self.settings.rollup_at,
            "search count worker started"
        );

        let drain_worker = self.clone();
        let drain = run_on_schedule(
            "search count drain",
            Schedule::EveryHours(self.settings.drain_every_hours),
            move || {
                let worker = drain_worker.clone();
                async move { worker.drain().await.map(|_| ()) }
            },
        );

        let rollup_worker = self.clone();
        let rollup = run_on_schedule(
            "daily rollup",
            Schedule::DailyAt(self.settings.rollup_at),
            move || {
                let worker = rollup_worker.clone();
                async move { worker.rollup_with_retry().await.map(|_| ()) }
            },
        );

        tokio::join!(drain, rollup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rank::{Gender, IdolMemberCounter};
    use crate::services::memory::{InMemoryCountQueue, InMemoryCounterStore};
    use std::time::Duration;

    fn member(id: i64, gender: Gender, temp: i64) -> IdolMemberCounter {
        IdolMemberCounter {
            id,
            gender,
            search_count_temp: temp,
            total_search_count: 0,
        }
    }

    fn worker(
        queue: Arc<InMemoryCountQueue>,
        store: Arc<InMemoryCounterStore>,
    ) -> SearchCountWorker {
        let settings = WorkerSettings {
            rollup_retry_delay: Duration::from_millis(1),
            ..Default::default()
        };
        SearchCountWorker::new(queue, store, settings)
    }

    #[tokio::test]
    async fn test_drain_empty_queue() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::default());

        let report = worker(queue, store).drain().await.unwrap();

        assert_eq!(report, DrainReport::default());
    }

    #[tokio::test]
    async fn test_drain_requeues_messages_from_interrupted_run() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::with_members(vec![member(
            1,
            Gender::Female,
            0,
        )]));
        queue.push_member(1);
        queue.push_member(1);
        queue.pop().await.unwrap();

        let report = worker(queue.clone(), store.clone()).drain().await.unwrap();

        assert_eq!(report.recovered, 1);
        assert_eq!(report.tallied, 2);
        assert_eq!(store.member(1).unwrap().search_count_temp, 2);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_expired_lock_of_crashed_drain_is_taken_over() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::with_members(vec![member(
            1,
            Gender::Female,
            0,
        )]));
        queue.push_member(1);
        queue
            .try_lock_drain("crashed", Duration::from_millis(1))
            .await
            .unwrap();
        queue.pop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = worker(queue.clone(), store.clone()).drain().await.unwrap();

        assert!(!report.skipped);
        assert_eq!(report.recovered, 1);
        assert_eq!(store.member(1).unwrap().search_count_temp, 1);
        assert!(queue.drain_lock.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_messages_in_flight() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::with_members(vec![member(
            1,
            Gender::Female,
            0,
        )]));
        for _ in 0..3 {
            queue.push_member(1);
        }
        store.fail_next(1);

        let worker = worker(queue.clone(), store.clone());
        assert!(worker.drain().await.is_err());
        assert_eq!(queue.in_flight_len(), 3);
        assert_eq!(store.member(1).unwrap().search_count_temp, 0);

        let report = worker.drain().await.unwrap();
        assert_eq!(report.recovered, 3);
        assert_eq!(store.member(1).unwrap().search_count_temp, 3);
    }

    #[tokio::test]
    async fn test_unknown_members_are_reported() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::with_members(vec![member(
            1,
            Gender::Male,
            0,
        )]));
        queue.push_member(1);
        queue.push_member(99);

        let report = worker(queue.clone(), store.clone()).drain().await.unwrap();

        assert_eq!(report.unknown_members, vec![99]);
        assert_eq!(store.member(1).unwrap().search_count_temp, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_rollup_retries_transient_failures() {
        let queue = Arc::new(InMemoryCountQueue::default());
        let store = Arc::new(InMemoryCounterStore::with_members(vec![
            member(1, Gender::Female, 1),
            member(2, Gender::Female, 2),
            member(3, Gender::Female, 3),
            member(4, Gender::Male, 4),
            member(5, Gender::Male, 5),
            member(6, Gender::Male, 6),
        ]));
        store.fail_next(2);

        let rank = worker(queue, store.clone())
            .rollup_with_retry()
            .await
            .unwrap();

        assert_eq!(rank.female, [3, 2, 1]);
        assert_eq!(rank.male, [6, 5, 4]);
        assert_eq!(store.ranks.lock().unwrap().len(), 1);
    }
}
