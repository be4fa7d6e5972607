// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Time-triggered background jobs.
//!
//! A scheduled job runs inside a single loop that awaits each firing before
//! computing the next one, so a job never overlaps with itself. A firing that
//! is missed because the previous run overran is skipped, not queued.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Firing times of a job, in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// At minute 0 of every hour divisible by `n`, counted from midnight
    EveryHours(u32),
    /// Once a day at the given time
    DailyAt(NaiveTime),
}

impl Schedule {
    /// First firing strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        match *self {
            Schedule::EveryHours(hours) => {
                let step = ChronoDuration::hours(i64::from(hours.max(1)));
                let mut next = midnight;
                while next <= now {
                    next += step;
                }
                next
            }
            Schedule::DailyAt(time) => {
                let today = now.date_naive().and_time(time).and_utc();
                if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                }
            }
        }
    }
}

/// Run `job` at every firing of `schedule`, forever.
///
/// Job failures are logged and the loop carries on with the next firing.
pub async fn run_on_schedule<F, Fut>(name: &'static str, schedule: Schedule, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        info!(job = name, next = %next, "job scheduled");

        sleep((next - now).to_std().unwrap_or_default()).await;

        let started = Utc::now();
        match job().await {
            Ok(()) => info!(
                job = name,
                elapsed_ms = (Utc::now() - started).num_milliseconds(),
                "job finished"
            ),
            Err(e) => error!(job = name, error = %format!("{:#}", e), "job failed"),
        }
    }
}

/// Run `operation` up to `max_attempts` times, sleeping `delay` between
/// attempts. The last error is returned once attempts are exhausted.
pub async fn retry_with_fixed_delay<T, F, Fut>(
    name: &'static str,
    max_attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!(
                    job = name,
                    attempt,
                    max_attempts,
                    error = %format!("{:#}", e),
                    "attempt failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    job = name,
                    attempts = max_attempts,
                    error = %format!("{:#}", e),
                    "giving up after exhausting retries"
                );
                return Err(e.context(format!("{} failed after {} attempts", name, max_attempts)));
            }
        }
    }
}
