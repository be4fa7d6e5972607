// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Search-count event queue.
//!
//! Popped messages stay in flight until acknowledged, so a drain that dies
//! before persisting its tallies loses nothing: the next drain puts the
//! in-flight messages back at the head of the queue.
//!
//! Requeueing is only safe while no other drain is running, so drains hold a
//! lock with a TTL. A drain that crashes leaves the lock to expire.

use crate::models::rank::SearchCountMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction, Script};
use std::time::Duration;

/// Deletes the lock only if the caller's token still holds it
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

#[async_trait]
pub trait CountQueue: Send + Sync {
    /// Append an event at the tail of the queue
    async fn publish(&self, message: &SearchCountMessage) -> Result<()>;

    /// Non-blocking pop of the head message, which becomes in flight.
    /// `None` when the queue is empty.
    async fn pop(&self) -> Result<Option<Vec<u8>>>;

    /// Forget every in-flight message
    async fn ack(&self) -> Result<()>;

    /// Return in-flight messages to the head of the queue in their original
    /// order. Returns how many were returned.
    async fn requeue_unacked(&self) -> Result<usize>;

    /// Take the drain lock under `token` for at most `ttl`.
    /// `false` when another drain holds it.
    async fn try_lock_drain(&self, token: &str, ttl: Duration) -> Result<bool>;

    /// Release the drain lock if `token` still holds it
    async fn unlock_drain(&self, token: &str) -> Result<()>;
}

/// Redis list queue; in-flight messages live in `{queue}:processing` and the
/// drain lock in `{queue}:lock`
#[derive(Clone)]
pub struct RedisCountQueue {
    connection: ConnectionManager,
    queue_key: String,
    processing_key: String,
    lock_key: String,
}

impl RedisCountQueue {
    pub fn new(connection: ConnectionManager, queue_name: &str) -> Self {
        Self {
            connection,
            queue_key: queue_name.to_string(),
            processing_key: format!("{}:processing", queue_name),
            lock_key: format!("{}:lock", queue_name),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    /// Number of messages waiting (not in flight)
    pub async fn len(&self) -> Result<usize> {
        let mut connection = self.connection.clone();
        connection
            .llen(&self.queue_key)
            .await
            .context("Failed to read queue length")
    }
}

#[async_trait]
impl CountQueue for RedisCountQueue {
    async fn publish(&self, message: &SearchCountMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let mut connection = self.connection.clone();
        let _: usize = connection
            .rpush(&self.queue_key, payload)
            .await
            .context("Failed to publish search count")?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Vec<u8>>> {
        let mut connection = self.connection.clone();
        connection
            .lmove(
                &self.queue_key,
                &self.processing_key,
                Direction::Left,
                Direction::Right,
            )
            .await
            .context("Failed to pop search count message")
    }

    async fn ack(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: usize = connection
            .del(&self.processing_key)
            .await
            .context("Failed to acknowledge in-flight messages")?;
        Ok(())
    }

    async fn requeue_unacked(&self) -> Result<usize> {
        let mut connection = self.connection.clone();
        let mut requeued = 0;
        // Newest in-flight message first, each pushed to the head
        loop {
            let moved: Option<Vec<u8>> = connection
                .lmove(
                    &self.processing_key,
                    &self.queue_key,
                    Direction::Right,
                    Direction::Left,
                )
                .await
                .context("Failed to requeue in-flight message")?;
            if moved.is_none() {
                break;
            }
            requeued += 1;
        }
        Ok(requeued)
    }

    async fn try_lock_drain(&self, token: &str, ttl: Duration) -> Result<bool> {
        let mut connection = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.lock_key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
            .query_async(&mut connection)
            .await
            .context("Failed to take drain lock")?;
        Ok(reply.is_some())
    }

    async fn unlock_drain(&self, token: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: i64 = Script::new(RELEASE_LOCK_SCRIPT)
            .key(&self.lock_key)
            .arg(token)
            .invoke_async(&mut connection)
            .await
            .context("Failed to release drain lock")?;
        Ok(())
    }
}
