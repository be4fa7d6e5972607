// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Idol member search counters and ranking history in Postgres.

use crate::models::rank::{Gender, IdolMemberCounter, IdolRank, StoredIdolRank};
use crate::services::ranking::rank_members;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::info;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add per-member tallies to `search_count_temp` as one unit of work.
    /// Returns the ids that matched no member; their tallies are discarded.
    async fn add_search_counts(&self, tallies: &BTreeMap<i64, i64>) -> Result<Vec<i64>>;

    /// Move every member's temporary count into its total, rank the members
    /// and append the snapshot. Either all of it is committed or none of it.
    async fn commit_daily_rollup(&self) -> Result<IdolRank>;

    async fn latest_rank(&self) -> Result<Option<StoredIdolRank>>;
}

#[derive(FromRow)]
struct IdolMemberRow {
    idol_member_id: i64,
    gender: String,
    search_count_temp: i64,
    total_search_count: i64,
}

impl TryFrom<IdolMemberRow> for IdolMemberCounter {
    type Error = anyhow::Error;

    fn try_from(row: IdolMemberRow) -> Result<Self> {
        let gender = Gender::parse(&row.gender).ok_or_else(|| {
            anyhow!(
                "Idol member {} has unknown gender {}",
                row.idol_member_id,
                row.gender
            )
        })?;

        Ok(IdolMemberCounter {
            id: row.idol_member_id,
            gender,
            search_count_temp: row.search_count_temp,
            total_search_count: row.total_search_count,
        })
    }
}

#[derive(FromRow)]
struct IdolRankRow {
    idol_rank_id: i64,
    first_female_idol_id: i64,
    second_female_idol_id: i64,
    third_female_idol_id: i64,
    first_male_idol_id: i64,
    second_male_idol_id: i64,
    third_male_idol_id: i64,
    created_at: DateTime<Utc>,
}

impl From<IdolRankRow> for StoredIdolRank {
    fn from(row: IdolRankRow) -> Self {
        StoredIdolRank {
            id: row.idol_rank_id,
            rank: IdolRank {
                female: [
                    row.first_female_idol_id,
                    row.second_female_idol_id,
                    row.third_female_idol_id,
                ],
                male: [
                    row.first_male_idol_id,
                    row.second_male_idol_id,
                    row.third_male_idol_id,
                ],
            },
            created_at: row.created_at,
        }
    }
}

/// Postgres client for the idol counter tables
#[derive(Clone)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        Ok(Self { pool })
    }

    /// Apply the bundled schema migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl CounterStore for PostgresCounterStore {
    async fn add_search_counts(&self, tallies: &BTreeMap<i64, i64>) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut unknown = Vec::new();

        for (&member_id, &count) in tallies {
            let result = sqlx::query(
                "UPDATE idol_member
                 SET search_count_temp = search_count_temp + $1
                 WHERE idol_member_id = $2",
            )
            .bind(count)
            .bind(member_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to add search count of member {}", member_id))?;

            if result.rows_affected() == 0 {
                unknown.push(member_id);
            }
        }

        tx.commit().await.context("Failed to commit search counts")?;
        Ok(unknown)
    }

    async fn commit_daily_rollup(&self) -> Result<IdolRank> {
        // Dropping `tx` on any early return rolls everything back
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE idol_member
             SET total_search_count = total_search_count + search_count_temp,
                 search_count_temp = 0",
        )
        .execute(&mut *tx)
        .await
        .context("Failed to roll over search counts")?;

        let rows = sqlx::query_as::<_, IdolMemberRow>(
            "SELECT m.idol_member_id, g.gender, m.search_count_temp, m.total_search_count
             FROM idol_member m
             JOIN idol_group g ON g.idol_group_id = m.idol_group_id",
        )
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load idol members")?;

        let members = rows
            .into_iter()
            .map(IdolMemberCounter::try_from)
            .collect::<Result<Vec<_>>>()?;

        let rank = rank_members(&members)?;

        sqlx::query(
            "INSERT INTO idol_rank (
                first_female_idol_id, second_female_idol_id, third_female_idol_id,
                first_male_idol_id, second_male_idol_id, third_male_idol_id
             )
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(rank.female[0])
        .bind(rank.female[1])
        .bind(rank.female[2])
        .bind(rank.male[0])
        .bind(rank.male[1])
        .bind(rank.male[2])
        .execute(&mut *tx)
        .await
        .context("Failed to insert ranking snapshot")?;

        tx.commit().await.context("Failed to commit daily rollup")?;
        Ok(rank)
    }

    async fn latest_rank(&self) -> Result<Option<StoredIdolRank>> {
        let row = sqlx::query_as::<_, IdolRankRow>(
            "SELECT idol_rank_id,
                    first_female_idol_id, second_female_idol_id, third_female_idol_id,
                    first_male_idol_id, second_male_idol_id, third_male_idol_id,
                    created_at
             FROM idol_rank
             ORDER BY idol_rank_id DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load latest ranking")?;

        Ok(row.map(StoredIdolRank::from))
    }
}
