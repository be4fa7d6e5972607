// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ranking category of an idol member, derived from the member's group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Parse the value stored in the `idol_group.gender` column
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "FEMALE" => Some(Gender::Female),
            "MALE" => Some(Gender::Male),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Female => write!(f, "FEMALE"),
            Gender::Male => write!(f, "MALE"),
        }
    }
}

/// Search-count event published once per searched idol member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCountMessage {
    /// Older producers send the field as `id`
    #[serde(rename = "memberId", alias = "id")]
    pub member_id: i64,
}

/// Counter row of an idol member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdolMemberCounter {
    pub id: i64,
    pub gender: Gender,
    /// Searches accumulated since the last daily rollup
    pub search_count_temp: i64,
    pub total_search_count: i64,
}

impl IdolMemberCounter {
    /// Commit the temporary count into the total
    pub fn roll_over(&mut self) {
        self.total_search_count += self.search_count_temp;
        self.search_count_temp = 0;
    }
}

/// Daily ranking snapshot: top three members per gender, best first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdolRank {
    pub female: [i64; 3],
    pub male: [i64; 3],
}

/// Ranking snapshot as persisted, with its row id and creation time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdolRank {
    pub id: i64,
    pub rank: IdolRank,
    pub created_at: DateTime<Utc>,
}
