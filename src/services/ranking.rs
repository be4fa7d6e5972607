// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::rank::{Gender, IdolMemberCounter, IdolRank};
use thiserror::Error;

/// Members ranked per gender in a snapshot
pub const RANK_SIZE: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankingError {
    #[error("ranking needs {required} {gender} members, found {found}")]
    InsufficientMembers {
        gender: Gender,
        found: usize,
        required: usize,
    },
}

/// Top three members per gender by total search count.
///
/// Ties go to the lower member id so that reruns produce the same snapshot.
pub fn rank_members(members: &[IdolMemberCounter]) -> Result<IdolRank, RankingError> {
    Ok(IdolRank {
        female: top_of(members, Gender::Female)?,
        male: top_of(members, Gender::Male)?,
    })
}

fn top_of(members: &[IdolMemberCounter], gender: Gender) -> Result<[i64; RANK_SIZE], RankingError> {
    let mut candidates: Vec<&IdolMemberCounter> =
        members.iter().filter(|m| m.gender == gender).collect();

    if candidates.len() < RANK_SIZE {
        return Err(RankingError::InsufficientMembers {
            gender,
            found: candidates.len(),
            required: RANK_SIZE,
        });
    }

    candidates.sort_by(|a, b| {
        b.total_search_count
            .cmp(&a.total_search_count)
            .then(a.id.cmp(&b.id))
    });

    Ok([candidates[0].id, candidates[1].id, candidates[2].id])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: i64, gender: Gender, total: i64) -> IdolMemberCounter {
        IdolMemberCounter {
            id,
            gender,
            search_count_temp: 0,
            total_search_count: total,
        }
    }

    #[test]
    fn test_rank_members_orders_by_total() {
        let members = vec![
            member(1, Gender::Female, 10),
            member(2, Gender::Female, 50),
            member(3, Gender::Female, 30),
            member(4, Gender::Female, 1),
            member(5, Gender::Male, 7),
            member(6, Gender::Male, 9),
            member(7, Gender::Male, 8),
        ];

        let rank = rank_members(&members).unwrap();

        assert_eq!(rank.female, [2, 3, 1]);
        assert_eq!(rank.male, [6, 7, 5]);
    }

    #[test]
    fn test_ties_break_on_lower_id() {
        let members = vec![
            member(9, Gender::Male, 5),
            member(3, Gender::Male, 5),
            member(4, Gender::Male, 5),
            member(1, Gender::Female, 0),
            member(2, Gender::Female, 0),
            member(5, Gender::Female, 0),
        ];

        let rank = rank_members(&members).unwrap();

        assert_eq!(rank.male, [3, 4, 9]);
        assert_eq!(rank.female, [1, 2, 5]);
    }

    #[test]
    fn test_too_few_members_of_one_gender() {
        let members = vec![
            member(1, Gender::Female, 1),
            member(2, Gender::Female, 2),
            member(3, Gender::Female, 3),
            member(4, Gender::Male, 1),
            member(5, Gender::Male, 2),
        ];

        assert_eq!(
            rank_members(&members).unwrap_err(),
            RankingError::InsufficientMembers {
                gender: Gender::Male,
                found: 2,
                required: 3,
            }
        );
    }
}
