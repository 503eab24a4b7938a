use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A passing submission as stored: one row per accepted evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: u64,
    pub challenge: String,
    pub user: String,
    pub kernel_name: String,
    pub kernel_type: String,
    /// Mean timing in seconds.
    pub timing: f64,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

/// Medal for the top three places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankLabel {
    Gold,
    Silver,
    Bronze,
}

impl RankLabel {
    pub fn for_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(RankLabel::Gold),
            2 => Some(RankLabel::Silver),
            3 => Some(RankLabel::Bronze),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RankLabel::Gold => "🥇",
            RankLabel::Silver => "🥈",
            RankLabel::Bronze => "🥉",
        }
    }
}

/// One user's standing on a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based ordinal rank.
    pub rank: usize,
    pub label: Option<RankLabel>,
    pub user: String,
    pub kernel_name: String,
    pub kernel_type: String,
    pub timing: f64,
    pub submission_id: u64,
}

/// Rank users by their best timing, fastest first.
///
/// Only the minimum timing of each user counts. Equal timings keep the row
/// order of each user's best submission, and every entry gets a distinct
/// rank. Non-finite timings are ignored.
pub fn rank(submissions: &[SubmissionRecord]) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (row, s) in submissions.iter().enumerate() {
        if !s.timing.is_finite() {
            continue;
        }
        best.entry(s.user.as_str())
            .and_modify(|b| {
                if s.timing < submissions[*b].timing {
                    *b = row;
                }
            })
            .or_insert(row);
    }

    let mut rows: Vec<usize> = best.into_values().collect();
    rows.sort_unstable();
    rows.sort_by(|&a, &b| submissions[a].timing.total_cmp(&submissions[b].timing));

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let s = &submissions[row];
            LeaderboardEntry {
                rank: i + 1,
                label: RankLabel::for_rank(i + 1),
                user: s.user.clone(),
                kernel_name: s.kernel_name.clone(),
                kernel_type: s.kernel_type.clone(),
                timing: s.timing,
                submission_id: s.id,
            }
        })
        .collect()
}

/// How a new result compares with the user's earlier results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "standing", rename_all = "snake_case")]
pub enum Standing {
    /// The user had no earlier passing submission.
    First,
    PersonalBest { previous: f64 },
    NotImproved { best: f64 },
}

/// Compare `timing` with `user`'s best among `prior`.
pub fn classify(prior: &[SubmissionRecord], user: &str, timing: f64) -> Standing {
    let best = prior
        .iter()
        .filter(|s| s.user == user && s.timing.is_finite())
        .map(|s| s.timing)
        .min_by(f64::total_cmp);
    match best {
        None => Standing::First,
        Some(previous) if timing < previous => Standing::PersonalBest { previous },
        Some(best) => Standing::NotImproved { best },
    }
}
