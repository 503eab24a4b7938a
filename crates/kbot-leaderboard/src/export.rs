//! Best-per-user export.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::SubmissionRecord;

/// One user's best passing submission on one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub challenge: String,
    pub user: String,
    pub kernel_name: String,
    pub kernel_type: String,
    pub timing: f64,
    pub submission_id: u64,
    pub created_at: u64,
}

impl From<&SubmissionRecord> for ExportRow {
    fn from(s: &SubmissionRecord) -> Self {
        Self {
            challenge: s.challenge.clone(),
            user: s.user.clone(),
            kernel_name: s.kernel_name.clone(),
            kernel_type: s.kernel_type.clone(),
            timing: s.timing,
            submission_id: s.id,
            created_at: s.created_at,
        }
    }
}

/// One row per (challenge, user), keeping the fastest submission with a
/// positive timing. Rows are ordered by challenge, then timing.
pub fn export_best(submissions: &[SubmissionRecord]) -> Vec<ExportRow> {
    let mut best: HashMap<(&str, &str), &SubmissionRecord> = HashMap::new();
    for s in submissions.iter().filter(|s| s.timing.is_finite() && s.timing > 0.0) {
        best.entry((s.challenge.as_str(), s.user.as_str()))
            .and_modify(|b| {
                if s.timing < b.timing {
                    *b = s;
                }
            })
            .or_insert(s);
    }
    let mut rows: Vec<ExportRow> = best.into_values().map(ExportRow::from).collect();
    rows.sort_by(|a, b| {
        a.challenge
            .cmp(&b.challenge)
            .then(a.timing.total_cmp(&b.timing))
            .then(a.submission_id.cmp(&b.submission_id))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, challenge: &str, user: &str, timing: f64) -> SubmissionRecord {
        SubmissionRecord {
            id,
            challenge: challenge.into(),
            user: user.into(),
            kernel_name: "k".into(),
            kernel_type: "PTX".into(),
            timing,
            created_at: 0,
        }
    }

    #[test]
    fn test_one_row_per_challenge_and_user() {
        let subs = vec![
            record(1, "matmul", "a", 3.0),
            record(2, "matmul", "a", 1.0),
            record(3, "softmax", "a", 2.0),
            record(4, "matmul", "b", 0.5),
            record(5, "matmul", "c", 0.0),
        ];
        let rows = export_best(&subs);
        let keys: Vec<(&str, &str, u64)> = rows
            .iter()
            .map(|r| (r.challenge.as_str(), r.user.as_str(), r.submission_id))
            .collect();
        assert_eq!(keys, vec![("matmul", "b", 4), ("matmul", "a", 2), ("softmax", "a", 3)]);
    }
}
