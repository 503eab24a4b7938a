//! Text rendering of leaderboards and submission history.

use std::fmt::Write;

use kbot_core::fmt_time;
use serde::Serialize;

use crate::{LeaderboardEntry, SubmissionRecord};

/// Render a ranked leaderboard as Markdown.
pub fn render(challenge: &str, entries: &[LeaderboardEntry]) -> String {
    let mut out = format!("# Challenge: `{challenge}`\n");
    for e in entries {
        let _ = write!(out, "{}. ", e.rank);
        if let Some(label) = e.label {
            let _ = write!(out, "{} ", label.emoji());
        }
        let _ = writeln!(
            out,
            "`{} ({})` in {} by {}",
            e.kernel_name,
            e.kernel_type,
            fmt_time(e.timing),
            e.user
        );
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub position: usize,
    pub is_best: bool,
    pub submission: SubmissionRecord,
}

/// One user's submissions on one challenge, fastest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    pub user: String,
    pub best: Option<f64>,
    pub entries: Vec<HistoryEntry>,
}

impl History {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collect `user`'s submissions sorted by timing. Every submission matching
/// the best timing is marked.
pub fn history(submissions: &[SubmissionRecord], user: &str) -> History {
    let mut mine: Vec<&SubmissionRecord> = submissions.iter().filter(|s| s.user == user).collect();
    mine.sort_by(|a, b| a.timing.total_cmp(&b.timing));
    let best = mine.first().map(|s| s.timing);
    let entries = mine
        .into_iter()
        .enumerate()
        .map(|(i, s)| HistoryEntry {
            position: i + 1,
            is_best: Some(s.timing) == best,
            submission: s.clone(),
        })
        .collect();
    History { user: user.to_string(), best, entries }
}

/// Render a history as Markdown.
pub fn render_history(challenge: &str, history: &History) -> String {
    let Some(best) = history.best else {
        return format!("{} has no submissions for challenge `{challenge}`.\n", history.user);
    };
    let mut out = format!("# Submissions for `{challenge}` by {}\n", history.user);
    let _ = writeln!(out, "Total submissions: **{}**", history.len());
    let _ = writeln!(out, "Best time: **{}**\n", fmt_time(best));
    out.push_str("## Submission History\n");
    for e in &history.entries {
        let s = &e.submission;
        let marker = if e.is_best { "🏆 " } else { "" };
        let _ = writeln!(
            out,
            "{}. {marker}`{} ({})` in {}",
            e.position,
            s.kernel_name,
            s.kernel_type,
            fmt_time(s.timing)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank;

    fn record(id: u64, user: &str, timing: f64) -> SubmissionRecord {
        SubmissionRecord {
            id,
            challenge: "matmul".into(),
            user: user.into(),
            kernel_name: format!("k{id}"),
            kernel_type: "CUDA".into(),
            timing,
            created_at: 0,
        }
    }

    #[test]
    fn test_render_leaderboard() {
        let subs = vec![record(1, "alice", 0.0025), record(2, "bob", 0.000_025)];
        let text = render("matmul", &rank(&subs));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Challenge: `matmul`");
        assert_eq!(lines[1], "1. 🥇 `k2 (CUDA)` in 25.00 us by bob");
        assert_eq!(lines[2], "2. 🥈 `k1 (CUDA)` in 2.50 ms by alice");
    }

    #[test]
    fn test_render_empty_board() {
        assert_eq!(render("softmax", &[]), "# Challenge: `softmax`\n");
    }

    #[test]
    fn test_history_marks_best() {
        let subs = vec![record(1, "a", 3.0), record(2, "b", 1.0), record(3, "a", 2.0), record(4, "a", 2.0)];
        let h = history(&subs, "a");
        assert_eq!(h.len(), 3);
        assert_eq!(h.best, Some(2.0));
        let marks: Vec<bool> = h.entries.iter().map(|e| e.is_best).collect();
        assert_eq!(marks, vec![true, true, false]);
        let text = render_history("matmul", &h);
        assert!(text.contains("Total submissions: **3**"));
        assert!(text.contains("1. 🏆 `k3 (CUDA)` in 2.00 s"));
        assert!(text.contains("3. `k1 (CUDA)` in 3.00 s"));
    }

    #[test]
    fn test_history_empty() {
        let h = history(&[], "nobody");
        assert!(h.is_empty());
        assert!(render_history("matmul", &h).contains("no submissions"));
    }
}
