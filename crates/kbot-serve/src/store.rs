//! In-memory challenge, submission and user records.

use std::collections::BTreeMap;
use std::sync::Arc;

use kbot_core::{DType, Shape};
use kbot_leaderboard::SubmissionRecord;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("challenge with name '{0}' already exists")]
    DuplicateChallenge(String),

    #[error("challenge '{0}' not found")]
    ChallengeNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(String),
}

/// A challenge and its hidden test suite.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub creator: String,
    pub kernel_type: String,
    pub input_shapes: Vec<Shape>,
    pub output_shape: Shape,
    pub dtype: DType,
    pub tests: usize,
    pub suite: Arc<Vec<u8>>,
    pub ops: u64,
    /// Mean reference timing in seconds.
    pub baseline: f64,
    pub created_at: u64,
}

/// A challenge before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub name: String,
    pub description: String,
    pub creator: String,
    pub kernel_type: String,
    pub input_shapes: Vec<Shape>,
    pub output_shape: Shape,
    pub dtype: DType,
    pub tests: usize,
    pub suite: Vec<u8>,
    pub ops: u64,
    pub baseline: f64,
}

#[derive(Debug, Clone)]
pub struct StoredSubmission {
    pub record: SubmissionRecord,
    pub source: String,
}

/// What a user deletion removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRemoval {
    pub submissions: usize,
    pub challenges: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ChallengeStore {
    challenges: Vec<Challenge>,
    submissions: Vec<StoredSubmission>,
    /// User id to first-seen timestamp.
    users: BTreeMap<String, u64>,
    next_challenge_id: u64,
    next_submission_id: u64,
}

pub fn timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.challenges.iter().any(|c| c.name == name)
    }

    pub fn challenge(&self, name: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.name == name)
    }

    /// Challenges in creation order.
    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn insert_challenge(&mut self, new: NewChallenge) -> Result<&Challenge, StoreError> {
        if self.contains(&new.name) {
            return Err(StoreError::DuplicateChallenge(new.name));
        }
        self.touch_user(&new.creator);
        self.next_challenge_id += 1;
        self.challenges.push(Challenge {
            id: self.next_challenge_id,
            name: new.name,
            description: new.description,
            creator: new.creator,
            kernel_type: new.kernel_type,
            input_shapes: new.input_shapes,
            output_shape: new.output_shape,
            dtype: new.dtype,
            tests: new.tests,
            suite: Arc::new(new.suite),
            ops: new.ops,
            baseline: new.baseline,
            created_at: timestamp(),
        });
        let last = self.challenges.len() - 1;
        Ok(&self.challenges[last])
    }

    /// Remove a challenge and its submissions. Returns the number of
    /// submissions removed.
    pub fn delete_challenge(&mut self, name: &str) -> Result<usize, StoreError> {
        let before = self.challenges.len();
        self.challenges.retain(|c| c.name != name);
        if self.challenges.len() == before {
            return Err(StoreError::ChallengeNotFound(name.to_string()));
        }
        let subs = self.submissions.len();
        self.submissions.retain(|s| s.record.challenge != name);
        Ok(subs - self.submissions.len())
    }

    /// Record a passing submission.
    pub fn record_submission(
        &mut self,
        challenge: &str,
        user: &str,
        kernel_name: &str,
        kernel_type: &str,
        source: &str,
        timing: f64,
    ) -> Result<SubmissionRecord, StoreError> {
        if !self.contains(challenge) {
            return Err(StoreError::ChallengeNotFound(challenge.to_string()));
        }
        self.touch_user(user);
        self.next_submission_id += 1;
        let record = SubmissionRecord {
            id: self.next_submission_id,
            challenge: challenge.to_string(),
            user: user.to_string(),
            kernel_name: kernel_name.to_string(),
            kernel_type: kernel_type.to_string(),
            timing,
            created_at: timestamp(),
        };
        self.submissions.push(StoredSubmission { record: record.clone(), source: source.to_string() });
        Ok(record)
    }

    /// Submissions to `challenge`, in insertion order.
    pub fn submissions_for(&self, challenge: &str) -> Vec<SubmissionRecord> {
        self.submissions
            .iter()
            .filter(|s| s.record.challenge == challenge)
            .map(|s| s.record.clone())
            .collect()
    }

    pub fn all_submissions(&self) -> Vec<SubmissionRecord> {
        self.submissions.iter().map(|s| s.record.clone()).collect()
    }

    pub fn source_of(&self, submission_id: u64) -> Option<&str> {
        self.submissions
            .iter()
            .find(|s| s.record.id == submission_id)
            .map(|s| s.source.as_str())
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Remove a user, their submissions, the challenges they created and
    /// every submission to those challenges.
    pub fn delete_user(&mut self, user: &str) -> Result<UserRemoval, StoreError> {
        let known = self.users.remove(user).is_some();
        let challenges: Vec<String> = self
            .challenges
            .iter()
            .filter(|c| c.creator == user)
            .map(|c| c.name.clone())
            .collect();
        let before = self.submissions.len();
        self.submissions.retain(|s| s.record.user != user);
        let own = before - self.submissions.len();
        if !known && own == 0 && challenges.is_empty() {
            return Err(StoreError::UserNotFound(user.to_string()));
        }
        for name in &challenges {
            self.delete_challenge(name)?;
        }
        Ok(UserRemoval { submissions: own, challenges })
    }

    fn touch_user(&mut self, user: &str) {
        self.users.entry(user.to_string()).or_insert_with(timestamp);
    }
}
