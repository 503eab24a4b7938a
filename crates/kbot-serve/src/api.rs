//! Challenge, submission and leaderboard handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use kbot_core::{fmt_time, literal, DType};
use kbot_harness::{Distribution, HarnessError, KernelSubmission, SuiteRequest};
use kbot_kernels::KernelType;
use kbot_leaderboard::{
    classify, export_best, history, rank, render_history, Board, ExportRow, History,
    LeaderboardEntry, Standing,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{timestamp, Challenge, NewChallenge, StoreError};

// ============================================================================
// Request types
// ============================================================================

/// Shapes and launch extents are Python-style literals, e.g.
/// `"[(4, 4), (4, 4)]"`, `"(4, 4)"`, `"(1, 1, 1)"`.
#[derive(Deserialize)]
pub struct CreateChallengeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub creator: String,
    pub kernel_type: String,
    pub kernel_name: String,
    pub source: String,
    pub input_shapes: String,
    pub output_shape: String,
    pub global_size: String,
    pub local_size: String,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default = "default_num_tests")]
    pub num_tests: usize,
}

fn default_dtype() -> String { "single".to_string() }
fn default_distribution() -> String { "randn".to_string() }
fn default_num_tests() -> usize { 10 }

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub user: String,
    pub kernel_type: String,
    pub kernel_name: String,
    pub source: String,
    pub global_size: String,
    pub local_size: String,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub name: String,
    pub description: String,
    pub creator: String,
    pub kernel_type: String,
    pub input_shapes: Vec<String>,
    pub output_shape: String,
    pub dtype: String,
    pub tests: usize,
    pub ops: u64,
    pub baseline: f64,
    pub baseline_display: String,
    pub created_at: u64,
}

impl From<&Challenge> for ChallengeSummary {
    fn from(c: &Challenge) -> Self {
        Self {
            name: c.name.clone(),
            description: c.description.clone(),
            creator: c.creator.clone(),
            kernel_type: c.kernel_type.clone(),
            input_shapes: c.input_shapes.iter().map(|s| s.to_string()).collect(),
            output_shape: c.output_shape.to_string(),
            dtype: c.dtype.challenge_name().to_string(),
            tests: c.tests,
            ops: c.ops,
            baseline: c.baseline,
            baseline_display: fmt_time(c.baseline),
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub id: u64,
    pub challenge: String,
    pub user: String,
    pub timing: f64,
    pub display: String,
    pub cases: usize,
    #[serde(flatten)]
    pub standing: Standing,
    pub rank: Option<usize>,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub challenge: String,
    pub text: String,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub challenge: String,
    pub text: String,
    #[serde(flatten)]
    pub history: History,
}

#[derive(Serialize)]
pub struct DeleteChallengeResponse {
    pub challenge: String,
    pub submissions_removed: usize,
}

#[derive(Serialize)]
pub struct DeleteUserResponse {
    pub user: String,
    pub submissions_removed: usize,
    pub challenges_removed: Vec<String>,
}

#[derive(Serialize)]
pub struct ExportChallenge {
    pub name: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub exported_at: u64,
    pub challenges: Vec<ExportChallenge>,
    pub best_submissions: Vec<ExportRow>,
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_kernel_type(tag: &str) -> Result<KernelType, ApiError> {
    tag.parse::<KernelType>()
        .map_err(|e| ApiError::Harness(HarnessError::from(e)))
}

pub async fn list_challenges(State(state): State<AppState>) -> Json<Vec<ChallengeSummary>> {
    let store = state.store.lock();
    Json(store.challenges().iter().map(ChallengeSummary::from).collect())
}

pub async fn create_challenge(
    State(state): State<AppState>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeSummary>), ApiError> {
    let exists = state.store.lock().contains(&req.name);
    if exists {
        return Err(StoreError::DuplicateChallenge(req.name.clone()).into());
    }
    let kernel_type = parse_kernel_type(&req.kernel_type)?;
    let input_shapes = literal::parse_shape_list(&req.input_shapes)?;
    let output_shape = literal::parse_shape(&req.output_shape)?;
    let geometry = literal::parse_geometry(&req.global_size, &req.local_size)?;
    let dtype: DType = req.dtype.parse()?;
    let distribution: Distribution = req.distribution.parse()?;

    let request = SuiteRequest {
        name: req.name.clone(),
        input_shapes: input_shapes.clone(),
        output_shape: output_shape.clone(),
        dtype,
        distribution,
        count: req.num_tests,
    };
    let reference = KernelSubmission::new(req.source, kernel_type, req.kernel_name, geometry);
    let generated = state.backend.create_challenge(reference, request).await?;

    let summary = {
        let mut store = state.store.lock();
        let challenge = store.insert_challenge(NewChallenge {
            name: req.name.clone(),
            description: req.description,
            creator: req.creator,
            kernel_type: kernel_type.to_string(),
            input_shapes,
            output_shape,
            dtype,
            tests: generated.suite.len(),
            suite: generated.blob,
            ops: generated.ops,
            baseline: generated.baseline,
        })?;
        ChallengeSummary::from(challenge)
    };
    state.leaderboards.invalidate(&req.name);

    tracing::info!(
        "created challenge '{}' ({} tests, baseline {})",
        summary.name,
        summary.tests,
        summary.baseline_display
    );
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn delete_challenge(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeleteChallengeResponse>, ApiError> {
    let removed = state.store.lock().delete_challenge(&name)?;
    state.leaderboards.invalidate(&name);
    tracing::info!("deleted challenge '{}' and {} submissions", name, removed);
    Ok(Json(DeleteChallengeResponse { challenge: name, submissions_removed: removed }))
}

pub async fn submit(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let blob = state
        .store
        .lock()
        .challenge(&name)
        .map(|c| Arc::clone(&c.suite))
        .ok_or_else(|| StoreError::ChallengeNotFound(name.clone()))?;
    let kernel_type = parse_kernel_type(&req.kernel_type)?;
    let geometry = literal::parse_geometry(&req.global_size, &req.local_size)?;

    let submission = KernelSubmission::new(req.source.clone(), kernel_type, req.kernel_name.clone(), geometry);
    let evaluation = state.backend.evaluate(submission, blob).await?;

    let (record, standing, rank_of_user) = {
        let mut store = state.store.lock();
        let prior = store.submissions_for(&name);
        let standing = classify(&prior, &req.user, evaluation.mean);
        let record = store.record_submission(
            &name,
            &req.user,
            &req.kernel_name,
            kernel_type.as_str(),
            &req.source,
            evaluation.mean,
        )?;
        let board = rank(&store.submissions_for(&name));
        let position = board.iter().find(|e| e.user == req.user).map(|e| e.rank);
        (record, standing, position)
    };
    state.leaderboards.invalidate(&name);

    tracing::info!(
        "submission {} to '{}' by {}: {}",
        record.id,
        name,
        record.user,
        evaluation.display()
    );
    Ok(Json(SubmitResponse {
        id: record.id,
        challenge: name,
        user: record.user,
        timing: evaluation.mean,
        display: evaluation.display(),
        cases: evaluation.cases(),
        standing,
        rank: rank_of_user,
    }))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let exists = state.store.lock().contains(&name);
    if !exists {
        return Err(StoreError::ChallengeNotFound(name).into());
    }
    let board = state.leaderboards.get_or_build(&name, || {
        let submissions = state.store.lock().submissions_for(&name);
        Board::build(&name, &submissions)
    });
    Ok(Json(LeaderboardResponse {
        challenge: name,
        text: board.text.clone(),
        entries: board.entries.clone(),
    }))
}

pub async fn user_submissions(
    State(state): State<AppState>,
    Path((name, user)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let submissions = {
        let store = state.store.lock();
        if !store.contains(&name) {
            return Err(StoreError::ChallengeNotFound(name).into());
        }
        store.submissions_for(&name)
    };
    let history = history(&submissions, &user);
    let text = render_history(&name, &history);
    Ok(Json(HistoryResponse { challenge: name, text, history }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    let removal = state.store.lock().delete_user(&user)?;
    // A user can appear on any board.
    state.leaderboards.clear();
    tracing::info!(
        "deleted user {}: {} submissions, {} challenges",
        user,
        removal.submissions,
        removal.challenges.len()
    );
    Ok(Json(DeleteUserResponse {
        user,
        submissions_removed: removal.submissions,
        challenges_removed: removal.challenges,
    }))
}

pub async fn export(State(state): State<AppState>) -> Json<ExportResponse> {
    let store = state.store.lock();
    let challenges = store
        .challenges()
        .iter()
        .map(|c| ExportChallenge { name: c.name.clone(), description: c.description.clone() })
        .collect();
    Json(ExportResponse {
        exported_at: timestamp(),
        challenges,
        best_submissions: export_best(&store.all_submissions()),
    })
}
