use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::errors::AppError;
use super::state::AppState;
use crate::ai::{self, JobAnalysis, QuestionAnswer};
use crate::disqualifiers::{self, Verdict};
use crate::models::{
    AnalyzeJobRequest, AnswerQuestionRequest, Application, ApplicationFilter, ApplicationStats,
    CheckJobRequest, GenerateResumeRequest, LogApplicationRequest, LogApplicationResponse,
};
use crate::profile::Profile;
use crate::resume::{self, GeneratedResume, JobRequirements};

const DEFAULT_LIST_LIMIT: usize = 100;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "autoapply",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /analyze-job
pub async fn analyze_job(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeJobRequest>,
) -> Result<Json<JobAnalysis>, AppError> {
    if req.job_text.trim().is_empty() {
        return Err(AppError::Validation("jobText is required".to_string()));
    }
    let analysis = ai::analyze_job(state.llm.as_ref(), &req.job_url, &req.job_text)
        .await
        .map_err(|e| AppError::Llm(format!("{e:#}")))?;
    Ok(Json(analysis))
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// The request's profile, or the service's default when the request has none.
fn request_profile(state: &AppState, value: Value) -> Result<Profile, AppError> {
    if is_empty_object(&value) {
        match &state.default_profile {
            Some(profile) => Ok(profile.as_ref().clone()),
            None => Err(AppError::Validation("userProfile is required".to_string())),
        }
    } else {
        serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("invalid userProfile: {e}")))
    }
}

/// POST /check-job
pub async fn check_job(
    State(state): State<AppState>,
    Json(req): Json<CheckJobRequest>,
) -> Result<Json<Verdict>, AppError> {
    if req.job_text.trim().is_empty() {
        return Err(AppError::Validation("jobText is required".to_string()));
    }
    let profile = request_profile(&state, req.user_profile)?;
    Ok(Json(disqualifiers::detect(&req.job_text, &profile)))
}

/// POST /generate-resume
pub async fn generate_resume(
    State(state): State<AppState>,
    Json(req): Json<GenerateResumeRequest>,
) -> Result<Json<GeneratedResume>, AppError> {
    let job: JobRequirements = if req.job_requirements.is_null() {
        JobRequirements::default()
    } else {
        serde_json::from_value(req.job_requirements)
            .map_err(|e| AppError::Validation(format!("invalid jobRequirements: {e}")))?
    };

    let profile = request_profile(&state, req.user_profile)?;

    let generated = resume::generate_resume(state.llm.as_ref(), &job, &profile)
        .await
        .map_err(|e| AppError::Llm(format!("{e:#}")))?;
    Ok(Json(generated))
}

/// POST /answer-question
pub async fn answer_question(
    State(state): State<AppState>,
    Json(req): Json<AnswerQuestionRequest>,
) -> Result<Json<QuestionAnswer>, AppError> {
    if req.question.trim().is_empty() {
        return Err(AppError::Validation("question is required".to_string()));
    }
    let answer = ai::answer_question(
        state.llm.as_ref(),
        &req.question,
        &req.user_profile,
        &req.job_context,
    )
    .await
    .map_err(|e| AppError::Llm(format!("{e:#}")))?;
    Ok(Json(answer))
}

/// POST /log-application
pub async fn log_application(
    State(state): State<AppState>,
    Json(req): Json<LogApplicationRequest>,
) -> Result<Json<LogApplicationResponse>, AppError> {
    if req.job_url.trim().is_empty() {
        return Err(AppError::Validation("jobUrl is required".to_string()));
    }
    let application_id = state.with_db(move |db| db.log_application(&req)).await?;
    tracing::info!(application_id, "application logged");
    Ok(Json(LogApplicationResponse {
        success: true,
        application_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub company: Option<String>,
}

/// GET /applications
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Application>>, AppError> {
    let filter = ApplicationFilter {
        limit: query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        status: query.status.filter(|s| !s.is_empty()),
        company: query.company.filter(|c| !c.is_empty()),
    };
    let applications = state
        .with_db(move |db| db.list_applications(&filter))
        .await?;
    Ok(Json(applications))
}

/// GET /applications/stats
pub async fn application_stats(
    State(state): State<AppState>,
) -> Result<Json<ApplicationStats>, AppError> {
    Ok(Json(state.with_db(|db| db.stats()).await?))
}

/// DELETE /applications/:id
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .with_db(move |db| db.delete_application(id))
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Application {id} not found")));
    }
    Ok(Json(json!({
        "success": true,
        "message": format!("Application {id} deleted"),
    })))
}
