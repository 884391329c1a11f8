use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub job_url: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub status: String, // "applied", "unknown", "cancelled", "failed", ...
    pub resume_used: Option<String>,
    pub timestamp: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub limit: usize,
    pub status: Option<String>,
    pub company: Option<String>, // substring match
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    /// Most-applied companies, highest count first.
    pub by_company: Vec<CompanyCount>,
    pub per_day: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: i64,
}

/// What the answer generator knows about the job being applied to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContext {
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
}

// --- Wire types shared by the service and its client ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeJobRequest {
    pub job_url: String,
    pub job_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQuestionRequest {
    pub question: String,
    #[serde(default)]
    pub user_profile: serde_json::Value,
    #[serde(default)]
    pub job_context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckJobRequest {
    pub job_text: String,
    #[serde(default)]
    pub user_profile: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResumeRequest {
    #[serde(default)]
    pub job_requirements: serde_json::Value,
    #[serde(default)]
    pub user_profile: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogApplicationRequest {
    pub job_url: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub resume_used: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_status() -> String {
    "applied".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogApplicationResponse {
    pub success: bool,
    pub application_id: i64,
}
