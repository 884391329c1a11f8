use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::ai::{Confidence, QuestionAnswer};
use crate::apply::AnswerSource;
use crate::models::{AnswerQuestionRequest, JobContext, LogApplicationRequest, LogApplicationResponse};
use crate::profile::Profile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to a running `autoapply serve`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `GET /`, to check the service is up before a run.
    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .with_context(|| format!("Service not reachable at {}", self.base_url))?;
        Self::read(response, "/").await
    }

    pub async fn answer_question(
        &self,
        question: &str,
        profile: &Profile,
        job: &JobContext,
    ) -> Result<QuestionAnswer> {
        let request = AnswerQuestionRequest {
            question: question.to_string(),
            user_profile: serde_json::to_value(profile)?,
            job_context: serde_json::to_value(job)?,
        };
        self.post("/answer-question", &request).await
    }

    pub async fn log_application(
        &self,
        request: &LogApplicationRequest,
    ) -> Result<LogApplicationResponse> {
        self.post("/log-application", request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}{}", self.base_url, path))?;
        Self::read(response, path).await
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "{} failed with status {}: {}",
                path,
                status,
                error_text
            ));
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

#[async_trait]
impl AnswerSource for ApiClient {
    async fn answer(&self, question: &str, profile: &Profile, job: &JobContext) -> Result<String> {
        let answer = self.answer_question(question, profile, job).await?;
        if answer.confidence == Confidence::Manual {
            tracing::info!(%question, "answer flagged for manual input");
            return Ok(String::new());
        }
        Ok(answer.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubProvider;
    use crate::db::Database;
    use crate::server::{AppState, build_router};
    use std::sync::Arc;

    async fn spawn_service(replies: &[&str]) -> (ApiClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        Database::open_at(&db_path).unwrap().init().unwrap();
        let state = AppState::new(db_path, Arc::new(StubProvider::new(replies)), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        (ApiClient::new(&format!("http://{}/", addr)).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_answer_source_round_trip() {
        let (client, _dir) = spawn_service(&[
            r#"{"answer": "Five years of Rust.", "confidence": "auto"}"#,
            r#"{"answer": "It depends.", "confidence": "manual"}"#,
        ])
        .await;
        let profile = Profile::default();
        let job = JobContext::default();

        let first = client.answer("How much Rust?", &profile, &job).await.unwrap();
        assert_eq!(first, "Five years of Rust.");

        let second = client.answer("Salary history?", &profile, &job).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_log_application_and_health() {
        let (client, _dir) = spawn_service(&[]).await;

        let health = client.health().await.unwrap();
        assert_eq!(health["status"], "running");

        let request = LogApplicationRequest {
            job_url: "https://jobs.example.com/posting/1".to_string(),
            company: Some("Acme".to_string()),
            title: None,
            status: "applied".to_string(),
            resume_used: None,
            timestamp: None,
            metadata: None,
        };
        let response = client.log_application(&request).await.unwrap();
        assert!(response.success);
        assert!(response.application_id > 0);
    }

    #[tokio::test]
    async fn test_service_errors_surface() {
        let (client, _dir) = spawn_service(&["not json"]).await;
        let err = client
            .answer_question("Why?", &Profile::default(), &JobContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
