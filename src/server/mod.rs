//! The companion HTTP service: LLM-backed job analysis, resume generation
//! and question answering, plus the application log.

pub mod errors;
pub mod handlers;
pub mod state;

use anyhow::Result;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/analyze-job", post(handlers::analyze_job))
        .route("/check-job", post(handlers::check_job))
        .route("/generate-resume", post(handlers::generate_resume))
        .route("/answer-question", post(handlers::answer_question))
        .route("/log-application", post(handlers::log_application))
        .route("/applications", get(handlers::list_applications))
        .route("/applications/stats", get(handlers::application_stats))
        .route("/applications/:id", delete(handlers::delete_application))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    tracing::info!(
        "Starting autoapply service v{} (model: {})",
        env!("CARGO_PKG_VERSION"),
        state.llm.model_name()
    );

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubProvider;
    use crate::db::Database;
    use crate::profile::Profile;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        _dir: tempfile::TempDir,
    }

    fn app_with(replies: &[&str], default_profile: Option<Profile>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("applications.db");
        Database::open_at(&db_path).unwrap().init().unwrap();
        let state = AppState::new(db_path, Arc::new(StubProvider::new(replies)), default_profile);
        TestApp {
            router: build_router(state),
            _dir: dir,
        }
    }

    fn app() -> TestApp {
        app_with(&[], None)
    }

    impl TestApp {
        async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn log(&self, url: &str, company: &str, status: &str) -> i64 {
            let (code, body) = self
                .call(
                    "POST",
                    "/log-application",
                    Some(json!({"jobUrl": url, "company": company, "status": status})),
                )
                .await;
            assert_eq!(code, StatusCode::OK);
            assert_eq!(body["success"], true);
            body["applicationId"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let (status, body) = app().call("GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["service"], "autoapply");
    }

    #[tokio::test]
    async fn test_logged_application_is_listed_first() {
        let app = app();
        app.log("https://jobs.example.com/1", "Acme", "applied").await;
        let id = app.log("https://jobs.example.com/2", "Globex", "unknown").await;

        let (status, body) = app.call("GET", "/applications?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], id);
        assert_eq!(list[0]["job_url"], "https://jobs.example.com/2");
        assert_eq!(list[0]["status"], "unknown");
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_company() {
        let app = app();
        app.log("https://jobs.example.com/1", "Acme Robotics", "applied").await;
        app.log("https://jobs.example.com/2", "Globex", "applied").await;
        app.log("https://jobs.example.com/3", "ACME Foods", "failed").await;

        let (_, body) = app.call("GET", "/applications?company=acme", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = app
            .call("GET", "/applications?company=acme&status=applied", None)
            .await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["company"], "Acme Robotics");
    }

    #[tokio::test]
    async fn test_stats_track_inserts_and_deletes() {
        let app = app();
        let first = app.log("https://jobs.example.com/1", "Acme", "applied").await;
        app.log("https://jobs.example.com/2", "Acme", "applied").await;
        app.log("https://jobs.example.com/3", "Globex", "failed").await;

        let (status, body) = app
            .call("DELETE", &format!("/applications/{first}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, stats) = app.call("GET", "/applications/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total"], 2);
        let by_status: i64 = stats["byStatus"]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_i64().unwrap())
            .sum();
        assert_eq!(by_status, 2);
        let companies = stats["byCompany"].as_array().unwrap();
        assert_eq!(companies.len(), 2);
        assert!(companies.contains(&json!({"company": "Acme", "count": 1})));
        assert!(companies.contains(&json!({"company": "Globex", "count": 1})));
    }

    #[tokio::test]
    async fn test_delete_missing_application_is_404() {
        let (status, body) = app().call("DELETE", "/applications/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Application 999 not found");
    }

    #[tokio::test]
    async fn test_log_requires_job_url() {
        let (status, body) = app()
            .call("POST", "/log-application", Some(json!({"jobUrl": "  "})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("jobUrl"));
    }

    #[tokio::test]
    async fn test_analyze_job_parses_fenced_reply() {
        let app = app_with(
            &["```json\n{\"title\": \"Backend Engineer\", \"skills\": [\"Rust\", \"SQL\"], \"location\": \"Austin, TX\"}\n```"],
            None,
        );
        let (status, body) = app
            .call(
                "POST",
                "/analyze-job",
                Some(json!({"jobUrl": "https://jobs.example.com/1", "jobText": "We need Rust."})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Backend Engineer");
        assert_eq!(body["skills"], json!(["Rust", "SQL"]));
        assert_eq!(body["disqualifiers"], json!([]));
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_500_with_excerpt() {
        let app = app_with(&["Sorry, I can't help with that."], None);
        let (status, body) = app
            .call(
                "POST",
                "/analyze-job",
                Some(json!({"jobUrl": "https://jobs.example.com/1", "jobText": "Anything"})),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("Sorry, I can't help"));
    }

    #[tokio::test]
    async fn test_answer_question_returns_confidence() {
        let app = app_with(&[r#"{"answer": "Yes, I am.", "confidence": "AUTO"}"#], None);
        let (status, body) = app
            .call(
                "POST",
                "/answer-question",
                Some(json!({
                    "question": "Are you authorized to work in the US?",
                    "userProfile": {"name": "Pat Doe"},
                    "jobContext": {"title": "Backend Engineer"}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Yes, I am.");
        assert_eq!(body["confidence"], "auto");
    }

    #[tokio::test]
    async fn test_generate_resume_falls_back_to_default_profile() {
        let profile = Profile {
            name: "Pat Doe".to_string(),
            skills: "Rust, SQL".to_string(),
            ..Default::default()
        };
        let app = app_with(&["PAT DOE\nBackend engineer"], Some(profile));
        let (status, body) = app
            .call(
                "POST",
                "/generate-resume",
                Some(json!({"jobRequirements": {"skills": ["Rust"]}, "userProfile": {}})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resumeText"], "PAT DOE\nBackend engineer");
        assert_eq!(body["matchScore"], 100);
        assert_eq!(body["highlightedSkills"], json!(["Rust"]));
    }

    #[tokio::test]
    async fn test_generate_resume_without_any_profile_is_400() {
        let (status, _) = app()
            .call(
                "POST",
                "/generate-resume",
                Some(json!({"jobRequirements": {"skills": ["Rust"]}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_job_flags_citizenship_requirement() {
        let (status, body) = app()
            .call(
                "POST",
                "/check-job",
                Some(json!({
                    "jobText": "Must be a U.S. citizen. Requirements: Rust",
                    "userProfile": {"citizenship": "H-1B", "skills": "Rust"},
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "red");
        assert_eq!(body["disqualifiers"], json!(["Requires US Citizenship"]));
        assert_eq!(body["matches"], json!(["Rust required - you have it"]));
        assert_eq!(body["score"], 65);
    }

    #[tokio::test]
    async fn test_check_job_uses_default_profile() {
        let profile = Profile {
            citizenship: "US Citizen".to_string(),
            ..Profile::default()
        };
        let (status, body) = app_with(&[], Some(profile))
            .call("POST", "/check-job", Some(json!({"jobText": "Must be a U.S. citizen."})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "green");
        assert_eq!(body["matches"], json!(["US Citizenship required - you qualify"]));
    }

    #[tokio::test]
    async fn test_check_job_requires_text() {
        let (status, _) = app()
            .call("POST", "/check-job", Some(json!({"jobText": "  ", "userProfile": {"name": "Pat"}})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
