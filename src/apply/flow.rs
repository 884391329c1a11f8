use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::locator::{Intent, wait_locate};
use super::operator::{Decision, Operator, OperatorAction};
use super::screening::{AnswerSource, answer_screening_questions};
use super::{Session, Variant, filler, icims, steps};
use crate::browser::{BannerKind, Pacing, Page, Timeouts};
use crate::models::{JobContext, LogApplicationRequest};
use crate::profile::{ApplicantContext, Profile};

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Upper bound on form pages walked before the review pause.
    pub max_pages: usize,
    pub timeouts: Timeouts,
    pub pacing: Pacing,
    pub screenshot_dir: PathBuf,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            timeouts: Timeouts::default(),
            pacing: Pacing::human(),
            screenshot_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Submitted,
    StatusUnknown,
    Cancelled,
    Failed,
}

impl ApplyStatus {
    /// Status recorded in the application log.
    pub fn log_status(self) -> &'static str {
        match self {
            ApplyStatus::Submitted => "applied",
            ApplyStatus::StatusUnknown => "unknown",
            ApplyStatus::Cancelled => "cancelled",
            ApplyStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub status: ApplyStatus,
    pub url: String,
    pub title: String,
    pub company: String,
    pub timestamp: String,
    pub screenshot: Option<PathBuf>,
    pub elapsed_secs: f64,
    pub pages_processed: usize,
    pub fields_filled: usize,
    pub questions_answered: usize,
    pub manual_intervention: bool,
    pub resume_uploaded: bool,
    pub error: Option<String>,
}

impl ApplyOutcome {
    pub fn to_log_request(&self, resume: &Path) -> LogApplicationRequest {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        LogApplicationRequest {
            job_url: self.url.clone(),
            company: non_empty(&self.company),
            title: non_empty(&self.title),
            status: self.status.log_status().to_string(),
            resume_used: Some(resume.display().to_string()),
            timestamp: Some(self.timestamp.clone()),
            metadata: Some(json!({
                "pagesProcessed": self.pages_processed,
                "fieldsFilled": self.fields_filled,
                "questionsAnswered": self.questions_answered,
                "elapsedSecs": self.elapsed_secs,
                "manualIntervention": self.manual_intervention,
                "resumeUploaded": self.resume_uploaded,
                "screenshot": self.screenshot,
                "error": self.error,
            })),
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    pages: usize,
    fields: usize,
    answered: usize,
    manual: bool,
    resume_uploaded: bool,
    screenshot: Option<PathBuf>,
}

#[derive(Debug)]
enum Stage {
    Navigate,
    Authenticate,
    ClickApply,
    Login,
    UploadResume,
    FormPages,
    Review,
    Submit,
    Verify,
    Done(ApplyStatus),
}

/// One application run against one browser tab.
pub struct ApplyFlow<'a> {
    page: &'a dyn Page,
    profile: &'a Profile,
    answers: &'a dyn AnswerSource,
    operator: &'a dyn Operator,
    config: FlowConfig,
}

impl<'a> ApplyFlow<'a> {
    pub fn new(
        page: &'a dyn Page,
        profile: &'a Profile,
        answers: &'a dyn AnswerSource,
        operator: &'a dyn Operator,
        config: FlowConfig,
    ) -> Self {
        Self {
            page,
            profile,
            answers,
            operator,
            config,
        }
    }

    /// Applies to `job` with the resume at `resume`. The page is closed
    /// exactly once before this returns, whatever the outcome.
    pub async fn run(&self, job: &JobContext, resume: &Path) -> ApplyOutcome {
        let started = Instant::now();
        let session = Session {
            page: self.page,
            profile: self.profile,
            applicant: ApplicantContext::for_job(self.profile, &job.location),
            timeouts: self.config.timeouts,
            pacing: self.config.pacing,
        };
        let mut progress = Progress::default();

        let (status, error) = match self.drive(&session, job, resume, &mut progress).await {
            Ok(status) => (status, None),
            Err(e) => {
                tracing::error!("application failed: {e:#}");
                self.banner(&format!("Error: {e}"), BannerKind::Error).await;
                progress.screenshot = self.screenshot("error").await;
                (ApplyStatus::Failed, Some(format!("{e:#}")))
            }
        };

        if let Err(e) = self.page.close().await {
            tracing::warn!("could not close browser: {e:#}");
        }

        ApplyOutcome {
            status,
            url: job.url.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            timestamp: Local::now().to_rfc3339(),
            screenshot: progress.screenshot,
            elapsed_secs: started.elapsed().as_secs_f64(),
            pages_processed: progress.pages,
            fields_filled: progress.fields,
            questions_answered: progress.answered,
            manual_intervention: progress.manual,
            resume_uploaded: progress.resume_uploaded,
            error,
        }
    }

    async fn drive(
        &self,
        s: &Session<'_>,
        job: &JobContext,
        resume: &Path,
        progress: &mut Progress,
    ) -> Result<ApplyStatus> {
        let mut variant = Variant::Generic;
        let mut stage = Stage::Navigate;

        loop {
            tracing::debug!(?stage, "entering stage");
            stage = match stage {
                Stage::Navigate => {
                    println!("\nNavigating to {}", job.url);
                    self.banner("Application starting...", BannerKind::Info).await;
                    s.page
                        .goto(&job.url)
                        .await
                        .with_context(|| format!("navigation to {} failed", job.url))?;
                    s.pacing.pause(2000, 3000).await;

                    variant = self.detect_variant(&job.url).await;
                    match variant {
                        Variant::Icims => {
                            println!("  Detected iCIMS application system");
                            self.banner("iCIMS detected - applying...", BannerKind::Info)
                                .await;
                            Stage::ClickApply
                        }
                        Variant::Generic => Stage::Authenticate,
                    }
                }

                Stage::Authenticate => {
                    if !steps::authenticate(s).await {
                        tracing::warn!("continuing without authentication");
                    }
                    Stage::ClickApply
                }

                Stage::ClickApply => {
                    self.banner("Clicking Apply button...", BannerKind::Info).await;
                    let clicked = match variant {
                        Variant::Icims => {
                            icims::click_apply(s).await || steps::click_apply(s).await
                        }
                        Variant::Generic => steps::click_apply(s).await,
                    };
                    if clicked {
                        Stage::Login
                    } else {
                        match self
                            .ask(progress, OperatorAction::OpenApplicationForm, "Apply button not found")
                            .await
                        {
                            Decision::Continue => Stage::Login,
                            Decision::Cancel => Stage::Done(ApplyStatus::Cancelled),
                        }
                    }
                }

                Stage::Login => {
                    let mut cancelled = false;
                    if variant == Variant::Icims {
                        self.banner("Logging in...", BannerKind::Info).await;
                        if !icims::login(s).await {
                            cancelled = self
                                .ask(progress, OperatorAction::LogIn, "Please log in manually")
                                .await
                                == Decision::Cancel;
                        }
                        if !cancelled {
                            icims::dismiss_faster_login(s).await;
                        }
                    }
                    if cancelled {
                        Stage::Done(ApplyStatus::Cancelled)
                    } else {
                        self.banner("Loading application form...", BannerKind::Info).await;
                        self.wait_for_load(s).await;
                        Stage::UploadResume
                    }
                }

                Stage::UploadResume => {
                    self.banner("Uploading resume...", BannerKind::Info).await;
                    progress.resume_uploaded = match variant {
                        Variant::Icims => icims::upload_resume(s, resume).await,
                        Variant::Generic => steps::upload_resume(s, resume).await,
                    };
                    if progress.resume_uploaded || variant == Variant::Generic {
                        Stage::FormPages
                    } else {
                        match self
                            .ask(progress, OperatorAction::UploadResume, "Please upload resume manually")
                            .await
                        {
                            Decision::Continue => {
                                progress.resume_uploaded = true;
                                Stage::FormPages
                            }
                            Decision::Cancel => Stage::Done(ApplyStatus::Cancelled),
                        }
                    }
                }

                Stage::FormPages => {
                    if self.form_pages(s, variant, job, resume, progress).await {
                        Stage::Done(ApplyStatus::Submitted)
                    } else {
                        Stage::Review
                    }
                }

                Stage::Review => {
                    let summary = summary(progress);
                    println!("\n{}\nAPPLICATION REVIEW\n{}", "=".repeat(70), "=".repeat(70));
                    self.banner(
                        "Review application - press ENTER in terminal to submit",
                        BannerKind::Warning,
                    )
                    .await;
                    match self
                        .operator
                        .request(&OperatorAction::ReviewAndSubmit { summary })
                        .await
                    {
                        Decision::Continue => Stage::Submit,
                        Decision::Cancel => {
                            println!("Application cancelled by user");
                            self.banner("Application cancelled by user", BannerKind::Error)
                                .await;
                            Stage::Done(ApplyStatus::Cancelled)
                        }
                    }
                }

                Stage::Submit => {
                    self.banner("Submitting application...", BannerKind::Info).await;
                    let clicked = match wait_locate(
                        s.page,
                        Intent::FinalSubmit.strategies(),
                        s.timeouts.element,
                    )
                    .await
                    {
                        Some(button) => steps::click(s, &button, 1000, 2000).await,
                        None => false,
                    };
                    if clicked {
                        Stage::Verify
                    } else {
                        match self
                            .ask(
                                progress,
                                OperatorAction::SubmitManually,
                                "Please submit the application manually",
                            )
                            .await
                        {
                            Decision::Continue => Stage::Verify,
                            Decision::Cancel => Stage::Done(ApplyStatus::Cancelled),
                        }
                    }
                }

                Stage::Verify => {
                    if steps::verify_submission(s).await {
                        self.banner("Application submitted successfully!", BannerKind::Success)
                            .await;
                        Stage::Done(ApplyStatus::Submitted)
                    } else {
                        self.alert("Application status unknown - please verify").await;
                        Stage::Done(ApplyStatus::StatusUnknown)
                    }
                }

                Stage::Done(status) => {
                    if matches!(status, ApplyStatus::Submitted | ApplyStatus::StatusUnknown) {
                        let label = if status == ApplyStatus::Submitted {
                            "success"
                        } else {
                            "unknown"
                        };
                        progress.screenshot = self.screenshot(label).await;
                        // Leave the result on screen for a moment.
                        s.pacing.pause(5000, 5000).await;
                    }
                    return Ok(status);
                }
            };
        }
    }

    /// Walks the form wizard. Returns true when a confirmation page shows up
    /// inside the loop.
    async fn form_pages(
        &self,
        s: &Session<'_>,
        variant: Variant,
        job: &JobContext,
        resume: &Path,
        progress: &mut Progress,
    ) -> bool {
        for page_num in 0..self.config.max_pages {
            progress.pages = page_num + 1;
            println!("\n{}", "=".repeat(70));
            println!("Processing form page {}", page_num + 1);
            println!("{}", "=".repeat(70));
            self.banner(
                &format!("Filling form (page {})...", page_num + 1),
                BannerKind::Info,
            )
            .await;

            progress.fields += filler::fill_standard_fields(s).await;
            if variant == Variant::Icims {
                progress.fields += icims::fill_questions(s).await;
            }
            progress.answered += answer_screening_questions(s, self.answers, job).await;

            // Some sites only ask for the resume on a later page.
            if page_num > 0 && !progress.resume_uploaded {
                progress.resume_uploaded = match variant {
                    Variant::Icims => icims::upload_resume(s, resume).await,
                    Variant::Generic => steps::upload_resume(s, resume).await,
                };
            }
            s.pacing.pause(1000, 2000).await;

            let body = s.page.body_text().await.unwrap_or_else(|e| {
                tracing::warn!("could not read page text: {e:#}");
                String::new()
            });
            if steps::detect_terminal(&body, variant) {
                println!("  Reached the confirmation page");
                self.banner("Application submitted successfully!", BannerKind::Success)
                    .await;
                return true;
            }

            let next = match variant {
                Variant::Icims => Intent::IcimsNext,
                Variant::Generic => Intent::NextOrSubmit,
            };
            let Some(button) = wait_locate(s.page, next.strategies(), s.timeouts.element).await
            else {
                progress.manual = true;
                self.alert("No Next/Submit button found - please click Continue/Submit manually")
                    .await;
                return false;
            };

            if steps::is_submit_label(button.label()) {
                println!("  Found final submit button: {}", button.label());
                return false;
            }
            if !steps::click(s, &button, 2000, 3000).await {
                progress.manual = true;
                self.alert("Could not advance the form - please continue manually")
                    .await;
                return false;
            }
            self.wait_for_load(s).await;
            s.pacing.pause(1000, 2000).await;
        }

        tracing::warn!(max_pages = self.config.max_pages, "page limit reached");
        false
    }

    async fn detect_variant(&self, requested_url: &str) -> Variant {
        let url = self
            .page
            .current_url()
            .await
            .unwrap_or_else(|_| requested_url.to_string());
        let source = self.page.source().await.unwrap_or_default();
        Variant::detect(&url, &source)
    }

    async fn wait_for_load(&self, s: &Session<'_>) {
        if let Err(e) = self.page.wait_for_load(s.timeouts.page_load).await {
            tracing::warn!("page load wait failed: {e:#}");
        }
    }

    async fn banner(&self, message: &str, kind: BannerKind) {
        if let Err(e) = self.page.show_banner(message, kind).await {
            tracing::debug!("banner not shown: {e:#}");
        }
    }

    /// Tells the operator without blocking: log line, page banner, bell.
    async fn alert(&self, message: &str) {
        tracing::warn!("{message}");
        self.banner(message, BannerKind::Warning).await;
        self.operator.alert(message);
    }

    /// Alerts, then blocks on the operator.
    async fn ask(&self, progress: &mut Progress, action: OperatorAction, message: &str) -> Decision {
        progress.manual = true;
        self.alert(message).await;
        self.operator.request(&action).await
    }

    async fn screenshot(&self, label: &str) -> Option<PathBuf> {
        let path = self.config.screenshot_dir.join(format!(
            "application_{}_{}.png",
            label,
            Local::now().timestamp()
        ));
        match self.page.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!("screenshot failed: {e:#}");
                None
            }
        }
    }
}

fn summary(progress: &Progress) -> String {
    format!(
        "  Total pages processed: {}\n  Standard fields filled: {}\n  Screening questions answered: {}\n  Resume uploaded: {}",
        progress.pages,
        progress.fields,
        progress.answered,
        if progress.resume_uploaded { "Yes" } else { "No" }
    )
}
