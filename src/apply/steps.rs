//! Generic apply-flow steps: sign-in, the apply button, resume upload and
//! submission checks.

use std::path::Path;

use super::locator::{Intent, Strategy, locate, wait_locate};
use super::{Session, Variant, icims};
use crate::browser::ElementRef;

const AUTH_INDICATORS: &[&str] = &["sign in", "log in", "create account", "register", "sign up"];

/// Text that means the application went through while still inside the
/// page loop. Bare "thank you" is too common on ordinary pages to count here.
const THANK_YOU: &[&str] = &[
    "thank you for applying",
    "application submitted",
    "application received",
    "successfully submitted",
    "application complete",
];

/// Confirmation text checked after the final submit.
const SUCCESS: &[&str] = &[
    "thank you",
    "application received",
    "successfully submitted",
    "we've received",
    "application complete",
    "success",
];

const SUBMIT_WORDS: &[&str] = &["submit", "apply now", "send application", "complete"];

pub(crate) const FILE_INPUT: &[Strategy] = &[Strategy::Css {
    selector: "input[type=file]",
    visible_only: false,
}];

const FORM_SUBMIT: &[Strategy] = &[Strategy::Css {
    selector: "button[type=submit], input[type=submit]",
    visible_only: false,
}];

/// Whether `body` shows the end-of-application page for this site variant.
pub fn detect_terminal(body: &str, variant: Variant) -> bool {
    let patterns = match variant {
        Variant::Generic => THANK_YOU,
        Variant::Icims => icims::THANK_YOU,
    };
    let body = body.to_lowercase();
    patterns.iter().any(|p| body.contains(p))
}

/// A navigation button that would send the application rather than move to
/// the next page.
pub fn is_submit_label(label: &str) -> bool {
    let label = label.to_lowercase();
    SUBMIT_WORDS.iter().any(|w| label.contains(w))
}

pub(crate) async fn click(s: &Session<'_>, el: &ElementRef, min_ms: u64, max_ms: u64) -> bool {
    match s.page.click(el).await {
        Ok(()) => {
            println!("  Clicked: {}", el.label());
            s.pacing.pause(min_ms, max_ms).await;
            true
        }
        Err(e) => {
            tracing::warn!(element = %el.describe(), "click failed: {e:#}");
            false
        }
    }
}

async fn fill(s: &Session<'_>, el: &ElementRef, text: &str, shown: &str) -> bool {
    match s.page.fill(el, text).await {
        Ok(()) => {
            println!("  Filled {}: {}", el.describe(), shown);
            s.pacing.pause(500, 1000).await;
            true
        }
        Err(e) => {
            tracing::warn!(element = %el.describe(), "fill failed: {e:#}");
            false
        }
    }
}

/// Fills the email and password fields with the profile's credentials.
pub(crate) async fn fill_credentials(s: &Session<'_>) -> bool {
    let email = locate(s.page, Intent::EmailField.strategies()).await;
    let password = locate(s.page, Intent::PasswordField.strategies()).await;
    let (Some(email), Some(password)) = (email, password) else {
        return false;
    };
    fill(s, &email, &s.profile.email, &s.profile.email).await
        && fill(s, &password, &s.profile.password, "********").await
}

/// Signs in (or creates an account) when the page asks for it. Returns true
/// when no sign-in was needed or it went through.
pub async fn authenticate(s: &Session<'_>) -> bool {
    let body = match s.page.body_text().await {
        Ok(b) => b.to_lowercase(),
        Err(e) => {
            tracing::warn!("could not read page text: {e:#}");
            return false;
        }
    };
    if !AUTH_INDICATORS.iter().any(|i| body.contains(i)) {
        tracing::info!("no authentication required");
        return true;
    }
    if s.profile.password.is_empty() {
        tracing::warn!("page asks for sign-in but the profile has no password");
        return false;
    }

    if let Some(link) = locate(s.page, Intent::SignInLink.strategies()).await {
        click(s, &link, 2000, 3000).await;
    }

    if fill_credentials(s).await {
        if let Some(submit) = locate(s.page, Intent::AuthSubmit.strategies()).await {
            if click(s, &submit, 3000, 5000).await {
                println!("  Signed in");
                return true;
            }
        }
    }

    tracing::info!("sign-in not possible, trying account creation");
    if let Some(create) = locate(s.page, Intent::CreateAccountLink.strategies()).await {
        if click(s, &create, 2000, 3000).await && fill_credentials(s).await {
            if let Some(submit) = locate(s.page, FORM_SUBMIT).await {
                if click(s, &submit, 3000, 5000).await {
                    println!("  Account created");
                    return true;
                }
            }
        }
    }

    tracing::warn!("could not complete authentication");
    false
}

/// Finds and clicks the apply button.
pub async fn click_apply(s: &Session<'_>) -> bool {
    match wait_locate(s.page, Intent::Apply.strategies(), s.timeouts.element).await {
        Some(button) => click(s, &button, 2000, 4000).await,
        None => {
            tracing::warn!("apply button not found");
            false
        }
    }
}

pub(crate) async fn upload_to_file_input(s: &Session<'_>, path: &Path, via: &str) -> bool {
    let Some(input) = locate(s.page, FILE_INPUT).await else {
        return false;
    };
    upload_to(s, &input, path, via).await
}

async fn upload_to(s: &Session<'_>, input: &ElementRef, path: &Path, via: &str) -> bool {
    match s.page.upload(input, path).await {
        Ok(()) => {
            println!("  Resume uploaded via {}", via);
            s.pacing.pause(1000, 2000).await;
            true
        }
        Err(e) => {
            tracing::warn!(via, "upload failed: {e:#}");
            false
        }
    }
}

/// Uploads the resume through whichever control the page offers: an autofill
/// button, a drop zone, a file input, or an upload button. A missing file
/// returns false.
pub async fn upload_resume(s: &Session<'_>, path: &Path) -> bool {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "resume file not found");
        return false;
    }

    if let Some(autofill) = locate(s.page, Intent::ResumeAutofill.strategies()).await {
        if click(s, &autofill, 1000, 2000).await && upload_to_file_input(s, path, "autofill").await {
            return true;
        }
    }

    if let Some(zone) = locate(s.page, Intent::DropZone.strategies()).await {
        if click(s, &zone, 500, 1000).await && upload_to_file_input(s, path, "drop zone").await {
            return true;
        }
    }

    if let Some(input) = locate(s.page, Intent::ResumeFileInput.strategies()).await {
        if upload_to(s, &input, path, "file input").await {
            return true;
        }
    }

    if let Some(button) = locate(s.page, Intent::UploadButton.strategies()).await {
        if click(s, &button, 500, 1000).await && upload_to_file_input(s, path, "upload button").await {
            return true;
        }
    }

    tracing::info!("resume upload field not found (may not be required)");
    false
}

/// Looks for confirmation text or a success element after submitting.
pub async fn verify_submission(s: &Session<'_>) -> bool {
    s.pacing.pause(2000, 4000).await;

    match s.page.body_text().await {
        Ok(body) => {
            let body = body.to_lowercase();
            if let Some(found) = SUCCESS.iter().find(|p| body.contains(*p)) {
                println!("  Confirmation found: '{}'", found);
                return true;
            }
        }
        Err(e) => tracing::warn!("could not read page text: {e:#}"),
    }

    if let Some(el) = locate(s.page, Intent::SuccessElement.strategies()).await {
        println!("  Success element found: {}", el.describe());
        return true;
    }

    tracing::warn!("could not verify submission");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::HtmlPage;
    use crate::browser::{Pacing, Timeouts};
    use crate::profile::{ApplicantContext, Profile};
    use std::io::Write;

    fn profile() -> Profile {
        Profile {
            email: "pat@example.com".to_string(),
            password: "hunter22".to_string(),
            ..Default::default()
        }
    }

    fn session<'a>(page: &'a HtmlPage, profile: &'a Profile) -> Session<'a> {
        Session {
            page,
            profile,
            applicant: ApplicantContext::for_job(profile, ""),
            timeouts: Timeouts::immediate(),
            pacing: Pacing::off(),
        }
    }

    fn resume_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();
        file
    }

    #[test]
    fn test_detect_terminal_is_case_insensitive() {
        assert!(detect_terminal("APPLICATION RECEIVED - we'll be in touch", Variant::Generic));
        assert!(detect_terminal("Thank You for your interest", Variant::Icims));
        assert!(!detect_terminal("Thank you for visiting our site", Variant::Generic));
        assert!(!detect_terminal("Step 2 of 4", Variant::Icims));
    }

    #[test]
    fn test_is_submit_label() {
        assert!(is_submit_label("Submit Application"));
        assert!(is_submit_label("APPLY NOW"));
        assert!(is_submit_label("Complete"));
        assert!(!is_submit_label("Next"));
        assert!(!is_submit_label("Save & Continue"));
    }

    #[tokio::test]
    async fn test_upload_with_missing_file_returns_false() {
        let page = HtmlPage::single(r#"<input type="file" name="resume">"#);
        let profile = profile();
        let s = session(&page, &profile);
        assert!(!upload_resume(&s, Path::new("/definitely/not/here.pdf")).await);
        assert!(page.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_upload_prefers_resume_named_input() {
        let page = HtmlPage::single(
            r#"<form>
                <input type="file" name="cover_letter">
                <input type="file" name="resume_file">
            </form>"#,
        );
        let profile = profile();
        let s = session(&page, &profile);
        let resume = resume_file();

        assert!(upload_resume(&s, resume.path()).await);
        assert_eq!(page.uploads(), vec![resume.path().to_path_buf()]);
        assert!(page.events().iter().any(|e| e == "upload:<input> resume_file"));
    }

    #[tokio::test]
    async fn test_upload_without_any_control_returns_false() {
        let page = HtmlPage::single("<p>Tell us about yourself</p>");
        let profile = profile();
        let s = session(&page, &profile);
        let resume = resume_file();
        assert!(!upload_resume(&s, resume.path()).await);
    }

    #[tokio::test]
    async fn test_authenticate_skips_pages_without_sign_in() {
        let page = HtmlPage::single("<h1>Senior Engineer</h1><a>Apply</a>");
        let profile = profile();
        let s = session(&page, &profile);
        assert!(authenticate(&s).await);
        assert!(page.events().is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_signs_in() {
        let page = HtmlPage::new(&[
            (
                "https://jobs.example.com/posting/1",
                r#"<a data-goto="https://jobs.example.com/login">Sign In</a>"#,
            ),
            (
                "https://jobs.example.com/login",
                r#"<form>
                    <input type="email" name="user_email">
                    <input type="password" name="pw">
                    <button type="submit">Log In</button>
                </form>"#,
            ),
        ]);
        let profile = profile();
        let s = session(&page, &profile);

        assert!(authenticate(&s).await);
        assert_eq!(page.value_of("input[name=user_email]").as_deref(), Some("pat@example.com"));
        assert_eq!(page.value_of("input[name=pw]").as_deref(), Some("hunter22"));
        assert_eq!(page.events().last().map(String::as_str), Some("click:Log In"));
    }

    #[tokio::test]
    async fn test_verify_submission_by_text_or_element() {
        let profile = profile();

        let page = HtmlPage::single("<h2>We've received your application</h2>");
        assert!(verify_submission(&session(&page, &profile)).await);

        let page = HtmlPage::single(r#"<div class="alert-success-banner"></div>"#);
        assert!(verify_submission(&session(&page, &profile)).await);

        let page = HtmlPage::single("<form><button>Submit</button></form>");
        assert!(!verify_submission(&session(&page, &profile)).await);
    }
}
