//! iCIMS applicant portals: the two-step login, "My Computer" resume upload
//! and the site's own question pages.

use std::path::Path;

use super::filler::select_accepted;
use super::locator::{Intent, Strategy, locate, wait_locate};
use super::screening::label_map;
use super::steps::{click, upload_to_file_input};
use super::Session;

pub const THANK_YOU: &[&str] = &[
    "thank you",
    "application submitted",
    "application received",
    "successfully submitted",
    "application complete",
];

const fn select_by(attrs: &'static [&'static str], patterns: &'static [&'static str]) -> [Strategy; 1] {
    [Strategy::AttrContains {
        scope: "select",
        attrs,
        patterns,
        exclude: &[],
        visible_only: false,
    }]
}

const EDUCATION: &[Strategy] = &select_by(&["name", "id"], &["education"]);
const AUTHORIZED: &[Strategy] = &select_by(&["name", "id"], &["authorized"]);
const SPONSOR: &[Strategy] = &[
    Strategy::AttrContains {
        scope: "select",
        attrs: &["name", "id"],
        patterns: &["sponsor"],
        exclude: &[],
        visible_only: false,
    },
    Strategy::AttrContains {
        scope: "select",
        attrs: &["name"],
        patterns: &["visa"],
        exclude: &[],
        visible_only: false,
    },
];
const AGE: &[Strategy] = &[
    Strategy::AttrContains {
        scope: "select",
        attrs: &["name"],
        patterns: &["age"],
        exclude: &[],
        visible_only: false,
    },
    Strategy::AttrContains {
        scope: "select",
        attrs: &["id"],
        patterns: &["18"],
        exclude: &[],
        visible_only: false,
    },
];
const NON_COMPETE: &[Strategy] = &select_by(&["name", "id"], &["compete"]);

const DROPDOWNS: &[(&str, &[Strategy], &[&str])] = &[
    ("education", EDUCATION, &["bachelor"]),
    ("work authorization", AUTHORIZED, &["yes"]),
    ("sponsorship", SPONSOR, &["no"]),
    ("age verification", AGE, &["yes"]),
    ("non-compete", NON_COMPETE, &["no"]),
];

/// Labels of text questions that get "N/A" (relatives or board members at
/// the company).
const NOT_APPLICABLE_LABELS: &[&str] = &["relative", "board member"];

pub async fn click_apply(s: &Session<'_>) -> bool {
    match wait_locate(s.page, Intent::IcimsApply.strategies(), s.timeouts.element).await {
        Some(button) => click(s, &button, 2000, 3000).await,
        None => false,
    }
}

/// Email, Next, then password and Log In in the popup that follows.
pub async fn login(s: &Session<'_>) -> bool {
    if s.profile.email.is_empty() || s.profile.password.is_empty() {
        tracing::warn!("no iCIMS credentials in profile");
        return false;
    }

    let Some(email) = wait_locate(s.page, Intent::EmailField.strategies(), s.timeouts.element).await
    else {
        tracing::warn!("iCIMS email field not found");
        return false;
    };
    if let Err(e) = s.page.fill(&email, &s.profile.email).await {
        tracing::warn!("could not enter email: {e:#}");
        return false;
    }
    println!("  Email entered: {}", s.profile.email);
    s.pacing.pause(500, 1000).await;

    if let Some(next) = locate(s.page, Intent::IcimsEmailNext.strategies()).await {
        click(s, &next, 2000, 3000).await;
    }
    s.pacing.pause(1000, 2000).await;

    let Some(password) =
        wait_locate(s.page, Intent::PasswordField.strategies(), s.timeouts.element).await
    else {
        tracing::warn!("iCIMS password field not found");
        return false;
    };
    if let Err(e) = s.page.fill(&password, &s.profile.password).await {
        tracing::warn!("could not enter password: {e:#}");
        return false;
    }
    println!("  Password entered: ********");
    s.pacing.pause(500, 1000).await;

    let Some(login) = locate(s.page, Intent::IcimsLogin.strategies()).await else {
        tracing::warn!("iCIMS Log In button not found");
        return false;
    };
    if !click(s, &login, 3000, 5000).await {
        return false;
    }
    tracing::info!("iCIMS login completed");
    true
}

/// Skips the "Log In Faster on This Device" prompt if it shows up.
pub async fn dismiss_faster_login(s: &Session<'_>) {
    match locate(s.page, Intent::IcimsNotOnThisDevice.strategies()).await {
        Some(button) => {
            click(s, &button, 2000, 3000).await;
        }
        None => tracing::debug!("no 'Log In Faster' prompt"),
    }
}

pub async fn upload_resume(s: &Session<'_>, path: &Path) -> bool {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "resume file not found");
        return false;
    }

    if let Some(button) = locate(s.page, Intent::IcimsMyComputer.strategies()).await {
        if click(s, &button, 1000, 2000).await && upload_to_file_input(s, path, "'My Computer'").await
        {
            return true;
        }
    }

    if upload_to_file_input(s, path, "direct file input").await {
        return true;
    }
    tracing::warn!("could not upload resume to iCIMS");
    false
}

/// Answers the stock iCIMS questions: education, authorization,
/// sponsorship, age, non-compete and the relative/board-member text fields.
pub async fn fill_questions(s: &Session<'_>) -> usize {
    let mut filled = 0;

    let asks_requirement = match s.page.body_text().await {
        Ok(body) => body.to_lowercase().contains("require"),
        Err(_) => false,
    };

    for (field, strategies, accepted) in DROPDOWNS {
        // Only answer "no" when the page actually asks about requiring it.
        if *field == "sponsorship" && !asks_requirement {
            continue;
        }
        if select_accepted(s, field, strategies, accepted).await {
            filled += 1;
        }
    }

    match s.page.query("input[type=text]").await {
        Ok(inputs) => {
            let labels = label_map(s).await;
            for input in inputs {
                if !input.current_value().is_empty() {
                    continue;
                }
                let label = input
                    .attr("id")
                    .and_then(|id| labels.get(id))
                    .map(|l| l.to_lowercase())
                    .unwrap_or_default();
                if !NOT_APPLICABLE_LABELS.iter().any(|l| label.contains(l)) {
                    continue;
                }
                match s.page.fill(&input, "N/A").await {
                    Ok(()) => {
                        println!("  Filled {} with N/A", input.describe());
                        filled += 1;
                        s.pacing.pause(500, 1000).await;
                    }
                    Err(e) => tracing::warn!("fill failed: {e:#}"),
                }
            }
        }
        Err(e) => tracing::warn!("could not list text inputs: {e:#}"),
    }

    if filled > 0 {
        tracing::info!(filled, "iCIMS-specific fields filled");
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fixture::HtmlPage;
    use crate::browser::{Pacing, Timeouts};
    use crate::profile::{ApplicantContext, Profile};
    use std::io::Write;

    fn session<'a>(page: &'a HtmlPage, profile: &'a Profile) -> Session<'a> {
        Session {
            page,
            profile,
            applicant: ApplicantContext::for_job(profile, ""),
            timeouts: Timeouts::immediate(),
            pacing: Pacing::off(),
        }
    }

    const QUESTIONS: &str = r#"<form>
        <p>Do you now or in the future require sponsorship?</p>
        <select name="education_level">
            <option value="">Select</option>
            <option value="hs">High School</option>
            <option value="ba">Bachelor's Degree</option>
        </select>
        <select id="authorizedToWork"><option value="">--</option><option value="1">Yes</option><option value="0">No</option></select>
        <select name="needsSponsor"><option value="">--</option><option value="1">Yes</option><option value="0">No</option></select>
        <select id="over18"><option value="">--</option><option value="y">Yes</option><option value="n">No</option></select>
        <select name="nonCompete"><option value="">--</option><option value="y">Yes</option><option value="n">No</option></select>
        <label for="rel">Do you have a relative employed here?</label>
        <input type="text" id="rel">
        <label for="ref">Referral source</label>
        <input type="text" id="ref">
    </form>"#;

    #[tokio::test]
    async fn test_fill_questions_answers_stock_questions() {
        let page = HtmlPage::single(QUESTIONS);
        let profile = Profile::default();
        let s = session(&page, &profile);

        assert_eq!(fill_questions(&s).await, 6);
        assert_eq!(page.value_of("select[name=education_level]").as_deref(), Some("ba"));
        assert_eq!(page.value_of("#authorizedToWork").as_deref(), Some("1"));
        assert_eq!(page.value_of("select[name=needsSponsor]").as_deref(), Some("0"));
        assert_eq!(page.value_of("#over18").as_deref(), Some("y"));
        assert_eq!(page.value_of("select[name=nonCompete]").as_deref(), Some("n"));
        assert_eq!(page.value_of("#rel").as_deref(), Some("N/A"));
        assert_eq!(page.value_of("#ref").as_deref(), Some(""));

        assert_eq!(fill_questions(&s).await, 0);
    }

    #[tokio::test]
    async fn test_sponsorship_left_alone_without_requirement_wording() {
        let page = HtmlPage::single(
            r#"<select name="visaStatus"><option value="">--</option><option value="0">No</option></select>"#,
        );
        let profile = Profile::default();
        let s = session(&page, &profile);
        assert_eq!(fill_questions(&s).await, 0);
        assert_eq!(page.value_of("select").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_login_two_steps() {
        let page = HtmlPage::new(&[
            (
                "https://careers-acme.icims.com/login",
                r#"<input type="email" id="email"><button data-goto="https://careers-acme.icims.com/password">Next</button>"#,
            ),
            (
                "https://careers-acme.icims.com/password",
                r#"<input type="password" id="pw"><button>Log In</button><a>Not on this device</a>"#,
            ),
        ]);
        let profile = Profile {
            email: "pat@example.com".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let s = session(&page, &profile);

        assert!(login(&s).await);
        dismiss_faster_login(&s).await;
        assert_eq!(page.value_of("#pw").as_deref(), Some("secret"));
        let events = page.events();
        assert!(events.contains(&"click:Next".to_string()));
        assert!(events.contains(&"click:Log In".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("click:Not on this device"));
    }

    fn credentials() -> Profile {
        Profile {
            email: "pat@example.com".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_login_fails_without_email_field() {
        let page = HtmlPage::single("<p>Welcome back</p>");
        let profile = credentials();
        assert!(!login(&session(&page, &profile)).await);
    }

    #[tokio::test]
    async fn test_login_without_password_types_nothing() {
        let page = HtmlPage::single(
            r#"<input type="email" id="email"><button>Next</button><input type="password" id="pw"><button>Log In</button>"#,
        );
        let profile = Profile {
            email: "pat@example.com".to_string(),
            ..Default::default()
        };
        assert!(!login(&session(&page, &profile)).await);
        assert!(page.events().is_empty());
    }

    #[tokio::test]
    async fn test_login_fails_without_log_in_button() {
        let page = HtmlPage::single(
            r#"<input type="email" id="email"><input type="password" id="pw"><p>Loading</p>"#,
        );
        let profile = credentials();
        assert!(!login(&session(&page, &profile)).await);
        assert_eq!(page.value_of("#pw").as_deref(), Some("secret"));
        assert!(!page.events().iter().any(|e| e.starts_with("click:")));
    }

    #[tokio::test]
    async fn test_upload_via_my_computer() {
        let page = HtmlPage::single(
            r#"<div role="button">My Computer</div><input type="file" id="resume-upload">"#,
        );
        let profile = Profile::default();
        let s = session(&page, &profile);
        let mut resume = tempfile::NamedTempFile::new().unwrap();
        resume.write_all(b"resume").unwrap();

        assert!(upload_resume(&s, resume.path()).await);
        assert_eq!(
            page.events(),
            vec!["click:My Computer", "upload:<input> resume-upload"]
        );
    }
}
