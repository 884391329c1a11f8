use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The applicant. Loaded once and never mutated during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    /// Used for site logins only; never sent to the answer service.
    #[serde(skip_serializing)]
    pub password: String,
    pub work_authorization: String,
    pub sponsorship_needed: String,
    pub years_experience: u32,
    pub willing_to_relocate: String,
    pub clearance: String,
    pub citizenship: String,
    /// Short form used in location fields, e.g. "Yukon, OK".
    pub home_location: String,
    /// Full street address used on resumes.
    pub home_address: String,
    pub skills: String,
    pub experience: Vec<Experience>,
    pub education: String,
    pub certifications: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub company: String,
    pub title: String,
    pub dates: String,
    pub achievements: Vec<String>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse profile file: {}", path.display()))
    }

    pub(crate) fn home_location(&self) -> &str {
        if self.home_location.is_empty() {
            &self.home_address
        } else {
            &self.home_location
        }
    }
}

/// Per-job values derived from the profile and the job's location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantContext {
    pub location: String,
    pub city: String,
}

impl ApplicantContext {
    pub fn for_job(profile: &Profile, job_location: &str) -> Self {
        let location = dynamic_address(job_location, profile.home_location());
        let city = match location.split_once(',') {
            Some((city, _)) => city.trim().to_string(),
            None => location.clone(),
        };
        Self { location, city }
    }
}

const HOME_KEYWORDS: &[&str] = &["oklahoma", "ok", "okc", "tulsa", "norman", "yukon"];

const RELOCATABLE_STATES: &[(&str, &str)] = &[
    ("tx", "Texas"),
    ("ak", "Alaska"),
    ("co", "Colorado"),
    ("ks", "Kansas"),
    ("ga", "Georgia"),
    ("il", "Illinois"),
    ("ca", "California"),
    ("ny", "New York"),
];

/// Picks the address to present for a job: the job's own city in a state the
/// applicant would relocate to, otherwise `home`.
pub fn dynamic_address(job_location: &str, home: &str) -> String {
    let lower = job_location.trim().to_lowercase();
    if lower.is_empty() {
        return home.to_string();
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if lower.contains("oklahoma") || tokens.iter().any(|t| HOME_KEYWORDS.contains(t)) {
        return home.to_string();
    }

    for (code, state_name) in RELOCATABLE_STATES {
        if !tokens.contains(code) && !contains_words(&tokens, state_name) {
            continue;
        }

        if let Some(caps) = city_state_code().and_then(|re| re.captures(job_location)) {
            return format!("{}, {}", caps[1].trim(), caps[2].trim());
        }

        let by_name = Regex::new(&format!(r"(?i)([A-Za-z\s]+),\s*({})", state_name));
        if let Ok(re) = by_name {
            if let Some(caps) = re.captures(job_location) {
                return format!("{}, {}", caps[1].trim(), state_name);
            }
        }

        return state_name.to_string();
    }

    home.to_string()
}

/// True when the words of `phrase` appear consecutively in `tokens`.
fn contains_words(tokens: &[&str], phrase: &str) -> bool {
    let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();
    !words.is_empty()
        && tokens
            .windows(words.len())
            .any(|window| window.iter().zip(&words).all(|(t, w)| *t == w.as_str()))
}

fn city_state_code() -> Option<&'static Regex> {
    static RE: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z\s]+),\s*([A-Z]{2})").ok())
        .as_ref()
}
