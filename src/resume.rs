use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ai::AIProvider;
use crate::profile::{Profile, dynamic_address};

/// What the resume generator needs to know about a job. Usually the output
/// of job analysis, optionally with the description attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRequirements {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub skills: Vec<String>,
    pub experience: Option<String>,
    pub disqualifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnalysis {
    pub match_score: u32,
    pub highlighted_skills: Vec<String>,
    pub honesty_concerns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResume {
    pub resume_text: String,
    pub match_score: u32,
    pub highlighted_skills: Vec<String>,
    pub honesty_concerns: Vec<String>,
}

pub const WELL_MATCHED: &str = "Profile appears to match job requirements well";

/// Scores the profile against the job's skills and flags requirements the
/// applicant should double-check before applying.
pub fn analyze_match(job: &JobRequirements, profile: &Profile) -> MatchAnalysis {
    let mut required: Vec<String> = vec![];
    for skill in &job.skills {
        let skill = skill.trim().to_lowercase();
        if !skill.is_empty() && !required.contains(&skill) {
            required.push(skill);
        }
    }

    let user_skills: Vec<String> = profile
        .skills
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.to_lowercase())
        .collect();

    let mut highlighted = vec![];
    let mut missing = vec![];
    for req in &required {
        let matched = user_skills
            .iter()
            .any(|user| req.contains(user.as_str()) || user.contains(req.as_str()));
        if matched {
            highlighted.push(title_case(req));
        } else {
            missing.push(req.clone());
        }
    }

    let ratio = if required.is_empty() {
        0.5
    } else {
        highlighted.len() as f64 / required.len() as f64
    };
    let mut score = (ratio * 100.0) as u32;
    if profile.experience.len() >= 4 {
        score = (score + 10).min(100);
    }

    let mut concerns = vec![];

    if missing.len() > 3 {
        concerns.push(format!(
            "Job requires {} skills not in your profile: {}",
            missing.len(),
            missing[..3].join(", ")
        ));
    }

    if let Some(required_years) = job.experience.as_deref().and_then(years_required) {
        let user_years = if profile.years_experience > 0 {
            profile.years_experience
        } else {
            profile.experience.len() as u32
        };
        if user_years < required_years {
            concerns.push(format!(
                "Job requires {}+ years experience - you have {} years of documented experience",
                required_years, user_years
            ));
        }
    }

    for disq in &job.disqualifiers {
        let lower = disq.to_lowercase();
        if lower.contains("citizenship") || lower.contains("clearance") {
            concerns.push(format!(
                "Job has requirement: {} - verify you meet this before applying",
                disq
            ));
        }
    }

    if concerns.is_empty() {
        concerns.push(WELL_MATCHED.to_string());
    }

    MatchAnalysis {
        match_score: score,
        highlighted_skills: highlighted,
        honesty_concerns: concerns,
    }
}

fn years_required(experience: &str) -> Option<u32> {
    if !experience.to_lowercase().contains("years") {
        return None;
    }
    let re = Regex::new(r"(\d+)").ok()?;
    re.captures(experience)?.get(1)?.as_str().parse().ok()
}

/// Capitalises the first letter of every alphabetic run: "node.js" -> "Node.Js".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

const RESUME_RULES: &str = "You are an expert resume writer. Your job is to create a tailored, \
ATS-friendly resume that highlights the candidate's REAL experience and skills that match the job requirements.

CRITICAL RULES - DO NOT VIOLATE:
1. ONLY use achievements and experience from the provided profile
2. NEVER invent, exaggerate, or fabricate any experience
3. NEVER add skills the candidate doesn't have
4. DO reorder bullet points to put most relevant achievements first
5. DO use keywords from the job description naturally
6. DO quantify achievements when they already contain numbers
7. Keep resume to 2 pages maximum
8. Use professional, concise language
9. Format as plain text with clear sections

If the candidate doesn't have a required skill or experience, DO NOT mention it.
Focus on what they DO have that's relevant.";

pub fn build_resume_prompt(job: &JobRequirements, profile: &Profile) -> String {
    let title = job.title.as_deref().unwrap_or("Software Engineer");
    let company = job.company.as_deref().unwrap_or("");
    let location = job.location.as_deref().unwrap_or("");
    let description = job.description.as_deref().unwrap_or("");
    let skills = if job.skills.is_empty() {
        "Not specified".to_string()
    } else {
        job.skills.join(", ")
    };

    let home = if profile.home_address.is_empty() {
        &profile.home_location
    } else {
        &profile.home_address
    };
    let contact = format!(
        "{} | {} | {}",
        dynamic_address(location, home),
        profile.phone,
        profile.email
    );

    let mut prompt = format!(
        "{RESUME_RULES}\n\n\
        Create a tailored resume for this job application.\n\n\
        JOB DETAILS:\n\
        Title: {title}\n\
        Company: {company}\n\
        Location: {location}\n\
        Required Skills: {skills}\n\n\
        Job Description:\n{description}\n\n\
        CANDIDATE PROFILE (USE ONLY THIS INFORMATION):\n\
        Name: {}\n\
        Contact: {contact}\n\n\
        Work Experience:\n",
        profile.name
    );

    for exp in &profile.experience {
        prompt.push_str(&format!("\n{} - {} ({})\n", exp.company, exp.title, exp.dates));
        for achievement in &exp.achievements {
            prompt.push_str(&format!("  • {}\n", achievement));
        }
    }

    let certifications = if profile.certifications.is_empty() {
        "None"
    } else {
        &profile.certifications
    };
    prompt.push_str(&format!(
        "\nSkills: {}\n\n\
        Education: {}\n\n\
        Certifications: {certifications}\n\n\
        INSTRUCTIONS:\n\
        1. Create a professional resume using ONLY the experience and skills listed above\n\
        2. Reorder bullet points within each job to highlight achievements matching the job requirements\n\
        3. Emphasize relevant technologies and skills that appear in both the job description and profile\n\
        4. Use action verbs and quantify results where already provided\n\
        5. Keep format clean and ATS-friendly\n\
        6. Return ONLY the plain text resume, no commentary\n\n\
        Return the complete resume as plain text.",
        profile.skills, profile.education
    ));

    prompt
}

pub async fn generate_resume(
    provider: &dyn AIProvider,
    job: &JobRequirements,
    profile: &Profile,
) -> Result<GeneratedResume> {
    let prompt = build_resume_prompt(job, profile);
    let resume_text = provider.complete(&prompt, 4000).await?;
    let analysis = analyze_match(job, profile);

    Ok(GeneratedResume {
        resume_text: resume_text.trim().to_string(),
        match_score: analysis.match_score,
        highlighted_skills: analysis.highlighted_skills,
        honesty_concerns: analysis.honesty_concerns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubProvider;
    use crate::profile::Experience;

    fn profile() -> Profile {
        Profile {
            name: "Pat Doe".to_string(),
            email: "pat@example.com".to_string(),
            phone: "(555) 010-0000".to_string(),
            home_address: "12 Elm St, Yukon, OK 73099".to_string(),
            skills: "Python, SQL, Kubernetes, machine learning".to_string(),
            years_experience: 8,
            ..Default::default()
        }
    }

    fn job(skills: &[&str]) -> JobRequirements {
        JobRequirements {
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("python"), "Python");
        assert_eq!(title_case("machine learning"), "Machine Learning");
        assert_eq!(title_case("node.js"), "Node.Js");
        assert_eq!(title_case("c++"), "C++");
    }

    #[test]
    fn test_analyze_match_scores_substring_matches() {
        let analysis = analyze_match(&job(&["python", "SQL", "Go", "machine learning"]), &profile());
        assert_eq!(
            analysis.highlighted_skills,
            vec!["Python", "Sql", "Machine Learning"]
        );
        assert_eq!(analysis.match_score, 75);
        assert_eq!(analysis.honesty_concerns, vec![WELL_MATCHED]);
    }

    #[test]
    fn test_analyze_match_without_required_skills_is_half() {
        let analysis = analyze_match(&job(&[]), &profile());
        assert_eq!(analysis.match_score, 50);
        assert!(analysis.highlighted_skills.is_empty());
    }

    #[test]
    fn test_analyze_match_experience_bonus_caps_at_100() {
        let mut p = profile();
        p.experience = (0..4)
            .map(|i| Experience {
                company: format!("Co {}", i),
                ..Default::default()
            })
            .collect();
        assert_eq!(analyze_match(&job(&["python"]), &p).match_score, 100);
        assert_eq!(analyze_match(&job(&["python", "rust"]), &p).match_score, 60);
    }

    #[test]
    fn test_analyze_match_raises_concerns() {
        let mut j = job(&["rust", "haskell", "erlang", "ocaml", "python"]);
        j.experience = Some("10+ years".to_string());
        j.disqualifiers = vec![
            "US Citizenship Required".to_string(),
            "PhD Required".to_string(),
            "TS/SCI Clearance".to_string(),
        ];

        let analysis = analyze_match(&j, &profile());
        assert_eq!(analysis.honesty_concerns.len(), 4);
        assert!(analysis.honesty_concerns[0].starts_with("Job requires 4 skills not in your profile: rust, haskell, erlang"));
        assert_eq!(
            analysis.honesty_concerns[1],
            "Job requires 10+ years experience - you have 8 years of documented experience"
        );
        assert!(analysis.honesty_concerns[2].contains("US Citizenship Required"));
        assert!(analysis.honesty_concerns[3].contains("TS/SCI Clearance"));
        assert!(!analysis.honesty_concerns.iter().any(|c| c == WELL_MATCHED));
    }

    #[test]
    fn test_years_fall_back_to_experience_entries() {
        let mut j = job(&["python"]);
        j.experience = Some("3+ years".to_string());

        let mut p = profile();
        p.years_experience = 0;
        p.experience = vec![Experience::default(); 2];
        assert_eq!(
            analyze_match(&j, &p).honesty_concerns,
            vec!["Job requires 3+ years experience - you have 2 years of documented experience"]
        );

        p.years_experience = 12;
        assert_eq!(analyze_match(&j, &p).honesty_concerns, vec![WELL_MATCHED]);
    }

    #[test]
    fn test_experience_without_years_is_ignored() {
        let mut j = job(&["python"]);
        j.experience = Some("Senior level".to_string());
        let analysis = analyze_match(&j, &profile());
        assert_eq!(analysis.honesty_concerns, vec![WELL_MATCHED]);
    }

    #[test]
    fn test_resume_prompt_uses_dynamic_address() {
        let mut j = job(&["python"]);
        j.location = Some("Austin, TX".to_string());
        let prompt = build_resume_prompt(&j, &profile());
        assert!(prompt.contains("Contact: Austin, TX | (555) 010-0000 | pat@example.com"));
        assert!(prompt.contains("Required Skills: python"));
        assert!(prompt.contains("Title: Software Engineer"));

        j.location = Some("Remote".to_string());
        let prompt = build_resume_prompt(&j, &profile());
        assert!(prompt.contains("Contact: 12 Elm St, Yukon, OK 73099 |"));
    }

    #[tokio::test]
    async fn test_generate_resume_combines_text_and_analysis() {
        let provider = StubProvider::new(&["  PAT DOE\nSoftware Engineer\n"]);
        let generated = generate_resume(&provider, &job(&["python"]), &profile())
            .await
            .unwrap();
        assert_eq!(generated.resume_text, "PAT DOE\nSoftware Engineer");
        assert_eq!(generated.match_score, 100);
        assert_eq!(generated.highlighted_skills, vec!["Python"]);
    }
}
