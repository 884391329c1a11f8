//! Rule-based screening of a job description against the applicant profile.
//!
//! Each rule family (citizenship, clearance, experience, education,
//! location, skills, export control, travel, checks) scans the lowercased
//! description and either records a hard disqualifier, a soft warning or a
//! positive match, adjusting a score that starts at 100.

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::OnceLock;

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub score: u32,
    pub status: Status,
    pub disqualifiers: Vec<String>,
    pub warnings: Vec<String>,
    pub matches: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Citizenship {
    UsCitizen,
    GreenCard,
    Other,
}

impl Citizenship {
    fn parse(raw: &str) -> Self {
        let norm = raw.to_lowercase().replace('.', "").replace(['_', '-'], " ");
        if norm.contains("green card") || norm.contains("permanent resident") {
            Citizenship::GreenCard
        } else if norm.contains("not") || norm.contains("non") {
            Citizenship::Other
        } else if norm.contains("us citizen") || norm.contains("united states citizen") {
            Citizenship::UsCitizen
        } else {
            Citizenship::Other
        }
    }

    fn is_us_person(self) -> bool {
        matches!(self, Citizenship::UsCitizen | Citizenship::GreenCard)
    }

    fn label(self) -> &'static str {
        match self {
            Citizenship::UsCitizen => "US citizen",
            Citizenship::GreenCard => "green card holder",
            Citizenship::Other => "non-US person",
        }
    }
}

/// The parts of a profile the rules look at.
struct Applicant {
    years: u32,
    citizenship: Citizenship,
    needs_sponsorship: bool,
    willing_to_relocate: bool,
    location: String,
    skills: Vec<String>,
}

impl Applicant {
    fn from_profile(profile: &Profile) -> Self {
        let years = if profile.years_experience > 0 {
            profile.years_experience
        } else {
            profile.experience.len() as u32
        };
        let citizenship = if profile.citizenship.is_empty() {
            &profile.work_authorization
        } else {
            &profile.citizenship
        };
        Self {
            years,
            citizenship: Citizenship::parse(citizenship),
            needs_sponsorship: affirmative(&profile.sponsorship_needed),
            willing_to_relocate: affirmative(&profile.willing_to_relocate),
            location: profile.home_location().trim().to_lowercase(),
            skills: profile
                .skills
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

fn affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer.starts_with('y') || answer == "true"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Citizen,
    CitizenOrGreenCard,
    GreenCard,
    NoSponsorship,
}

const REQUIREMENTS: &[(&str, Requirement)] = &[
    (r"\b(?:must\s+be|requires?|only)\s+(?:a\s+)?(?:u\.?s\.?\s+citizen|united\s+states\s+citizen)", Requirement::Citizen),
    (r"\bu\.?s\.?\s+citizen(?:ship)?\s+(?:is\s+)?required", Requirement::Citizen),
    (r"\bcitizens?\s+only\b", Requirement::Citizen),
    (r"\bmust\s+(?:hold|have|possess)\s+(?:a\s+)?u\.?s\.?\s+citizen", Requirement::Citizen),
    (r"\bonly\s+u\.?s\.?\s+citizens?\b", Requirement::Citizen),
    (r"\busc\b", Requirement::Citizen),
    (r"\bu\.?s\.?\s+citizen(?:ship)?\b", Requirement::Citizen),
    (r"\busc\s+or\s+(?:gc|green\s*card)\s*holder", Requirement::CitizenOrGreenCard),
    (r"\bu\.?s\.?\s+citizen(?:ship)?\s+or\s+green\s*card\s*holder", Requirement::CitizenOrGreenCard),
    (r"\bgreen\s*card\s*holder\s+or\s+u\.?s\.?\s+citizen", Requirement::CitizenOrGreenCard),
    (r"\b(?:must\s+be|requires?)\s+(?:a\s+)?(?:u\.?s\.?\s+citizen|usc)\s+or\s+(?:green\s*card|gc)\s*holder", Requirement::CitizenOrGreenCard),
    (r"\bgc\s+holder\b", Requirement::GreenCard),
    (r"\bgreen\s*card\s*holder\b", Requirement::GreenCard),
    (r"\bmust\s+(?:hold|have|possess)\s+(?:a\s+)?green\s*card", Requirement::GreenCard),
    (r"\bgreen\s*card\s+required\b", Requirement::GreenCard),
    (r"\bpermanent\s+resident\b", Requirement::GreenCard),
    (r"\bnot\s+(?:able|willing)\s+to\s+sponsor", Requirement::NoSponsorship),
    (r"\bunable\s+to\s+(?:provide\s+)?sponsor", Requirement::NoSponsorship),
    (r"\bwill\s+not\s+sponsor", Requirement::NoSponsorship),
    (r"\bno\s+(?:visa\s+)?sponsorship", Requirement::NoSponsorship),
    (r"\bwithout\s+(?:the\s+)?need\s+for\s+(?:current\s+or\s+future\s+)?sponsorship", Requirement::NoSponsorship),
];

const CLEARANCES: &[(&str, (&str, i32))] = &[
    (r"\bts\s*/\s*sci\b", ("Requires TS/SCI Clearance", 40)),
    (r"\btop\s+secret\b", ("Requires Top Secret Clearance", 40)),
    (r"\bsecret\s+clearance\b", ("Requires Secret Clearance", 35)),
    (r"\bactive\s+(?:security\s+)?clearance\b", ("Requires active security clearance", 35)),
    (r"\bclearance\s+(?:is\s+)?required\b", ("Security clearance required", 35)),
    (r"\bmust\s+(?:have|hold|possess|maintain)\s+(?:an?\s+)?(?:active\s+)?(?:security\s+)?clearance", ("Security clearance required", 35)),
    (r"\bpublic\s+trust\b", ("Requires Public Trust clearance", 20)),
    (r"\bsuitability\s+determination\b", ("Requires suitability determination", 15)),
];

const PREFERRED_SIGNALS: &[&str] = &[
    "preferred",
    "nice to have",
    "bonus",
    "ideally",
    "a plus",
    "desired",
    "not required",
    "optional",
    "advantageous",
];

const YEARS: &[&str] = &[
    r"(\d+)\+?\s*(?:to|-|–)\s*(\d+)\+?\s*years?\s+(?:of\s+)?(?:experience|professional|relevant)",
    r"(\d+)\+?\s*years?\s+(?:of\s+)?(?:experience|professional|relevant|related|hands[\s-]on|work|industry)",
    r"(?:minimum|at\s+least|no\s+less\s+than)\s+(?:of\s+)?(\d+)\+?\s*years?",
    r"(\d+)\+?\s*years?\s+(?:or\s+more\s+)?(?:of\s+)?(?:experience|exp\.?)\b",
];

// Ordered highest first; only the first hit counts.
const EDUCATION: &[(&str, (&str, i32))] = &[
    (r"\b(?:ph\.?d|doctorate)\b.*?\brequired\b", ("Requires PhD", 25)),
    (r"\brequired\b.*?\b(?:ph\.?d|doctorate)\b", ("Requires PhD", 25)),
    (r"\bmaster(?:'?s)?\s+degree\b.*?\brequired\b", ("Requires Master's degree", 20)),
    (r"\brequired\b.*?\bmaster(?:'?s)?\s+degree\b", ("Requires Master's degree", 20)),
];

const REMOTE: &[&str] = &[r"\bfully\s+remote\b", r"\bremote\s+(?:position|role|work|job)\b"];
const HYBRID: &[&str] = &[r"\bhybrid\b"];
const ONSITE: &[&str] = &[r"\bon[\s-]?site\b", r"\bin[\s-]?office\b", r"\bin[\s-]?person\b"];
const MUST_RELOCATE: &[&str] = &[
    r"\bmust\s+(?:be\s+)?(?:willing\s+to\s+)?relocate\b",
    r"\brelocation\s+required\b",
];
const JOB_LOCATION: &[&str] = &[r"\blocation\s*:\s*([^\n.]{3,60})"];
const EXPORT_CONTROL: &[&str] = &[r"\bitar\b", r"\bear\s+(?:regulat|restrict)", r"\bexport[\s-]?control"];
const TRAVEL: &[&str] = &[
    r"(\d{1,3})\s*%?\s*(?:domestic|international)?\s*travel\s+(?:required|expected|necessary)",
];
const DRUG_TEST: &[&str] = &[r"\bdrug\s+(?:test|screen)"];
const BACKGROUND_CHECK: &[&str] = &[r"\bbackground\s+(?:check|investigation|screening)\b"];

const SKILLS: &[&str] = &[
    // Languages
    "JavaScript", "TypeScript", "Python", "Java", r"C\+\+", "C#",
    "Go(?:lang)?", "Rust", "Ruby", "PHP", "Swift", "Kotlin",
    "Scala", "Perl", "R", "MATLAB", "Lua", "Elixir", "Erlang",
    "Objective-C", "Dart", "Haskell", "Clojure",
    // Frontend
    r"React(?:\.js|js)?", "Angular", r"Vue(?:\.js|js)?", "Svelte",
    r"Next\.?js", "Nuxt", "jQuery", "Redux", "Webpack", "Vite",
    "HTML5?", "CSS3?", "SASS", "SCSS", "LESS", r"Tailwind(?:\s*CSS)?",
    "Bootstrap", r"Material\s*UI",
    // Backend
    r"Node\.?js", r"Express(?:\.js)?", "Django", "Flask", "FastAPI",
    r"Spring(?:\s*Boot)?", "Rails", "Laravel", r"ASP\.NET", "NestJS",
    r"\.NET(?:\s+Core)?", "Gin", "Fiber", "Phoenix",
    // Databases
    "SQL", "NoSQL", "PostgreSQL", "Postgres", "MySQL", "MariaDB",
    "MongoDB", "Redis", "DynamoDB", "Cassandra", "Elasticsearch",
    "SQLite", r"Oracle\s*DB", "Snowflake", "Redshift", "BigQuery",
    "CockroachDB", "Neo4j",
    // Cloud and infrastructure
    "AWS", r"Amazon\s+Web\s+Services", "Azure", "GCP",
    r"Google\s+Cloud(?:\s+Platform)?",
    "Docker", "Kubernetes", "K8s", "Terraform", "Ansible",
    "Puppet", "Chef", "Vagrant", "Packer",
    "CloudFormation", "Pulumi", "ArgoCD", "Helm",
    // CI/CD
    "CI/CD", "Jenkins", r"GitHub\s+Actions", r"GitLab(?:\s+CI)?",
    "CircleCI", r"Travis\s*CI", "Bamboo", "TeamCity",
    "Git", "SVN", "Mercurial",
    // Data and ML
    r"Machine\s+Learning", r"Deep\s+Learning", "NLP",
    r"Computer\s+Vision", "TensorFlow", "PyTorch", "Keras",
    "Scikit-learn", "Pandas", "NumPy", "Spark", "Hadoop",
    "Kafka", "Airflow", "dbt", "ETL", r"Data\s+Pipeline",
    "Databricks", "MLflow", "Kubeflow", "SageMaker",
    // Observability
    "Datadog", "Splunk", "Grafana", "Prometheus", r"New\s+Relic",
    "PagerDuty", r"ELK\s+Stack", "Kibana", "Logstash",
    // APIs
    "REST(?:ful)?", "GraphQL", "gRPC", "WebSocket", "SOAP",
    "OAuth", "JWT", "OpenAPI", "Swagger",
    // Testing
    "Jest", "Mocha", "Cypress", "Selenium", "Playwright",
    "JUnit", "pytest", "RSpec", "TestNG",
    // Design
    "Figma", "Sketch", r"Adobe\s+XD", "InVision",
    // Methodologies
    "Agile", "Scrum", "Kanban", "SAFe", "Lean",
    "DevOps", "SRE", "TDD", "BDD",
    // Messaging
    "RabbitMQ", "SQS", "SNS", "ActiveMQ", "ZeroMQ",
    // Networking and security
    "TCP/IP", "DNS", "HTTP", "TLS", "SSL",
    "OAuth2", "SAML", "LDAP", r"Active\s+Directory",
    "Okta", "Auth0",
    // Mobile
    r"React\s+Native", "Flutter", "Xamarin", "SwiftUI",
    r"Jetpack\s+Compose", "Android", "iOS",
    // OS
    "Linux", "Unix", r"Windows\s+Server", "macOS",
    "Bash", r"Shell\s+Scripting", "PowerShell",
    // Business tools
    "Jira", "Confluence", "Notion", "Trello",
    "Tableau", r"Power\s+BI", "Looker", "Excel",
    "Salesforce", "ServiceNow", "SAP",
];

const REQUIRED_HEADERS: &[&str] = &[
    "required",
    "must have",
    "must-have",
    "minimum qualifications",
    "basic qualifications",
    "requirements",
    "what you need",
    "what you'll need",
    "essential",
];

const PREFERRED_HEADERS: &[&str] = &[
    "preferred",
    "nice to have",
    "nice-to-have",
    "bonus",
    "desired",
    "additional",
    "a plus",
];

/// Skill spellings treated as equivalent, keyed by normalized name.
const ALIASES: &[(&str, &[&str])] = &[
    ("javascript", &["js", "ecmascript"]),
    ("typescript", &["ts"]),
    ("python", &["py", "python3"]),
    ("golang", &["go"]),
    ("go", &["golang"]),
    ("cpp", &["c++", "cplusplus"]),
    ("c++", &["cpp", "cplusplus"]),
    ("csharp", &["c#", "dotnet", "net"]),
    ("c#", &["csharp", "dotnet", "net"]),
    ("nodejs", &["node", "nodej", "nodjs"]),
    ("node", &["nodejs"]),
    ("nodej", &["nodejs", "node"]),
    ("react", &["reactjs", "reactj"]),
    ("reactjs", &["react"]),
    ("vue", &["vuejs", "vuej"]),
    ("vuejs", &["vue"]),
    ("angular", &["angularjs"]),
    ("angularjs", &["angular"]),
    ("nextjs", &["next"]),
    ("next", &["nextjs"]),
    ("postgres", &["postgresql", "psql"]),
    ("postgresql", &["postgres", "psql"]),
    ("k8s", &["kubernetes"]),
    ("kubernetes", &["k8s"]),
    ("aws", &["amazonwebservices"]),
    ("gcp", &["googlecloud", "googlecloudplatform"]),
    ("googlecloud", &["gcp"]),
    ("cicd", &["continuousintegration"]),
    ("ml", &["machinelearning"]),
    ("machinelearning", &["ml"]),
    ("dl", &["deeplearning"]),
    ("deeplearning", &["dl"]),
    ("tensorflow", &["tf"]),
    ("tf", &["tensorflow"]),
    ("pytorch", &["torch"]),
    ("torch", &["pytorch"]),
    ("restful", &["rest", "restapi"]),
    ("rest", &["restful", "restapi"]),
    ("graphql", &["gql"]),
    ("gql", &["graphql"]),
    ("rabbitmq", &["rmq"]),
    ("elasticsearch", &["es", "elastic"]),
    ("bash", &["shellscripting", "shell"]),
    ("linux", &["unix"]),
    ("unix", &["linux"]),
];

struct Rules {
    requirements: Vec<(Regex, Requirement)>,
    clearances: Vec<(Regex, (&'static str, i32))>,
    years: Vec<Regex>,
    education: Vec<(Regex, (&'static str, i32))>,
    remote: Vec<Regex>,
    hybrid: Vec<Regex>,
    onsite: Vec<Regex>,
    must_relocate: Vec<Regex>,
    job_location: Vec<Regex>,
    skills: Vec<Regex>,
    export_control: Vec<Regex>,
    travel: Vec<Regex>,
    drug_test: Vec<Regex>,
    background_check: Vec<Regex>,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        requirements: compile_labeled(REQUIREMENTS),
        clearances: compile_labeled(CLEARANCES),
        years: compile_all(YEARS),
        education: compile_labeled(EDUCATION),
        remote: compile_all(REMOTE),
        hybrid: compile_all(HYBRID),
        onsite: compile_all(ONSITE),
        must_relocate: compile_all(MUST_RELOCATE),
        job_location: compile_all(JOB_LOCATION),
        skills: SKILLS
            .iter()
            .filter_map(|pattern| compile(&bounded(pattern)))
            .collect(),
        export_control: compile_all(EXPORT_CONTROL),
        travel: compile_all(TRAVEL),
        drug_test: compile_all(DRUG_TEST),
        background_check: compile_all(BACKGROUND_CHECK),
    })
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("(?i){pattern}")) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("skipping rule pattern {pattern:?}: {e}");
            None
        }
    }
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| compile(p)).collect()
}

fn compile_labeled<T: Copy>(table: &[(&str, T)]) -> Vec<(Regex, T)> {
    table
        .iter()
        .filter_map(|(pattern, label)| compile(pattern).map(|re| (re, *label)))
        .collect()
}

/// Wraps a skill pattern so it only matches as a standalone term. Unlike
/// `\b`, this also works for names that start or end in symbols (C++, C#,
/// .NET). Group 1 is the term itself.
fn bounded(pattern: &str) -> String {
    format!(r"(?:^|[^a-z0-9_])({pattern})(?:[^a-z0-9_]|$)")
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

fn first_captures<'t>(patterns: &[Regex], text: &'t str) -> Option<Captures<'t>> {
    patterns.iter().find_map(|re| re.captures(text))
}

/// Up to `len` bytes of `text` ending at `end`, widened to a char boundary.
fn window_before(text: &str, end: usize, len: usize) -> &str {
    let mut start = end.saturating_sub(len);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..end]
}

/// Screens `job_text` against `profile`.
pub fn detect(job_text: &str, profile: &Profile) -> Verdict {
    let rules = rules();
    let applicant = Applicant::from_profile(profile);
    let text = job_text.to_lowercase();

    let mut score: i32 = 100;
    let mut disqualifiers = Vec::new();
    let mut warnings = Vec::new();
    let mut matches = Vec::new();

    // Citizenship and work authorization
    let mut found: Vec<Requirement> = Vec::new();
    for (re, requirement) in &rules.requirements {
        if !found.contains(requirement) && re.is_match(&text) {
            found.push(*requirement);
        }
    }
    // "US citizen or green card holder" also trips the narrower rules.
    if found.contains(&Requirement::CitizenOrGreenCard) {
        found.retain(|r| !matches!(r, Requirement::Citizen | Requirement::GreenCard));
    }
    for requirement in [
        Requirement::Citizen,
        Requirement::CitizenOrGreenCard,
        Requirement::GreenCard,
        Requirement::NoSponsorship,
    ] {
        if !found.contains(&requirement) {
            continue;
        }
        let (qualifies, label, penalty, matched) = match requirement {
            Requirement::Citizen => (
                applicant.citizenship == Citizenship::UsCitizen,
                "Requires US Citizenship",
                40,
                "US Citizenship required - you qualify",
            ),
            Requirement::CitizenOrGreenCard => (
                applicant.citizenship.is_us_person(),
                "Requires USC or Green Card Holder",
                38,
                "USC or Green Card required - you qualify",
            ),
            Requirement::GreenCard => (
                applicant.citizenship.is_us_person(),
                "Requires Green Card Holder",
                35,
                "Green Card / USC required - you qualify",
            ),
            Requirement::NoSponsorship => (
                !applicant.needs_sponsorship,
                "No visa sponsorship",
                35,
                "No sponsorship needed - you qualify",
            ),
        };
        if qualifies {
            matches.push(matched.to_string());
        } else {
            disqualifiers.push(label.to_string());
            score -= penalty;
        }
    }

    // Security clearance
    let mut seen_clearances: Vec<&str> = Vec::new();
    for (re, entry) in &rules.clearances {
        let (label, weight) = *entry;
        if seen_clearances.contains(&label) {
            continue;
        }
        let Some(m) = re.find(&text) else { continue };
        seen_clearances.push(label);

        let before = window_before(&text, m.start(), 200);
        if PREFERRED_SIGNALS.iter().any(|signal| before.contains(signal)) {
            warnings.push(format!("Prefers: {label}"));
            score -= (weight * 3 + 5) / 10;
        } else {
            disqualifiers.push(label.to_string());
            score -= weight;
        }
    }

    // Years of experience
    let required_years = rules
        .years
        .iter()
        .filter_map(|re| re.captures(&text))
        .filter_map(|caps| caps.get(2).or_else(|| caps.get(1))?.as_str().parse::<u32>().ok())
        .max();
    if let Some(required) = required_years {
        let have = applicant.years;
        let gap = required as i32 - have as i32;
        if gap <= 0 {
            matches.push(format!("Requires {required}+ years experience - you have {have}"));
        } else if gap <= 2 {
            warnings.push(format!("Requires {required}+ years - you have {have} (close)"));
            score -= 8 * gap;
        } else {
            disqualifiers.push(format!("Requires {required}+ years experience - you have {have}"));
            score -= (10 * gap).min(35);
        }
    }

    // Education
    if let Some((_, (label, weight))) = rules.education.iter().find(|(re, _)| re.is_match(&text)) {
        warnings.push(label.to_string());
        score -= *weight;
    }

    // Location and relocation
    let remote = any_match(&rules.remote, &text);
    let on_location = any_match(&rules.onsite, &text) || any_match(&rules.hybrid, &text);
    let job_location = first_captures(&rules.job_location, &text)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .unwrap_or_default();
    let user_location = applicant.location.as_str();
    if on_location
        && !user_location.is_empty()
        && !job_location.is_empty()
        && !job_location.contains(user_location)
        && !user_location.contains(job_location.as_str())
    {
        if applicant.willing_to_relocate {
            warnings.push("On-site/hybrid role - relocation may be needed".to_string());
            score -= 5;
        } else if any_match(&rules.must_relocate, &text) {
            disqualifiers.push("Requires relocation - you are not willing to relocate".to_string());
            score -= 20;
        } else {
            warnings.push(format!("Prefers local candidates ({job_location})"));
            score -= 10;
        }
    }
    if remote && !user_location.is_empty() {
        matches.push("Remote position - location compatible".to_string());
    }

    // Skills
    let job_skills = extract_job_skills(job_text);
    let (have, missing): (Vec<&String>, Vec<&String>) = job_skills
        .iter()
        .partition(|skill| applicant.skills.iter().any(|mine| skill_match(mine, skill)));
    for skill in &have {
        if in_required_context(&text, skill) {
            matches.push(format!("{skill} required - you have it"));
        } else {
            matches.push(format!("{skill} mentioned - you have it"));
        }
    }
    let mut missing_skills = Vec::new();
    for skill in &missing {
        missing_skills.push(skill.to_string());
        if in_required_context(&text, skill) {
            warnings.push(format!("Requires {skill} - not in your profile"));
            score -= 6;
        } else {
            warnings.push(format!("Prefers {skill} experience"));
            score -= 3;
        }
    }
    if !job_skills.is_empty() && have.len() * 5 >= job_skills.len() * 4 {
        score += 5;
    }

    // Export control
    if any_match(&rules.export_control, &text) {
        if applicant.citizenship.is_us_person() {
            matches.push(format!(
                "ITAR/Export control - you qualify as {}",
                applicant.citizenship.label()
            ));
        } else {
            disqualifiers.push("ITAR/Export control - requires US Person status".to_string());
            score -= 30;
        }
    }

    // Travel
    if let Some(pct) = first_captures(&rules.travel, &text)
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
    {
        if pct >= 50 {
            warnings.push(format!("Requires {pct}% travel"));
            score -= 8;
        } else if pct >= 25 {
            warnings.push(format!("Requires {pct}% travel"));
            score -= 4;
        }
    }

    // Checks; common enough that they never cost points.
    if any_match(&rules.drug_test, &text) {
        warnings.push("Drug test required".to_string());
    }
    if any_match(&rules.background_check, &text) {
        warnings.push("Background check required".to_string());
    }

    let score = score.clamp(0, 100) as u32;
    let status = if !disqualifiers.is_empty() {
        Status::Red
    } else if score >= 70 {
        Status::Green
    } else if score >= 45 {
        Status::Yellow
    } else {
        Status::Red
    };
    let recommendation = recommend(
        score,
        status,
        &disqualifiers,
        warnings.len(),
        have.len(),
        job_skills.len(),
    );

    tracing::debug!(score, ?status, disqualifiers = disqualifiers.len(), "screened job description");

    Verdict {
        score,
        status,
        disqualifiers,
        warnings,
        matches,
        missing_skills,
        recommendation,
    }
}

/// Technology keywords named in `text`, deduplicated, in the casing the
/// posting uses.
pub fn extract_job_skills(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut skills = Vec::new();
    for re in &rules().skills {
        let Some(term) = re.captures(text).and_then(|caps| caps.get(1)) else {
            continue;
        };
        let key: String = term
            .as_str()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();
        if !keys.contains(&key) {
            keys.push(key);
            skills.push(term.as_str().to_string());
        }
    }
    skills
}

/// Whether the applicant's `mine` covers the job's `theirs`, allowing for
/// aliases (k8s/kubernetes) and compound names (react/react native).
pub fn skill_match(mine: &str, theirs: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '-' | '/'))
            .collect()
    };
    let u = normalize(mine);
    let j = normalize(theirs);
    if u.is_empty() || j.is_empty() {
        return false;
    }
    if u == j {
        return true;
    }

    let aliases = |key: &str| -> &'static [&'static str] {
        ALIASES
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(&[])
    };
    if aliases(&u).contains(&j.as_str()) || aliases(&j).contains(&u.as_str()) {
        return true;
    }

    (u.len() >= 3 && j.contains(&u)) || (j.len() >= 3 && u.contains(&j))
}

/// True when the nearest section header before the first mention of
/// `skill` reads as a requirement. No header at all counts as required.
fn in_required_context(text: &str, skill: &str) -> bool {
    let Some(re) = compile(&bounded(&regex::escape(&skill.to_lowercase()))) else {
        return true;
    };
    let Some(term) = re.captures(text).and_then(|caps| caps.get(1)) else {
        return false;
    };
    let before = window_before(text, term.start(), 300);

    let last = |headers: &[&str]| headers.iter().filter_map(|h| before.rfind(h)).max();
    match (last(REQUIRED_HEADERS), last(PREFERRED_HEADERS)) {
        (None, None) => true,
        (required, preferred) => required >= preferred,
    }
}

fn recommend(
    score: u32,
    status: Status,
    disqualifiers: &[String],
    concerns: usize,
    matched_skills: usize,
    all_skills: usize,
) -> String {
    match status {
        Status::Red if !disqualifiers.is_empty() => {
            let blockers: Vec<&str> = disqualifiers.iter().take(2).map(String::as_str).collect();
            format!(
                "Not recommended - hard disqualifiers found: {}. Applying is unlikely to succeed unless requirements are negotiable.",
                blockers.join("; ")
            )
        }
        Status::Red => "Weak match - significant gaps in qualifications. Consider upskilling or targeting roles closer to your profile.".to_string(),
        Status::Yellow if matched_skills > 0 && all_skills > 0 => {
            let pct = (matched_skills * 200 + all_skills) / (all_skills * 2);
            let plural = if concerns == 1 { "" } else { "s" };
            format!(
                "Moderate match ({pct}% skill overlap) with {concerns} concern{plural}. Apply with a tailored resume that addresses gaps directly."
            )
        }
        Status::Yellow => {
            "Partial match with some concerns. Apply with a cover letter addressing the gaps.".to_string()
        }
        Status::Green if score >= 90 => {
            "Excellent match - apply immediately with a targeted resume.".to_string()
        }
        Status::Green if score >= 80 => {
            "Strong match - apply with tailored resume highlighting relevant experience.".to_string()
        }
        Status::Green => {
            "Good match - apply with resume customized to this role's requirements.".to_string()
        }
    }
}
