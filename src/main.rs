mod ai;
mod apply;
mod browser;
mod client;
mod config;
mod db;
mod disqualifiers;
mod models;
mod profile;
mod resume;
mod scrape;
mod server;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use apply::{ApplyFlow, FlowConfig, TerminalOperator};
use browser::{Page, Timeouts, WebDriverPage};
use client::ApiClient;
use config::Config;
use db::Database;
use models::{ApplicationFilter, JobContext};
use profile::Profile;

#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Fill out online job applications, with you in the loop for the last click")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the application log database
    Init,

    /// Run the answer/resume/logging service
    Serve {
        /// Port to listen on (defaults to $PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply to a job posting in a browser
    Apply {
        /// Job posting URL
        #[arg(required_unless_present = "example")]
        job_url: Option<String>,

        /// Resume file to upload
        #[arg(required_unless_present = "example")]
        resume: Option<PathBuf>,

        /// Job title
        title: Option<String>,

        /// Company name
        company: Option<String>,

        /// Job location, used to pick the address you apply with
        location: Option<String>,

        /// Prompt for the job details instead of taking them as arguments
        #[arg(long)]
        example: bool,

        /// Applicant profile JSON (defaults to $AUTOAPPLY_PROFILE)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Service URL for screening answers (defaults to $AUTOAPPLY_API)
        #[arg(long)]
        api: Option<String>,

        /// WebDriver server URL (defaults to $WEBDRIVER_URL)
        #[arg(long)]
        webdriver: Option<String>,

        /// Maximum number of form pages to walk before review
        #[arg(long, default_value = "10")]
        max_pages: usize,

        /// Record the outcome in the service's application log
        #[arg(long)]
        log: bool,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },

    /// Print a posting's job description
    Scrape {
        /// Job posting URL
        url: String,

        /// Also screen the description against your profile and run LLM job analysis
        #[arg(short, long)]
        analyze: bool,

        /// Applicant profile JSON for screening (defaults to $AUTOAPPLY_PROFILE)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// WebDriver server URL (defaults to $WEBDRIVER_URL)
        #[arg(long)]
        webdriver: Option<String>,
    },

    /// Screen a saved job description for disqualifiers
    Check {
        /// Job description text file, or - for stdin
        file: PathBuf,

        /// Applicant profile JSON (defaults to $AUTOAPPLY_PROFILE)
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// List logged applications, newest first
    List {
        /// Filter by status (applied, unknown, cancelled, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by company (substring)
        #[arg(short, long)]
        company: Option<String>,

        /// Number of applications to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Delete a logged application
    Delete {
        /// Application ID
        id: i64,
    },

    /// Show application log statistics
    Stats,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "autoapply=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            let db = Database::open_at(&config.db_path)?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Serve { port } => {
            let spec = ai::resolve_model(&config.model)?;
            let llm: Arc<dyn ai::AIProvider> = Arc::from(ai::create_provider(&spec).await?);

            let db = Database::open_at(&config.db_path)?;
            db.init()?;

            let default_profile = match &config.profile_path {
                Some(path) => Some(Profile::load(path)?),
                None => None,
            };
            let state = server::AppState::new(config.db_path.clone(), llm, default_profile);
            server::serve(state, port.unwrap_or(config.port)).await?;
        }

        Commands::Apply {
            job_url,
            resume,
            title,
            company,
            location,
            example,
            profile,
            api,
            webdriver,
            max_pages,
            log,
            headless,
        } => {
            let (job, resume) = if example {
                prompt_job()?
            } else {
                let url = job_url.ok_or_else(|| anyhow!("job_url is required"))?;
                let resume = resume.ok_or_else(|| anyhow!("resume is required"))?;
                let job = JobContext {
                    title: title.unwrap_or_default(),
                    company: company.unwrap_or_default(),
                    location: location.unwrap_or_default(),
                    url,
                };
                (job, resume)
            };

            let profile = load_profile(profile.as_deref().or(config.profile_path.as_deref()))?;
            let client = ApiClient::new(api.as_deref().unwrap_or(&config.api_url))?;
            if let Err(e) = client.health().await {
                println!("Warning: answer service unavailable ({e:#}); screening questions will be left blank");
            }

            let webdriver = webdriver.unwrap_or(config.webdriver_url);
            let timeouts = Timeouts::default();
            let page = WebDriverPage::connect(&webdriver, headless, timeouts).await?;
            let operator = TerminalOperator;
            let flow_config = FlowConfig {
                max_pages,
                timeouts,
                ..FlowConfig::default()
            };

            println!("Applying to: {}", job.url);
            let outcome = ApplyFlow::new(&page, &profile, &client, &operator, flow_config)
                .run(&job, &resume)
                .await;

            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if log {
                match client.log_application(&outcome.to_log_request(&resume)).await {
                    Ok(response) => println!("Logged application #{}", response.application_id),
                    Err(e) => println!("Failed to log application: {e:#}"),
                }
            }
        }

        Commands::Scrape {
            url,
            analyze,
            profile,
            webdriver,
        } => {
            let webdriver = webdriver.unwrap_or(config.webdriver_url);
            let timeouts = Timeouts::default();
            let page = WebDriverPage::connect(&webdriver, true, timeouts).await?;
            let fetched = scrape::fetch_job_description(&page, &url, timeouts.page_load).await;
            if let Err(e) = page.close().await {
                tracing::warn!("failed to close browser: {e:#}");
            }
            let text = fetched?;

            println!("\n--- Job Description ---");
            println!("{}", textwrap::fill(&text, 100));

            if analyze {
                match profile.as_deref().or(config.profile_path.as_deref()) {
                    Some(path) => {
                        let verdict = disqualifiers::detect(&text, &Profile::load(path)?);
                        println!("\n--- Screening ---");
                        print_verdict(&verdict);
                    }
                    None => println!("\nNo profile given; skipping disqualifier screening."),
                }

                let spec = ai::resolve_model(&config.model)?;
                let provider = ai::create_provider(&spec).await?;
                println!("\nAnalyzing with {}...", provider.model_name());
                let analysis = ai::analyze_job(provider.as_ref(), &url, &text).await?;
                println!("\n--- Analysis ---");
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }
        }

        Commands::Check {
            file,
            profile,
            json,
        } => {
            let profile = load_profile(profile.as_deref().or(config.profile_path.as_deref()))?;
            let text = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read from stdin")?
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read job description: {}", file.display()))?
            };
            let verdict = disqualifiers::detect(&text, &profile);
            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                print_verdict(&verdict);
            }
        }

        Commands::List {
            status,
            company,
            limit,
        } => {
            let db = Database::open_at(&config.db_path)?;
            db.ensure_initialized()?;
            let applications = db.list_applications(&ApplicationFilter {
                limit,
                status,
                company,
            })?;
            if applications.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<6} {:<10} {:<20} {:<25} {:<20}",
                    "ID", "STATUS", "COMPANY", "TITLE", "APPLIED"
                );
                println!("{}", "-".repeat(84));
                for app in applications {
                    println!(
                        "{:<6} {:<10} {:<20} {:<25} {:<20}",
                        app.id,
                        app.status,
                        truncate(&app.company.unwrap_or_default(), 18),
                        truncate(&app.title.unwrap_or_default(), 23),
                        truncate(&app.timestamp, 19)
                    );
                }
            }
        }

        Commands::Delete { id } => {
            let db = Database::open_at(&config.db_path)?;
            db.ensure_initialized()?;
            match db.get_application(id)? {
                Some(app) => {
                    db.delete_application(id)?;
                    println!(
                        "Deleted application #{} ({} at {}).",
                        app.id,
                        app.title.as_deref().unwrap_or("untitled"),
                        app.company.as_deref().unwrap_or(&app.job_url)
                    );
                }
                None => println!("Application #{} not found.", id),
            }
        }

        Commands::Stats => {
            let db = Database::open_at(&config.db_path)?;
            db.ensure_initialized()?;
            let stats = db.stats()?;
            println!("Total applications: {}", stats.total);

            if !stats.by_status.is_empty() {
                println!("\nBy status:");
                for (status, count) in &stats.by_status {
                    println!("  {:<12} {:>5}", status, count);
                }
            }
            if !stats.by_company.is_empty() {
                println!("\nBy company:");
                for entry in &stats.by_company {
                    println!("  {:<30} {:>5}", truncate(&entry.company, 28), entry.count);
                }
            }
            if !stats.per_day.is_empty() {
                println!("\nPer day:");
                for (day, count) in &stats.per_day {
                    println!("  {:<12} {:>5}", day, count);
                }
            }
        }
    }

    Ok(())
}

fn load_profile(path: Option<&Path>) -> Result<Profile> {
    let path = path.ok_or_else(|| {
        anyhow!("no applicant profile; pass --profile or set AUTOAPPLY_PROFILE (see profile.example.json)")
    })?;
    Profile::load(path)
}

fn print_verdict(verdict: &disqualifiers::Verdict) {
    let status = match verdict.status {
        disqualifiers::Status::Green => "GREEN",
        disqualifiers::Status::Yellow => "YELLOW",
        disqualifiers::Status::Red => "RED",
    };
    println!("Score: {}/100 ({})", verdict.score, status);
    for (heading, items) in [
        ("Disqualifiers", &verdict.disqualifiers),
        ("Warnings", &verdict.warnings),
        ("Matches", &verdict.matches),
    ] {
        if !items.is_empty() {
            println!("\n{heading}:");
            for item in items {
                println!("  - {item}");
            }
        }
    }
    println!("\n{}", textwrap::fill(&verdict.recommendation, 100));
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn prompt_job() -> Result<(JobContext, PathBuf)> {
    let url = prompt("Job URL")?;
    if url.is_empty() {
        return Err(anyhow!("Job URL is required"));
    }
    let resume = prompt("Resume path")?;
    if resume.is_empty() {
        return Err(anyhow!("Resume path is required"));
    }
    let job = JobContext {
        title: prompt("Job title")?,
        company: prompt("Company")?,
        location: prompt("Location")?,
        url,
    };
    Ok((job, PathBuf::from(resume)))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
