mod ai;
mod apply;
mod collect;
mod db;
mod extract;
mod models;
mod prompts;
mod resume;
mod search;
mod session;

use anyhow::{anyhow, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use apply::{ApplyFormEngine, ApplyOutcome};
use collect::{ListingCollector, Pacing};
use db::Database;
use session::{Selectors, WebdriverSession};

#[derive(Parser)]
#[command(name = "prowl")]
#[command(about = "Resume-driven job search automation - parse, search, quick apply")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Parse a resume PDF into a searchable profile
    Parse {
        /// Path to the resume PDF
        resume: PathBuf,

        /// Model to use (gpt-4o, sonnet, llama3.2, ollama:<model>, ...)
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,

        /// Number of search keyword lines to generate
        #[arg(short = 'k', long, default_value = "20")]
        queries: usize,

        /// Main job search focus fed to keyword generation
        #[arg(short, long, default_value = "Software Engineering")]
        focus: String,
    },

    /// Show the stored profile
    Profile,

    /// Run the stored keyword lines as searches and collect listings
    Search {
        /// Only show postings from the last N days
        #[arg(short, long, default_value = "7")]
        days: u32,

        /// Maximum number of search URLs to process
        #[arg(long, default_value = "10")]
        max_urls: usize,

        /// Include postings without the in-platform quick-apply flow
        #[arg(long)]
        include_external: bool,

        /// Override the profile location for this search
        #[arg(short, long)]
        location: Option<String>,

        /// WebDriver endpoint
        #[arg(long, default_value = "http://localhost:9515")]
        webdriver: String,

        /// Chrome profile directory with a logged-in session
        #[arg(long)]
        chrome_profile: Option<PathBuf>,

        /// JSON file overriding the built-in CSS selectors
        #[arg(long)]
        selectors: Option<PathBuf>,
    },

    /// List collected listings
    Listings {
        /// Number of listings to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show one listing
    Show {
        /// Listing ID
        id: String,
    },

    /// Drive the quick-apply flow for a collected listing
    Apply {
        /// Listing ID
        id: String,

        /// Maximum form steps before giving up
        #[arg(long, default_value = "20")]
        max_steps: usize,

        /// WebDriver endpoint
        #[arg(long, default_value = "http://localhost:9515")]
        webdriver: String,

        /// Chrome profile directory with a logged-in session
        #[arg(long)]
        chrome_profile: Option<PathBuf>,

        /// JSON file overriding the built-in CSS selectors
        #[arg(long)]
        selectors: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Parse {
            resume,
            model,
            queries,
            focus,
        } => {
            db.ensure_initialized()?;

            let spec = ai::resolve_model(&model)?;
            let provider = ai::create_provider(&spec)?;
            println!("Using model {}", spec.short_name);

            let text = resume::extract_text(&resume)?;
            if text.trim().is_empty() {
                return Err(anyhow!("No text found in {}", resume.display()));
            }

            let current_year = i64::from(chrono::Local::now().year());
            let (profile, history) =
                resume::extract_profile(provider.as_ref(), &text, queries, &focus, current_year)?;

            db.save_profile(&profile)?;
            println!("\nProfile saved.");
            print_profile(&profile);
            if !history.is_empty() {
                println!("\nWork history:");
                for job in &history {
                    println!(
                        "  {} - {} ({} - {})",
                        job.company,
                        job.positions.join(" / "),
                        job.start_date.as_deref().unwrap_or("?"),
                        job.end_date.as_deref().unwrap_or("?"),
                    );
                }
            }
        }

        Commands::Profile => {
            db.ensure_initialized()?;
            match db.load_profile()? {
                Some(profile) => print_profile(&profile),
                None => println!("No profile found. Run 'prowl parse <resume.pdf>' first."),
            }
        }

        Commands::Search {
            days,
            max_urls,
            include_external,
            location,
            webdriver,
            chrome_profile,
            selectors,
        } => {
            db.ensure_initialized()?;
            let profile = db
                .load_profile()?
                .ok_or_else(|| anyhow!("No profile found. Run 'prowl parse <resume.pdf>' first."))?;

            let location = location.unwrap_or_else(|| profile.location.clone());
            let urls: Vec<String> = profile
                .keyword_lines
                .iter()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .map(|line| search::build_search_url(line, &location, days, !include_external))
                .collect();

            if urls.is_empty() {
                return Err(anyhow!(
                    "The profile has no keyword lines. Re-run 'prowl parse' to generate them."
                ));
            }
            println!("{} search URL(s) built", urls.len());

            let selectors = load_selectors(selectors.as_deref())?;
            let mut session = WebdriverSession::connect(&webdriver, chrome_profile.as_deref())?;

            let mut collector = ListingCollector::new(&selectors, Pacing::default());
            let listings = collector.collect(&mut session, &urls, max_urls, Some(&db))?;
            session.quit()?;

            if listings.is_empty() {
                println!("No new listings collected.");
            } else {
                println!("\nCollected {} new listing(s):", listings.len());
                print_listing_table(&listings);
            }
        }

        Commands::Listings { limit } => {
            db.ensure_initialized()?;
            let listings = db.list_listings(limit)?;
            if listings.is_empty() {
                println!("No listings collected yet. Run 'prowl search' first.");
            } else {
                print_listing_table(&listings);
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_listing(&id)? {
                Some(listing) => {
                    println!("Listing {}", listing.id);
                    println!("Title: {}", listing.title);
                    println!("Company: {}", listing.company);
                    if !listing.location.is_empty() {
                        println!("Location: {}", listing.location);
                    }
                    if !listing.benefits.is_empty() {
                        println!("Benefits: {}", listing.benefits);
                    }
                    if !listing.tags.is_empty() {
                        println!("Tags: {}", listing.tags.join(", "));
                    }
                    if !listing.url.is_empty() {
                        println!("URL: {}", listing.url);
                    }
                    if let Some(outcome) = db.last_application_outcome(&listing.id)? {
                        println!("Last application attempt: {}", outcome);
                    }
                }
                None => println!("Listing '{}' not found.", id),
            }
        }

        Commands::Apply {
            id,
            max_steps,
            webdriver,
            chrome_profile,
            selectors,
        } => {
            db.ensure_initialized()?;
            let profile = db
                .load_profile()?
                .ok_or_else(|| anyhow!("No profile found. Run 'prowl parse <resume.pdf>' first."))?;
            let listing = db
                .get_listing(&id)?
                .ok_or_else(|| anyhow!("Listing '{}' not found", id))?;
            if listing.url.is_empty() {
                return Err(anyhow!("Listing '{}' has no detail URL", id));
            }

            println!(
                "Applying to: {} at {}",
                listing.title, listing.company
            );

            let selectors = load_selectors(selectors.as_deref())?;
            let mut session = WebdriverSession::connect(&webdriver, chrome_profile.as_deref())?;

            let engine = ApplyFormEngine::new(&selectors, &profile).with_max_steps(max_steps);
            let report = engine.run(&mut session, &listing.url)?;
            session.quit()?;

            match report.outcome {
                ApplyOutcome::Submitted => {
                    db.record_application(&listing.id, "submitted")?;
                    println!("Application submitted ({} step(s)).", report.trace.len());
                }
                ApplyOutcome::Stuck => {
                    db.record_application(&listing.id, "stuck")?;
                    println!(
                        "No recognizable next action on the form; the attempt was left in progress."
                    );
                }
                ApplyOutcome::NotApplicable => {
                    db.record_application(&listing.id, "not_applicable")?;
                    println!("This listing has no quick-apply flow.");
                }
            }
        }
    }

    Ok(())
}

fn load_selectors(path: Option<&std::path::Path>) -> Result<Selectors> {
    match path {
        Some(path) => Selectors::load(path),
        None => Ok(Selectors::default()),
    }
}

fn print_profile(profile: &models::UserProfile) {
    let years = profile
        .years_experience
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Location: {}", profile.location);
    println!("Years of experience: {}", years);
    if !profile.positions.is_empty() {
        println!("Positions:\n{}", textwrap::indent(&textwrap::fill(&profile.positions, 76), "  "));
    }
    if !profile.skills.is_empty() {
        println!("Skills:\n{}", textwrap::indent(&textwrap::fill(&profile.skills, 76), "  "));
    }
    if !profile.keyword_lines.is_empty() {
        println!("Keyword lines:");
        for (i, line) in profile.keyword_lines.iter().enumerate() {
            println!("  {}) {}", i + 1, line);
        }
    }
}

fn print_listing_table(listings: &[models::Listing]) {
    println!(
        "{:<14} {:<32} {:<22} {:<18} {:<12}",
        "ID", "TITLE", "COMPANY", "LOCATION", "TAGS"
    );
    println!("{}", "-".repeat(100));
    for listing in listings {
        println!(
            "{:<14} {:<32} {:<22} {:<18} {:<12}",
            truncate(&listing.id, 12),
            truncate(&listing.title, 30),
            truncate(&listing.company, 20),
            truncate(&listing.location, 16),
            truncate(&listing.tags.join(","), 12)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
        assert_eq!(truncate("a very long job title here", 10), "a very ...");
    }
}
