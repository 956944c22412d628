use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::ai::AIProvider;
use crate::extract::{self, MAX_WORDS_PER_CHUNK};
use crate::models::{JobRecord, UserProfile};
use crate::prompts;

/// Pull plain text out of a resume document. Only PDF is supported; anything
/// else is rejected before any parsing happens.
pub fn extract_text(path: &Path) -> Result<String> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extension.eq_ignore_ascii_case("pdf") {
        bail!("Only PDF resumes are supported at the moment. Got: .{extension}");
    }
    pdf_extract::extract_text(path)
        .with_context(|| format!("Failed to extract text from {}", path.display()))
}

/// Run the extraction pipeline over resume text: chunk, extract location and
/// per-chunk work history, aggregate, then generate `k` search keyword lines.
/// A chunk whose response cannot be parsed is skipped, never fatal.
pub fn extract_profile(
    provider: &dyn AIProvider,
    resume_text: &str,
    k: usize,
    main_job_search_focus: &str,
    current_year: i64,
) -> Result<(UserProfile, Vec<JobRecord>)> {
    let chunks = extract::chunk_words(resume_text, MAX_WORDS_PER_CHUNK);
    println!("Resume split into {} chunk(s)", chunks.len());

    // Location lives in the resume header, so the first chunk is enough.
    let location_response = provider.complete(
        Some(prompts::LOCATION_EXTRACTOR_SYSTEM),
        &prompts::location_extractor_user(&chunks[0].text),
        1024,
    )?;
    let mut location = extract::parse_location_response(&location_response);
    println!("Location extracted");

    let mut extractions = Vec::new();
    for chunk in &chunks {
        let response = provider.complete(
            Some(prompts::COMPANY_EXTRACTOR_SYSTEM),
            &prompts::company_extractor_user(&chunk.text),
            2048,
        )?;
        match extract::parse_extraction(&response) {
            Ok(extraction) => extractions.push(extraction),
            Err(e) => eprintln!("  Chunk {}: unusable extraction, skipping ({e})", chunk.index),
        }
    }

    let aggregated = extract::aggregate(&extractions, current_year);
    let history = aggregated.history;
    println!("Work history extracted ({} employer(s))", history.len());

    let mut positions: Vec<String> = history
        .iter()
        .flat_map(|job| job.positions.iter().cloned())
        .collect();
    let mut skills: Vec<String> = history
        .iter()
        .flat_map(|job| job.skills.iter().cloned())
        .collect();

    // Delimited-shape chunks contribute whatever the history pass missed.
    if positions.is_empty() && !aggregated.fields.positions.is_empty() {
        positions = split_terms(&aggregated.fields.positions);
    }
    if skills.is_empty() && !aggregated.fields.skills.is_empty() {
        skills = split_terms(&aggregated.fields.skills);
    }
    if location.is_empty() {
        location = aggregated.fields.current_location.clone();
    }
    let years_experience = aggregated
        .years_experience
        .or_else(|| parse_years(&aggregated.fields.years_experience));

    let history_json =
        serde_json::to_string_pretty(&history).context("Failed to serialize work history")?;
    let keyword_response = provider.complete(
        Some(prompts::KEYWORD_GEN_SYSTEM),
        &prompts::keyword_gen_user(&history_json, main_job_search_focus, k),
        2048,
    )?;
    let keyword_lines = extract::parse_keyword_lines(&keyword_response, k);
    if keyword_lines.is_empty() {
        eprintln!("No keyword lines found in the model response");
    } else {
        println!("{} keyword line(s) generated", keyword_lines.len());
    }

    let profile = UserProfile {
        positions: positions.join(", "),
        location,
        years_experience,
        skills: skills.join(", "),
        keyword_lines,
    };

    Ok((profile, history))
}

fn split_terms(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

// "5 years" or "5" -> 5; anything else is not derivable.
fn parse_years(value: &str) -> Option<i64> {
    value.split_whitespace().next()?.parse().ok()
}
