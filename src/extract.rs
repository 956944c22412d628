use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::models::JobRecord;

pub const MAX_WORDS_PER_CHUNK: usize = 300;

pub const EXTRACTION_FIELDS: [&str; 4] = [
    "positions",
    "current_location",
    "years_experience",
    "skills",
];

// --- Chunking ---

#[derive(Debug, Clone)]
pub struct ResumeChunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

/// Splits `text` into word-boundary-aligned chunks of at most `max_words` words.
/// Cuts fall on word starts, so concatenating the chunks reconstructs the source
/// exactly; only the final chunk may be short.
pub fn chunk_words(text: &str, max_words: usize) -> Vec<ResumeChunk> {
    let spans = word_spans(text);
    if max_words == 0 || spans.len() <= max_words {
        return vec![ResumeChunk {
            index: 0,
            word_count: spans.len(),
            text: text.to_string(),
        }];
    }

    let mut cuts = vec![0usize];
    let mut next = max_words;
    while next < spans.len() {
        cuts.push(spans[next].0);
        next += max_words;
    }
    cuts.push(text.len());

    cuts.windows(2)
        .enumerate()
        .map(|(index, window)| {
            let slice = &text[window[0]..window[1]];
            ResumeChunk {
                index,
                word_count: word_spans(slice).len(),
                text: slice.to_string(),
            }
        })
        .collect()
}

fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

// --- Response parsing ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub positions: String,
    pub current_location: String,
    pub years_experience: String,
    pub skills: String,
}

#[derive(Debug, Clone)]
pub enum ChunkExtraction {
    Fields(ExtractedFields),
    Companies(Vec<JobRecord>),
}

/// Picks the response shape by which markers are present: literal `{field}:`
/// markers select the delimited shape, otherwise the response must carry an
/// embedded JSON object.
pub fn parse_extraction(response: &str) -> Result<ChunkExtraction> {
    if has_field_markers(response) {
        return Ok(ChunkExtraction::Fields(parse_field_response(response)));
    }
    Ok(ChunkExtraction::Companies(parse_company_response(response)?))
}

fn has_field_markers(response: &str) -> bool {
    EXTRACTION_FIELDS
        .iter()
        .any(|field| response.contains(&format!("{{{field}}}:")))
}

/// Delimited shape: each known field appears as `{field}: value` terminated by a
/// newline or the end of the response. A field whose marker is absent yields an
/// empty string, never an error.
pub fn parse_field_response(response: &str) -> ExtractedFields {
    let field_value = |field: &str| -> String {
        let marker = format!("{{{field}}}:");
        match response.find(&marker) {
            None => String::new(),
            Some(start) => {
                let rest = &response[start + marker.len()..];
                let end = rest.find('\n').unwrap_or(rest.len());
                rest[..end].trim().to_string()
            }
        }
    };

    ExtractedFields {
        positions: field_value("positions"),
        current_location: field_value("current_location"),
        years_experience: field_value("years_experience"),
        skills: field_value("skills"),
    }
}

/// Parses the substring between the first `{` and the last `}` as a JSON object.
pub fn parse_json_object(response: &str) -> Result<Value> {
    let start = response.find('{');
    let end = response.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(anyhow!("no JSON object found in model response"));
    };
    if end < start {
        return Err(anyhow!("no JSON object found in model response"));
    }
    serde_json::from_str(&response[start..=end]).context("model response is not valid JSON")
}

/// JSON shape: `{"company_names": {name: {"Positions", "Start Date", "End Date",
/// "Relevant Skills"}}}`. A missing or oddly-typed `company_names` yields an empty
/// list; only an unparsable response is an error (the caller skips that chunk).
pub fn parse_company_response(response: &str) -> Result<Vec<JobRecord>> {
    let value = parse_json_object(response)?;
    let Some(companies) = value.get("company_names").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let records = companies
        .iter()
        .map(|(company, info)| JobRecord {
            company: company.clone(),
            positions: string_list(info.get("Positions")),
            start_date: nonempty_string(info.get("Start Date")),
            end_date: nonempty_string(info.get("End Date")),
            skills: string_list(info.get("Relevant Skills")),
        })
        .collect();

    Ok(records)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::to_string)
            .collect(),
        // Tolerate a scalar where a list was requested
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn nonempty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Location responses are a JSON object with a `current_location` key; the model
/// is instructed to answer the literal string "None" when nothing was found.
pub fn parse_location_response(response: &str) -> String {
    let Ok(value) = parse_json_object(response) else {
        return String::new();
    };
    let location = value
        .get("current_location")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();
    if location.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        location.to_string()
    }
}

// --- Keyword set parsing ---

static KEYWORD_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Keywords>(.*?)<[\\/]Keywords>").expect("keyword block pattern"));

/// Extracts at most `k` keyword lines from a response. The numbered-list shape
/// (`<Keywords>` block, closed by `<\Keywords>` or `</Keywords>`) wins when
/// present; otherwise a JSON object with a `keyword_sets` array is accepted.
/// No recognizable shape yields an empty list, not an error.
pub fn parse_keyword_lines(response: &str, k: usize) -> Vec<String> {
    if let Some(block) = KEYWORD_BLOCK.captures(response).and_then(|c| c.get(1)) {
        return block
            .as_str()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(strip_numbering)
            .take(k)
            .collect();
    }

    let Ok(value) = parse_json_object(response) else {
        return Vec::new();
    };
    match value.get("keyword_sets") {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(|line| line.as_str())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .take(k)
            .collect(),
        _ => Vec::new(),
    }
}

// Strip a leading "N)" numbering prefix; a ")" preceded by anything other than
// digits is content and stays.
fn strip_numbering(line: &str) -> String {
    match line.split_once(')') {
        Some((prefix, rest))
            if !prefix.trim().is_empty() && prefix.trim().chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.trim().to_string()
        }
        _ => line.to_string(),
    }
}

// --- Aggregation ---

const SENTINEL_START_YEAR: i64 = 3000;
const SENTINEL_END_YEAR: i64 = 0;

#[derive(Debug, Default)]
pub struct Aggregated {
    pub history: Vec<JobRecord>,
    pub years_experience: Option<i64>,
    pub fields: ExtractedFields,
}

/// Merges per-chunk extractions into one work history. Company identity is the
/// exact name, first occurrence wins the slot; positions and skills accumulate
/// (duplicates allowed); the first non-empty start/end date seen is kept.
/// `years_experience` is `None` unless at least one start and one end year parsed.
pub fn aggregate(extractions: &[ChunkExtraction], current_year: i64) -> Aggregated {
    let mut history: Vec<JobRecord> = Vec::new();
    let mut fields = ExtractedFields::default();

    for extraction in extractions {
        match extraction {
            ChunkExtraction::Companies(records) => {
                for record in records {
                    match history.iter_mut().find(|job| job.company == record.company) {
                        Some(existing) => {
                            existing.positions.extend(record.positions.iter().cloned());
                            existing.skills.extend(record.skills.iter().cloned());
                            if existing.start_date.is_none() {
                                existing.start_date = record.start_date.clone();
                            }
                            if existing.end_date.is_none() {
                                existing.end_date = record.end_date.clone();
                            }
                        }
                        None => history.push(record.clone()),
                    }
                }
            }
            ChunkExtraction::Fields(chunk_fields) => merge_fields(&mut fields, chunk_fields),
        }
    }

    let mut min_start = SENTINEL_START_YEAR;
    let mut max_end = SENTINEL_END_YEAR;
    for job in &history {
        if let Some(year) = job.start_date.as_deref().and_then(date_year) {
            min_start = min_start.min(year);
        }
        if let Some(end) = job.end_date.as_deref() {
            if end.eq_ignore_ascii_case("present") {
                max_end = max_end.max(current_year);
            } else if let Some(year) = date_year(end) {
                max_end = max_end.max(year);
            }
        }
    }

    let years_experience = (min_start != SENTINEL_START_YEAR && max_end != SENTINEL_END_YEAR)
        .then_some(max_end - min_start);

    Aggregated {
        history,
        years_experience,
        fields,
    }
}

fn merge_fields(into: &mut ExtractedFields, from: &ExtractedFields) {
    if into.positions.is_empty() {
        into.positions = from.positions.clone();
    }
    if into.current_location.is_empty() {
        into.current_location = from.current_location.clone();
    }
    if into.years_experience.is_empty() {
        into.years_experience = from.years_experience.clone();
    }
    if into.skills.is_empty() {
        into.skills = from.skills.clone();
    }
}

/// Year of a `"MM/YYYY"`-style date: the trailing `/`-separated token. Malformed
/// dates yield `None` and are skipped by the aggregation.
pub fn date_year(date: &str) -> Option<i64> {
    date.rsplit('/').next()?.trim().parse().ok()
}
