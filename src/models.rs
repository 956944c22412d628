use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub positions: String, // comma-separated
    pub location: String,
    pub years_experience: Option<i64>, // None = not derivable from the resume, distinct from 0
    pub skills: String,                // comma-separated
    pub keyword_lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRecord {
    pub company: String,
    pub positions: Vec<String>,
    pub start_date: Option<String>, // "MM/YYYY"
    pub end_date: Option<String>,   // "MM/YYYY" or "present"
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub benefits: String,
    pub tags: Vec<String>, // e.g. ["Viewed", "Promoted"]
    pub url: String,
}
