pub const SEARCH_BASE_URL: &str = "https://www.linkedin.com/jobs/search/";

/// One compiled job search: comma-separated keyword terms OR-joined into a single
/// query, a location, a "posted within N days" window, and the optional
/// quick-apply restriction. Maps 1:1 onto a search URL.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub location: String,
    pub window_days: u32,
    pub quick_apply_only: bool,
}

impl SearchQuery {
    pub fn from_keyword_line(
        keyword_line: &str,
        location: &str,
        window_days: u32,
        quick_apply_only: bool,
    ) -> Self {
        let terms = keyword_line
            .split(',')
            .map(|term| term.trim().to_string())
            .collect();
        Self {
            terms,
            location: location.to_string(),
            window_days,
            quick_apply_only,
        }
    }

    pub fn to_url(&self) -> String {
        let joined = self.terms.join(" OR ");
        let encoded_keywords = form_encode(&joined);
        let encoded_location = if self.location.is_empty() {
            String::new()
        } else {
            form_encode(&self.location)
        };

        // r604800 = 7 days in seconds; 14 days would be r1209600, etc.
        let window_seconds = u64::from(self.window_days) * 24 * 3600;

        let mut url = format!(
            "{SEARCH_BASE_URL}?keywords={encoded_keywords}\
             &location={encoded_location}\
             &f_TPR=r{window_seconds}\
             &sortBy=DD"
        );
        if self.quick_apply_only {
            url.push_str("&f_AL=true");
        }
        url
    }
}

/// Compile one keyword line into a search URL. Pure and total: an empty line
/// yields a URL with an empty query term; filtering empty lines is the caller's
/// job.
pub fn build_search_url(
    keyword_line: &str,
    location: &str,
    window_days: u32,
    quick_apply_only: bool,
) -> String {
    SearchQuery::from_keyword_line(keyword_line, location, window_days, quick_apply_only).to_url()
}

// quote_plus-style form encoding: space becomes '+', reserved bytes escaped.
fn form_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_url_joins_terms_with_or() {
        let url = build_search_url("Engineer, Python", "Berlin", 7, true);
        assert!(url.starts_with(SEARCH_BASE_URL));
        assert!(url.contains("keywords=Engineer+OR+Python"));
        assert!(url.contains("&location=Berlin"));
        assert!(url.contains("&f_TPR=r604800"));
        assert!(url.contains("&sortBy=DD"));
        assert!(url.contains("&f_AL=true"));
    }

    #[test]
    fn test_build_search_url_without_quick_apply_flag() {
        let url = build_search_url("Engineer", "", 14, false);
        assert!(url.contains("&f_TPR=r1209600"));
        assert!(!url.contains("f_AL"));
        assert!(url.contains("&location=&"));
    }

    #[test]
    fn test_build_search_url_encodes_reserved_characters() {
        let url = build_search_url("C++, C#", "New York", 7, false);
        assert!(url.contains("keywords=C%2B%2B+OR+C%23"));
        assert!(url.contains("location=New+York"));
    }

    #[test]
    fn test_build_search_url_trims_terms() {
        let url = build_search_url("  Data Scientist ,  NLP  ", "", 7, false);
        assert!(url.contains("keywords=Data+Scientist+OR+NLP"));
    }

    #[test]
    fn test_build_search_url_empty_line_is_total() {
        let url = build_search_url("", "Berlin", 7, true);
        assert!(url.contains("keywords=&"));
        assert!(url.contains("&f_AL=true"));
    }

    #[test]
    fn test_duplicate_terms_are_preserved() {
        let url = build_search_url("Python, Python", "", 7, false);
        assert!(url.contains("keywords=Python+OR+Python"));
    }
}
