use anyhow::Result;
use std::time::Duration;

use crate::models::UserProfile;
use crate::session::{find_first, Element, Selectors, Session};

pub const MAX_FORM_STEPS: usize = 20;
pub const UNKNOWN_FIELD_LABEL: &str = "Unknown Field";

// Fields the platform pre-populates; never touched.
pub const SKIP_LABEL_MARKERS: [&str; 4] = ["email", "phone", "mobile", "resume"];

const DEFAULT_ENTRY_WAIT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    Filling,
    Reviewing,
    Submitting,
    Done,
    Stuck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Dropdown,
    File,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: String,
    pub kind: FieldKind,
    pub skip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No quick-apply entry point on the listing page; the engine never started.
    NotApplicable,
    Submitted,
    /// No recognizable next action on some step; the attempt is reported, not failed.
    Stuck,
}

#[derive(Debug)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    pub trace: Vec<ApplyState>,
}

/// Walks an unknown-length, dynamically-rendered quick-apply form: discover and
/// answer the current step's fields, then take the highest-priority control
/// present (submit > review > continue), re-discovering fields after every step
/// change. Bounded defensively; the markup is third-party-controlled.
pub struct ApplyFormEngine<'a> {
    selectors: &'a Selectors,
    profile: &'a UserProfile,
    max_steps: usize,
    entry_wait: Duration,
}

impl<'a> ApplyFormEngine<'a> {
    pub fn new(selectors: &'a Selectors, profile: &'a UserProfile) -> Self {
        Self {
            selectors,
            profile,
            max_steps: MAX_FORM_STEPS,
            entry_wait: DEFAULT_ENTRY_WAIT,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_entry_wait(mut self, entry_wait: Duration) -> Self {
        self.entry_wait = entry_wait;
        self
    }

    pub fn run(&self, session: &mut dyn Session, detail_url: &str) -> Result<ApplyReport> {
        session.navigate(detail_url)?;

        let Some(entry) = self.wait_for_entry(session)? else {
            return Ok(ApplyReport {
                outcome: ApplyOutcome::NotApplicable,
                trace: Vec::new(),
            });
        };
        entry.click()?;

        let mut trace = vec![ApplyState::Filling];
        for _ in 0..self.max_steps {
            self.fill_current_step(session)?;

            if let Some(submit) = find_first(session, &self.selectors.submit_controls)? {
                trace.push(ApplyState::Submitting);
                submit.click()?;
                trace.push(ApplyState::Done);
                return Ok(ApplyReport {
                    outcome: ApplyOutcome::Submitted,
                    trace,
                });
            }

            if let Some(review) = find_first(session, &self.selectors.review_controls)? {
                trace.push(ApplyState::Reviewing);
                review.click()?;
                trace.push(ApplyState::Filling);
                continue;
            }

            if let Some(next) = find_first(session, &self.selectors.continue_controls)? {
                next.click()?;
                trace.push(ApplyState::Filling);
                continue;
            }

            trace.push(ApplyState::Stuck);
            return Ok(ApplyReport {
                outcome: ApplyOutcome::Stuck,
                trace,
            });
        }

        // Step bound exhausted; the form never offered a way out.
        trace.push(ApplyState::Stuck);
        Ok(ApplyReport {
            outcome: ApplyOutcome::Stuck,
            trace,
        })
    }

    // Bounded wait for the quick-apply entry point; absence is "not applicable".
    fn wait_for_entry(&self, session: &dyn Session) -> Result<Option<Box<dyn Element>>> {
        let deadline = std::time::Instant::now() + self.entry_wait;
        loop {
            if let Some(entry) = find_first(session, &self.selectors.quick_apply_button)? {
                return Ok(Some(entry));
            }
            if std::time::Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(250));
        }
    }

    fn fill_current_step(&self, session: &dyn Session) -> Result<()> {
        for (field, element) in self.discover_fields(session)? {
            if field.skip {
                continue;
            }
            let answer = answer_for(&field.label, self.profile);
            let applied = match field.kind {
                FieldKind::Text => element.fill(&answer),
                FieldKind::Dropdown => self.answer_dropdown(element.as_ref(), &answer),
                FieldKind::File => Ok(()), // always skipped by policy
            };
            if let Err(e) = applied {
                eprintln!("  Could not answer '{}': {}", field.label, e);
            }
        }
        Ok(())
    }

    fn discover_fields(
        &self,
        session: &dyn Session,
    ) -> Result<Vec<(FormField, Box<dyn Element>)>> {
        let groups = [
            (FieldKind::Text, &self.selectors.form_text_inputs),
            (FieldKind::Dropdown, &self.selectors.form_dropdowns),
            (FieldKind::File, &self.selectors.form_file_inputs),
        ];

        let mut fields = Vec::new();
        for (kind, group) in groups {
            for css in group {
                for element in session.query_selector_all(css)? {
                    let label = self.label_for(session, element.as_ref())?;
                    let label_lower = label.to_lowercase();
                    let skip = kind == FieldKind::File
                        || SKIP_LABEL_MARKERS
                            .iter()
                            .any(|marker| label_lower.contains(marker));
                    fields.push((FormField { label, kind, skip }, element));
                }
            }
        }
        Ok(fields)
    }

    // Label preference: explicit label[for] association, then a structural
    // <label> ancestor, then the placeholder hint, then the sentinel.
    fn label_for(&self, session: &dyn Session, element: &dyn Element) -> Result<String> {
        if let Some(id) = element.attr("id")? {
            if !id.is_empty() {
                if let Some(label_el) = session.query_selector(&format!("label[for=\"{id}\"]"))? {
                    let text = label_el.text()?.trim().to_string();
                    if !text.is_empty() {
                        return Ok(text);
                    }
                }
            }
        }
        if let Some(label) = element.enclosing_label()? {
            let label = label.trim().to_string();
            if !label.is_empty() {
                return Ok(label);
            }
        }
        if let Some(placeholder) = element.attr("placeholder")? {
            let placeholder = placeholder.trim().to_string();
            if !placeholder.is_empty() {
                return Ok(placeholder);
            }
        }
        Ok(UNKNOWN_FIELD_LABEL.to_string())
    }

    // Pick the option containing the answer (case-insensitive); fall back to the
    // first available option.
    fn answer_dropdown(&self, element: &dyn Element, answer: &str) -> Result<()> {
        let options = element.options()?;
        if options.is_empty() {
            return Ok(());
        }
        let answer_lower = answer.to_lowercase();
        let index = options
            .iter()
            .position(|option| option.to_lowercase().contains(&answer_lower))
            .unwrap_or(0);
        element.select_option(index)
    }
}

/// Heuristic answer for a free-form question, keyed off the label text.
pub fn answer_for(label: &str, profile: &UserProfile) -> String {
    let label = label.to_lowercase();

    if label.contains("years") || label.contains("experience") {
        return profile
            .years_experience
            .map(|y| y.to_string())
            .unwrap_or_else(|| "1".to_string());
    }
    if label.contains("city") || label.contains("location") || label.contains("country") {
        return profile.location.clone();
    }
    if label.contains("salary") || label.contains("compensation") {
        return "Negotiable".to_string();
    }
    // Remaining free-text questions are overwhelmingly yes/no screens.
    "Yes".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixture::StaticSession;
    use crate::session::Selectors;

    fn test_selectors() -> Selectors {
        Selectors {
            quick_apply_button: vec!["button.quick-apply".to_string()],
            form_text_inputs: vec![
                "input[type='text']".to_string(),
                "textarea".to_string(),
            ],
            form_dropdowns: vec!["select".to_string()],
            form_file_inputs: vec!["input[type='file']".to_string()],
            submit_controls: vec!["button.submit".to_string()],
            review_controls: vec!["button.review".to_string()],
            continue_controls: vec!["button.next".to_string()],
            ..Selectors::default()
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            positions: "Engineer".to_string(),
            location: "Berlin".to_string(),
            years_experience: Some(5),
            skills: "Rust, SQL".to_string(),
            keyword_lines: vec![],
        }
    }

    fn detail_page(goto: usize) -> String {
        format!(r#"<button class="quick-apply" data-goto="{goto}">Easy Apply</button>"#)
    }

    fn step(name: &str, button_class: &str, button_label: &str, goto: usize) -> String {
        format!(
            r#"<label>Question {name}<input type="text" name="{name}"></label>
               <button class="{button_class}" data-goto="{goto}">{button_label}</button>"#
        )
    }

    fn count_filling_cycles(trace: &[ApplyState]) -> usize {
        trace
            .windows(2)
            .filter(|w| w[0] == ApplyState::Filling && w[1] == ApplyState::Filling)
            .count()
    }

    #[test]
    fn test_three_continues_then_submit_reaches_done() {
        let detail = detail_page(1);
        let step1 = step("one", "next", "Continue", 2);
        let step2 = step("two", "next", "Continue", 3);
        let step3 = step("three", "next", "Continue", 4);
        let final_step = r#"<button class="submit">Submit application</button>"#;
        let mut session = StaticSession::new(&[
            detail.as_str(),
            step1.as_str(),
            step2.as_str(),
            step3.as_str(),
            final_step,
        ]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        let report = engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Submitted);
        assert_eq!(count_filling_cycles(&report.trace), 3);
        assert_eq!(
            &report.trace[report.trace.len() - 2..],
            &[ApplyState::Submitting, ApplyState::Done]
        );
        // one answered text field per step
        assert_eq!(session.fills().len(), 3);
    }

    #[test]
    fn test_no_controls_is_stuck_after_one_discovery() {
        let detail = detail_page(1);
        let dead_end = r#"<label>Question<input type="text" name="q"></label>"#;
        let mut session = StaticSession::new(&[detail.as_str(), dead_end]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        let report = engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Stuck);
        assert_eq!(report.trace, vec![ApplyState::Filling, ApplyState::Stuck]);
        assert_eq!(session.fills().len(), 1);
    }

    #[test]
    fn test_missing_entry_point_is_not_applicable() {
        let mut session = StaticSession::new(&["<p>external posting</p>"]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile)
            .with_entry_wait(Duration::from_millis(0));
        let report = engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(report.outcome, ApplyOutcome::NotApplicable);
        assert!(report.trace.is_empty());
    }

    #[test]
    fn test_review_then_submit() {
        let detail = detail_page(1);
        let review_step = r#"<button class="review" data-goto="2">Review</button>"#;
        let final_step = r#"<button class="submit">Submit application</button>"#;
        let mut session =
            StaticSession::new(&[detail.as_str(), review_step, final_step]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        let report = engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Submitted);
        assert!(report.trace.contains(&ApplyState::Reviewing));
    }

    #[test]
    fn test_step_bound_exhaustion_is_stuck() {
        let detail = detail_page(1);
        // continue button that never leaves the page
        let looping = r#"<button class="next" data-goto="1">Continue</button>"#;
        let mut session = StaticSession::new(&[detail.as_str(), looping]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile).with_max_steps(3);
        let report = engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Stuck);
        assert_eq!(*report.trace.last().unwrap(), ApplyState::Stuck);
    }

    #[test]
    fn test_skip_policy_leaves_prefilled_fields_alone() {
        let detail = detail_page(1);
        let form = r#"
            <label>Email address<input type="text" name="email"></label>
            <label>Mobile phone number<input type="text" name="phone"></label>
            <label>Upload resume<input type="file" name="cv"></label>
            <label>Years of experience<input type="text" name="years"></label>
            <button class="submit">Submit application</button>"#;
        let mut session = StaticSession::new(&[detail.as_str(), form]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(
            session.fills(),
            vec![("years".to_string(), "5".to_string())]
        );
    }

    #[test]
    fn test_label_resolution_order() {
        let detail = detail_page(1);
        let form = r#"
            <label for="q1">Explicit label</label><input type="text" id="q1" name="q1">
            <label>Ancestor label<input type="text" name="q2"></label>
            <input type="text" name="q3" placeholder="Placeholder label">
            <input type="text" name="q4">
            <button class="submit">Submit application</button>"#;
        let mut session = StaticSession::new(&[detail.as_str(), form]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        let fields = {
            session.navigate("http://l/view/1").unwrap();
            session
                .query_selector(".quick-apply")
                .unwrap()
                .unwrap()
                .click()
                .unwrap();
            engine.discover_fields(&session).unwrap()
        };

        let labels: Vec<_> = fields.iter().map(|(f, _)| f.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Explicit label",
                "Ancestor label",
                "Placeholder label",
                UNKNOWN_FIELD_LABEL
            ]
        );
    }

    #[test]
    fn test_dropdown_matches_answer_substring() {
        let detail = detail_page(1);
        let form = r#"
            <label>Years of experience
              <select name="years">
                <option>0-1</option>
                <option>2-4</option>
                <option>5 or more</option>
              </select>
            </label>
            <button class="submit">Submit application</button>"#;
        let mut session = StaticSession::new(&[detail.as_str(), form]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(session.selections(), vec![("years".to_string(), 2)]);
    }

    #[test]
    fn test_dropdown_falls_back_to_first_option() {
        let detail = detail_page(1);
        let form = r#"
            <label>Work authorization
              <select name="auth">
                <option>Option A</option>
                <option>Option B</option>
              </select>
            </label>
            <button class="submit">Submit application</button>"#;
        let mut session = StaticSession::new(&[detail.as_str(), form]);

        let selectors = test_selectors();
        let profile = profile();
        let engine = ApplyFormEngine::new(&selectors, &profile);
        engine.run(&mut session, "http://l/view/1").unwrap();

        assert_eq!(session.selections(), vec![("auth".to_string(), 0)]);
    }

    #[test]
    fn test_answer_heuristics() {
        let profile = profile();
        assert_eq!(answer_for("How many years of Rust?", &profile), "5");
        assert_eq!(answer_for("Current city", &profile), "Berlin");
        assert_eq!(answer_for("Expected salary", &profile), "Negotiable");
        assert_eq!(answer_for("Are you authorized to work?", &profile), "Yes");

        let mut unknown_years = profile.clone();
        unknown_years.years_experience = None;
        assert_eq!(answer_for("Years of experience", &unknown_years), "1");
    }
}
