use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

// --- Capability-style DOM boundary ---
//
// The core never hard-codes markup: it asks for "the listing-card concept", "the
// scroll-container concept", "the continue-control concept" through these traits,
// and the selectors that realize each concept live in `Selectors` below.

pub trait Element {
    fn text(&self) -> Result<String>;
    fn attr(&self, name: &str) -> Result<Option<String>>;
    fn click(&self) -> Result<()>;
    fn fill(&self, value: &str) -> Result<()>;
    fn options(&self) -> Result<Vec<String>>;
    fn select_option(&self, index: usize) -> Result<()>;
    fn enclosing_label(&self) -> Result<Option<String>>;
    fn scroll_height(&self) -> Result<i64>;
    fn scroll_to_bottom(&self) -> Result<()>;
    fn find(&self, css: &str) -> Result<Option<Box<dyn Element>>>;
    fn find_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>>;
}

pub trait Session {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn query_selector(&self, css: &str) -> Result<Option<Box<dyn Element>>>;
    fn query_selector_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>>;
    /// Bounded wait for a selector to appear; `false` means "absent", never an error.
    fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool>;
}

/// First element matching any of the candidate selectors, tried in order.
pub fn find_first(session: &dyn Session, selectors: &[String]) -> Result<Option<Box<dyn Element>>> {
    for css in selectors {
        if let Some(element) = session.query_selector(css)? {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

// --- Selector configuration ---

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub results_container: String,
    pub listing_card: String,
    pub listing_id_attr: String,
    pub listing_title_link: String,
    pub listing_company: String,
    pub listing_location: String,
    pub listing_benefits: String,
    pub listing_footer_tags: String,
    pub quick_apply_button: Vec<String>,
    pub form_text_inputs: Vec<String>,
    pub form_dropdowns: Vec<String>,
    pub form_file_inputs: Vec<String>,
    pub submit_controls: Vec<String>,
    pub review_controls: Vec<String>,
    pub continue_controls: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            results_container: ".jobs-search-results-list".to_string(),
            listing_card: ".job-card-container".to_string(),
            listing_id_attr: "data-job-id".to_string(),
            listing_title_link: "a.job-card-container__link".to_string(),
            listing_company: "div.artdeco-entity-lockup__subtitle span".to_string(),
            listing_location:
                "div.artdeco-entity-lockup__caption ul.job-card-container__metadata-wrapper li"
                    .to_string(),
            listing_benefits: "div.mt1 ul.job-card-container__metadata-wrapper li".to_string(),
            listing_footer_tags:
                "ul.job-card-list__footer-wrapper li.job-card-container__footer-item".to_string(),
            quick_apply_button: strings(&[
                "button.jobs-apply-button",
                "button[aria-label*='Easy Apply']",
            ]),
            form_text_inputs: strings(&[
                "div.jobs-easy-apply-modal input[type='text']",
                "div.jobs-easy-apply-modal input[type='number']",
                "div.jobs-easy-apply-modal textarea",
            ]),
            form_dropdowns: strings(&["div.jobs-easy-apply-modal select"]),
            form_file_inputs: strings(&["div.jobs-easy-apply-modal input[type='file']"]),
            submit_controls: strings(&["button[aria-label='Submit application']"]),
            review_controls: strings(&["button[aria-label='Review your application']"]),
            continue_controls: strings(&[
                "button[aria-label='Continue to next step']",
                "button[data-easy-apply-next-button]",
            ]),
        }
    }
}

impl Selectors {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selectors file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid selectors file: {}", path.display()))
    }
}

// --- WebDriver-backed session ---
//
// Wraps thirtyfour's async API behind blocking calls on a dedicated
// current-thread runtime so the pipeline stays synchronous end to end.

pub struct WebdriverSession {
    rt: Arc<tokio::runtime::Runtime>,
    driver: WebDriver,
}

impl WebdriverSession {
    /// Connect to a running WebDriver endpoint (e.g. chromedriver). Pass a Chrome
    /// profile directory to reuse an already-logged-in browser session.
    pub fn connect(webdriver_url: &str, chrome_profile: Option<&Path>) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime for WebDriver session")?;

        let mut caps = DesiredCapabilities::chrome();
        if let Some(profile) = chrome_profile {
            caps.add_arg(&format!("--user-data-dir={}", profile.display()))?;
        }

        let driver = rt.block_on(WebDriver::new(webdriver_url, caps)).context(
            "Failed to connect to WebDriver. Start chromedriver and make sure the URL matches.",
        )?;

        Ok(Self {
            rt: Arc::new(rt),
            driver,
        })
    }

    pub fn quit(self) -> Result<()> {
        self.rt.block_on(self.driver.clone().quit())?;
        Ok(())
    }

    fn wrap(&self, el: WebElement) -> Box<dyn Element> {
        Box::new(WebdriverElement {
            rt: Arc::clone(&self.rt),
            driver: self.driver.clone(),
            el,
        })
    }
}

impl Session for WebdriverSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.rt
            .block_on(self.driver.goto(url))
            .with_context(|| format!("Failed to navigate to {url}"))
    }

    fn query_selector(&self, css: &str) -> Result<Option<Box<dyn Element>>> {
        let found = self.rt.block_on(self.driver.find_all(By::Css(css)))?;
        Ok(found.into_iter().next().map(|el| self.wrap(el)))
    }

    fn query_selector_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>> {
        let found = self.rt.block_on(self.driver.find_all(By::Css(css)))?;
        Ok(found.into_iter().map(|el| self.wrap(el)).collect())
    }

    fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.query_selector(css)?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

struct WebdriverElement {
    rt: Arc<tokio::runtime::Runtime>,
    driver: WebDriver,
    el: WebElement,
}

impl Element for WebdriverElement {
    fn text(&self) -> Result<String> {
        Ok(self.rt.block_on(self.el.text())?)
    }

    fn attr(&self, name: &str) -> Result<Option<String>> {
        Ok(self.rt.block_on(self.el.attr(name))?)
    }

    fn click(&self) -> Result<()> {
        Ok(self.rt.block_on(self.el.click())?)
    }

    fn fill(&self, value: &str) -> Result<()> {
        self.rt.block_on(async {
            self.el.clear().await?;
            self.el.send_keys(value).await
        })?;
        Ok(())
    }

    fn options(&self) -> Result<Vec<String>> {
        self.rt.block_on(async {
            let mut texts = Vec::new();
            for option in self.el.find_all(By::Tag("option")).await? {
                texts.push(option.text().await?);
            }
            Ok(texts)
        })
    }

    fn select_option(&self, index: usize) -> Result<()> {
        self.rt.block_on(async {
            let select = SelectElement::new(&self.el).await?;
            select.select_by_index(index as u32).await
        })?;
        Ok(())
    }

    fn enclosing_label(&self) -> Result<Option<String>> {
        let ret = self.rt.block_on(self.driver.execute(
            "let node = arguments[0].parentElement;\
             while (node && node.tagName !== 'LABEL') { node = node.parentElement; }\
             return node ? node.innerText : null;",
            vec![self.el.to_json()?],
        ))?;
        let value = ret.json().clone();
        Ok(value.as_str().map(str::to_string))
    }

    fn scroll_height(&self) -> Result<i64> {
        let ret = self.rt.block_on(self.driver.execute(
            "return arguments[0].scrollHeight;",
            vec![self.el.to_json()?],
        ))?;
        let value = ret.json().clone();
        value
            .as_i64()
            .ok_or_else(|| anyhow!("scrollHeight was not a number"))
    }

    fn scroll_to_bottom(&self) -> Result<()> {
        self.rt.block_on(self.driver.execute(
            "arguments[0].scrollTo(0, arguments[0].scrollHeight);",
            vec![self.el.to_json()?],
        ))?;
        Ok(())
    }

    fn find(&self, css: &str) -> Result<Option<Box<dyn Element>>> {
        let found = self.rt.block_on(self.el.find_all(By::Css(css)))?;
        Ok(found.into_iter().next().map(|el| {
            Box::new(WebdriverElement {
                rt: Arc::clone(&self.rt),
                driver: self.driver.clone(),
                el,
            }) as Box<dyn Element>
        }))
    }

    fn find_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>> {
        let found = self.rt.block_on(self.el.find_all(By::Css(css)))?;
        Ok(found
            .into_iter()
            .map(|el| {
                Box::new(WebdriverElement {
                    rt: Arc::clone(&self.rt),
                    driver: self.driver.clone(),
                    el,
                }) as Box<dyn Element>
            })
            .collect())
    }
}

// --- Static HTML fixture session ---
//
// Implements the same traits over a sequence of static HTML documents, so the
// collector and the apply engine can be exercised against synthetic pages
// instead of a live site. A click on an element carrying a `data-goto="N"`
// attribute jumps to page N, which is how fixtures model step transitions.

pub mod fixture {
    use super::{Element, Session};
    use anyhow::{anyhow, Result};
    use scraper::{ElementRef, Html, Selector};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct FixtureState {
        page: usize,
        navigations: Vec<String>,
        clicks: Vec<String>,
        fills: Vec<(String, String)>,
        selections: Vec<(String, usize)>,
        extents: Vec<i64>,
        scroll_calls: usize,
    }

    pub struct StaticSession {
        pages: Vec<String>,
        state: Rc<RefCell<FixtureState>>,
    }

    impl StaticSession {
        pub fn new(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                state: Rc::new(RefCell::new(FixtureState::default())),
            }
        }

        /// Scroll-extent readings, one per measurement; the last value repeats.
        pub fn with_extents(self, extents: Vec<i64>) -> Self {
            self.state.borrow_mut().extents = extents;
            self
        }

        pub fn navigations(&self) -> Vec<String> {
            self.state.borrow().navigations.clone()
        }

        pub fn clicks(&self) -> Vec<String> {
            self.state.borrow().clicks.clone()
        }

        pub fn fills(&self) -> Vec<(String, String)> {
            self.state.borrow().fills.clone()
        }

        pub fn selections(&self) -> Vec<(String, usize)> {
            self.state.borrow().selections.clone()
        }

        pub fn scroll_calls(&self) -> usize {
            self.state.borrow().scroll_calls
        }

        fn current_page(&self) -> &str {
            let page = self.state.borrow().page.min(self.pages.len() - 1);
            &self.pages[page]
        }

        fn select_from(&self, html: &str, css: &str) -> Result<Vec<Box<dyn Element>>> {
            let selector = parse_selector(css)?;
            let document = Html::parse_document(html);
            Ok(document
                .select(&selector)
                .map(|el| capture(&self.state, el))
                .collect())
        }
    }

    impl Session for StaticSession {
        fn navigate(&mut self, url: &str) -> Result<()> {
            let mut state = self.state.borrow_mut();
            state.navigations.push(url.to_string());
            state.page = (state.navigations.len() - 1).min(self.pages.len() - 1);
            state.scroll_calls = 0;
            Ok(())
        }

        fn query_selector(&self, css: &str) -> Result<Option<Box<dyn Element>>> {
            Ok(self.select_from(self.current_page(), css)?.into_iter().next())
        }

        fn query_selector_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>> {
            self.select_from(self.current_page(), css)
        }

        fn wait_for(&self, css: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.query_selector(css)?.is_some())
        }
    }

    fn parse_selector(css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| anyhow!("invalid selector '{css}': {e}"))
    }

    fn capture(state: &Rc<RefCell<FixtureState>>, el: ElementRef) -> Box<dyn Element> {
        let attrs: HashMap<String, String> = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let options = Selector::parse("option")
            .map(|sel| {
                el.select(&sel)
                    .map(|o| o.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let label = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "label")
            .map(|l| l.text().collect::<String>().trim().to_string());

        Box::new(FixtureElement {
            state: Rc::clone(state),
            html: el.inner_html(),
            text: el.text().collect::<String>().trim().to_string(),
            attrs,
            options,
            label,
        })
    }

    struct FixtureElement {
        state: Rc<RefCell<FixtureState>>,
        html: String,
        text: String,
        attrs: HashMap<String, String>,
        options: Vec<String>,
        label: Option<String>,
    }

    impl FixtureElement {
        fn identity(&self) -> String {
            self.attrs
                .get("name")
                .or_else(|| self.attrs.get("id"))
                .cloned()
                .unwrap_or_else(|| self.text.clone())
        }
    }

    impl Element for FixtureElement {
        fn text(&self) -> Result<String> {
            Ok(self.text.clone())
        }

        fn attr(&self, name: &str) -> Result<Option<String>> {
            Ok(self.attrs.get(name).cloned())
        }

        fn click(&self) -> Result<()> {
            let mut state = self.state.borrow_mut();
            state.clicks.push(self.identity());
            if let Some(goto) = self.attrs.get("data-goto").and_then(|v| v.parse().ok()) {
                state.page = goto;
                state.scroll_calls = 0;
            }
            Ok(())
        }

        fn fill(&self, value: &str) -> Result<()> {
            self.state
                .borrow_mut()
                .fills
                .push((self.identity(), value.to_string()));
            Ok(())
        }

        fn options(&self) -> Result<Vec<String>> {
            Ok(self.options.clone())
        }

        fn select_option(&self, index: usize) -> Result<()> {
            self.state
                .borrow_mut()
                .selections
                .push((self.identity(), index));
            Ok(())
        }

        fn enclosing_label(&self) -> Result<Option<String>> {
            Ok(self.label.clone())
        }

        fn scroll_height(&self) -> Result<i64> {
            let state = self.state.borrow();
            let index = state.scroll_calls.min(state.extents.len().saturating_sub(1));
            Ok(state.extents.get(index).copied().unwrap_or(0))
        }

        fn scroll_to_bottom(&self) -> Result<()> {
            self.state.borrow_mut().scroll_calls += 1;
            Ok(())
        }

        fn find(&self, css: &str) -> Result<Option<Box<dyn Element>>> {
            Ok(self.find_all(css)?.into_iter().next())
        }

        fn find_all(&self, css: &str) -> Result<Vec<Box<dyn Element>>> {
            let selector = parse_selector(css)?;
            let fragment = Html::parse_fragment(&self.html);
            Ok(fragment
                .select(&selector)
                .map(|el| capture(&self.state, el))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture::StaticSession;

    #[test]
    fn test_default_selectors_cover_all_concepts() {
        let selectors = Selectors::default();
        assert!(!selectors.listing_card.is_empty());
        assert!(!selectors.quick_apply_button.is_empty());
        assert!(!selectors.submit_controls.is_empty());
        assert!(!selectors.continue_controls.is_empty());
    }

    #[test]
    fn test_fixture_query_and_attrs() {
        let session = StaticSession::new(&[r#"<div class="card" data-job-id="42"><a href="/jobs/view/42">Title</a></div>"#]);
        let card = session.query_selector(".card").unwrap().unwrap();
        assert_eq!(card.attr("data-job-id").unwrap().as_deref(), Some("42"));
        let link = card.find("a").unwrap().unwrap();
        assert_eq!(link.text().unwrap(), "Title");
        assert!(session.query_selector(".missing").unwrap().is_none());
    }

    #[test]
    fn test_fixture_click_advances_page() {
        let mut session = StaticSession::new(&[
            r#"<button id="go" data-goto="1">Next</button>"#,
            r#"<p class="done">done</p>"#,
        ]);
        session.navigate("http://example.test").unwrap();
        session.query_selector("#go").unwrap().unwrap().click().unwrap();
        assert!(session.query_selector(".done").unwrap().is_some());
        assert_eq!(session.clicks(), vec!["go"]);
    }

    #[test]
    fn test_fixture_enclosing_label() {
        let session =
            StaticSession::new(&[r#"<label>Years of experience<input name="years"></label>"#]);
        let input = session.query_selector("input").unwrap().unwrap();
        assert_eq!(
            input.enclosing_label().unwrap().as_deref(),
            Some("Years of experience")
        );
    }

    #[test]
    fn test_find_first_tries_selectors_in_order() {
        let session = StaticSession::new(&[r#"<button class="b">B</button>"#]);
        let found = find_first(
            &session,
            &["button.a".to_string(), "button.b".to_string()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.text().unwrap(), "B");
    }
}
