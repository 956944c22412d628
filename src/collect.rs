use anyhow::Result;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

use crate::db::Database;
use crate::models::Listing;
use crate::session::{Element, Selectors, Session};

pub const BASE_PLATFORM_URL: &str = "https://www.linkedin.com/jobs/";
pub const MAX_SCROLL_ATTEMPTS: usize = 12;
const CONTAINER_WAIT: Duration = Duration::from_secs(10);

/// Pacing between navigations. The jittered delay is an anti-detection control,
/// on by default; tests must opt out explicitly with `Pacing::none()`.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub between_urls_ms: Option<(u64, u64)>,
    pub settle_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_urls_ms: Some((2000, 7000)),
            settle_ms: 1500,
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            between_urls_ms: None,
            settle_ms: 0,
        }
    }

    fn pause_between_urls(&self) {
        if let Some((min_ms, max_ms)) = self.between_urls_ms {
            let duration = rand::thread_rng().gen_range(min_ms..=max_ms);
            std::thread::sleep(Duration::from_millis(duration));
        }
    }

    fn settle(&self) {
        if self.settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.settle_ms));
        }
    }
}

pub struct ListingCollector<'a> {
    selectors: &'a Selectors,
    pacing: Pacing,
    max_scroll_attempts: usize,
    seen: HashSet<String>,
}

impl<'a> ListingCollector<'a> {
    pub fn new(selectors: &'a Selectors, pacing: Pacing) -> Self {
        Self {
            selectors,
            pacing,
            max_scroll_attempts: MAX_SCROLL_ATTEMPTS,
            seen: HashSet::new(),
        }
    }

    /// Walk up to `max_urls` search pages, scroll each result list until its
    /// extent settles, and extract one Listing per rendered card. Listings whose
    /// id was already seen this run are dropped; new ones are persisted when a
    /// database handle is supplied.
    pub fn collect(
        &mut self,
        session: &mut dyn Session,
        urls: &[String],
        max_urls: usize,
        db: Option<&Database>,
    ) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        let total = urls.len().min(max_urls);

        for (i, url) in urls.iter().take(max_urls).enumerate() {
            if i > 0 {
                self.pacing.pause_between_urls();
            }

            println!("Navigating to search page {} of {}", i + 1, total);
            session.navigate(url)?;
            self.pacing.settle();

            if !session
                .wait_for(&self.selectors.results_container, CONTAINER_WAIT)?
            {
                eprintln!("  Results container never appeared, skipping this search");
                continue;
            }

            self.scroll_until_settled(session)?;

            let cards = session.query_selector_all(&self.selectors.listing_card)?;
            println!("  {} card(s) rendered", cards.len());

            for card in cards {
                let listing = self.extract_card(card.as_ref());
                if listing.id.is_empty() {
                    // No identity means no dedup; drop the card.
                    continue;
                }
                if !self.seen.insert(listing.id.clone()) {
                    continue;
                }
                if let Some(db) = db {
                    db.insert_listing(&listing)?;
                }
                listings.push(listing);
            }
        }

        Ok(listings)
    }

    // Scroll the results container until its content extent stops growing
    // between two consecutive scrolls, or the attempt cap is hit.
    fn scroll_until_settled(&self, session: &dyn Session) -> Result<()> {
        let Some(container) = session.query_selector(&self.selectors.results_container)? else {
            return Ok(());
        };
        let Ok(mut last_extent) = container.scroll_height() else {
            return Ok(());
        };

        for _ in 0..self.max_scroll_attempts {
            container.scroll_to_bottom()?;
            self.pacing.settle();
            let Ok(extent) = container.scroll_height() else {
                break;
            };
            if extent <= last_extent {
                break;
            }
            last_extent = extent;
        }
        Ok(())
    }

    // Per-field lookups degrade to an empty string; a broken field never drops
    // the whole card.
    fn extract_card(&self, card: &dyn Element) -> Listing {
        let id = card
            .attr(&self.selectors.listing_id_attr)
            .ok()
            .flatten()
            .unwrap_or_default();

        let (title, url) = match card.find(&self.selectors.listing_title_link).ok().flatten() {
            Some(link) => {
                let title = link.text().map(|t| t.trim().to_string()).unwrap_or_default();
                let href = link.attr("href").ok().flatten().unwrap_or_default();
                (title, absolutize(&href))
            }
            None => (String::new(), String::new()),
        };

        let company = text_of(card, &self.selectors.listing_company);
        let location = text_of(card, &self.selectors.listing_location);
        let benefits = text_of(card, &self.selectors.listing_benefits);

        let tags = card
            .find_all(&self.selectors.listing_footer_tags)
            .unwrap_or_default()
            .iter()
            .filter_map(|tag| tag.text().ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Listing {
            id,
            title,
            company,
            location,
            benefits,
            tags,
            url,
        }
    }
}

fn text_of(card: &dyn Element, css: &str) -> String {
    card.find(css)
        .ok()
        .flatten()
        .and_then(|el| el.text().ok())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

// Card links are usually relative; join them against the platform base URL.
fn absolutize(href: &str) -> String {
    if href.starts_with('/') {
        if let Ok(joined) = url::Url::parse(BASE_PLATFORM_URL).and_then(|base| base.join(href)) {
            return joined.to_string();
        }
    }
    href.to_string()
}
