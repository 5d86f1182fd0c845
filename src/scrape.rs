use crate::{
    field::{extract, first_text},
    models::RestaurantRecord,
    session::{Session, SessionError},
    sites::Profile,
    wait::{Wait, Waited, settle_scroll},
};
use reviews::{Completion, ReviewHarvester};
use scraper::Html;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub mod card;
pub mod dedup;
pub mod menu;
pub mod reviews;

/// Knobs for one restaurant scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOpts {
    /// How long to wait for a page to render something useful
    pub load_timeout: Duration,
    /// How long to wait for more content after a scroll, or for a control to show up
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
    /// Pixels per scroll step
    pub scroll_step: i64,
    pub max_menu_scrolls: usize,
    pub max_review_scrolls: usize,
    /// Max number of "next" clicks on the reviews
    pub max_pages: usize,
    /// Shorter menu item names are dropped
    pub min_name_len: usize,
    /// Remove modals and overlays from the order page before scrolling the menu
    pub clear_overlays: bool,
}

impl Default for ScrapeOpts {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(10),
            settle_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
            scroll_step: 800,
            max_menu_scrolls: 10,
            max_review_scrolls: 5,
            max_pages: 50,
            min_name_len: 2,
            clear_overlays: true,
        }
    }
}

impl ScrapeOpts {
    pub fn load_wait(&self) -> Wait {
        Wait::new(self.load_timeout, self.poll_interval)
    }

    pub fn settle_wait(&self) -> Wait {
        Wait::new(self.settle_timeout, self.poll_interval)
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("order page {url}: {source}")]
    OrderPage { url: Url, source: SessionError },
    #[error("order page {url} never showed a restaurant name")]
    NoHeader { url: Url },
    #[error("review page {url}: {source}")]
    ReviewPage { url: Url, source: SessionError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scraped {
    pub record: RestaurantRecord,
    /// Review pages visited
    pub pages: usize,
    pub completion: Completion,
}

/// Builds one [`RestaurantRecord`] from an order page and the reviews that go with it
pub struct RecordScraper<'a, S> {
    session: &'a mut S,
    profile: &'a Profile,
    opts: &'a ScrapeOpts,
}

impl<'a, S: Session> RecordScraper<'a, S> {
    pub fn new(session: &'a mut S, profile: &'a Profile, opts: &'a ScrapeOpts) -> Self {
        Self {
            session,
            profile,
            opts,
        }
    }

    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn scrape(&mut self, url: &Url) -> Result<Scraped, ScrapeError> {
        let profile = self.profile;
        let opts = self.opts;
        let order_err = |source| ScrapeError::OrderPage {
            url: url.clone(),
            source,
        };

        self.session.navigate(url).await.map_err(order_err)?;
        let header = opts
            .load_wait()
            .until_content(&mut *self.session, |h| {
                first_text(h.root_element(), &profile.restaurant_name)
            })
            .await
            .map_err(order_err)?;
        if let Waited::TimedOut = header {
            return Err(ScrapeError::NoHeader { url: url.clone() });
        }

        if opts.clear_overlays {
            match self.session.remove_all(profile.overlays).await {
                Ok(0) => {}
                Ok(n) => debug!(removed = n, "Removed overlays"),
                Err(e) => warn!(err = %e, "Could not remove overlays"),
            }
        }

        let candidates = settle_scroll(
            &mut *self.session,
            opts.scroll_step,
            opts.max_menu_scrolls,
            &opts.settle_wait(),
            |h| menu::count_candidates(h, profile),
        )
        .await
        .map_err(order_err)?;
        let content = self.session.content().await.map_err(order_err)?;

        // Html is not Send, so it stays in this scope and out of the awaits below
        let record = {
            let html = Html::parse_document(&content);
            let root = html.root_element();
            RestaurantRecord {
                name: extract(root, &profile.restaurant_name),
                address: extract(root, &profile.address),
                rating: extract(root, &profile.rating),
                rating_count: extract(root, &profile.rating_count),
                ..RestaurantRecord::new(url.as_str())
            }
            .with_menu(menu::parse_menu(&html, profile, opts.min_name_len))
        };
        info!(
            name = %record.name,
            candidates,
            menu_items = record.menu.len(),
            "Scraped order page"
        );

        let review_url = profile.review_url(url);
        let harvest = ReviewHarvester::new(&mut *self.session, profile, opts)
            .harvest(&review_url)
            .await
            .map_err(|source| ScrapeError::ReviewPage {
                url: review_url.clone(),
                source,
            })?;

        if !harvest.completion.is_natural() {
            warn!(
                name = %record.name,
                pages = harvest.pages,
                completion = %harvest.completion,
                "Reviews may be incomplete"
            );
        }
        info!(
            name = %record.name,
            menu_items = record.menu.len(),
            reviews = harvest.reviews.len(),
            pages = harvest.pages,
            completion = %harvest.completion,
            "Scraped restaurant"
        );

        Ok(Scraped {
            record: record.with_reviews(harvest.reviews),
            pages: harvest.pages,
            completion: harvest.completion,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{MenuItem, Review};
    use crate::session::scripted::{ScriptedPage, ScriptedSession};
    use crate::sites::zomato;

    pub const ORDER_PAGE: &str = r#"
        <section class="sc-fQejPQ"><h1>Kongu Parota Stall</h1>
            <div class="sc-clNaTc">Asokapuram, Erode<br>Open now</div>
            <div class="sc-1q7bklc-1 x">4.1</div>
            <div class="sc-1q7bklc-8 kEgyiI">1,204 Delivery Ratings</div>
        </section>
        <div class="menu">
            <div><h4>Kothu Parotta</h4><p>Shredded parotta with egg</p><span>₹120</span></div>
            <div><h4>Chicken 65</h4><span>₹180</span></div>
        </div>"#;

    pub fn review_card(name: &str, rating: &str, comment: &str) -> String {
        format!(
            r#"<div><a href="/users/{name}">{name}</a><div class="sc-1q7bklc-10">{rating}</div><p>{comment}</p></div>"#
        )
    }

    pub fn review_page(cards: &[(&str, &str, &str)], next: bool) -> ScriptedPage {
        let cards: String = cards.iter().map(|(n, r, c)| review_card(n, r, c)).collect();
        let nav = if next {
            r##"<a href="#"><svg><title>chevron-right</title></svg></a>"##
        } else {
            ""
        };
        ScriptedPage::new(&format!("<section>{cards}</section>{nav}"))
    }

    /// A restaurant with two menu items and three reviews over two pages, one of them repeated
    pub fn restaurant(session: ScriptedSession, base: &str) -> ScriptedSession {
        session
            .with_page(&format!("{base}/order"), ScriptedPage::new(ORDER_PAGE))
            .with_pages(
                &format!("{base}/reviews"),
                vec![
                    review_page(&[("anu", "5", "Great"), ("ravi", "4", "Good")], true),
                    review_page(&[("ravi", "4", "Good")], false),
                ],
            )
    }

    #[tokio::test(start_paused = true)]
    async fn builds_complete_record() {
        let mut s = restaurant(ScriptedSession::new(), "https://a.test");
        let opts = ScrapeOpts::default();
        let url = Url::parse("https://a.test/order").unwrap();
        let scraped = RecordScraper::new(&mut s, zomato::profile(), &opts)
            .scrape(&url)
            .await
            .unwrap();

        let r = scraped.record;
        assert_eq!("https://a.test/order", r.source_url);
        assert_eq!("Kongu Parota Stall", r.name);
        assert_eq!("Asokapuram, Erode", r.address);
        assert_eq!("4.1", r.rating);
        assert_eq!("1,204 Delivery Ratings", r.rating_count);
        assert_eq!(
            vec![
                MenuItem {
                    name: "Kothu Parotta".into(),
                    description: "Shredded parotta with egg".into(),
                    price: "₹120".into(),
                },
                MenuItem {
                    name: "Chicken 65".into(),
                    description: "".into(),
                    price: "₹180".into(),
                },
            ],
            r.menu
        );
        assert_eq!(
            vec![Review::new("anu", "5", "Great"), Review::new("ravi", "4", "Good")],
            r.reviews
        );
        assert_eq!(2, scraped.pages);
        assert_eq!(Completion::NoNextControl, scraped.completion);
        assert_eq!(
            vec!["https://a.test/order", "https://a.test/reviews"],
            s.stats().navigations
        );
    }

    async fn menu_names(opts: &ScrapeOpts) -> Vec<String> {
        let page = format!(
            r#"<div class="promo-modal"><h4>Sign in for ₹100 off</h4></div>{ORDER_PAGE}"#
        );
        let mut s = ScriptedSession::new()
            .with_page("https://e.test/order", ScriptedPage::new(&page))
            .with_page("https://e.test/reviews", review_page(&[], false));
        let url = Url::parse("https://e.test/order").unwrap();
        let scraped = RecordScraper::new(&mut s, zomato::profile(), opts)
            .scrape(&url)
            .await
            .unwrap();
        scraped.record.menu.into_iter().map(|m| m.name).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn overlays_are_removed_before_reading_the_menu() {
        assert_eq!(
            vec!["Kothu Parotta", "Chicken 65"],
            menu_names(&ScrapeOpts::default()).await
        );

        let keep = ScrapeOpts {
            clear_overlays: false,
            ..Default::default()
        };
        assert_eq!(
            vec!["Sign in for ₹100 off", "Kothu Parotta", "Chicken 65"],
            menu_names(&keep).await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn order_page_failure() {
        let mut s = ScriptedSession::new().failing_on("https://b.test/order");
        let opts = ScrapeOpts::default();
        let url = Url::parse("https://b.test/order").unwrap();
        let res = RecordScraper::new(&mut s, zomato::profile(), &opts)
            .scrape(&url)
            .await;
        assert!(matches!(res, Err(ScrapeError::OrderPage { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_header() {
        let mut s = ScriptedSession::new()
            .with_page("https://c.test/order", ScriptedPage::new("<p>Loading</p>"));
        let opts = ScrapeOpts::default();
        let url = Url::parse("https://c.test/order").unwrap();
        let res = RecordScraper::new(&mut s, zomato::profile(), &opts)
            .scrape(&url)
            .await;
        assert!(matches!(res, Err(ScrapeError::NoHeader { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn review_page_failure() {
        let mut s = ScriptedSession::new()
            .with_page("https://d.test/order", ScriptedPage::new(ORDER_PAGE))
            .failing_on("https://d.test/reviews");
        let opts = ScrapeOpts::default();
        let url = Url::parse("https://d.test/order").unwrap();
        let res = RecordScraper::new(&mut s, zomato::profile(), &opts)
            .scrape(&url)
            .await;
        match res {
            Err(ScrapeError::ReviewPage { url, .. }) => {
                assert_eq!("https://d.test/reviews", url.as_str())
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
