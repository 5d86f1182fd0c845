//! Review harvesting.
//!
//! Reviews are spread over several pages behind a "next" control. [`ReviewHarvester`] walks them
//! as a small state machine:
//!
//! ```text
//! Loading -> Extracting -> Deduping -> CheckNext -> Paginating -> Loading
//!                                          |             |
//!                                          +--> Done <---+
//! ```
//!
//! Every way out of the loop is reported as a [`Completion`], so the caller can tell a natural end
//! from a page ceiling or a control that stopped responding.

use super::{
    ScrapeOpts,
    card::{cards, holds_match, is_within},
    dedup::{DedupKey, DedupStore},
};
use crate::{
    field::{extract, first_text_where, locate_first},
    models::Review,
    session::{NodePath, Session, SessionError},
    sites::Profile,
    util::{element_text, sel},
    wait::{Waited, settle_scroll},
};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::fmt::Display;
use tracing::{debug, info, trace, warn};
use url::Url;

lazy_static! {
    static ref SEL_ICON_TITLE: Selector = sel("svg title");
}

/// Why harvesting stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The last page has no next control
    NoNextControl,
    /// The next control is there, but hidden or disabled
    NextControlInactive,
    /// Clicking next did nothing, or could not be done at all
    Stalled,
    /// Gave up after this many page transitions
    ForcedStop { max_pages: usize },
}

impl Completion {
    /// True if we ran out of pages, rather than stopping early
    pub fn is_natural(&self) -> bool {
        matches!(self, Self::NoNextControl | Self::NextControlInactive)
    }
}

impl Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NoNextControl => write!(f, "no next control"),
            Self::NextControlInactive => write!(f, "next control inactive"),
            Self::Stalled => write!(f, "stalled"),
            Self::ForcedStop { max_pages } => write!(f, "forced stop after {max_pages} pages"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvest {
    /// Unique reviews in the order they were first seen
    pub reviews: Vec<Review>,
    /// Number of review pages extracted
    pub pages: usize,
    pub completion: Completion,
}

/// Number of review cards in a snapshot
pub fn count_reviews(html: &Html, profile: &Profile) -> usize {
    locate_first(html.root_element(), &profile.reviewer_name).len()
}

/// All reviews in a snapshot, in page order.
///
/// Every reviewer name marks one review. Rating and comment are only looked for inside that
/// review's card, so a review missing a field can't shift the others out of place.
pub fn parse_reviews(html: &Html, profile: &Profile) -> Vec<Review> {
    let anchors = locate_first(html.root_element(), &profile.reviewer_name);
    let scoped = cards(&anchors, |c, a| {
        holds_match(c, a, &profile.review_rating) || holds_match(c, a, &profile.review_comment)
    });
    anchors
        .iter()
        .zip(scoped)
        .filter_map(|(anchor, card)| {
            let name = element_text(anchor);
            if name.is_empty() {
                trace!("Skipping review without reviewer name");
                return None;
            }
            let Some(card) = card else {
                trace!(reviewer = %name, "No card found for review");
                return Some(Review::new(&name, "", ""));
            };
            let rating = extract(card, &profile.review_rating);
            let comment = first_text_where(card, &profile.review_comment, |n, t| {
                !t.is_empty() && !is_within(n, anchor)
            })
            .unwrap_or_default();
            Some(Review::new(&name, &rating, &comment))
        })
        .collect()
}

/// The reviews on screen, by identity and in page order. Two snapshots with the same surface show
/// the same review page, whatever else changed around it.
fn surface(html: &Html, profile: &Profile) -> Vec<DedupKey> {
    parse_reviews(html, profile)
        .iter()
        .map(DedupKey::from)
        .collect()
}

/// The clickable element wrapping the "next" icon, if the page has one
pub fn find_next_control(html: &Html, profile: &Profile) -> Option<NodePath> {
    html.select(&SEL_ICON_TITLE)
        .filter(|t| element_text(t).contains(profile.next_icon_title))
        .find_map(|t| {
            t.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| profile.actionable_tags.contains(&a.value().name()))
        })
        .map(|e| NodePath::of(&e))
}

enum State {
    /// Get a review page on screen. Navigates when there's no previous page to compare with,
    /// otherwise waits for the reviews on screen to move on from `previous`.
    Loading { previous: Option<Vec<DedupKey>> },
    Extracting(String),
    Deduping(Vec<Review>),
    CheckNext,
    Paginating(NodePath),
    Done(Completion),
}

pub struct ReviewHarvester<'a, S> {
    session: &'a mut S,
    profile: &'a Profile,
    opts: &'a ScrapeOpts,
}

impl<'a, S: Session> ReviewHarvester<'a, S> {
    pub fn new(session: &'a mut S, profile: &'a Profile, opts: &'a ScrapeOpts) -> Self {
        Self {
            session,
            profile,
            opts,
        }
    }

    /// Collect the reviews from all pages starting at `url`.
    /// Only session failures are errors, an empty or broken review page just ends the harvest.
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn harvest(self, url: &Url) -> Result<Harvest, SessionError> {
        let Self {
            session,
            profile,
            opts,
        } = self;
        let load = opts.load_wait();
        let settle = opts.settle_wait();

        let mut store = DedupStore::new();
        let mut reviews = Vec::new();
        let mut pages = 0;
        let mut transitions = 0;
        let mut state = State::Loading { previous: None };

        let completion = loop {
            state = match state {
                State::Loading { previous } => {
                    match previous {
                        None => session.navigate(url).await?,
                        Some(previous) => match load
                            .until_changed(session, &previous, |h| surface(h, profile))
                            .await?
                        {
                            Waited::Ready(_) => transitions += 1,
                            Waited::TimedOut => {
                                warn!(page = pages, "Review page did not change after click");
                                state = State::Done(Completion::Stalled);
                                continue;
                            }
                        },
                    }
                    let rendered = load
                        .until_content(session, |h| (count_reviews(h, profile) > 0).then_some(()))
                        .await?;
                    if !rendered.is_ready() {
                        debug!(page = pages + 1, "No reviews rendered on page");
                    }
                    settle_scroll(
                        session,
                        opts.scroll_step,
                        opts.max_review_scrolls,
                        &settle,
                        |h| count_reviews(h, profile),
                    )
                    .await?;
                    State::Extracting(session.content().await?)
                }
                State::Extracting(content) => {
                    pages += 1;
                    State::Deduping(parse_reviews(&Html::parse_document(&content), profile))
                }
                State::Deduping(found) => {
                    let total = found.len();
                    let added = store.absorb(found, &mut reviews);
                    debug!(page = pages, found = total, added, "Extracted reviews");
                    State::CheckNext
                }
                State::CheckNext => {
                    session.scroll_to_bottom().await?;
                    match settle
                        .until_content(session, |h| find_next_control(h, profile))
                        .await?
                    {
                        Waited::TimedOut => State::Done(Completion::NoNextControl),
                        Waited::Ready(node) => {
                            if !is_active(session, &node).await? {
                                State::Done(Completion::NextControlInactive)
                            } else if transitions >= opts.max_pages {
                                State::Done(Completion::ForcedStop {
                                    max_pages: opts.max_pages,
                                })
                            } else {
                                State::Paginating(node)
                            }
                        }
                    }
                }
                State::Paginating(node) => {
                    if let Err(e) = session.scroll_into_view(&node).await {
                        debug!(err = %e, node = %node, "Could not scroll next control into view");
                    }
                    let content = session.content().await?;
                    let previous = surface(&Html::parse_document(&content), profile);
                    match click(session, &node).await {
                        Ok(()) => State::Loading {
                            previous: Some(previous),
                        },
                        Err(e) => {
                            warn!(err = %e, node = %node, "Could not click next control");
                            State::Done(Completion::Stalled)
                        }
                    }
                }
                State::Done(completion) => break completion,
            };
        };

        info!(
            pages,
            reviews = reviews.len(),
            completion = %completion,
            "Review harvest done"
        );
        Ok(Harvest {
            reviews,
            pages,
            completion,
        })
    }
}

/// Displayed and enabled. A control that vanished in between counts as inactive.
async fn is_active<S: Session>(session: &mut S, node: &NodePath) -> Result<bool, SessionError> {
    let active = async {
        Ok::<_, SessionError>(session.is_displayed(node).await? && session.is_enabled(node).await?)
    };
    match active.await {
        Err(SessionError::NodeNotFound(_)) => Ok(false),
        other => other,
    }
}

/// Click like a user, and if something is in the way, dispatch the click on the node itself
async fn click<S: Session>(session: &mut S, node: &NodePath) -> Result<(), SessionError> {
    match session.click(node).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(err = %e, node = %node, "Direct click failed, forcing it");
            session.force_click(node).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::scripted::{ScriptedPage, ScriptedSession};
    use crate::sites::zomato;

    const URL: &str = "https://a.test/kongu/reviews";
    const NEXT: &str = r##"<nav><a href="#"><svg><title>chevron-right</title></svg></a></nav>"##;

    fn review(name: &str, rating: &str, comment: &str) -> String {
        format!(
            r#"<div class="review"><a href="/users/{name}">{name}</a><div class="sc-1q7bklc-10">{rating}</div><p>{comment}</p></div>"#
        )
    }

    fn page(reviews: &[(&str, &str, &str)], next: bool) -> ScriptedPage {
        let cards: String = reviews.iter().map(|(n, r, c)| review(n, r, c)).collect();
        let nav = if next { NEXT } else { "" };
        ScriptedPage::new(&format!("<section>{cards}</section>{nav}"))
    }

    fn opts() -> ScrapeOpts {
        ScrapeOpts {
            max_pages: 10,
            ..Default::default()
        }
    }

    async fn harvest(session: &mut ScriptedSession, opts: &ScrapeOpts) -> Harvest {
        ReviewHarvester::new(session, zomato::profile(), opts)
            .harvest(&Url::parse(URL).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn reviews_are_scoped_to_their_card() {
        let html = Html::parse_document(&format!(
            r#"<html><body><section>{}<div class="review"><a href="/users/ravi">Ravi</a><p>No rating given</p></div>{}</section></body></html>"#,
            review("anu", "5", "Great parotta"),
            review("kala", "3", "Too oily"),
        ));
        let reviews = parse_reviews(&html, zomato::profile());
        assert_eq!(
            vec![
                Review::new("anu", "5", "Great parotta"),
                Review::new("Ravi", "", "No rating given"),
                Review::new("kala", "3", "Too oily"),
            ],
            reviews
        );
    }

    #[test]
    fn lone_review_ignores_page_text() {
        let html = Html::parse_document(&format!(
            r#"<html><body><div id="root"><header><p>Kongu Parota Stall reviews</p></header><section>{}</section></div></body></html>"#,
            review("anu", "5", "Great parotta"),
        ));
        assert_eq!(
            vec![Review::new("anu", "5", "Great parotta")],
            parse_reviews(&html, zomato::profile())
        );
    }

    #[test]
    fn next_control_is_the_clickable_ancestor() {
        let html = Html::parse_document(&format!(
            r#"<html><body><button><svg><title>chevron-left</title></svg></button>{NEXT}</body></html>"#
        ));
        let node = find_next_control(&html, zomato::profile()).unwrap();
        assert_eq!("a", node.resolve(&html).unwrap().value().name());

        let html = Html::parse_document(
            "<html><body><div><svg><title>chevron-right</title></svg></div></body></html>",
        );
        assert_eq!(None, find_next_control(&html, zomato::profile()));
    }

    #[tokio::test(start_paused = true)]
    async fn follows_next_until_it_is_gone() {
        let mut s = ScriptedSession::new().with_pages(
            URL,
            vec![
                page(&[("anu", "5", "Great")], true),
                page(&[("ravi", "4", "Good")], true),
                page(&[("kala", "3", "Fine")], false),
            ],
        );
        let h = harvest(&mut s, &opts()).await;
        assert_eq!(3, h.pages);
        assert_eq!(Completion::NoNextControl, h.completion);
        assert!(h.completion.is_natural());
        assert_eq!(3, h.reviews.len());
        assert_eq!(2, s.stats().clicks);
        assert_eq!(vec![URL.to_string()], s.stats().navigations);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicates_across_pages_are_dropped() {
        let mut s = ScriptedSession::new().with_pages(
            URL,
            vec![
                page(&[("anu", "5", "Great"), ("ravi", "4", "Good")], true),
                page(&[("ravi", "2", "Good"), ("kala", "3", "Fine")], false),
            ],
        );
        let h = harvest(&mut s, &opts()).await;
        let names: Vec<&str> = h.reviews.iter().map(|r| r.reviewer_name.as_str()).collect();
        assert_eq!(vec!["anu", "ravi", "kala"], names);
        assert_eq!("4", h.reviews[1].rating_text);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_page_ceiling() {
        let pages = (0..5)
            .map(|i| {
                let name = format!("user{i}");
                page(&[(name.as_str(), "5", "Same again")], true)
            })
            .collect();
        let mut s = ScriptedSession::new().with_pages(URL, pages);
        let opts = ScrapeOpts {
            max_pages: 2,
            ..Default::default()
        };
        let h = harvest(&mut s, &opts).await;
        assert_eq!(Completion::ForcedStop { max_pages: 2 }, h.completion);
        assert!(!h.completion.is_natural());
        assert_eq!(2, s.stats().clicks);
        assert_eq!(3, h.pages);
        assert_eq!(3, h.reviews.len());
    }

    #[tokio::test(start_paused = true)]
    async fn intercepted_click_is_forced() {
        let mut s = ScriptedSession::new()
            .with_pages(
                URL,
                vec![
                    page(&[("anu", "5", "Great")], true),
                    page(&[("ravi", "4", "Good")], false),
                ],
            )
            .intercepting_clicks();
        let h = harvest(&mut s, &opts()).await;
        assert_eq!(2, h.pages);
        assert_eq!(Completion::NoNextControl, h.completion);
        assert_eq!(1, s.stats().clicks);
        assert_eq!(1, s.stats().forced_clicks);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_next_control_ends_harvest() {
        let body = format!(
            r#"<section>{}</section><button disabled><svg><title>chevron-right</title></svg></button>"#,
            review("anu", "5", "Great")
        );
        let mut s = ScriptedSession::new().with_page(URL, ScriptedPage::new(&body));
        let h = harvest(&mut s, &opts()).await;
        assert_eq!(Completion::NextControlInactive, h.completion);
        assert_eq!(1, h.pages);
        assert_eq!(0, s.stats().clicks);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_next_control_ends_harvest() {
        let body = format!(
            r##"<section>{}</section><div style="display: none"><a href="#"><svg><title>chevron-right</title></svg></a></div>"##,
            review("anu", "5", "Great")
        );
        let mut s = ScriptedSession::new().with_page(URL, ScriptedPage::new(&body));
        let h = harvest(&mut s, &opts()).await;
        assert_eq!(Completion::NextControlInactive, h.completion);
        assert_eq!(1, h.pages);
        assert_eq!(0, s.stats().clicks);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_page_after_click_stalls() {
        // clicking on the last scripted page leaves it as it is
        let mut s = ScriptedSession::new().with_page(URL, page(&[("anu", "5", "Great")], true));
        let h = harvest(&mut s, &opts()).await;
        assert_eq!(Completion::Stalled, h.completion);
        assert_eq!(1, h.pages);
        assert_eq!(1, h.reviews.len());
    }

    /// Renders a fresh relative timestamp on every read, and ignores clicks
    struct Ticking {
        inner: ScriptedSession,
        ticks: usize,
        clicks: usize,
    }

    impl Session for Ticking {
        async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
            self.inner.navigate(url).await
        }

        async fn content(&mut self) -> Result<String, SessionError> {
            self.ticks += 1;
            let html = self.inner.content().await?;
            Ok(html.replace(
                "</body>",
                &format!("<time>{} minutes ago</time></body>", self.ticks),
            ))
        }

        async fn scroll_by(&mut self, dy: i64) -> Result<(), SessionError> {
            self.inner.scroll_by(dy).await
        }

        async fn scroll_to(&mut self, y: i64) -> Result<(), SessionError> {
            self.inner.scroll_to(y).await
        }

        async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
            self.inner.scroll_to_bottom().await
        }

        async fn scroll_into_view(&mut self, node: &NodePath) -> Result<(), SessionError> {
            self.inner.scroll_into_view(node).await
        }

        async fn click(&mut self, _node: &NodePath) -> Result<(), SessionError> {
            self.clicks += 1;
            Ok(())
        }

        async fn force_click(&mut self, _node: &NodePath) -> Result<(), SessionError> {
            Ok(())
        }

        async fn is_displayed(&mut self, node: &NodePath) -> Result<bool, SessionError> {
            self.inner.is_displayed(node).await
        }

        async fn is_enabled(&mut self, node: &NodePath) -> Result<bool, SessionError> {
            self.inner.is_enabled(node).await
        }

        async fn remove_all(&mut self, selector: &str) -> Result<usize, SessionError> {
            self.inner.remove_all(selector).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn page_noise_is_not_a_page_turn() {
        let mut s = Ticking {
            inner: ScriptedSession::new().with_pages(
                URL,
                vec![
                    page(&[("anu", "5", "Great")], true),
                    page(&[("ravi", "4", "Good")], false),
                ],
            ),
            ticks: 0,
            clicks: 0,
        };
        let opts = opts();
        let h = ReviewHarvester::new(&mut s, zomato::profile(), &opts)
            .harvest(&Url::parse(URL).unwrap())
            .await
            .unwrap();
        assert_eq!(Completion::Stalled, h.completion);
        assert_eq!(1, h.pages);
        assert_eq!(vec![Review::new("anu", "5", "Great")], h.reviews);
        assert_eq!(1, s.clicks);
    }

    #[tokio::test(start_paused = true)]
    async fn page_without_reviews() {
        let mut s = ScriptedSession::new().with_page(URL, ScriptedPage::new("<p>No reviews yet</p>"));
        let h = harvest(&mut s, &opts()).await;
        assert!(h.reviews.is_empty());
        assert_eq!(1, h.pages);
        assert_eq!(Completion::NoNextControl, h.completion);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_is_an_error() {
        let mut s = ScriptedSession::new().failing_on(URL);
        let res = ReviewHarvester::new(&mut s, zomato::profile(), &opts())
            .harvest(&Url::parse(URL).unwrap())
            .await;
        assert!(matches!(res, Err(SessionError::Navigation { .. })));
    }
}
