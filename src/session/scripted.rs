//! An in-memory [`Session`] that plays back canned HTML.
//!
//! Each scripted URL has a list of pages. Clicking anything on a page moves on to the next page of
//! the same URL, which is how a paginated review surface behaves. A page is made of chunks; only
//! the first chunk is rendered after a page load, and every scroll step reveals one more, which is
//! enough to exercise the lazy-loading and scroll-settling logic without a browser.

use super::{NodePath, Session, SessionError};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    chunks: Vec<String>,
}

impl ScriptedPage {
    /// A page that renders everything at once
    pub fn new(body: &str) -> Self {
        Self {
            chunks: vec![body.into()],
        }
    }

    /// A page where each chunk only shows up after one more scroll step
    pub fn lazy<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the engine did to the session, for assertions in tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub navigations: Vec<String>,
    pub clicks: usize,
    pub forced_clicks: usize,
    pub scrolls: usize,
}

#[derive(Debug, Clone)]
struct Cursor {
    url: String,
    page: usize,
    revealed: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedSession {
    sites: HashMap<String, Vec<ScriptedPage>>,
    failing: HashSet<String>,
    intercept_clicks: bool,
    current: Option<Cursor>,
    /// Nodes taken out of the current page, by selector
    removed: Vec<Selector>,
    stats: Stats,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_page(self, url: &str, page: ScriptedPage) -> Self {
        self.with_pages(url, vec![page])
    }

    pub fn with_pages(mut self, url: &str, pages: Vec<ScriptedPage>) -> Self {
        self.sites.insert(normalize(url), pages);
        self
    }

    /// Make navigation to the given URL fail
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(normalize(url));
        self
    }

    /// Make every direct click fail as if another element was on top
    pub fn intercepting_clicks(mut self) -> Self {
        self.intercept_clicks = true;
        self
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    fn render(&self) -> String {
        let body = match &self.current {
            None => String::new(),
            Some(c) => self.sites[&c.url][c.page].chunks[..c.revealed].concat(),
        };
        let page = format!("<html><head></head><body>{body}</body></html>");
        if self.removed.is_empty() {
            return page;
        }
        let mut html = Html::parse_document(&page);
        let ids: Vec<_> = self
            .removed
            .iter()
            .flat_map(|s| html.select(s).map(|e| e.id()))
            .collect();
        for id in ids {
            if let Some(mut node) = html.tree.get_mut(id) {
                node.detach();
            }
        }
        html.root_element().html()
    }

    fn reveal(&mut self, all: bool) {
        self.stats.scrolls += 1;
        if let Some(c) = self.current.as_mut() {
            let total = self.sites[&c.url][c.page].chunks.len();
            c.revealed = if all { total } else { (c.revealed + 1).min(total) };
        }
    }

    fn require(&self, node: &NodePath) -> Result<Html, SessionError> {
        let html = Html::parse_document(&self.render());
        match node.resolve(&html) {
            Some(_) => Ok(html),
            None => Err(SessionError::NodeNotFound(node.clone())),
        }
    }

    fn activate(&mut self, node: &NodePath) -> Result<(), SessionError> {
        self.require(node)?;
        if let Some(c) = self.current.as_mut() {
            let pages = self.sites[&c.url].len();
            if c.page + 1 < pages {
                c.page += 1;
                c.revealed = 1.min(self.sites[&c.url][c.page].chunks.len());
            }
        }
        Ok(())
    }
}

fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => u.into(),
        Err(_) => url.into(),
    }
}

fn is_hidden(e: &ElementRef) -> bool {
    let hidden = |el: &ElementRef| {
        el.value().attr("hidden").is_some()
            || el
                .value()
                .attr("style")
                .map(|s| s.replace(' ', "").contains("display:none"))
                .unwrap_or(false)
    };
    hidden(e) || e.ancestors().filter_map(ElementRef::wrap).any(|a| hidden(&a))
}

impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
        let key = url.as_str().to_string();
        self.stats.navigations.push(key.clone());
        if self.failing.contains(&key) {
            return Err(SessionError::Navigation {
                url: key,
                reason: String::from("connection reset"),
            });
        }
        let pages = match self.sites.get(&key) {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(SessionError::Navigation {
                    url: key,
                    reason: String::from("not scripted"),
                });
            }
        };
        let revealed = 1.min(pages[0].chunks.len());
        self.removed.clear();
        self.current = Some(Cursor {
            url: key,
            page: 0,
            revealed,
        });
        Ok(())
    }

    async fn content(&mut self) -> Result<String, SessionError> {
        Ok(self.render())
    }

    async fn scroll_by(&mut self, _dy: i64) -> Result<(), SessionError> {
        self.reveal(false);
        Ok(())
    }

    async fn scroll_to(&mut self, _y: i64) -> Result<(), SessionError> {
        self.reveal(false);
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.reveal(true);
        Ok(())
    }

    async fn scroll_into_view(&mut self, node: &NodePath) -> Result<(), SessionError> {
        self.require(node).map(|_| ())
    }

    async fn click(&mut self, node: &NodePath) -> Result<(), SessionError> {
        self.stats.clicks += 1;
        if self.intercept_clicks {
            self.require(node)?;
            return Err(SessionError::ClickIntercepted(node.clone()));
        }
        self.activate(node)
    }

    async fn force_click(&mut self, node: &NodePath) -> Result<(), SessionError> {
        self.stats.forced_clicks += 1;
        self.activate(node)
    }

    async fn is_displayed(&mut self, node: &NodePath) -> Result<bool, SessionError> {
        let html = self.require(node)?;
        Ok(node.resolve(&html).map(|e| !is_hidden(&e)).unwrap_or(false))
    }

    async fn is_enabled(&mut self, node: &NodePath) -> Result<bool, SessionError> {
        let html = self.require(node)?;
        Ok(node
            .resolve(&html)
            .map(|e| {
                e.value().attr("disabled").is_none()
                    && e.value().attr("aria-disabled") != Some("true")
            })
            .unwrap_or(false))
    }

    async fn remove_all(&mut self, selector: &str) -> Result<usize, SessionError> {
        let parsed = Selector::parse(selector)
            .map_err(|_| SessionError::Backend(format!("invalid selector {selector}")))?;
        let count = Html::parse_document(&self.render())
            .select(&parsed)
            .count();
        // removed nodes stay gone until the next navigation, lazily revealed ones included
        self.removed.push(parsed);
        Ok(count)
    }
}
