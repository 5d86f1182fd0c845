//! The browser collaborator.
//!
//! Everything in the extraction engine talks to the browser through [`Session`]. The engine only
//! ever reads the rendered DOM as a snapshot and addresses live nodes through [`NodePath`]s
//! computed from that snapshot, so a backend just has to be able to hand out HTML and act on CSS
//! paths.
//!
//! A session is borrowed mutably by whoever is using it. There is exactly one per batch run, and
//! the borrow checker makes sure only one restaurant touches it at a time.
//!
//! The trait uses plain `async fn`, so its futures carry no `Send` bound. The engine drives a
//! session from a single task and never spawns with one, so that is all it needs.

use scraper::{ElementRef, Html, Selector};
use std::fmt::Display;
use thiserror::Error;
use url::Url;

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod scripted;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("no node at {0}")]
    NodeNotFound(NodePath),
    #[error("click on {0} was intercepted")]
    ClickIntercepted(NodePath),
    #[error("browser error: {0}")]
    Backend(String),
}

/// Structural CSS path to one element, e.g. `html > body:nth-child(2) > a:nth-child(3)`.
///
/// Only tag names and sibling positions are used, since class names on the sites we scrape are
/// generated at build time and change without notice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(String);

impl NodePath {
    pub fn of(e: &ElementRef) -> Self {
        let mut parts = Vec::new();
        let mut cur = Some(*e);
        while let Some(el) = cur {
            let name = el.value().name();
            let parent = el.parent().and_then(ElementRef::wrap);
            match parent {
                None => parts.push(name.to_string()),
                Some(_) => {
                    let idx = el.prev_siblings().filter(|n| n.value().is_element()).count() + 1;
                    parts.push(format!("{name}:nth-child({idx})"));
                }
            }
            cur = parent;
        }
        parts.reverse();
        Self(parts.join(" > "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Find the element this path points at in a (possibly newer) snapshot
    pub fn resolve<'a>(&self, html: &'a Html) -> Option<ElementRef<'a>> {
        let selector = Selector::parse(&self.0).ok()?;
        html.select(&selector).next()
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[allow(async_fn_in_trait)]
pub trait Session {
    /// Load the given URL and return once the browser reports the navigation done
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError>;

    /// The current rendered DOM, serialized as HTML
    async fn content(&mut self) -> Result<String, SessionError>;

    async fn scroll_by(&mut self, dy: i64) -> Result<(), SessionError>;

    async fn scroll_to(&mut self, y: i64) -> Result<(), SessionError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;

    async fn scroll_into_view(&mut self, node: &NodePath) -> Result<(), SessionError>;

    /// Click like a user would. May fail if something else is on top of the node.
    async fn click(&mut self, node: &NodePath) -> Result<(), SessionError>;

    /// Click by dispatching the event on the node directly, bypassing hit testing
    async fn force_click(&mut self, node: &NodePath) -> Result<(), SessionError>;

    async fn is_displayed(&mut self, node: &NodePath) -> Result<bool, SessionError>;

    async fn is_enabled(&mut self, node: &NodePath) -> Result<bool, SessionError>;

    /// Take every node matching the CSS `selector` out of the page. Returns how many went.
    async fn remove_all(&mut self, selector: &str) -> Result<usize, SessionError>;
}
