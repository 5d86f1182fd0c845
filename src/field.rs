//! Best-effort field lookup.
//!
//! A logical field (a restaurant name, a price, a reviewer) is described by an ordered chain of
//! strategies. Each strategy is tried in turn, and the first one that finds a node with some text
//! wins. Markup on the sites we scrape is unreliable, so failing to find a field is not an error:
//! the caller gets the default and carries on.

use crate::util::{element_text, first_line, sel};
use scraper::{ElementRef, Selector};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMode {
    /// All text below the node, whitespace collapsed
    #[default]
    Full,
    /// Only the first non-blank text fragment
    FirstLine,
}

/// A rule for locating the nodes of one field inside a scope
pub trait Locate {
    fn name(&self) -> &str;

    /// All matching nodes below `scope`, in document order
    fn locate<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>>;

    /// The text a matching node contributes to the field
    fn read(&self, node: &ElementRef) -> String {
        element_text(node)
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    name: &'static str,
    selector: Selector,
    mode: TextMode,
}

impl Strategy {
    /// A CSS strategy. The selector must be valid, these are all written by hand.
    pub fn css(name: &'static str, selector: &str) -> Self {
        Self {
            name,
            selector: sel(selector),
            mode: TextMode::Full,
        }
    }

    pub fn first_line(mut self) -> Self {
        self.mode = TextMode::FirstLine;
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl Locate for Strategy {
    fn name(&self) -> &str {
        self.name
    }

    fn locate<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        scope.select(&self.selector).collect()
    }

    fn read(&self, node: &ElementRef) -> String {
        match self.mode {
            TextMode::Full => element_text(node),
            TextMode::FirstLine => first_line(node),
        }
    }
}

/// Text of the first node with non-empty text, from the first strategy that has one.
/// Strategies after the winning one are never consulted.
pub fn first_text<L: Locate>(scope: ElementRef, chain: &[L]) -> Option<String> {
    first_text_where(scope, chain, |_, t| !t.is_empty())
}

/// Like [`first_text`], but a node only counts if `accept` approves of it and its text
pub fn first_text_where<L, F>(scope: ElementRef, chain: &[L], accept: F) -> Option<String>
where
    L: Locate,
    F: Fn(&ElementRef, &str) -> bool,
{
    chain.iter().find_map(|s| {
        let found = s.locate(scope).into_iter().find_map(|n| {
            let t = s.read(&n);
            accept(&n, &t).then_some(t)
        });
        if let Some(t) = &found {
            trace!(strategy = s.name(), value = %t, "Field strategy matched");
        }
        found
    })
}

/// Like [`first_text`], falling back to `default`
pub fn extract_or<L: Locate>(scope: ElementRef, chain: &[L], default: &str) -> String {
    first_text(scope, chain).unwrap_or_else(|| default.into())
}

/// Like [`first_text`], falling back to an empty string
pub fn extract<L: Locate>(scope: ElementRef, chain: &[L]) -> String {
    extract_or(scope, chain, "")
}

/// All nodes of the first strategy that matches anything at all.
/// Used for collecting candidates, where emptiness is judged later by the caller.
pub fn locate_first<'a, L: Locate>(scope: ElementRef<'a>, chain: &[L]) -> Vec<ElementRef<'a>> {
    for s in chain {
        let nodes = s.locate(scope);
        if !nodes.is_empty() {
            trace!(strategy = s.name(), count = nodes.len(), "Node strategy matched");
            return nodes;
        }
    }
    Vec::new()
}
