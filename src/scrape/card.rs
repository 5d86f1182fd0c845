// Card resolution.
//
// A card is the subtree that holds exactly one menu item or review. We find it structurally,
// since class names are unstable: starting from the node that identifies the item (its anchor),
// walk up to the first ancestor that holds one of the item's fields. The walk never goes past an
// ancestor that also contains some other item's anchor, or past `<body>`.

use crate::field::Locate;
use scraper::ElementRef;
use std::collections::HashMap;

/// For every anchor, the smallest ancestor that holds a field of that item according to
/// `holds_field(container, anchor)`, and no other anchor.
/// `None` if no such ancestor exists below `<body>`.
pub fn cards<'a, F>(anchors: &[ElementRef<'a>], holds_field: F) -> Vec<Option<ElementRef<'a>>>
where
    F: Fn(&ElementRef<'a>, &ElementRef<'a>) -> bool,
{
    let mut counts = HashMap::new();
    for a in anchors {
        for ancestor in a.ancestors() {
            *counts.entry(ancestor.id()).or_insert(0usize) += 1;
        }
    }

    anchors
        .iter()
        .map(|a| {
            a.ancestors()
                .filter_map(ElementRef::wrap)
                .take_while(|e| {
                    !matches!(e.value().name(), "body" | "html") && counts.get(&e.id()) == Some(&1)
                })
                .find(|e| holds_field(e, a))
        })
        .collect()
}

/// True if any strategy in `chain` finds a node with text in `container`, outside `anchor`
pub fn holds_match<L: Locate>(container: &ElementRef, anchor: &ElementRef, chain: &[L]) -> bool {
    chain.iter().any(|s| {
        s.locate(*container)
            .iter()
            .any(|n| !is_within(n, anchor) && !s.read(n).is_empty())
    })
}

/// True if `node` is `anchor` or sits somewhere below it
pub fn is_within(node: &ElementRef, anchor: &ElementRef) -> bool {
    node.id() == anchor.id() || node.ancestors().any(|a| a.id() == anchor.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Strategy;
    use crate::util::sel;
    use scraper::Html;

    fn paragraphs() -> Vec<Strategy> {
        vec![Strategy::css("p", "p")]
    }

    fn resolve<'a>(html: &'a Html) -> Vec<Option<ElementRef<'a>>> {
        let chain = paragraphs();
        let anchors: Vec<_> = html.select(&sel("h4")).collect();
        cards(&anchors, |c, a| holds_match(c, a, &chain))
    }

    #[test]
    fn smallest_ancestor_holding_a_field() {
        let html = Html::parse_document(
            r#"<html><body><main><ul>
                <li class="card"><div class="head"><h4>One</h4></div><p>first</p></li>
                <li class="card"><div class="head"><h4>Two</h4></div><p>second</p></li>
            </ul></main></body></html>"#,
        );
        let cards = resolve(&html);
        assert_eq!(2, cards.len());
        for c in &cards {
            assert_eq!(Some("card"), c.unwrap().value().attr("class"));
        }
    }

    #[test]
    fn lone_anchor_stops_at_its_own_card() {
        let html = Html::parse_document(
            r#"<html><body><div id="root">
                <header><p>Kongu Parota Stall</p></header>
                <div class="menu"><div class="item"><h4>Only</h4><p>mine</p></div></div>
            </div></body></html>"#,
        );
        assert_eq!(Some("item"), resolve(&html)[0].unwrap().value().attr("class"));
    }

    #[test]
    fn no_card_without_a_field() {
        let html = Html::parse_document(
            "<html><body><main><section><h4>Only</h4></section></main></body></html>",
        );
        assert!(resolve(&html)[0].is_none());
    }

    #[test]
    fn no_card_for_siblings_sharing_a_parent() {
        let html = Html::parse_document(
            "<html><body><div><h4>One</h4><h4>Two</h4><p>x</p></div><h4>Three</h4><p>y</p></body></html>",
        );
        assert!(resolve(&html).iter().all(Option::is_none));
    }

    #[test]
    fn anchor_text_is_not_a_field() {
        let html = Html::parse_document(
            "<html><body><div><div class=\"a\"><h4><p>inside</p></h4></div><p>out</p></div></body></html>",
        );
        let card = resolve(&html)[0].unwrap();
        assert_eq!(None, card.value().attr("class"));
        assert_eq!("div", card.value().name());
    }

    #[test]
    fn within() {
        let html = Html::parse_document("<html><body><a><b>x</b></a><i>y</i></body></html>");
        let a = html.select(&sel("a")).next().unwrap();
        let b = html.select(&sel("b")).next().unwrap();
        let i = html.select(&sel("i")).next().unwrap();
        assert!(is_within(&a, &a));
        assert!(is_within(&b, &a));
        assert!(!is_within(&i, &a));
    }
}
