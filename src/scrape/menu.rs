use super::card::{cards, holds_match, is_within};
use crate::{
    field::{first_text_where, locate_first},
    models::MenuItem,
    sites::Profile,
    util::{element_text, own_text_contains},
};
use scraper::{ElementRef, Html};
use tracing::{debug, trace};

/// Number of menu item candidates in a snapshot, used to tell when scrolling stops loading more
pub fn count_candidates(html: &Html, profile: &Profile) -> usize {
    locate_first(html.root_element(), &profile.menu_item_name).len()
}

/// Pull all menu items out of a fully scrolled order page.
///
/// Candidates whose name is shorter than `min_name_len` characters are dropped; those are
/// incidental headings rather than items. Everything else becomes an item, with price and
/// description left empty when they can't be found.
pub fn parse_menu(html: &Html, profile: &Profile, min_name_len: usize) -> Vec<MenuItem> {
    // Dropped candidates still count as card boundaries, so a stray heading next to an item
    // doesn't get its price attributed to the item.
    let anchors = locate_first(html.root_element(), &profile.menu_item_name);
    let menu: Vec<MenuItem> = anchors
        .iter()
        .zip(cards(&anchors, |c, a| holds_price_or_text(c, a, profile)))
        .filter_map(|(anchor, card)| {
            let name = element_text(anchor);
            if name.is_empty() || name.chars().count() < min_name_len {
                trace!(name = %name, "Skipping menu candidate");
                return None;
            }
            let mut item = MenuItem::new(&name);
            match card {
                Some(card) => {
                    item.price = price_in(&card, anchor, profile.currency_marker);
                    item.description = description_in(&card, &name, profile);
                }
                None => trace!(name = %name, "No card found for menu item"),
            }
            Some(item)
        })
        .collect();

    debug!(candidates = anchors.len(), items = menu.len(), "Parsed menu");
    menu
}

/// A container is an item's card once it holds a price or a description outside the name
fn holds_price_or_text(container: &ElementRef, anchor: &ElementRef, profile: &Profile) -> bool {
    container
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| !is_within(&e, anchor) && own_text_contains(&e, profile.currency_marker))
        || holds_match(container, anchor, &profile.menu_description)
}

/// Text of the first element in the card carrying the currency marker. If that element holds
/// nothing but the marker, the amount lives in a sibling, so we widen to the parent.
fn price_in(card: &ElementRef, anchor: &ElementRef, marker: &str) -> String {
    let Some(mut found) = card
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| !is_within(e, anchor))
        .find(|e| own_text_contains(e, marker))
    else {
        return String::new();
    };

    let mut text = element_text(&found);
    while text == marker && found.id() != card.id() {
        match found.parent().and_then(ElementRef::wrap) {
            Some(parent) => {
                found = parent;
                text = element_text(&found);
            }
            None => break,
        }
    }
    text
}

fn description_in(card: &ElementRef, name: &str, profile: &Profile) -> String {
    first_text_where(*card, &profile.menu_description, |_, t| {
        !t.is_empty() && t != name && !t.contains(profile.currency_marker)
    })
    .unwrap_or_default()
}
