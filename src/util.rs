use scraper::{ElementRef, Selector};

pub fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

pub fn reduce_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// All text below the element, with whitespace runs collapsed
pub fn element_text(e: &ElementRef) -> String {
    reduce_whitespace(&e.text().collect::<String>())
}

/// The first non-blank text fragment below the element, trimmed.
/// This is the closest we get to "first line of the rendered text" from a snapshot.
pub fn first_line(e: &ElementRef) -> String {
    e.text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(reduce_whitespace)
        .unwrap_or_default()
}

/// True if any text node that is a direct child of the element contains the needle
pub fn own_text_contains(e: &ElementRef, needle: &str) -> bool {
    e.children()
        .filter_map(|c| c.value().as_text())
        .any(|t| t.contains(needle))
}
