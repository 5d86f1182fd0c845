//! Site profiles: everything that is specific to one site template.
//!
//! The extraction engine knows nothing about any particular site. A [`Profile`] hands it the
//! selector chains for each field, and knows how to get from an order page to its reviews.

use crate::field::Strategy;
use url::Url;

pub mod zomato;

#[derive(Debug, Clone)]
pub struct Profile {
    /// Short name for logging
    pub name: &'static str,
    /// Restaurant name on the order page. Its presence also tells us the page has loaded.
    pub restaurant_name: Vec<Strategy>,
    pub address: Vec<Strategy>,
    pub rating: Vec<Strategy>,
    pub rating_count: Vec<Strategy>,
    /// Heading of a single menu item
    pub menu_item_name: Vec<Strategy>,
    /// Paragraph-like nodes inside a menu card that may hold the description
    pub menu_description: Vec<Strategy>,
    /// Text marking a price, e.g. a currency symbol
    pub currency_marker: &'static str,
    /// Reviewer name inside a review card. Every review card has exactly one.
    pub reviewer_name: Vec<Strategy>,
    pub review_rating: Vec<Strategy>,
    pub review_comment: Vec<Strategy>,
    /// `<title>` text of the svg icon inside the "next page" control
    pub next_icon_title: &'static str,
    /// Modals and overlays that can sit on top of the menu
    pub overlays: &'static str,
    /// Tags of elements that can be clicked to paginate
    pub actionable_tags: &'static [&'static str],
    /// Last path segment of an order page URL
    pub order_segment: &'static str,
    /// Last path segment of a review page URL
    pub review_segment: &'static str,
}

impl Profile {
    /// The review page belonging to an order page.
    ///
    /// A trailing order segment is swapped for the review segment, anything else gets the review
    /// segment appended. Query and fragment are dropped.
    pub fn review_url(&self, order_url: &Url) -> Url {
        let mut segments: Vec<String> = order_url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        if segments.last().map(String::as_str) == Some(self.order_segment) {
            segments.pop();
        }
        segments.push(self.review_segment.into());

        let mut url = order_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&format!("/{}", segments.join("/")));
        url
    }
}
