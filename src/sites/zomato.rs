// Selector chains for zomato.com restaurant pages.
//
// The class names below are styled-components hashes and change whenever the site is rebuilt, so
// where possible a chain ends in something structural that still finds the field, if less
// precisely.

use super::Profile;
use crate::field::Strategy;
use lazy_static::lazy_static;

lazy_static! {
    static ref PROFILE: Profile = Profile {
        name: "zomato",
        restaurant_name: vec![Strategy::css("h1", "h1")],
        address: vec![
            Strategy::css("address-id", r#"section div[id*="address"]"#).first_line(),
            Strategy::css(
                "address-class",
                r#"section[class*="sc-fQejPQ"] div[class*="sc-clNaTc"]"#,
            )
            .first_line(),
            Strategy::css("after-h1", "h1 + div").first_line(),
        ],
        rating: vec![
            Strategy::css("rating-class", r#"[class*="sc-1q7bklc-1"]"#).first_line(),
            Strategy::css("rating-class-old", r#"[class*="sc-1q722ms-0"]"#).first_line(),
        ],
        rating_count: vec![
            Strategy::css(
                "rating-count-class",
                r#"[class*="sc-1q7bklc-8"][class*="kEgyiI"]"#,
            ),
            Strategy::css("rating-count-prefix", r#"[class*="sc-1q7bklc-8"]"#),
        ],
        menu_item_name: vec![Strategy::css("h4", "h4")],
        menu_description: vec![Strategy::css("p", "p")],
        currency_marker: "₹",
        reviewer_name: vec![
            Strategy::css("reviewer-class", r#"p[class*="sc-lenlpJ"]"#),
            Strategy::css("reviewer-class-old", r#"p[class*="dCAQIv"]"#),
            Strategy::css("user-link", r#"a[href*="/users/"]"#),
        ],
        review_rating: vec![
            Strategy::css("review-rating-class", r#"div[class*="sc-1q7bklc-10"]"#).first_line(),
            Strategy::css("review-rating-class-old", r#"div[class*="XPLrh"]"#).first_line(),
        ],
        review_comment: vec![
            Strategy::css("comment-class", r#"p[class*="sc-hfLElm"]"#),
            Strategy::css("comment-class-old", r#"p[class*="hreYiP"]"#),
            Strategy::css("any-p", "p"),
        ],
        next_icon_title: "chevron-right",
        overlays: r#"[class*="modal"], [class*="overlay"]"#,
        actionable_tags: &["a", "button"],
        order_segment: "order",
        review_segment: "reviews",
    };
}

pub fn profile() -> &'static Profile {
    &PROFILE
}
