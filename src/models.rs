// The structs in this module are the output format of a batch run. Field names are what ends up
// in the JSON file, so renaming anything here is a breaking change for whoever reads the output.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MenuItem {
    /// Name of the item, e.g. "Kothu Parotta". Never empty in scraped output.
    pub name: String,
    /// More details about the item, empty if none was found
    pub description: String,
    /// Price as shown on the page, including the currency symbol, e.g. "₹120"
    pub price: String,
}

impl MenuItem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Display for MenuItem {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (self.description.is_empty(), self.price.is_empty()) {
            (true, true) => write!(f, "{}", self.name),
            (true, false) => write!(f, "{} {}", self.name, self.price),
            (false, true) => write!(f, "{} ({})", self.name, self.description),
            (false, false) => write!(f, "{} ({}) {}", self.name, self.description, self.price),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Review {
    pub reviewer_name: String,
    /// Rating as displayed, e.g. "4.0"
    pub rating_text: String,
    pub comment: String,
}

impl Review {
    pub fn new(reviewer_name: &str, rating_text: &str, comment: &str) -> Self {
        Self {
            reviewer_name: reviewer_name.into(),
            rating_text: rating_text.into(),
            comment: comment.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RestaurantRecord {
    /// The URL this record was scraped from, as given in the input list
    pub source_url: String,
    /// Name of restaurant
    pub name: String,
    /// Street address, first line only
    pub address: String,
    /// Aggregate rating as displayed
    pub rating: String,
    /// Number of ratings as displayed, e.g. "1,204 Delivery Ratings"
    pub rating_count: String,
    /// Menu items in page order
    pub menu: Vec<MenuItem>,
    /// Unique reviews in the order they were first seen
    pub reviews: Vec<Review>,
}

impl RestaurantRecord {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    pub fn with_menu(mut self, menu: Vec<MenuItem>) -> Self {
        self.menu = menu;
        self
    }

    pub fn with_reviews(mut self, reviews: Vec<Review>) -> Self {
        self.reviews = reviews;
        self
    }
}
