use crate::models::Review;
use std::collections::HashSet;

/// Identity of a review. The rating is left out on purpose: after a re-render a name and comment
/// may end up next to a different rating text, but it is still the same review.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    reviewer_name: String,
    comment: String,
}

impl From<&Review> for DedupKey {
    fn from(r: &Review) -> Self {
        Self {
            reviewer_name: r.reviewer_name.clone(),
            comment: r.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupStore {
    seen: HashSet<DedupKey>,
}

impl DedupStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Remember the review. Returns false if an equal one was seen before.
    pub fn insert(&mut self, review: &Review) -> bool {
        self.seen.insert(review.into())
    }

    pub fn contains(&self, review: &Review) -> bool {
        self.seen.contains(&DedupKey::from(review))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Move the reviews not seen before into `into`, keeping their order. Returns how many.
    pub fn absorb<I>(&mut self, reviews: I, into: &mut Vec<Review>) -> usize
    where
        I: IntoIterator<Item = Review>,
    {
        let before = into.len();
        into.extend(reviews.into_iter().filter(|r| self.insert(r)));
        into.len() - before
    }
}
