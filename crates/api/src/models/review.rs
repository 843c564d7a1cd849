//! Review domain types.

use chrono::{DateTime, Utc};

use trackytronics_core::{ItemId, ReviewId, UserId};

/// A user's review of an item.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: ReviewId,
    pub author_id: UserId,
    pub item_id: ItemId,
    pub text: String,
    /// 1 to 5 inclusive.
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub author_id: UserId,
    pub item_id: ItemId,
    pub text: String,
    pub rating: i32,
}
