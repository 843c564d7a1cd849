//! Checkout workflow stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stage of the checkout workflow.
///
/// Stages run strictly in declaration order. A checkout attempt either
/// passes `ClearCart` (completed) or stops at the stage that failed, which is
/// recorded in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    /// Require an authenticated caller.
    AuthCheck,
    /// Read the caller's cart with item details.
    Snapshot,
    /// Compute the authoritative total from the snapshot.
    Recompute,
    /// Charge the payment processor.
    Charge,
    /// Persist the order.
    Persist,
    /// Delete the purchased cart lines.
    ClearCart,
}

impl CheckoutStage {
    /// Stable snake-case name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthCheck => "auth_check",
            Self::Snapshot => "snapshot",
            Self::Recompute => "recompute",
            Self::Charge => "charge",
            Self::Persist => "persist",
            Self::ClearCart => "clear_cart",
        }
    }
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        assert!(CheckoutStage::Recompute < CheckoutStage::Charge);
        assert!(CheckoutStage::Charge < CheckoutStage::Persist);
        assert!(CheckoutStage::Persist < CheckoutStage::ClearCart);
    }

    #[test]
    fn test_display() {
        assert_eq!(CheckoutStage::ClearCart.to_string(), "clear_cart");
    }
}
