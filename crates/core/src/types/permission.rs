//! Permission tags granting authority independent of resource ownership.
//!
//! Permissions form a closed set. They are persisted as their upper-case tag
//! (`"ADMIN"`, `"ITEMDELETE"`, ...) and exposed through GraphQL under the same
//! names.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a permission tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct PermissionError(pub String);

/// A single permission tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(async_graphql::Enum))]
pub enum Permission {
    /// Full authority over every resource.
    #[serde(rename = "ADMIN")]
    #[cfg_attr(feature = "graphql", graphql(name = "ADMIN"))]
    Admin,
    /// Baseline permission granted on signup.
    #[serde(rename = "USER")]
    #[cfg_attr(feature = "graphql", graphql(name = "USER"))]
    User,
    /// May create items.
    #[serde(rename = "ITEMCREATE")]
    #[cfg_attr(feature = "graphql", graphql(name = "ITEMCREATE"))]
    ItemCreate,
    /// May edit items owned by other users.
    #[serde(rename = "ITEMUPDATE")]
    #[cfg_attr(feature = "graphql", graphql(name = "ITEMUPDATE"))]
    ItemUpdate,
    /// May delete items owned by other users.
    #[serde(rename = "ITEMDELETE")]
    #[cfg_attr(feature = "graphql", graphql(name = "ITEMDELETE"))]
    ItemDelete,
    /// May change other users' permissions.
    #[serde(rename = "PERMISSIONUPDATE")]
    #[cfg_attr(feature = "graphql", graphql(name = "PERMISSIONUPDATE"))]
    PermissionUpdate,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Admin,
        Self::User,
        Self::ItemCreate,
        Self::ItemUpdate,
        Self::ItemDelete,
        Self::PermissionUpdate,
    ];

    /// The persisted tag for this permission.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::ItemCreate => "ITEMCREATE",
            Self::ItemUpdate => "ITEMUPDATE",
            Self::ItemDelete => "ITEMDELETE",
            Self::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == tag)
            .ok_or_else(|| PermissionError(s.to_owned()))
    }
}

/// The set of permissions held by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// An empty permission set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// The permissions granted to a freshly signed-up user.
    #[must_use]
    pub fn signup_default() -> Self {
        Self::from_iter([Permission::User])
    }

    /// Parse a set from persisted tags.
    ///
    /// # Errors
    ///
    /// Returns `PermissionError` for the first unrecognised tag.
    pub fn parse_tags<I, S>(tags: I) -> Result<Self, PermissionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|t| t.as_ref().parse::<Permission>())
            .collect()
    }

    /// The persisted tags, in a stable order.
    #[must_use]
    pub fn to_tags(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Whether the set holds `permission`.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Whether the set holds at least one of `required`.
    ///
    /// An empty `required` slice never intersects.
    #[must_use]
    pub fn intersects(&self, required: &[Permission]) -> bool {
        required.iter().any(|p| self.0.contains(p))
    }

    /// Grant a permission. Returns `false` if it was already held.
    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    /// Revoke a permission. Returns `false` if it was not held.
    pub fn remove(&mut self, permission: Permission) -> bool {
        self.0.remove(&permission)
    }

    /// Iterate over the held permissions in order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Number of held permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no permissions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_case_insensitive() {
        let set = PermissionSet::parse_tags(["admin", "ITEMDELETE"]).unwrap();
        assert!(set.contains(Permission::Admin));
        assert!(set.contains(Permission::ItemDelete));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_parse_tags_rejects_unknown() {
        let err = PermissionSet::parse_tags(["USER", "SUPERUSER"]).unwrap_err();
        assert_eq!(err, PermissionError("SUPERUSER".to_owned()));
    }

    #[test]
    fn test_to_tags_roundtrip() {
        let set = PermissionSet::from_iter([Permission::ItemUpdate, Permission::User]);
        let tags = set.to_tags();
        assert_eq!(tags, vec!["USER".to_owned(), "ITEMUPDATE".to_owned()]);
        assert_eq!(PermissionSet::parse_tags(&tags).unwrap(), set);
    }

    #[test]
    fn test_intersects() {
        let set = PermissionSet::from_iter([Permission::User, Permission::ItemUpdate]);
        assert!(set.intersects(&[Permission::Admin, Permission::ItemUpdate]));
        assert!(!set.intersects(&[Permission::Admin, Permission::ItemDelete]));
        assert!(!set.intersects(&[]));
    }

    #[test]
    fn test_signup_default() {
        let set = PermissionSet::signup_default();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Permission::User]);
    }

    #[test]
    fn test_serde_uses_tags() {
        let set = PermissionSet::from_iter([Permission::Admin]);
        assert_eq!(serde_json::to_string(&set).unwrap(), "[\"ADMIN\"]");
    }
}
