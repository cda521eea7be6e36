//! Immutable, restartable sequences returned by list queries.

use std::sync::Arc;

/// A point-in-time copy of a registry listing.
///
/// Cheap to clone; iterating never observes later changes and may be
/// repeated any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T>(Arc<[T]>);

impl<T> Snapshot<T> {
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T: PartialEq> Snapshot<T> {
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.0.contains(item)
    }
}

impl Snapshot<String> {
    /// Convenience for string listings.
    #[must_use]
    pub fn contains_str(&self, item: &str) -> bool {
        self.0.iter().any(|s| s == item)
    }
}

impl<T> From<Vec<T>> for Snapshot<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items.into())
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self(Vec::new().into())
    }
}

impl<'a, T> IntoIterator for &'a Snapshot<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
