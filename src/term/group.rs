use std::collections::HashSet;
use std::ops::{BitAnd, BitOr};

use smallvec::SmallVec;

use crate::TermId;

/// A sorted set of [`TermId`]s
///
/// Each id can occur only once in the group. Used for parent/child
/// adjacency, ancestor sets and the per-model relevant-term lists.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct TermGroup {
    ids: SmallVec<[TermId; 8]>,
}

impl TermGroup {
    /// Constructs a new, empty [`TermGroup`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a new, empty [`TermGroup`] with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: SmallVec::with_capacity(capacity),
        }
    }

    /// Returns `true` if the group contains no [`TermId`]s
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the number of [`TermId`]s in the group
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Adds a new [`TermId`] to the group
    ///
    /// Returns whether the id was newly inserted. That is:
    ///
    /// - If the group did not previously contain this id, true is returned.
    /// - If the group already contained this id, false is returned.
    pub fn insert(&mut self, id: TermId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(idx) => {
                self.ids.insert(idx, id);
                true
            }
        }
    }

    /// Removes a [`TermId`] from the group
    ///
    /// Returns whether the id was present.
    pub fn remove(&mut self, id: TermId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(idx) => {
                self.ids.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Appends an id without checking the sort order
    ///
    /// The caller must guarantee that `id` is larger than every id
    /// already in the group, otherwise sort order and uniqueness break
    /// and with them every lookup on this group.
    pub(crate) fn insert_unchecked(&mut self, id: TermId) {
        self.ids.push(id);
    }

    /// Returns `true` if the group contains the [`TermId`]
    pub fn contains(&self, id: TermId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Returns the [`TermId`] at the given index, if present
    pub fn get(&self, index: usize) -> Option<TermId> {
        self.ids.get(index).copied()
    }

    /// Returns an iterator of the [`TermId`]s inside the group
    pub fn iter(&self) -> TermIds<'_> {
        TermIds::new(self.ids.iter())
    }

    /// Returns the ids as a slice
    pub fn as_slice(&self) -> &[TermId] {
        &self.ids
    }
}

impl From<HashSet<TermId>> for TermGroup {
    fn from(s: HashSet<TermId>) -> Self {
        let mut ids: SmallVec<[TermId; 8]> = s.into_iter().collect();
        ids.sort_unstable();
        TermGroup { ids }
    }
}

impl FromIterator<TermId> for TermGroup {
    fn from_iter<I: IntoIterator<Item = TermId>>(iter: I) -> Self {
        let mut group = TermGroup::new();
        for id in iter {
            group.insert(id);
        }
        group
    }
}

impl<'a> IntoIterator for &'a TermGroup {
    type Item = TermId;
    type IntoIter = TermIds<'a>;

    fn into_iter(self) -> TermIds<'a> {
        TermIds::new(self.ids.iter())
    }
}

/// An iterator over [`TermId`]s
pub struct TermIds<'a> {
    inner: std::slice::Iter<'a, TermId>,
}

impl<'a> TermIds<'a> {
    fn new(inner: std::slice::Iter<'a, TermId>) -> Self {
        Self { inner }
    }
}

impl Iterator for TermIds<'_> {
    type Item = TermId;
    fn next(&mut self) -> Option<TermId> {
        self.inner.next().copied()
    }
}

impl BitOr for &TermGroup {
    type Output = TermGroup;

    fn bitor(self, rhs: &TermGroup) -> TermGroup {
        let mut group = TermGroup::with_capacity(self.len() + rhs.len());
        let (large, small) = if self.len() > rhs.len() {
            (self, rhs)
        } else {
            (rhs, self)
        };

        for id in large {
            group.insert_unchecked(id);
        }
        for id in small {
            group.insert(id);
        }
        group
    }
}

impl BitAnd for &TermGroup {
    type Output = TermGroup;

    fn bitand(self, rhs: &TermGroup) -> TermGroup {
        let mut group = TermGroup::with_capacity(self.len().min(rhs.len()));
        let (large, small) = if self.len() > rhs.len() {
            (self, rhs)
        } else {
            (rhs, self)
        };

        for id in small {
            if large.contains(id) {
                group.insert_unchecked(id);
            }
        }
        group
    }
}
