//! Genes and gene groups
//!
//! Genes live in the [`crate::AssociationIndex`], which assigns each
//! gene a dense [`GeneId`] in `[0, G)` in first-seen order.

use core::fmt::Debug;
use std::fmt::Display;

use smallvec::SmallVec;

use crate::term::TermGroup;

/// The dense index of a gene within its [`crate::AssociationIndex`]
#[derive(Clone, Copy, Default, Debug, Hash, PartialEq, PartialOrd, Eq, Ord)]
pub struct GeneId {
    inner: u32,
}

impl GeneId {
    /// Returns the id as `usize` for indexing gene-parallel arrays
    pub fn idx(self) -> usize {
        self.inner as usize
    }
}

impl From<u32> for GeneId {
    fn from(inner: u32) -> Self {
        GeneId { inner }
    }
}

impl From<usize> for GeneId {
    fn from(inner: usize) -> Self {
        GeneId {
            inner: u32::try_from(inner).expect("more than u32::MAX genes"),
        }
    }
}

impl Display for GeneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G:{}", self.inner)
    }
}

/// A single gene
///
/// A gene has a unique [`GeneId`], a primary name (symbol), optional
/// alias names used during gene-name validation, and the sorted set of
/// terms it is associated with.
#[derive(Default, Debug, Clone)]
pub struct Gene {
    id: GeneId,
    name: String,
    aliases: Vec<String>,
    terms: TermGroup,
}

impl Gene {
    /// Initializes a new gene
    ///
    /// Genes should be created through the
    /// [`crate::AssociationIndex`] constructors so that every name
    /// maps to exactly one gene.
    pub(crate) fn new(id: GeneId, name: &str) -> Gene {
        Gene {
            id,
            name: name.to_string(),
            aliases: Vec::new(),
            terms: TermGroup::new(),
        }
    }

    /// The unique [`GeneId`] of the gene
    pub fn id(&self) -> GeneId {
        self.id
    }

    /// The primary name (symbol) of the gene
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias names of the gene
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The sorted set of associated terms
    pub fn term_ids(&self) -> &TermGroup {
        &self.terms
    }

    pub(crate) fn add_alias(&mut self, alias: &str) {
        if self.aliases.iter().all(|a| a != alias) {
            self.aliases.push(alias.to_string());
        }
    }

    pub(crate) fn add_term<I: Into<crate::TermId>>(&mut self, term: I) -> bool {
        self.terms.insert(term.into())
    }
}

impl PartialEq for Gene {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Gene {}

/// A sorted set of [`GeneId`]s
///
/// The gene-side counterpart of [`TermGroup`]: each id occurs at most
/// once and iteration is always in ascending id order, which keeps
/// everything downstream (equivalence classes, summaries) fully
/// deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct GeneGroup {
    ids: SmallVec<[GeneId; 8]>,
}

impl GeneGroup {
    /// Constructs a new, empty [`GeneGroup`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the group contains no [`GeneId`]s
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the number of [`GeneId`]s in the group
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Adds a new [`GeneId`] to the group
    ///
    /// Returns whether the id was newly inserted.
    pub fn insert(&mut self, id: GeneId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(idx) => {
                self.ids.insert(idx, id);
                true
            }
        }
    }

    /// Returns `true` if the group contains the [`GeneId`]
    pub fn contains(&self, id: GeneId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Returns an iterator of the [`GeneId`]s inside the group
    pub fn iter(&self) -> impl Iterator<Item = GeneId> + '_ {
        self.ids.iter().copied()
    }

    /// Returns the ids as a slice
    pub fn as_slice(&self) -> &[GeneId] {
        &self.ids
    }
}

impl FromIterator<GeneId> for GeneGroup {
    fn from_iter<I: IntoIterator<Item = GeneId>>(iter: I) -> Self {
        let mut group = GeneGroup::new();
        for id in iter {
            group.insert(id);
        }
        group
    }
}

impl<'a> IntoIterator for &'a GeneGroup {
    type Item = GeneId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, GeneId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}
