//! Terms of the ontology and groups thereof

use core::fmt::Debug;
use std::fmt::Display;

use crate::{Ontology, OntomcResult};

mod group;
pub(crate) mod internal;

pub use group::{TermGroup, TermIds};
pub(crate) use internal::TermInternal;

/// The dense index of a term within its [`Ontology`]
///
/// `TermId`s are assigned at construction in `[0, T)`: explicitly
/// declared terms first, in declaration order, followed by terms that
/// were only ever referenced as parents, in first-reference order.
#[derive(Clone, Copy, Default, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermId {
    inner: u32,
}

impl TermId {
    /// Returns the id as `usize` for indexing term-parallel arrays
    pub fn idx(self) -> usize {
        self.inner as usize
    }
}

impl From<u32> for TermId {
    fn from(inner: u32) -> Self {
        TermId { inner }
    }
}

impl From<usize> for TermId {
    fn from(inner: usize) -> Self {
        TermId {
            inner: u32::try_from(inner).expect("more than u32::MAX terms"),
        }
    }
}

impl Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T:{}", self.inner)
    }
}

/// A single term of the [`Ontology`]
///
/// `Term` is a cheap borrowed view into the ontology's arena. It
/// provides access to the term's name, its direct parents and children
/// and its full ancestor set.
///
/// # Examples
///
/// ```
/// use ontomc::Ontology;
///
/// let ontology = Ontology::from_terms([
///     ("animal", vec![]),
///     ("mammal", vec!["animal"]),
/// ]).unwrap();
///
/// let term = ontology.term_by_name("mammal").unwrap();
/// assert_eq!(term.name(), "mammal");
/// assert_eq!(term.parent_ids().len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Term<'a> {
    id: TermId,
    name: &'a str,
    parents: &'a TermGroup,
    children: &'a TermGroup,
    ancestors: &'a TermGroup,
    ontology: &'a Ontology,
}

impl<'a> Term<'a> {
    /// Constructs a new [`Term`]
    ///
    /// # Errors
    ///
    /// Returns [`crate::OntomcError::DoesNotExist`] if the id is not
    /// part of the ontology
    pub fn try_new(ontology: &'a Ontology, id: TermId) -> OntomcResult<Term<'a>> {
        let term = ontology.get(id).ok_or(crate::OntomcError::DoesNotExist)?;
        Ok(Term::new(ontology, term))
    }

    pub(crate) fn new(ontology: &'a Ontology, term: &'a TermInternal) -> Term<'a> {
        Term {
            id: term.id(),
            name: term.name(),
            parents: term.parents(),
            children: term.children(),
            ancestors: term.ancestors(),
            ontology,
        }
    }

    /// Returns the [`TermId`] of the term
    pub fn id(&self) -> TermId {
        self.id
    }

    /// Returns the name of the term
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the ids of the direct parents
    pub fn parent_ids(&self) -> &TermGroup {
        self.parents
    }

    /// Returns an iterator of the direct parent terms
    pub fn parents(&self) -> Iter<'a> {
        Iter::new(self.parents.iter(), self.ontology)
    }

    /// Returns the ids of the direct children
    pub fn children_ids(&self) -> &TermGroup {
        self.children
    }

    /// Returns an iterator of the direct child terms
    pub fn children(&self) -> Iter<'a> {
        Iter::new(self.children.iter(), self.ontology)
    }

    /// Returns the term's transitive closure: itself plus every
    /// ancestor reachable via parent edges
    pub fn ancestor_ids(&self) -> &TermGroup {
        self.ancestors
    }

    /// Returns `true` if `other` is an ancestor of (or equal to) `self`
    pub fn is_descendant_of(&self, other: &Term) -> bool {
        self.ancestors.contains(other.id())
    }
}

impl PartialEq for Term<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Term<'_> {}

/// An iterator of [`Term`]s
pub struct Iter<'a> {
    ids: TermIds<'a>,
    ontology: &'a Ontology,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(ids: TermIds<'a>, ontology: &'a Ontology) -> Self {
        Iter { ids, ontology }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Term<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        self.ids
            .next()
            .map(|id| Term::new(self.ontology, self.ontology.get_unchecked(id)))
    }
}

impl Debug for Iter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "term::Iter")
    }
}
