use core::fmt::Debug;
use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::term::{Term, TermGroup, TermInternal};
use crate::{OntomcError, OntomcResult, TermId};

mod arena;
use arena::Arena;

/// The directed-acyclic ontology of terms
///
/// The [`Ontology`] owns all terms, their parent/child adjacency and
/// the derived structures the inference engine builds on: a
/// topological order of the term graph and the cached transitive
/// closure (ancestor set) of every term.
///
/// An ontology is immutable once built. Construction fails with
/// [`OntomcError::CyclicGraph`] if the parent relation contains a
/// cycle.
///
/// # Examples
///
/// ```
/// use ontomc::Ontology;
///
/// let ontology = Ontology::from_terms([
///     ("mammal", vec!["animal"]),
///     ("primate", vec!["mammal"]),
///     ("human", vec!["primate"]),
/// ]).unwrap();
///
/// // "animal" was only referenced as a parent and got auto-created
/// assert_eq!(ontology.len(), 4);
///
/// let human = ontology.term_by_name("human").unwrap();
/// let animal = ontology.term_by_name("animal").unwrap();
/// assert!(human.is_descendant_of(&animal));
/// ```
#[derive(Default, Clone)]
pub struct Ontology {
    terms: Arena,
    names: HashMap<String, TermId>,
    topo_order: Vec<TermId>,
}

impl Debug for Ontology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ontology with {} terms", self.terms.len())
    }
}

impl Ontology {
    /// Builds an ontology from `(name, parent names)` records
    ///
    /// A parent name that never appears as a record of its own is
    /// auto-created as a term without parents. Auto-created terms are
    /// appended after all explicit records, in first-reference order,
    /// so id assignment is deterministic given input order.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::CyclicGraph`] if the parent relation is
    /// cyclic
    ///
    /// # Examples
    ///
    /// ```
    /// use ontomc::Ontology;
    ///
    /// let ontology = Ontology::from_terms([
    ///     ("spider", vec!["arachnid"]),
    ///     ("tarantula", vec!["spider"]),
    /// ]).unwrap();
    /// assert_eq!(ontology.len(), 3);
    /// ```
    pub fn from_terms<N, P, I>(entries: I) -> OntomcResult<Self>
    where
        N: AsRef<str>,
        P: AsRef<str>,
        I: IntoIterator<Item = (N, Vec<P>)>,
    {
        let entries: Vec<(N, Vec<P>)> = entries.into_iter().collect();
        let mut ont = Ontology::default();

        // Explicit records first so they get the low ids
        for (name, _) in &entries {
            ont.insert_term(name.as_ref());
        }
        for (name, parents) in &entries {
            let child = ont.names[name.as_ref()];
            for parent in parents {
                let parent = ont.insert_term(parent.as_ref());
                ont.add_parent(parent, child);
            }
        }

        ont.build_cache()?;
        Ok(ont)
    }

    /// Builds an ontology from the compressed exchange form, where
    /// parents are integer indices into the record sequence itself
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::DoesNotExist`] for an out-of-range parent
    /// index and [`OntomcError::CyclicGraph`] for a cyclic parent
    /// relation
    pub fn from_indexed_terms<N, I>(entries: I) -> OntomcResult<Self>
    where
        N: AsRef<str>,
        I: IntoIterator<Item = (N, Vec<usize>)>,
    {
        let entries: Vec<(N, Vec<usize>)> = entries.into_iter().collect();
        let mut ont = Ontology::default();

        for (name, _) in &entries {
            ont.insert_term(name.as_ref());
        }
        for (idx, (_, parents)) in entries.iter().enumerate() {
            let child = TermId::from(idx);
            for &parent in parents {
                if parent >= entries.len() {
                    return Err(OntomcError::DoesNotExist);
                }
                ont.add_parent(TermId::from(parent), child);
            }
        }

        ont.build_cache()?;
        Ok(ont)
    }

    /// Returns the number of terms in the ontology
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if the ontology contains no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the [`Term`] with the given id, if present
    pub fn term<I: Into<TermId>>(&self, id: I) -> Option<Term<'_>> {
        Term::try_new(self, id.into()).ok()
    }

    /// Returns the [`Term`] with the given name, if present
    pub fn term_by_name(&self, name: &str) -> Option<Term<'_>> {
        self.names.get(name).and_then(|id| self.term(*id))
    }

    /// Returns the [`TermId`] for a term name, if present
    pub fn id_of(&self, name: &str) -> Option<TermId> {
        self.names.get(name).copied()
    }

    /// Returns an iterator of all terms, in id order
    pub fn terms(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Returns the topological order of the term graph
    ///
    /// Every parent appears before each of its children. The order is
    /// a deterministic function of the construction input.
    pub fn toposort_order(&self) -> &[TermId] {
        &self.topo_order
    }

    /// Returns, for every term, its transitive closure: the sorted set
    /// of itself plus all ancestors reachable via parent edges
    ///
    /// # Examples
    ///
    /// ```
    /// use ontomc::Ontology;
    ///
    /// let ontology = Ontology::from_terms([
    ///     ("primate", vec!["mammal"]),
    ///     ("mammal", vec!["animal"]),
    /// ]).unwrap();
    ///
    /// let closure = ontology.transitive_closure();
    /// let primate = ontology.id_of("primate").unwrap();
    /// assert_eq!(closure[primate.idx()].len(), 3);
    /// ```
    pub fn transitive_closure(&self) -> Vec<TermGroup> {
        self.terms.iter().map(|t| t.ancestors().clone()).collect()
    }

    /// Constructs the induced sub-ontology of the given terms and
    /// every descendant reachable from them
    ///
    /// Term names survive; ids are re-assigned densely, preserving the
    /// relative order of the original ids.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::DoesNotExist`] if any root id is unknown
    pub fn subgraph_rooted_at(&self, roots: &[TermId]) -> OntomcResult<Self> {
        let mut keep = TermGroup::new();
        let mut queue: VecDeque<TermId> = VecDeque::new();
        for &root in roots {
            if self.terms.get(root).is_none() {
                return Err(OntomcError::DoesNotExist);
            }
            if keep.insert(root) {
                queue.push_back(root);
            }
        }
        while let Some(id) = queue.pop_front() {
            for child in self.terms.get_unchecked(id).children() {
                if keep.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        self.induced(&keep)
    }

    /// Constructs the induced sub-ontology of the given terms plus all
    /// their ancestors
    ///
    /// Used to slim an ontology down to only the terms relevant to an
    /// association set.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::DoesNotExist`] if any name is unknown
    pub fn subgraph_with_ancestors<S: AsRef<str>>(&self, names: &[S]) -> OntomcResult<Self> {
        let mut keep = TermGroup::new();
        for name in names {
            let id = self
                .id_of(name.as_ref())
                .ok_or(OntomcError::DoesNotExist)?;
            for ancestor in self.terms.get_unchecked(id).ancestors() {
                keep.insert(ancestor);
            }
        }
        self.induced(&keep)
    }

    /// Builds the sub-ontology induced by `keep`, retaining only edges
    /// with both endpoints inside the subset
    fn induced(&self, keep: &TermGroup) -> OntomcResult<Self> {
        let mut ont = Ontology::default();
        let mut remap: HashMap<TermId, TermId> = HashMap::with_capacity(keep.len());
        for id in keep {
            let new_id = ont.insert_term(self.terms.get_unchecked(id).name());
            remap.insert(id, new_id);
        }
        for id in keep {
            let child = remap[&id];
            for parent in self.terms.get_unchecked(id).parents() {
                if let Some(&parent) = remap.get(&parent) {
                    ont.add_parent(parent, child);
                }
            }
        }
        ont.build_cache()?;
        Ok(ont)
    }
}

/// Construction internals
impl Ontology {
    /// Inserts a term by name, returning the existing id if the name
    /// is already known
    fn insert_term(&mut self, name: &str) -> TermId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = self.terms.insert(name.to_string());
        self.names.insert(name.to_string(), id);
        id
    }

    /// Records a parent-child edge in both adjacency directions
    fn add_parent(&mut self, parent_id: TermId, child_id: TermId) {
        self.terms.get_unchecked_mut(parent_id).add_child(child_id);
        self.terms.get_unchecked_mut(child_id).add_parent(parent_id);
    }

    /// Computes the topological order and the per-term ancestor cache
    ///
    /// Kahn's algorithm: repeatedly remove terms whose parents have
    /// all been processed. A term that is never reached this way sits
    /// on a cycle.
    fn build_cache(&mut self) -> OntomcResult<()> {
        let n = self.terms.len();
        let mut remaining: Vec<usize> = (0..n)
            .map(|idx| self.terms.get_unchecked(TermId::from(idx)).parents().len())
            .collect();

        let mut queue: VecDeque<TermId> = (0..n)
            .map(TermId::from)
            .filter(|id| remaining[id.idx()] == 0)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for child in self.terms.get_unchecked(id).children().clone().iter() {
                remaining[child.idx()] -= 1;
                if remaining[child.idx()] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() != n {
            let stuck = (0..n)
                .map(TermId::from)
                .find(|id| remaining[id.idx()] > 0)
                .expect("at least one term must remain on a cycle");
            return Err(OntomcError::CyclicGraph(
                self.terms.get_unchecked(stuck).name().to_string(),
            ));
        }

        // Parents are processed before children, so a term's closure
        // is itself plus the union of its parents' closures.
        for &id in &order {
            let parents = self.terms.get_unchecked(id).parents().clone();
            let mut closure = TermGroup::new();
            closure.insert(id);
            for parent in &parents {
                closure = &closure | self.terms.get_unchecked(parent).ancestors();
            }
            *self.terms.get_unchecked_mut(id).ancestors_mut() = closure;
        }

        debug!("ontology cache built for {} terms", n);
        self.topo_order = order;
        Ok(())
    }

    pub(crate) fn get(&self, id: TermId) -> Option<&TermInternal> {
        self.terms.get(id)
    }

    pub(crate) fn get_unchecked(&self, id: TermId) -> &TermInternal {
        self.terms.get_unchecked(id)
    }
}

impl<'a> IntoIterator for &'a Ontology {
    type Item = Term<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        Iter {
            inner: self.terms.iter(),
            ontology: self,
        }
    }
}

/// An iterator of all [`Term`]s of an [`Ontology`], in id order
pub struct Iter<'a> {
    inner: std::slice::Iter<'a, TermInternal>,
    ontology: &'a Ontology,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Term<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|t| Term::new(self.ontology, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::spider_ontology;
    use crate::OntomcError;

    #[test]
    fn implicit_parents_are_appended() {
        let ont = spider_ontology();
        assert_eq!(ont.len(), 9);
        // Explicit terms keep declaration order
        assert_eq!(ont.id_of("arachnid"), Some(0u32.into()));
        assert_eq!(ont.id_of("gorilla"), Some(6u32.into()));
        // Implicit terms follow in first-reference order
        assert_eq!(ont.id_of("animal"), Some(7u32.into()));
        assert_eq!(ont.id_of("mutant"), Some(8u32.into()));
    }

    #[test]
    fn toposort_parents_first() {
        let ont = spider_ontology();
        let order = ont.toposort_order();
        assert_eq!(order.len(), ont.len());

        let position: Vec<usize> = {
            let mut pos = vec![0; ont.len()];
            for (i, id) in order.iter().enumerate() {
                pos[id.idx()] = i;
            }
            pos
        };
        for term in &ont {
            for parent in term.parent_ids() {
                assert!(position[parent.idx()] < position[term.id().idx()]);
            }
        }
    }

    #[test]
    fn spiderhuman_closure() {
        let ont = spider_ontology();
        let closure = ont.transitive_closure();
        let spiderhuman = ont.id_of("spiderhuman").unwrap();

        let names: Vec<String> = closure[spiderhuman.idx()]
            .iter()
            .map(|id| ont.term(id).unwrap().name().to_string())
            .collect();
        for expected in [
            "spiderhuman",
            "arachnid",
            "human",
            "primate",
            "mammal",
            "animal",
            "mutant",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn closure_is_a_fixed_point() {
        let ont = spider_ontology();
        let closure = ont.transitive_closure();
        for term in &ont {
            let mut expanded = closure[term.id().idx()].clone();
            for parent in term.parent_ids() {
                expanded = &expanded | &closure[parent.idx()];
            }
            assert_eq!(expanded, closure[term.id().idx()]);
        }
    }

    #[test]
    fn cycle_is_rejected() {
        let result = Ontology::from_terms([
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["a"]),
        ]);
        assert!(matches!(result, Err(OntomcError::CyclicGraph(_))));
    }

    #[test]
    fn self_loop_is_rejected() {
        let result = Ontology::from_terms([("a", vec!["a"])]);
        assert!(matches!(result, Err(OntomcError::CyclicGraph(_))));
    }

    #[test]
    fn subgraph_rooted_at_descendants_only() {
        let ont = spider_ontology();
        let primate = ont.id_of("primate").unwrap();
        let sub = ont.subgraph_rooted_at(&[primate]).unwrap();

        // primate, human, spiderhuman, gorilla
        assert_eq!(sub.len(), 4);
        assert!(sub.id_of("human").is_some());
        assert!(sub.id_of("mammal").is_none());

        // spiderhuman keeps only the edges inside the subset
        let spiderhuman = sub.term_by_name("spiderhuman").unwrap();
        assert_eq!(spiderhuman.parent_ids().len(), 1);
    }

    #[test]
    fn subgraph_with_ancestors() {
        let ont = spider_ontology();
        let sub = ont.subgraph_with_ancestors(&["human"]).unwrap();

        // human, primate, mammal, animal
        assert_eq!(sub.len(), 4);
        assert!(sub.id_of("primate").is_some());
        assert!(sub.id_of("spider").is_none());

        let human = sub.term_by_name("human").unwrap();
        let animal = sub.term_by_name("animal").unwrap();
        assert!(human.is_descendant_of(&animal));
    }

    #[test]
    fn indexed_construction_matches_named() {
        let named = Ontology::from_terms([
            ("root", vec![]),
            ("mid", vec!["root"]),
            ("leaf", vec!["mid", "root"]),
        ])
        .unwrap();
        let indexed = Ontology::from_indexed_terms([
            ("root", vec![]),
            ("mid", vec![0]),
            ("leaf", vec![1, 0]),
        ])
        .unwrap();

        assert_eq!(named.len(), indexed.len());
        for (a, b) in named.terms().zip(indexed.terms()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.parent_ids(), b.parent_ids());
        }
    }

    #[test]
    fn indexed_construction_rejects_bad_index() {
        let result = Ontology::from_indexed_terms([("a", vec![5])]);
        assert!(matches!(result, Err(OntomcError::DoesNotExist)));
    }
}
