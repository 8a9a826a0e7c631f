//! The gene↔term association index
//!
//! [`AssociationIndex`] owns the bipartite graph between genes and
//! ontology terms, derived from raw `(gene, term)` pairs or
//! `(gene, aliases, terms)` triples. With `closure = true` every
//! association is expanded through the term's transitive closure, so a
//! gene annotated to `spider` is also counted for `arachnid` and
//! `animal`.
//!
//! The index also partitions terms into equivalence classes of
//! identical gene coverage. Only one member per class, the *exemplar*,
//! is ever reported to the user; this keeps chains of structurally
//! identical ontology terms from showing up as independently
//! significant results.

use std::collections::HashMap;

use tracing::warn;

use crate::annotations::{Gene, GeneGroup, GeneId};
use crate::term::TermGroup;
use crate::{Ontology, OntomcError, OntomcResult, TermId};

/// The indexed gene↔term bipartite graph
///
/// Immutable once built. Terms referenced by the input but absent from
/// the ontology do not fail construction; they are collected into a
/// warning list which [`AssociationIndex::require_no_missing`] (or the
/// `_strict` constructors) can escalate into
/// [`OntomcError::MissingTerms`].
///
/// # Examples
///
/// ```
/// use ontomc::{AssociationIndex, Ontology};
///
/// let ontology = Ontology::from_terms([
///     ("spider", vec!["arachnid"]),
/// ]).unwrap();
///
/// let assocs = AssociationIndex::from_pairs(
///     &ontology,
///     [("charlotte", "spider")],
///     true,
/// ).unwrap();
///
/// let spider = ontology.id_of("spider").unwrap();
/// let arachnid = ontology.id_of("arachnid").unwrap();
/// // closure expansion annotates the parent too
/// assert_eq!(assocs.genes_by_term(spider).len(), 1);
/// assert_eq!(assocs.genes_by_term(arachnid).len(), 1);
/// ```
pub struct AssociationIndex<'a> {
    ontology: &'a Ontology,
    genes: Vec<Gene>,
    /// lowercased primary names and aliases, for validation lookups
    lookup: HashMap<String, GeneId>,
    genes_by_term: Vec<GeneGroup>,
    missing_terms: Vec<String>,
    /// per term, the exemplar of its equivalence class
    exemplar: Vec<TermId>,
    relevant: TermGroup,
}

/// Outcome of [`AssociationIndex::validate_gene_names`]
///
/// Validation never fails; callers decide whether unresolved names
/// abort the run.
#[derive(Debug, Default, Clone)]
pub struct GeneValidation {
    /// Gene ids for every name that resolved
    pub resolved: Vec<GeneId>,
    /// Input names that matched neither a gene name nor an alias
    pub unresolved: Vec<String>,
}

impl GeneValidation {
    /// Escalates unresolved names into [`OntomcError::UnknownGenes`]
    ///
    /// # Errors
    ///
    /// Returns an error if any name failed to resolve
    pub fn into_strict(self) -> OntomcResult<Vec<GeneId>> {
        if self.unresolved.is_empty() {
            Ok(self.resolved)
        } else {
            Err(OntomcError::UnknownGenes(self.unresolved))
        }
    }
}

impl<'a> AssociationIndex<'a> {
    /// Builds the index from raw `(gene name, term name)` pairs
    ///
    /// Duplicate pairs collapse to a single association. With
    /// `closure = true` each association is expanded through the
    /// term's transitive closure before indexing.
    ///
    /// # Errors
    ///
    /// Construction itself only fails on downstream invariant
    /// violations; missing terms are collected, not raised.
    pub fn from_pairs<G, T, I>(ontology: &'a Ontology, pairs: I, closure: bool) -> OntomcResult<Self>
    where
        G: AsRef<str>,
        T: AsRef<str>,
        I: IntoIterator<Item = (G, T)>,
    {
        let mut builder = Builder::new(ontology, closure);
        for (gene, term) in pairs {
            let gene = builder.gene(gene.as_ref());
            builder.associate(gene, term.as_ref());
        }
        builder.finish()
    }

    /// Builds the index from `(gene name, aliases, term names)` triples
    ///
    /// The richer exchange form also carries alias names, which
    /// [`AssociationIndex::validate_gene_names`] uses for fuzzy gene
    /// matching.
    ///
    /// # Errors
    ///
    /// See [`AssociationIndex::from_pairs`]
    pub fn from_triples<G, T, I>(
        ontology: &'a Ontology,
        triples: I,
        closure: bool,
    ) -> OntomcResult<Self>
    where
        G: AsRef<str>,
        T: AsRef<str>,
        I: IntoIterator<Item = (G, Vec<G>, Vec<T>)>,
    {
        let mut builder = Builder::new(ontology, closure);
        for (gene, aliases, terms) in triples {
            let gene = builder.gene(gene.as_ref());
            for alias in &aliases {
                builder.alias(gene, alias.as_ref());
            }
            for term in &terms {
                builder.associate(gene, term.as_ref());
            }
        }
        builder.finish()
    }

    /// Like [`AssociationIndex::from_pairs`], but missing terms abort
    /// construction with [`OntomcError::MissingTerms`]
    ///
    /// # Errors
    ///
    /// Returns an error if any referenced term is absent from the
    /// ontology
    pub fn from_pairs_strict<G, T, I>(
        ontology: &'a Ontology,
        pairs: I,
        closure: bool,
    ) -> OntomcResult<Self>
    where
        G: AsRef<str>,
        T: AsRef<str>,
        I: IntoIterator<Item = (G, T)>,
    {
        let index = Self::from_pairs(ontology, pairs, closure)?;
        index.require_no_missing()?;
        Ok(index)
    }

    /// Returns the ontology the index was built against
    pub fn ontology(&self) -> &'a Ontology {
        self.ontology
    }

    /// Returns the number of genes in the index
    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    /// Returns the [`Gene`] with the given id, if present
    pub fn gene(&self, id: GeneId) -> Option<&Gene> {
        self.genes.get(id.idx())
    }

    /// Returns the [`Gene`] with the given primary name, if present
    pub fn gene_by_name(&self, name: &str) -> Option<&Gene> {
        self.genes.iter().find(|g| g.name() == name)
    }

    /// Returns an iterator of all genes, in id order
    pub fn genes(&self) -> std::slice::Iter<'_, Gene> {
        self.genes.iter()
    }

    /// Returns the sorted associated terms of a gene
    ///
    /// # Panics
    ///
    /// Panics if the gene id is out of range
    pub fn terms_by_gene(&self, gene: GeneId) -> &TermGroup {
        self.genes[gene.idx()].term_ids()
    }

    /// Returns the sorted associated genes of a term
    ///
    /// # Panics
    ///
    /// Panics if the term id is not part of the ontology
    pub fn genes_by_term(&self, term: TermId) -> &GeneGroup {
        &self.genes_by_term[term.idx()]
    }

    /// Term names referenced by the input but absent from the ontology
    ///
    /// Reported in aggregate so a user sees the full picture at once.
    pub fn missing_terms(&self) -> &[String] {
        &self.missing_terms
    }

    /// Escalates the missing-term warning list into a fatal error
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::MissingTerms`] if the list is non-empty
    pub fn require_no_missing(&self) -> OntomcResult<()> {
        if self.missing_terms.is_empty() {
            Ok(())
        } else {
            Err(OntomcError::MissingTerms(self.missing_terms.clone()))
        }
    }

    /// Returns the exemplar of the term's equivalence class
    ///
    /// Terms with identical gene coverage form one class; the exemplar
    /// is the most specific member (the first one encountered walking
    /// the ontology children-before-parents). A term without any
    /// associated gene is its own exemplar.
    pub fn exemplar_of(&self, term: TermId) -> TermId {
        self.exemplar[term.idx()]
    }

    /// Returns `true` if the term represents its equivalence class
    pub fn is_exemplar(&self, term: TermId) -> bool {
        self.exemplar[term.idx()] == term
    }

    /// Returns all members of the term's equivalence class
    pub fn equivalence_class(&self, term: TermId) -> TermGroup {
        let exemplar = self.exemplar_of(term);
        self.exemplar
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == exemplar)
            .map(|(idx, _)| TermId::from(idx))
            .collect()
    }

    /// Returns the sorted relevant, non-redundant terms: exemplars
    /// with at least one associated gene
    pub fn relevant_terms(&self) -> &TermGroup {
        &self.relevant
    }

    /// Hypergeometric enrichment p-values of the relevant terms within
    /// a query gene set
    ///
    /// Convenience wrapper around [`crate::stats::term_enrichment`]
    pub fn hypergeometric_pvalues(&self, query: &GeneGroup) -> Vec<crate::stats::Enrichment> {
        crate::stats::term_enrichment(self, query)
    }

    /// Partitions `names` into resolvable gene ids and unresolved
    /// names
    ///
    /// Matching is case-insensitive over primary names and aliases.
    /// Designed for interactive validation: it never fails, callers
    /// inspect [`GeneValidation::unresolved`] or call
    /// [`GeneValidation::into_strict`].
    pub fn validate_gene_names<S, I>(&self, names: I) -> GeneValidation
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S>,
    {
        let mut validation = GeneValidation::default();
        for name in names {
            match self.lookup.get(&name.as_ref().to_lowercase()) {
                Some(id) => validation.resolved.push(*id),
                None => validation.unresolved.push(name.as_ref().to_string()),
            }
        }
        validation
    }
}

/// Incremental construction state shared by the `from_*` constructors
struct Builder<'a> {
    ontology: &'a Ontology,
    closure: bool,
    genes: Vec<Gene>,
    lookup: HashMap<String, GeneId>,
    genes_by_term: Vec<GeneGroup>,
    missing_terms: Vec<String>,
}

impl<'a> Builder<'a> {
    fn new(ontology: &'a Ontology, closure: bool) -> Self {
        Builder {
            ontology,
            closure,
            genes: Vec::new(),
            lookup: HashMap::new(),
            genes_by_term: vec![GeneGroup::new(); ontology.len()],
            missing_terms: Vec::new(),
        }
    }

    /// Returns the gene id for a name, creating the gene on first use
    fn gene(&mut self, name: &str) -> GeneId {
        if let Some(&id) = self.lookup.get(&name.to_lowercase()) {
            return id;
        }
        let id = GeneId::from(self.genes.len());
        self.genes.push(Gene::new(id, name));
        self.lookup.insert(name.to_lowercase(), id);
        id
    }

    fn alias(&mut self, gene: GeneId, alias: &str) {
        self.genes[gene.idx()].add_alias(alias);
        self.lookup.entry(alias.to_lowercase()).or_insert(gene);
    }

    fn associate(&mut self, gene: GeneId, term_name: &str) {
        let Some(term) = self.ontology.id_of(term_name) else {
            if self.missing_terms.iter().all(|t| t != term_name) {
                self.missing_terms.push(term_name.to_string());
            }
            return;
        };
        if self.closure {
            for ancestor in self.ontology.get_unchecked(term).ancestors() {
                self.link(gene, ancestor);
            }
        } else {
            self.link(gene, term);
        }
    }

    fn link(&mut self, gene: GeneId, term: TermId) {
        self.genes[gene.idx()].add_term(term);
        self.genes_by_term[term.idx()].insert(gene);
    }

    fn finish(self) -> OntomcResult<AssociationIndex<'a>> {
        if !self.missing_terms.is_empty() {
            warn!(
                "{} associated term(s) missing from the ontology: {}",
                self.missing_terms.len(),
                self.missing_terms.join(", ")
            );
        }

        // Equivalence classes: walk children before parents so the
        // most specific member of each class becomes the exemplar.
        let mut exemplar: Vec<TermId> = (0..self.ontology.len()).map(TermId::from).collect();
        let mut seen: HashMap<&GeneGroup, TermId> = HashMap::new();
        for &id in self.ontology.toposort_order().iter().rev() {
            let coverage = &self.genes_by_term[id.idx()];
            if coverage.is_empty() {
                continue;
            }
            match seen.get(coverage) {
                Some(&class_exemplar) => exemplar[id.idx()] = class_exemplar,
                None => {
                    seen.insert(coverage, id);
                }
            }
        }

        let relevant: TermGroup = exemplar
            .iter()
            .enumerate()
            .map(|(idx, _)| TermId::from(idx))
            .filter(|id| exemplar[id.idx()] == *id && !self.genes_by_term[id.idx()].is_empty())
            .collect();

        Ok(AssociationIndex {
            ontology: self.ontology,
            genes: self.genes,
            lookup: self.lookup,
            genes_by_term: self.genes_by_term,
            missing_terms: self.missing_terms,
            exemplar,
            relevant,
        })
    }
}
