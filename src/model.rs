//! Per-gene-set latent state
//!
//! A [`Model`] binds one observed gene set to the association graph.
//! It owns a Boolean activation state for every *relevant* term (an
//! exemplar term sharing at least one gene with the query set) and
//! maintains, incrementally, the per-gene count of active covering
//! terms plus the Bernoulli sufficient statistics implied by the
//! current state.
//!
//! The hot path of the sampler is [`Model::count_delta`]: the change
//! in sufficient statistics for a candidate assignment, computed
//! without mutating anything and in time proportional to the genes
//! actually touched.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;

use crate::annotations::{GeneGroup, GeneId};
use crate::assocs::AssociationIndex;
use crate::bernoulli::{BernoulliCounts, Parameterization};
use crate::term::TermGroup;
use crate::{OntomcError, OntomcResult, TermId};

/// A sparse candidate assignment of term activation states
///
/// Keys are term ids, values the proposed activation. Assignments are
/// applied atomically; keys whose value equals the current state are
/// permitted and ignored.
pub type Assignment = BTreeMap<TermId, bool>;

/// The latent-state model of a single observed gene set
///
/// # Examples
///
/// ```
/// use ontomc::{AssociationIndex, Model, Ontology, Parameterization};
///
/// let ontology = Ontology::from_terms([("spider", vec!["arachnid"])]).unwrap();
/// let assocs = AssociationIndex::from_pairs(
///     &ontology,
///     [("charlotte", "spider"), ("aragog", "arachnid")],
///     true,
/// ).unwrap();
///
/// let genes = assocs.validate_gene_names(["charlotte"]).resolved;
/// let model = Model::new(&assocs, genes).unwrap();
/// assert_eq!(model.relevant_terms().len(), 2);
///
/// let params = Parameterization::pooled(&assocs);
/// let counts = model.counts(&params);
/// assert!(!counts.is_empty());
/// ```
pub struct Model<'a> {
    assocs: &'a AssociationIndex<'a>,
    gene_set: GeneGroup,
    in_gene_set: Vec<bool>,
    relevant: Vec<TermId>,
    /// position of each term inside `relevant`, dense over all terms
    relevant_pos: Vec<Option<u32>>,
    term_state: Vec<bool>,
    active: TermGroup,
    active_coverage: Vec<u32>,
}

impl<'a> Model<'a> {
    /// Binds a query gene set to the association graph
    ///
    /// All terms start inactive. Relevant terms are the non-redundant
    /// exemplars sharing at least one gene with the query.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::EmptyGeneSet`] for an empty query
    pub fn new(assocs: &'a AssociationIndex<'a>, genes: Vec<GeneId>) -> OntomcResult<Model<'a>> {
        if genes.is_empty() {
            return Err(OntomcError::EmptyGeneSet);
        }
        let gene_set: GeneGroup = genes.into_iter().collect();

        let mut in_gene_set = vec![false; assocs.num_genes()];
        for gene in &gene_set {
            in_gene_set[gene.idx()] = true;
        }

        let relevant: Vec<TermId> = assocs
            .relevant_terms()
            .iter()
            .filter(|term| {
                assocs
                    .genes_by_term(*term)
                    .iter()
                    .any(|gene| in_gene_set[gene.idx()])
            })
            .collect();

        let mut relevant_pos = vec![None; assocs.ontology().len()];
        for (pos, term) in relevant.iter().enumerate() {
            relevant_pos[term.idx()] = Some(pos as u32);
        }

        Ok(Model {
            assocs,
            gene_set,
            in_gene_set,
            term_state: vec![false; relevant.len()],
            relevant,
            relevant_pos,
            active: TermGroup::new(),
            active_coverage: vec![0; assocs.num_genes()],
        })
    }

    /// The query gene set
    pub fn gene_set(&self) -> &GeneGroup {
        &self.gene_set
    }

    /// The sorted relevant terms of this model
    pub fn relevant_terms(&self) -> &[TermId] {
        &self.relevant
    }

    /// Returns `true` if the term is relevant to this model
    pub fn is_relevant(&self, term: TermId) -> bool {
        self.relevant_pos[term.idx()].is_some()
    }

    /// The currently active terms
    pub fn active_terms(&self) -> &TermGroup {
        &self.active
    }

    /// The current activation state of a relevant term
    ///
    /// # Panics
    ///
    /// Panics if the term is not relevant to this model
    pub fn term_state(&self, term: TermId) -> bool {
        self.term_state[self.pos(term)]
    }

    /// Returns `true` if the gene belongs to the query set
    pub fn in_gene_set(&self, gene: GeneId) -> bool {
        self.in_gene_set[gene.idx()]
    }

    /// Returns `true` if any active term covers the gene
    pub fn is_covered(&self, gene: GeneId) -> bool {
        self.active_coverage[gene.idx()] > 0
    }

    fn pos(&self, term: TermId) -> usize {
        self.relevant_pos[term.idx()].expect("term must be relevant to the model") as usize
    }

    /// Sets the activation state of a relevant term
    ///
    /// A no-op if the value is unchanged. On an actual change the
    /// coverage counter of every associated gene is adjusted by one.
    ///
    /// # Panics
    ///
    /// Panics if the term is not relevant to this model
    pub fn set_term_state(&mut self, term: TermId, value: bool) {
        let pos = self.pos(term);
        if self.term_state[pos] == value {
            return;
        }
        self.term_state[pos] = value;
        if value {
            self.active.insert(term);
            for gene in self.assocs.genes_by_term(term) {
                self.active_coverage[gene.idx()] += 1;
            }
        } else {
            self.active.remove(term);
            for gene in self.assocs.genes_by_term(term) {
                self.active_coverage[gene.idx()] -= 1;
            }
        }
    }

    /// Applies a whole assignment
    ///
    /// # Panics
    ///
    /// Panics if any key is not relevant to this model
    pub fn apply(&mut self, assignment: &Assignment) {
        for (&term, &value) in assignment {
            self.set_term_state(term, value);
        }
    }

    /// Returns the assignment that would undo `assignment`: the same
    /// keys bound to their current values
    ///
    /// # Panics
    ///
    /// Panics if any key is not relevant to this model
    pub fn invert(&self, assignment: &Assignment) -> Assignment {
        assignment
            .keys()
            .map(|&term| (term, self.term_state(term)))
            .collect()
    }

    /// Recomputes the full sufficient statistics of the current state
    ///
    /// One count per relevant term (success when active, keyed by its
    /// prior parameter) and one per gene, from the 2×2 table of
    /// observed membership × coverage:
    ///
    /// | | in set | not in set |
    /// |---|---|---|
    /// | covered | fn failure | fn success |
    /// | not covered | fp success | fp failure |
    ///
    /// Used for initialization and invariant checks only; the sampler
    /// hot path uses [`Model::count_delta`].
    pub fn counts(&self, params: &Parameterization) -> BernoulliCounts {
        let mut counts = BernoulliCounts::default();
        for (pos, &term) in self.relevant.iter().enumerate() {
            let param = params.term_prior(term);
            if self.term_state[pos] {
                counts.add_succ(param, 1.0);
            } else {
                counts.add_fail(param, 1.0);
            }
        }
        for gene in self.assocs.genes() {
            let id = gene.id();
            match (self.is_covered(id), self.in_gene_set(id)) {
                (true, true) => counts.add_fail(params.false_neg(id), 1.0),
                (true, false) => counts.add_succ(params.false_neg(id), 1.0),
                (false, true) => counts.add_succ(params.false_pos(id), 1.0),
                (false, false) => counts.add_fail(params.false_pos(id), 1.0),
            }
        }
        counts
    }

    /// Computes the change in sufficient statistics for applying
    /// `assignment`, without mutating any state
    ///
    /// Gene factors change only when a gene's coverage crosses the
    /// zero boundary, so the cost is proportional to the genes of the
    /// terms actually flipped, not to the total gene count.
    ///
    /// # Panics
    ///
    /// Panics if any key is not relevant to this model
    pub fn count_delta(&self, params: &Parameterization, assignment: &Assignment) -> BernoulliCounts {
        let mut delta = BernoulliCounts::default();
        let mut coverage_delta: HashMap<GeneId, i64> = HashMap::new();

        for (&term, &value) in assignment {
            let pos = self.pos(term);
            if self.term_state[pos] == value {
                continue;
            }
            let param = params.term_prior(term);
            let sign: i64 = if value { 1 } else { -1 };
            delta.add_succ(param, sign as f64);
            delta.add_fail(param, -(sign as f64));
            for gene in self.assocs.genes_by_term(term) {
                *coverage_delta.entry(gene).or_insert(0) += sign;
            }
        }

        for (&gene, &change) in &coverage_delta {
            let old = i64::from(self.active_coverage[gene.idx()]);
            let was_covered = old > 0;
            let now_covered = old + change > 0;
            if was_covered == now_covered {
                continue;
            }
            let sign = if now_covered { 1.0 } else { -1.0 };
            // crossing the boundary swaps the gene's factor between
            // the false-positive and the false-negative parameter
            if self.in_gene_set(gene) {
                delta.add_succ(params.false_pos(gene), -sign);
                delta.add_fail(params.false_neg(gene), sign);
            } else {
                delta.add_fail(params.false_pos(gene), -sign);
                delta.add_succ(params.false_neg(gene), sign);
            }
        }
        delta
    }

    /// Proposes toggling one uniformly-chosen relevant term
    pub fn propose_flip<R: Rng + ?Sized>(&self, rng: &mut R) -> Assignment {
        let term = self.relevant[rng.gen_range(0..self.relevant.len())];
        Assignment::from([(term, !self.term_state(term))])
    }

    /// Proposes deactivating one uniformly-chosen active term while
    /// activating one uniformly-chosen inactive term
    ///
    /// The number of active terms is preserved, so the proposal is
    /// symmetric under its own inverse. Returns `None` when every term
    /// is active or every term inactive.
    pub fn propose_swap<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Assignment> {
        let num_active = self.active.len();
        let num_inactive = self.relevant.len() - num_active;
        if num_active == 0 || num_inactive == 0 {
            return None;
        }
        let active = self
            .active
            .get(rng.gen_range(0..num_active))
            .expect("index is within the active group");
        let nth = rng.gen_range(0..num_inactive);
        let inactive = self
            .relevant
            .iter()
            .filter(|term| !self.term_state(**term))
            .nth(nth)
            .copied()
            .expect("index is within the inactive terms");
        Some(Assignment::from([(active, false), (inactive, true)]))
    }

    /// Proposes an independent fair-coin redraw of the whole relevant
    /// vector
    pub fn propose_randomize<R: Rng + ?Sized>(&self, rng: &mut R) -> Assignment {
        self.relevant
            .iter()
            .map(|&term| (term, rng.gen_bool(0.5)))
            .collect()
    }

    /// Asserts that the incrementally maintained coverage counters
    /// match a recomputation from scratch
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::CountsMismatch`] on divergence
    pub fn check_coverage(&self) -> OntomcResult<()> {
        for gene in self.assocs.genes() {
            let expected: u32 = self.gene_terms_active(gene.id()).try_into()?;
            let actual = self.active_coverage[gene.id().idx()];
            if actual != expected {
                return Err(OntomcError::CountsMismatch {
                    param: format!("coverage[{}]", gene.name()),
                    running: f64::from(actual),
                    recomputed: f64::from(expected),
                });
            }
        }
        Ok(())
    }

    fn gene_terms_active(&self, gene: GeneId) -> usize {
        self.assocs
            .terms_by_gene(gene)
            .iter()
            .filter(|term| self.is_relevant(*term) && self.term_state(*term))
            .count()
    }
}
