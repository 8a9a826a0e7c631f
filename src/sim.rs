//! Forward simulation of observed gene sets
//!
//! The [`Simulator`] is the generative counterpart of the sampler: it
//! draws one set of Bernoulli probabilities from the Beta prior, then
//! produces replicates by activating terms at their prior probability
//! and pushing the resulting gene coverage through per-gene
//! false-positive and false-negative noise. Each replicate reports the
//! ground-truth terms alongside the noiseless and observed gene sets,
//! so an inference run over the observed set can be scored against
//! what actually generated it.
//!
//! # Examples
//!
//! ```
//! use ontomc::{AssociationIndex, Ontology, Simulator};
//! use ontomc::sim::SimConfig;
//!
//! let ontology = Ontology::from_terms([("spider", vec!["arachnid"])]).unwrap();
//! let assocs = AssociationIndex::from_pairs(
//!     &ontology,
//!     [("charlotte", "spider"), ("aragog", "arachnid")],
//!     true,
//! ).unwrap();
//!
//! let mut sim = Simulator::new(&assocs, SimConfig::default()).unwrap();
//! let replicates = sim.sample(10).unwrap();
//! assert_eq!(replicates.len(), 10);
//! ```

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotations::GeneGroup;
use crate::assocs::AssociationIndex;
use crate::bernoulli::{BernoulliParams, Parameterization};
use crate::mcmc::PriorCounts;
use crate::term::TermGroup;
use crate::{OntomcError, OntomcResult};

/// Configuration of a simulation
///
/// As with the sampler, `prior` overrides the Laplace pseudo-counts of
/// individual parameters. `exclude_ancestral_terms` keeps a term
/// inactive whenever one of its ancestors is already active;
/// `exclude_redundant_terms` restricts activation to the exemplar of
/// each equivalence class. Both produce minimal ground truth that an
/// inference run can be expected to recover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    pub prior: BTreeMap<String, PriorCounts>,
    pub seed: u64,
    pub exclude_ancestral_terms: bool,
    pub exclude_redundant_terms: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            prior: BTreeMap::new(),
            seed: 123_456_789,
            exclude_ancestral_terms: true,
            exclude_redundant_terms: true,
        }
    }
}

/// One simulated gene set with its generative ground truth
///
/// Term and gene names are sorted by their ontology and gene index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replicate {
    /// the terms drawn active
    pub active_terms: Vec<String>,
    /// genes covered by the active terms, before noise
    pub noiseless: Vec<String>,
    /// the observed gene set, after false-positive and
    /// false-negative noise
    pub observed: Vec<String>,
}

/// The forward generative model
pub struct Simulator<'a> {
    assocs: &'a AssociationIndex<'a>,
    params: Parameterization,
    config: SimConfig,
    sampled: BernoulliParams,
    rng: StdRng,
}

impl<'a> Simulator<'a> {
    /// Draws one global parameter sample from the prior and readies
    /// the replicate loop
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] if the configured
    /// prior names an unknown parameter
    pub fn new(assocs: &'a AssociationIndex<'a>, config: SimConfig) -> OntomcResult<Simulator<'a>> {
        let params = Parameterization::pooled(assocs);
        let mut prior = params.laplace_prior();
        for (name, pseudo) in &config.prior {
            let param = params
                .id_of(name)
                .ok_or_else(|| OntomcError::UndefinedParameter(name.clone()))?;
            prior.add_succ(param, pseudo.succ - prior.succ(param));
            prior.add_fail(param, pseudo.fail - prior.fail(param));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let sampled = prior.sample_params(&mut rng);
        debug!(seed = config.seed, "simulator parameters drawn");

        Ok(Simulator {
            assocs,
            params,
            config,
            sampled,
            rng,
        })
    }

    /// The global parameter sample all replicates share
    pub fn sampled_params(&self) -> &BernoulliParams {
        &self.sampled
    }

    /// The sampled probabilities keyed by parameter name, for
    /// reporting alongside the replicates
    pub fn sampled_probs(&self) -> BTreeMap<String, f64> {
        self.sampled
            .iter()
            .map(|(param, prob)| (self.params.name_of(param).to_string(), prob))
            .collect()
    }

    /// Generates one replicate
    ///
    /// Terms are visited parents-first; a term with no associated
    /// genes is never activated. Coverage is the union of the active
    /// terms' gene sets; a covered gene is observed unless its
    /// false-negative coin fires, an uncovered one only if its
    /// false-positive coin fires.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] if a parameter
    /// probability was never drawn
    pub fn replicate(&mut self) -> OntomcResult<Replicate> {
        let ontology = self.assocs.ontology();

        let mut active = TermGroup::new();
        for &term in ontology.toposort_order() {
            if self.assocs.genes_by_term(term).is_empty() {
                continue;
            }
            if self.config.exclude_redundant_terms && !self.assocs.is_exemplar(term) {
                continue;
            }
            if self.config.exclude_ancestral_terms {
                let ancestors = ontology.get_unchecked(term).ancestors();
                if active.iter().any(|a| ancestors.contains(a)) {
                    continue;
                }
            }
            let prob = self.sampled.prob(self.params.term_prior(term))?;
            if self.rng.gen_bool(prob) {
                active.insert(term);
            }
        }

        let mut covered = GeneGroup::new();
        for term in &active {
            for gene in self.assocs.genes_by_term(term) {
                covered.insert(gene);
            }
        }

        let mut observed = GeneGroup::new();
        for gene in self.assocs.genes() {
            let id = gene.id();
            let prob_observed = if covered.contains(id) {
                1.0 - self.sampled.prob(self.params.false_neg(id))?
            } else {
                self.sampled.prob(self.params.false_pos(id))?
            };
            if self.rng.gen_bool(prob_observed) {
                observed.insert(id);
            }
        }

        let gene_names = |group: &GeneGroup| {
            group
                .iter()
                .map(|id| {
                    self.assocs
                        .gene(id)
                        .expect("covered genes exist in the index")
                        .name()
                        .to_string()
                })
                .collect()
        };
        Ok(Replicate {
            active_terms: active
                .iter()
                .map(|id| {
                    ontology
                        .term(id)
                        .expect("active terms exist in the ontology")
                        .name()
                        .to_string()
                })
                .collect(),
            noiseless: gene_names(&covered),
            observed: gene_names(&observed),
        })
    }

    /// Generates `n` replicates
    ///
    /// # Errors
    ///
    /// Returns the first error of [`Simulator::replicate`]
    pub fn sample(&mut self, n: usize) -> OntomcResult<Vec<Replicate>> {
        (0..n).map(|_| self.replicate()).collect()
    }
}
