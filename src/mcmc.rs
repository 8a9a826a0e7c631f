//! Metropolis-Hastings inference over term activation states
//!
//! The [`Sampler`] runs a single-threaded Markov chain over the joint
//! latent state of one or more [`Model`]s. Term-activation and
//! gene-noise probabilities are integrated out analytically against
//! their Beta priors, so each step only needs the collapsed
//! Beta-Bernoulli likelihood ratio implied by the proposal's count
//! delta. All randomness flows through one seeded generator, so a run
//! is reproducible from its configuration alone.
//!
//! # Examples
//!
//! ```
//! use ontomc::{AssociationIndex, McmcConfig, Ontology, Sampler};
//!
//! let ontology = Ontology::from_terms([("spider", vec!["arachnid"])]).unwrap();
//! let assocs = AssociationIndex::from_pairs(
//!     &ontology,
//!     [("charlotte", "spider"), ("aragog", "arachnid")],
//!     true,
//! ).unwrap();
//!
//! let genes = assocs.validate_gene_names(["charlotte"]).resolved;
//! let mut sampler = Sampler::new(&assocs, vec![genes], McmcConfig::default()).unwrap();
//! sampler.run(1_000);
//!
//! assert_eq!(sampler.num_samples(), 1_000);
//! sampler.check_counts().unwrap();
//! ```

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotations::GeneId;
use crate::assocs::AssociationIndex;
use crate::bernoulli::{BernoulliCounts, Parameterization};
use crate::model::Model;
use crate::stats;
use crate::{OntomcError, OntomcResult};

/// Terms below this raw p-value appear in the hypergeometric section
/// of the summary
const MAX_PVALUE_THRESHOLD: f64 = 0.05;
/// Terms and genes below this posterior marginal are elided from the
/// summary
const MIN_POSTERIOR_THRESHOLD: f64 = 0.01;

/// Relative rates of the three proposal kinds
///
/// Only the ratios matter; the rates are not required to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveRate {
    pub flip: f64,
    pub swap: f64,
    pub randomize: f64,
}

impl Default for MoveRate {
    fn default() -> Self {
        MoveRate {
            flip: 1.0,
            swap: 1.0,
            randomize: 0.0,
        }
    }
}

impl MoveRate {
    fn total(&self) -> f64 {
        self.flip + self.swap + self.randomize
    }

    /// # Errors
    ///
    /// Returns [`OntomcError::ZeroMoveRate`] unless at least one rate
    /// is positive and none is negative or non-finite
    fn validate(&self) -> OntomcResult<()> {
        let rates = [self.flip, self.swap, self.randomize];
        if rates.iter().all(|r| r.is_finite() && *r >= 0.0) && self.total() > 0.0 {
            Ok(())
        } else {
            Err(OntomcError::ZeroMoveRate)
        }
    }
}

/// Beta pseudo-counts for one parameter of the prior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorCounts {
    pub succ: f64,
    pub fail: f64,
}

/// Configuration of a sampler run
///
/// The `prior` maps parameter names to Beta pseudo-counts; parameters
/// it omits keep the uninformative Laplace prior of one pseudo-success
/// and one pseudo-failure. The first `burn_in` steps of the chain are
/// executed but not recorded; `samples` is the number of recorded
/// samples [`Sampler::run_configured`] draws after burn-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McmcConfig {
    pub prior: BTreeMap<String, PriorCounts>,
    pub move_rate: MoveRate,
    pub seed: u64,
    pub samples: u64,
    pub burn_in: u64,
}

impl Default for McmcConfig {
    fn default() -> Self {
        McmcConfig {
            prior: BTreeMap::new(),
            move_rate: MoveRate::default(),
            seed: 123_456_789,
            samples: 10_000,
            burn_in: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MoveKind {
    Flip,
    Swap,
    Randomize,
}

/// Proposed and accepted step counts for one proposal kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveCounter {
    pub proposed: u64,
    pub accepted: u64,
}

impl MoveCounter {
    /// The fraction of proposals of this kind that were accepted
    pub fn acceptance(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// Per-kind acceptance bookkeeping of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveStats {
    pub flip: MoveCounter,
    pub swap: MoveCounter,
    pub randomize: MoveCounter,
}

impl MoveStats {
    fn counter(&mut self, kind: MoveKind) -> &mut MoveCounter {
        match kind {
            MoveKind::Flip => &mut self.flip,
            MoveKind::Swap => &mut self.swap,
            MoveKind::Randomize => &mut self.randomize,
        }
    }
}

/// The Metropolis-Hastings sampler
///
/// Owns one [`Model`] per input gene set plus the running
/// counts-with-prior the acceptance ratio is evaluated against. Each
/// step picks a model weighted by its relevant-term count, picks a
/// proposal kind by the configured rates, and accepts with probability
/// `min(1, exp(Δ log-likelihood))`. Flip and swap proposals are
/// symmetric; randomize proposes every state with equal probability;
/// in all three cases the Hastings correction is one.
///
/// Occupancy counters accumulate after every recorded step, whether or
/// not the proposal was accepted.
pub struct Sampler<'a> {
    assocs: &'a AssociationIndex<'a>,
    params: Parameterization,
    config: McmcConfig,
    models: Vec<Model<'a>>,
    total_weight: usize,
    prior: BernoulliCounts,
    counts_with_prior: BernoulliCounts,
    rng: StdRng,
    steps: u64,
    samples: u64,
    term_occupancy: Vec<Vec<u64>>,
    false_pos_occupancy: Vec<Vec<u64>>,
    false_neg_occupancy: Vec<Vec<u64>>,
    move_stats: MoveStats,
}

impl<'a> Sampler<'a> {
    /// Builds a sampler over one model per input gene set
    ///
    /// # Errors
    ///
    /// - [`OntomcError::ZeroMoveRate`] if no proposal kind has a
    ///   positive rate
    /// - [`OntomcError::EmptyGeneSet`] if any gene set is empty
    /// - [`OntomcError::UndefinedParameter`] if the configured prior
    ///   names an unknown parameter
    pub fn new(
        assocs: &'a AssociationIndex<'a>,
        gene_sets: Vec<Vec<GeneId>>,
        config: McmcConfig,
    ) -> OntomcResult<Sampler<'a>> {
        config.move_rate.validate()?;

        let params = Parameterization::pooled(assocs);
        let mut prior = params.laplace_prior();
        for (name, pseudo) in &config.prior {
            let param = params
                .id_of(name)
                .ok_or_else(|| OntomcError::UndefinedParameter(name.clone()))?;
            // replace the Laplace pseudo-counts for this parameter
            prior.add_succ(param, pseudo.succ - prior.succ(param));
            prior.add_fail(param, pseudo.fail - prior.fail(param));
        }

        let models = gene_sets
            .into_iter()
            .map(|genes| Model::new(assocs, genes))
            .collect::<OntomcResult<Vec<_>>>()?;
        let total_weight = models.iter().map(|m| m.relevant_terms().len()).sum();

        let mut counts_with_prior = prior.clone();
        for model in &models {
            counts_with_prior.accum(&model.counts(&params));
        }

        let term_occupancy = models
            .iter()
            .map(|m| vec![0; m.relevant_terms().len()])
            .collect();
        let gene_zeros = vec![vec![0; assocs.num_genes()]; models.len()];

        info!(
            models = models.len(),
            variables = total_weight,
            seed = config.seed,
            "sampler initialized"
        );

        Ok(Sampler {
            assocs,
            params,
            rng: StdRng::seed_from_u64(config.seed),
            models,
            total_weight,
            prior,
            counts_with_prior,
            steps: 0,
            samples: 0,
            term_occupancy,
            false_pos_occupancy: gene_zeros.clone(),
            false_neg_occupancy: gene_zeros,
            move_stats: MoveStats::default(),
            config,
        })
    }

    /// The models of this run, one per input gene set
    pub fn models(&self) -> &[Model<'a>] {
        &self.models
    }

    /// The parameterization shared by all models
    pub fn params(&self) -> &Parameterization {
        &self.params
    }

    /// The Beta prior pseudo-counts of the run
    pub fn prior(&self) -> &BernoulliCounts {
        &self.prior
    }

    /// Total steps executed, including burn-in
    pub fn num_steps(&self) -> u64 {
        self.steps
    }

    /// Recorded samples, excluding burn-in
    pub fn num_samples(&self) -> u64 {
        self.samples
    }

    /// Per-kind proposal and acceptance counts
    pub fn move_stats(&self) -> &MoveStats {
        &self.move_stats
    }

    /// Unthresholded posterior marginals of one model's relevant
    /// terms, in `relevant_terms` order
    ///
    /// All zeros before the first recorded sample.
    pub fn term_marginals(&self, model_idx: usize) -> Vec<f64> {
        let occupancy = &self.term_occupancy[model_idx];
        if self.samples == 0 {
            return vec![0.0; occupancy.len()];
        }
        occupancy
            .iter()
            .map(|n| *n as f64 / self.samples as f64)
            .collect()
    }

    /// Runs `steps` MCMC steps
    ///
    /// Steps past the configured burn-in record occupancy; a caller
    /// wanting to inspect progress can invoke `run` repeatedly with
    /// smaller blocks.
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
        debug!(
            steps = self.steps,
            samples = self.samples,
            log_likelihood = self.counts_with_prior.log_beta_bernoulli(&self.prior),
            "run block complete"
        );
    }

    /// Runs the configured burn-in plus `samples` recorded samples
    ///
    /// On a fresh sampler `num_samples()` equals `config.samples`
    /// afterwards.
    pub fn run_configured(&mut self) {
        self.run(self.config.burn_in + self.config.samples);
    }

    fn step(&mut self) {
        if self.total_weight > 0 {
            let model_idx = self.choose_model();
            let kind = self.choose_move();
            self.propose(model_idx, kind);
        }
        self.steps += 1;
        if self.steps > self.config.burn_in {
            self.record();
        }
    }

    /// Chooses a model with probability proportional to its
    /// relevant-term count
    fn choose_model(&mut self) -> usize {
        let mut pick = self.rng.gen_range(0..self.total_weight);
        for (idx, model) in self.models.iter().enumerate() {
            let weight = model.relevant_terms().len();
            if pick < weight {
                return idx;
            }
            pick -= weight;
        }
        unreachable!("pick is bounded by the total weight")
    }

    fn choose_move(&mut self) -> MoveKind {
        let rate = self.config.move_rate;
        let pick = self.rng.gen::<f64>() * rate.total();
        if pick < rate.flip {
            MoveKind::Flip
        } else if pick < rate.flip + rate.swap {
            MoveKind::Swap
        } else {
            MoveKind::Randomize
        }
    }

    fn propose(&mut self, model_idx: usize, kind: MoveKind) {
        let model = &self.models[model_idx];
        let assignment = match kind {
            MoveKind::Flip => Some(model.propose_flip(&mut self.rng)),
            MoveKind::Swap => model.propose_swap(&mut self.rng),
            MoveKind::Randomize => Some(model.propose_randomize(&mut self.rng)),
        };
        self.move_stats.counter(kind).proposed += 1;

        // a degenerate swap proposes nothing; the current state is
        // recorded as the next sample
        let Some(assignment) = assignment else {
            return;
        };

        // collapsed likelihood ratio: the delta evaluated against the
        // running counts-with-prior is exactly the log of
        // P(new)/P(old) with all probabilities integrated out
        let delta = model.count_delta(&self.params, &assignment);
        let log_ratio = delta.log_beta_bernoulli(&self.counts_with_prior);
        let accept = log_ratio >= 0.0 || self.rng.gen::<f64>() < log_ratio.exp();
        if accept {
            self.models[model_idx].apply(&assignment);
            self.counts_with_prior.accum(&delta);
            self.move_stats.counter(kind).accepted += 1;
        }
    }

    /// Accumulates the current state of every model into the
    /// occupancy counters
    fn record(&mut self) {
        for (idx, model) in self.models.iter().enumerate() {
            for (pos, term) in model.relevant_terms().iter().enumerate() {
                if model.term_state(*term) {
                    self.term_occupancy[idx][pos] += 1;
                }
            }
            for gene in self.assocs.genes() {
                let id = gene.id();
                match (model.is_covered(id), model.in_gene_set(id)) {
                    (false, true) => self.false_pos_occupancy[idx][id.idx()] += 1,
                    (true, false) => self.false_neg_occupancy[idx][id.idx()] += 1,
                    _ => {}
                }
            }
        }
        self.samples += 1;
    }

    /// Verifies the incrementally maintained state against a full
    /// recomputation
    ///
    /// Checks every model's coverage counters and compares the running
    /// counts-with-prior against the prior plus freshly recomputed
    /// model counts. All increments are integral, so the comparison is
    /// exact.
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::CountsMismatch`] on the first divergence
    pub fn check_counts(&self) -> OntomcResult<()> {
        for model in &self.models {
            model.check_coverage()?;
        }
        let mut recomputed = self.prior.clone();
        for model in &self.models {
            recomputed.accum(&model.counts(&self.params));
        }
        for param in self.counts_with_prior.touched_with(&recomputed) {
            for (running, fresh) in [
                (self.counts_with_prior.succ(param), recomputed.succ(param)),
                (self.counts_with_prior.fail(param), recomputed.fail(param)),
            ] {
                if running != fresh {
                    return Err(OntomcError::CountsMismatch {
                        param: self.params.name_of(param).to_string(),
                        running,
                        recomputed: fresh,
                    });
                }
            }
        }
        Ok(())
    }

    /// Builds the serializable summary of the run so far
    ///
    /// Posterior marginals are occupancy frequencies over the recorded
    /// samples; the hypergeometric section is the frequentist
    /// diagnostic computed independently of the chain.
    pub fn summary(&self) -> Summary {
        let ontology = self.assocs.ontology();
        let term_name = |term| {
            ontology
                .term(term)
                .expect("relevant terms exist in the ontology")
                .name()
                .to_string()
        };

        let num_tests = self.assocs.relevant_terms().len();
        let gene_sets = self
            .models
            .iter()
            .enumerate()
            .map(|(idx, model)| {
                let mut pvalues = BTreeMap::new();
                for e in stats::term_enrichment(self.assocs, model.gene_set()) {
                    if e.pvalue() <= MAX_PVALUE_THRESHOLD {
                        pvalues.insert(term_name(e.term()), e.pvalue());
                    }
                }

                let mut term_marginal = BTreeMap::new();
                let mut false_pos = BTreeMap::new();
                let mut false_neg = BTreeMap::new();
                if self.samples > 0 {
                    let total = self.samples as f64;
                    for (pos, term) in model.relevant_terms().iter().enumerate() {
                        let prob = self.term_occupancy[idx][pos] as f64 / total;
                        if prob >= MIN_POSTERIOR_THRESHOLD {
                            term_marginal.insert(term_name(*term), prob);
                        }
                    }
                    for gene in self.assocs.genes() {
                        let gidx = gene.id().idx();
                        let fp = self.false_pos_occupancy[idx][gidx] as f64 / total;
                        if fp >= MIN_POSTERIOR_THRESHOLD {
                            false_pos.insert(gene.name().to_string(), fp);
                        }
                        let fn_ = self.false_neg_occupancy[idx][gidx] as f64 / total;
                        if fn_ >= MIN_POSTERIOR_THRESHOLD {
                            false_neg.insert(gene.name().to_string(), fn_);
                        }
                    }
                }

                GeneSetSummary {
                    hypergeometric_p_value: HypergeometricSummary {
                        max_threshold: MAX_PVALUE_THRESHOLD,
                        bonferroni_max_threshold: MAX_PVALUE_THRESHOLD / num_tests.max(1) as f64,
                        term: pvalues,
                    },
                    posterior_marginal: PosteriorSummary {
                        min_threshold: MIN_POSTERIOR_THRESHOLD,
                        term: term_marginal,
                        gene: GeneMarginals {
                            false_pos,
                            false_neg,
                        },
                    },
                }
            })
            .collect();

        let prior = self
            .params
            .params()
            .map(|param| {
                let name = self.params.name_of(param).to_string();
                let pseudo = PriorCounts {
                    succ: self.prior.succ(param),
                    fail: self.prior.fail(param),
                };
                (name, pseudo)
            })
            .collect();

        Summary {
            model: ModelSummary { prior },
            mcmc: RunSummary {
                samples: self.samples,
                burn_in: self.config.burn_in,
                seed: self.config.seed,
                move_rate: self.config.move_rate,
                moves: self.move_stats,
            },
            gene_sets,
        }
    }
}

/// Serializable report of a sampler run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub model: ModelSummary,
    pub mcmc: RunSummary,
    #[serde(rename = "summary")]
    pub gene_sets: Vec<GeneSetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub prior: BTreeMap<String, PriorCounts>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub samples: u64,
    pub burn_in: u64,
    pub seed: u64,
    pub move_rate: MoveRate,
    pub moves: MoveStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneSetSummary {
    pub hypergeometric_p_value: HypergeometricSummary,
    pub posterior_marginal: PosteriorSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HypergeometricSummary {
    pub max_threshold: f64,
    pub bonferroni_max_threshold: f64,
    pub term: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosteriorSummary {
    pub min_threshold: f64,
    pub term: BTreeMap<String, f64>,
    pub gene: GeneMarginals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneMarginals {
    pub false_pos: BTreeMap<String, f64>,
    pub false_neg: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{spider_assocs, spider_ontology};

    fn query(assocs: &AssociationIndex) -> Vec<GeneId> {
        assocs
            .validate_gene_names(["peter-parker", "may-parker", "kingkong"])
            .into_strict()
            .unwrap()
    }

    #[test]
    fn zero_move_rate_is_rejected() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            move_rate: MoveRate {
                flip: 0.0,
                swap: 0.0,
                randomize: 0.0,
            },
            ..McmcConfig::default()
        };
        assert!(matches!(
            Sampler::new(&assocs, vec![query(&assocs)], config),
            Err(OntomcError::ZeroMoveRate)
        ));
    }

    #[test]
    fn empty_gene_set_is_rejected() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        assert!(matches!(
            Sampler::new(&assocs, vec![vec![]], McmcConfig::default()),
            Err(OntomcError::EmptyGeneSet)
        ));
    }

    #[test]
    fn unknown_prior_parameter_is_rejected() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            prior: BTreeMap::from([(
                "nonsense".to_string(),
                PriorCounts {
                    succ: 1.0,
                    fail: 1.0,
                },
            )]),
            ..McmcConfig::default()
        };
        assert!(matches!(
            Sampler::new(&assocs, vec![query(&assocs)], config),
            Err(OntomcError::UndefinedParameter(name)) if name == "nonsense"
        ));
    }

    #[test]
    fn configured_prior_overrides_laplace() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            prior: BTreeMap::from([(
                "fp".to_string(),
                PriorCounts {
                    succ: 3.0,
                    fail: 17.0,
                },
            )]),
            ..McmcConfig::default()
        };
        let sampler = Sampler::new(&assocs, vec![query(&assocs)], config).unwrap();

        let fp = sampler.params().id_of("fp").unwrap();
        let t = sampler.params().id_of("t").unwrap();
        assert_eq!(sampler.prior().succ(fp), 3.0);
        assert_eq!(sampler.prior().fail(fp), 17.0);
        assert_eq!(sampler.prior().succ(t), 1.0);
        assert_eq!(sampler.prior().fail(t), 1.0);
    }

    #[test]
    fn counts_stay_consistent_over_a_run() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let mut sampler =
            Sampler::new(&assocs, vec![query(&assocs)], McmcConfig::default()).unwrap();

        for _ in 0..20 {
            sampler.run(50);
            sampler.check_counts().unwrap();
        }
        assert_eq!(sampler.num_steps(), 1_000);
        assert_eq!(sampler.num_samples(), 1_000);
    }

    #[test]
    fn burn_in_is_not_recorded() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            burn_in: 300,
            ..McmcConfig::default()
        };
        let mut sampler = Sampler::new(&assocs, vec![query(&assocs)], config).unwrap();

        sampler.run(1_000);
        assert_eq!(sampler.num_steps(), 1_000);
        assert_eq!(sampler.num_samples(), 700);
    }

    #[test]
    fn every_step_is_proposed_once() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let mut sampler =
            Sampler::new(&assocs, vec![query(&assocs)], McmcConfig::default()).unwrap();

        sampler.run(500);
        let stats = sampler.move_stats();
        assert_eq!(
            stats.flip.proposed + stats.swap.proposed + stats.randomize.proposed,
            500
        );
        assert!(stats.flip.accepted <= stats.flip.proposed);
        assert_eq!(stats.randomize.proposed, 0);
    }

    #[test]
    fn multiple_gene_sets_are_sampled_jointly() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let second = assocs
            .validate_gene_names(["socrates", "charlotte"])
            .into_strict()
            .unwrap();
        let mut sampler =
            Sampler::new(&assocs, vec![query(&assocs), second], McmcConfig::default()).unwrap();

        sampler.run(2_000);
        sampler.check_counts().unwrap();

        let summary = sampler.summary();
        assert_eq!(summary.gene_sets.len(), 2);
    }

    #[test]
    fn flip_only_chain_visits_high_likelihood_states() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            move_rate: MoveRate {
                flip: 1.0,
                swap: 0.0,
                randomize: 0.0,
            },
            ..McmcConfig::default()
        };
        let mut sampler = Sampler::new(&assocs, vec![query(&assocs)], config).unwrap();
        sampler.run(20_000);

        // mutant covers peter-parker, may-parker and kingkong and
        // nothing else: activating it alone explains the query without
        // a single noise count, so it must dominate the marginals
        let summary = sampler.summary();
        let marginals = &summary.gene_sets[0].posterior_marginal.term;
        let mutant = marginals.get("mutant").copied().unwrap_or(0.0);
        for (name, prob) in marginals {
            assert!(
                *prob <= mutant,
                "{name} at {prob} beats mutant at {mutant}"
            );
        }
        let animal = marginals.get("animal").copied().unwrap_or(0.0);
        assert!(mutant > animal, "mutant {mutant} vs animal {animal}");
    }

    #[test]
    fn randomize_chain_matches_exact_posterior() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let charlotte = assocs
            .validate_gene_names(["charlotte"])
            .into_strict()
            .unwrap();

        // charlotte alone keeps the state space enumerable: only
        // spider, arachnid and animal cover her, giving 8 states
        let params = crate::bernoulli::Parameterization::pooled(&assocs);
        let prior = params.laplace_prior();
        let mut model = crate::model::Model::new(&assocs, charlotte.clone()).unwrap();
        let relevant: Vec<_> = model.relevant_terms().to_vec();
        assert_eq!(relevant.len(), 3);

        let mut log_weights = Vec::new();
        for mask in 0u32..(1 << relevant.len()) {
            for (bit, &term) in relevant.iter().enumerate() {
                model.set_term_state(term, mask & (1 << bit) != 0);
            }
            log_weights.push(model.counts(&params).log_beta_bernoulli(&prior));
        }
        let max = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = log_weights.iter().map(|lw| (lw - max).exp()).collect();
        let total: f64 = weights.iter().sum();

        let exact_marginal = |bit: usize| {
            weights
                .iter()
                .enumerate()
                .filter(|(mask, _)| mask & (1 << bit) != 0)
                .map(|(_, w)| w)
                .sum::<f64>()
                / total
        };

        let config = McmcConfig {
            move_rate: MoveRate {
                flip: 0.0,
                swap: 0.0,
                randomize: 1.0,
            },
            ..McmcConfig::default()
        };
        let mut sampler = Sampler::new(&assocs, vec![charlotte], config).unwrap();
        sampler.run(100_000);

        let empirical = sampler.term_marginals(0);
        // an independence sampler decorrelates at roughly its
        // acceptance rate, which scales the effective sample size
        let stats = sampler.move_stats().randomize;
        let effective = sampler.num_samples() as f64 * stats.acceptance().max(0.01);
        for (bit, &term) in relevant.iter().enumerate() {
            let exact = exact_marginal(bit);
            let term_ref = ontology.term(term).unwrap();
            let name = term_ref.name();
            let sigma = (exact * (1.0 - exact) / effective).sqrt();
            assert!(
                (empirical[bit] - exact).abs() < 4.0 * sigma + 1e-3,
                "{name}: empirical {} vs exact {exact} (sigma {sigma})",
                empirical[bit]
            );
        }
    }

    #[test]
    fn identical_seeds_give_identical_summaries() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);

        let mut serialized = Vec::new();
        for _ in 0..2 {
            let mut sampler =
                Sampler::new(&assocs, vec![query(&assocs)], McmcConfig::default()).unwrap();
            sampler.run(3_000);
            serialized.push(serde_json::to_string(&sampler.summary()).unwrap());
        }
        assert_eq!(serialized[0], serialized[1]);
    }

    #[test]
    fn different_seeds_diverge() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);

        let run = |seed: u64| {
            let config = McmcConfig {
                seed,
                ..McmcConfig::default()
            };
            let mut sampler = Sampler::new(&assocs, vec![query(&assocs)], config).unwrap();
            sampler.run(3_000);
            serde_json::to_string(&sampler.summary()).unwrap()
        };
        assert_ne!(run(1), run(2));
    }

    #[test]
    fn summary_serializes_with_camel_case_keys() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let mut sampler =
            Sampler::new(&assocs, vec![query(&assocs)], McmcConfig::default()).unwrap();
        sampler.run(1_000);

        let json = serde_json::to_value(sampler.summary()).unwrap();
        assert!(json["model"]["prior"]["t"]["succ"].is_number());
        assert!(json["mcmc"]["moveRate"]["flip"].is_number());
        assert!(json["summary"][0]["hypergeometricPValue"]["maxThreshold"].is_number());
        assert!(json["summary"][0]["posteriorMarginal"]["gene"]["falsePos"].is_object());
    }

    #[test]
    fn config_deserializes_from_camel_case() {
        let config: McmcConfig = serde_json::from_str(
            r#"{
                "prior": {"fn": {"succ": 2.0, "fail": 8.0}},
                "moveRate": {"flip": 2.0, "randomize": 1.0},
                "seed": 7,
                "samples": 5000,
                "burnIn": 100
            }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.samples, 5000);
        assert_eq!(config.burn_in, 100);
        assert_eq!(config.move_rate.flip, 2.0);
        assert_eq!(config.move_rate.swap, 1.0); // default survives
        assert_eq!(config.move_rate.randomize, 1.0);
        assert_eq!(config.prior["fn"].succ, 2.0);

        // the option survives a round trip instead of being dropped
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["samples"], 5000);
    }

    #[test]
    fn configured_sample_count_drives_a_full_run() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let config = McmcConfig {
            samples: 500,
            burn_in: 100,
            ..McmcConfig::default()
        };
        let mut sampler = Sampler::new(&assocs, vec![query(&assocs)], config).unwrap();

        sampler.run_configured();
        assert_eq!(sampler.num_steps(), 600);
        assert_eq!(sampler.num_samples(), 500);
    }
}
