//! Conjugate Beta-Bernoulli parameter bookkeeping
//!
//! Every Bernoulli probability in the model (term activation priors,
//! per-gene false-positive and false-negative rates) is a named
//! parameter with a conjugate Beta prior expressed as pseudocounts.
//! [`BernoulliCounts`] tracks success/failure counts per parameter,
//! [`BernoulliParams`] holds concrete probability estimates, and
//! [`Parameterization`] maps terms and genes onto the (possibly
//! shared) parameter vocabulary.
//!
//! All likelihood arithmetic is carried out in log space: an
//! enrichment run touches thousands of term and gene factors and their
//! product underflows `f64` long before any single factor does.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;

use rand::Rng;
use rand_distr::{Beta, Distribution};
use statrs::function::beta::ln_beta;

use crate::annotations::{Gene, GeneId};
use crate::assocs::AssociationIndex;
use crate::term::Term;
use crate::{OntomcError, OntomcResult, TermId};

/// Interned key of a named Bernoulli parameter
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParamId {
    inner: u32,
}

impl ParamId {
    fn idx(self) -> usize {
        self.inner as usize
    }
}

impl From<usize> for ParamId {
    fn from(inner: usize) -> Self {
        ParamId {
            inner: u32::try_from(inner).expect("more than u32::MAX parameters"),
        }
    }
}

impl Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P:{}", self.inner)
    }
}

/// Maps terms and genes to named Bernoulli parameters
///
/// Each term carries an activation-prior parameter; each gene carries
/// a false-positive and a false-negative parameter. By default the
/// model is fully pooled: one shared term prior (`t`) and two shared
/// observation-noise parameters (`fp`, `fn`). Custom mapping functions
/// produce hierarchical models, e.g. one prior per ontology branch.
///
/// # Examples
///
/// ```
/// use ontomc::{AssociationIndex, Ontology, Parameterization};
///
/// let ontology = Ontology::from_terms([("spider", vec!["arachnid"])]).unwrap();
/// let assocs = AssociationIndex::from_pairs(
///     &ontology, [("charlotte", "spider")], true,
/// ).unwrap();
///
/// let params = Parameterization::pooled(&assocs);
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Parameterization {
    names: Vec<String>,
    index: HashMap<String, ParamId>,
    term_prior: Vec<ParamId>,
    gene_false_pos: Vec<ParamId>,
    gene_false_neg: Vec<ParamId>,
}

impl Parameterization {
    /// The fully pooled default: every term shares the prior key `t`,
    /// every gene shares the noise keys `fp` and `fn`
    pub fn pooled(assocs: &AssociationIndex) -> Self {
        Self::with_maps(assocs, |_| "t".to_string(), |_| {
            ("fp".to_string(), "fn".to_string())
        })
    }

    /// Builds a parameterization from custom term and gene mappings
    ///
    /// `term_map` names the activation-prior parameter of each term;
    /// `gene_map` names the `(false positive, false negative)`
    /// parameters of each gene. Identical names share one parameter.
    pub fn with_maps<TF, GF>(assocs: &AssociationIndex, term_map: TF, gene_map: GF) -> Self
    where
        TF: Fn(Term<'_>) -> String,
        GF: Fn(&Gene) -> (String, String),
    {
        let mut p = Parameterization {
            names: Vec::new(),
            index: HashMap::new(),
            term_prior: Vec::with_capacity(assocs.ontology().len()),
            gene_false_pos: Vec::with_capacity(assocs.num_genes()),
            gene_false_neg: Vec::with_capacity(assocs.num_genes()),
        };
        for term in assocs.ontology().terms() {
            let id = p.intern(term_map(term));
            p.term_prior.push(id);
        }
        for gene in assocs.genes() {
            let (fp, fn_) = gene_map(gene);
            let fp = p.intern(fp);
            let fn_ = p.intern(fn_);
            p.gene_false_pos.push(fp);
            p.gene_false_neg.push(fn_);
        }
        p
    }

    fn intern(&mut self, name: String) -> ParamId {
        if let Some(&id) = self.index.get(&name) {
            return id;
        }
        let id = ParamId::from(self.names.len());
        self.index.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Returns the number of distinct parameters
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the vocabulary is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the activation-prior parameter of a term
    pub fn term_prior(&self, term: TermId) -> ParamId {
        self.term_prior[term.idx()]
    }

    /// Returns the false-positive parameter of a gene
    pub fn false_pos(&self, gene: GeneId) -> ParamId {
        self.gene_false_pos[gene.idx()]
    }

    /// Returns the false-negative parameter of a gene
    pub fn false_neg(&self, gene: GeneId) -> ParamId {
        self.gene_false_neg[gene.idx()]
    }

    /// Returns the name of a parameter
    pub fn name_of(&self, param: ParamId) -> &str {
        &self.names[param.idx()]
    }

    /// Returns the parameter with the given name, if declared
    pub fn id_of(&self, name: &str) -> Option<ParamId> {
        self.index.get(name).copied()
    }

    /// Returns an iterator of all parameter ids
    pub fn params(&self) -> impl Iterator<Item = ParamId> + '_ {
        (0..self.names.len()).map(ParamId::from)
    }

    /// Returns the uninformative symmetric prior: 1 pseudo-success and
    /// 1 pseudo-failure for every known parameter
    pub fn laplace_prior(&self) -> BernoulliCounts {
        let mut counts = BernoulliCounts::default();
        for param in self.params() {
            counts.add_succ(param, 1.0);
            counts.add_fail(param, 1.0);
        }
        counts
    }
}

/// Success/failure counts per named parameter
///
/// Counts are non-negative reals when describing priors or observed
/// sufficient statistics, but may be negative inside a *delta* (the
/// change in sufficient statistics induced by a state change). An
/// absent key is equivalent to a count of zero; accumulation prunes
/// keys whose count returns to exactly zero.
///
/// Stored in `BTreeMap`s so iteration order, and with it every
/// floating-point summation in the crate, is deterministic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BernoulliCounts {
    succ: BTreeMap<ParamId, f64>,
    fail: BTreeMap<ParamId, f64>,
}

impl BernoulliCounts {
    /// Returns the success count of a parameter (0 if absent)
    pub fn succ(&self, param: ParamId) -> f64 {
        self.succ.get(&param).copied().unwrap_or(0.0)
    }

    /// Returns the failure count of a parameter (0 if absent)
    pub fn fail(&self, param: ParamId) -> f64 {
        self.fail.get(&param).copied().unwrap_or(0.0)
    }

    /// Adds to the success count of a parameter
    pub fn add_succ(&mut self, param: ParamId, delta: f64) {
        Self::bump(&mut self.succ, param, delta);
    }

    /// Adds to the failure count of a parameter
    pub fn add_fail(&mut self, param: ParamId, delta: f64) {
        Self::bump(&mut self.fail, param, delta);
    }

    fn bump(map: &mut BTreeMap<ParamId, f64>, param: ParamId, delta: f64) {
        if delta == 0.0 {
            return;
        }
        let entry = map.entry(param).or_insert(0.0);
        *entry += delta;
        if *entry == 0.0 {
            map.remove(&param);
        }
    }

    /// Elementwise accumulation of `other` into `self`
    pub fn accum(&mut self, other: &BernoulliCounts) {
        for (&param, &count) in &other.succ {
            self.add_succ(param, count);
        }
        for (&param, &count) in &other.fail {
            self.add_fail(param, count);
        }
    }

    /// Returns the elementwise sum of `self` and `other`
    pub fn add(&self, other: &BernoulliCounts) -> BernoulliCounts {
        let mut result = self.clone();
        result.accum(other);
        result
    }

    /// Returns `true` if no parameter has a nonzero count
    pub fn is_empty(&self) -> bool {
        self.succ.is_empty() && self.fail.is_empty()
    }

    /// The sorted set of parameters touched by `self` or `other`
    pub(crate) fn touched_with<'a>(&'a self, other: &'a BernoulliCounts) -> Vec<ParamId> {
        let mut keys: Vec<ParamId> = self
            .succ
            .keys()
            .chain(self.fail.keys())
            .chain(other.succ.keys())
            .chain(other.fail.keys())
            .copied()
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Log-likelihood of the counts under concrete probabilities:
    /// `Σ succ·ln(p) + fail·ln(1−p)`
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] if a touched
    /// parameter has no probability estimate
    pub fn log_likelihood(&self, params: &BernoulliParams) -> OntomcResult<f64> {
        let mut ll = 0.0;
        for (&param, &count) in &self.succ {
            ll += count * params.log_prob(param)?;
        }
        for (&param, &count) in &self.fail {
            ll += count * params.log_prob_complement(param)?;
        }
        Ok(ll)
    }

    /// Log-density of concrete probabilities under `self` read as Beta
    /// shape counts: `Σ succ·ln(p) + fail·ln(1−p) − ln B(succ+1, fail+1)`
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] if a touched
    /// parameter has no probability estimate
    pub fn log_prior(&self, params: &BernoulliParams) -> OntomcResult<f64> {
        let mut lp = self.log_likelihood(params)?;
        for param in self.touched_with(&BernoulliCounts::default()) {
            lp -= ln_beta(self.succ(param) + 1.0, self.fail(param) + 1.0);
        }
        Ok(lp)
    }

    /// Collapsed (marginal) Beta-Bernoulli log-likelihood of `self`
    /// given Beta priors expressed as `prior` pseudocounts
    ///
    /// For every parameter touched by either map:
    ///
    /// ```text
    /// ln B(ps + 1 + s, pf + 1 + f) − ln B(ps + 1, pf + 1)
    /// ```
    ///
    /// The Bernoulli probabilities are integrated out analytically, so
    /// no parameter sampling is needed to score a state. Evaluated
    /// with `self` as a count *delta* and `prior` as the running
    /// prior-plus-state counts, this is exactly the log-likelihood
    /// ratio of the proposed vs. current sampler state.
    pub fn log_beta_bernoulli(&self, prior: &BernoulliCounts) -> f64 {
        let mut ll = 0.0;
        for param in self.touched_with(prior) {
            let ps = prior.succ(param) + 1.0;
            let pf = prior.fail(param) + 1.0;
            let s = self.succ(param);
            let f = self.fail(param);
            if s == 0.0 && f == 0.0 {
                continue;
            }
            ll += ln_beta(ps + s, pf + f) - ln_beta(ps, pf);
        }
        ll
    }

    /// Draws a probability for every touched parameter from its Beta
    /// posterior `Beta(succ + 1, fail + 1)`
    ///
    /// This is the generative entry point used by the
    /// [`crate::Simulator`]; inference never needs it thanks to the
    /// collapsed likelihood.
    pub fn sample_params<R: Rng + ?Sized>(&self, rng: &mut R) -> BernoulliParams {
        let mut params = BernoulliParams::default();
        for param in self.touched_with(&BernoulliCounts::default()) {
            let beta = Beta::new(self.succ(param) + 1.0, self.fail(param) + 1.0)
                .expect("Beta shape counts must be positive");
            params.set(param, beta.sample(rng));
        }
        params
    }
}

/// Concrete probability estimates per named parameter
///
/// Logs of `p` and `1−p` are cached and recomputed on
/// [`BernoulliParams::set`], since the likelihood loops consume only
/// the logs.
#[derive(Debug, Default, Clone)]
pub struct BernoulliParams {
    prob: BTreeMap<ParamId, f64>,
    log_prob: BTreeMap<ParamId, f64>,
    log_compl: BTreeMap<ParamId, f64>,
}

impl BernoulliParams {
    /// Builds a parameter set from `(param, probability)` pairs
    pub fn from_probs<I: IntoIterator<Item = (ParamId, f64)>>(probs: I) -> Self {
        let mut params = BernoulliParams::default();
        for (param, prob) in probs {
            params.set(param, prob);
        }
        params
    }

    /// Sets the probability of a parameter, refreshing the cached logs
    pub fn set(&mut self, param: ParamId, prob: f64) {
        self.prob.insert(param, prob);
        self.log_prob.insert(param, prob.ln());
        self.log_compl.insert(param, (1.0 - prob).ln());
    }

    /// Returns the probability of a parameter
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] for an unknown key
    pub fn prob(&self, param: ParamId) -> OntomcResult<f64> {
        self.prob
            .get(&param)
            .copied()
            .ok_or_else(|| OntomcError::UndefinedParameter(param.to_string()))
    }

    /// Returns `ln(p)` of a parameter
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] for an unknown key
    pub fn log_prob(&self, param: ParamId) -> OntomcResult<f64> {
        self.log_prob
            .get(&param)
            .copied()
            .ok_or_else(|| OntomcError::UndefinedParameter(param.to_string()))
    }

    /// Returns `ln(1−p)` of a parameter
    ///
    /// # Errors
    ///
    /// Returns [`OntomcError::UndefinedParameter`] for an unknown key
    pub fn log_prob_complement(&self, param: ParamId) -> OntomcResult<f64> {
        self.log_compl
            .get(&param)
            .copied()
            .ok_or_else(|| OntomcError::UndefinedParameter(param.to_string()))
    }

    /// Returns an iterator of `(param, probability)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, f64)> + '_ {
        self.prob.iter().map(|(&param, &prob)| (param, prob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{spider_assocs, spider_ontology};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TOLERANCE: f64 = 1e-10;

    fn param(idx: usize) -> ParamId {
        ParamId::from(idx)
    }

    #[test]
    fn pooled_parameterization_has_three_keys() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let p = Parameterization::pooled(&assocs);

        assert_eq!(p.len(), 3);
        let t = p.id_of("t").unwrap();
        for term in ontology.terms() {
            assert_eq!(p.term_prior(term.id()), t);
        }
        let fp = p.id_of("fp").unwrap();
        let fn_ = p.id_of("fn").unwrap();
        for gene in assocs.genes() {
            assert_eq!(p.false_pos(gene.id()), fp);
            assert_eq!(p.false_neg(gene.id()), fn_);
        }
    }

    #[test]
    fn laplace_prior_is_symmetric() {
        let ontology = spider_ontology();
        let assocs = spider_assocs(&ontology);
        let p = Parameterization::pooled(&assocs);

        let prior = p.laplace_prior();
        for key in p.params() {
            assert_eq!(prior.succ(key), 1.0);
            assert_eq!(prior.fail(key), 1.0);
        }
    }

    #[test]
    fn accum_prunes_zeroed_keys() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 2.0);
        counts.add_fail(param(0), 1.0);

        let mut delta = BernoulliCounts::default();
        delta.add_succ(param(0), -2.0);
        delta.add_fail(param(0), 0.5);

        counts.accum(&delta);
        assert_eq!(counts.succ(param(0)), 0.0);
        assert_eq!(counts.fail(param(0)), 1.5);
        // the zeroed key is gone, not stored as 0.0
        assert!(!counts.succ.contains_key(&param(0)));
    }

    #[test]
    fn log_likelihood_in_log_space() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 3.0);
        counts.add_fail(param(0), 2.0);

        let params = BernoulliParams::from_probs([(param(0), 0.25)]);
        let expected = 3.0 * 0.25f64.ln() + 2.0 * 0.75f64.ln();
        assert!((counts.log_likelihood(&params).unwrap() - expected).abs() < TOLERANCE);
    }

    #[test]
    fn log_prior_is_a_beta_log_density() {
        // counts (1, 1) read as Beta(2, 2): density 6 p (1 - p)
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 1.0);
        counts.add_fail(param(0), 1.0);

        let at = |p: f64| {
            let params = BernoulliParams::from_probs([(param(0), p)]);
            counts.log_prior(&params).unwrap()
        };
        assert!((at(0.5) - 1.5f64.ln()).abs() < TOLERANCE);
        assert!((at(0.25) - 1.125f64.ln()).abs() < TOLERANCE);
    }

    #[test]
    fn log_likelihood_rejects_unknown_param() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(7), 1.0);

        let params = BernoulliParams::from_probs([(param(0), 0.5)]);
        assert!(matches!(
            counts.log_likelihood(&params),
            Err(OntomcError::UndefinedParameter(_))
        ));
    }

    #[test]
    fn collapsed_likelihood_uniform_prior_single_draw() {
        // One observation under Beta(1,1): marginal probability 1/2
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 1.0);

        let prior = BernoulliCounts::default();
        let ll = counts.log_beta_bernoulli(&prior);
        assert!((ll - 0.5f64.ln()).abs() < TOLERANCE);
    }

    #[test]
    fn collapsed_likelihood_sums_over_keys() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 2.0);
        counts.add_fail(param(0), 1.0);
        counts.add_succ(param(1), 1.0);

        let mut only_first = BernoulliCounts::default();
        only_first.add_succ(param(0), 2.0);
        only_first.add_fail(param(0), 1.0);
        let mut only_second = BernoulliCounts::default();
        only_second.add_succ(param(1), 1.0);

        let prior = BernoulliCounts::default();
        assert!(
            (counts.log_beta_bernoulli(&prior)
                - only_first.log_beta_bernoulli(&prior)
                - only_second.log_beta_bernoulli(&prior))
            .abs()
                < TOLERANCE
        );
    }

    #[test]
    fn collapsed_delta_equals_full_difference() {
        // logBB(c + d | prior) − logBB(c | prior) == logBB(d | prior + c)
        let mut prior = BernoulliCounts::default();
        prior.add_succ(param(0), 1.0);
        prior.add_fail(param(0), 1.0);

        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 4.0);
        counts.add_fail(param(0), 2.0);

        let mut delta = BernoulliCounts::default();
        delta.add_succ(param(0), -1.0);
        delta.add_fail(param(0), 1.0);

        let full = counts.add(&delta).log_beta_bernoulli(&prior)
            - counts.log_beta_bernoulli(&prior);
        let incremental = delta.log_beta_bernoulli(&prior.add(&counts));
        assert!((full - incremental).abs() < TOLERANCE);
    }

    #[test]
    fn sampled_params_cover_all_keys() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 5.0);
        counts.add_fail(param(0), 5.0);
        counts.add_succ(param(1), 1.0);
        counts.add_fail(param(1), 99.0);

        let mut rng = StdRng::seed_from_u64(42);
        let params = counts.sample_params(&mut rng);
        let p0 = params.prob(param(0)).unwrap();
        let p1 = params.prob(param(1)).unwrap();
        assert!((0.0..=1.0).contains(&p0));
        assert!((0.0..=1.0).contains(&p1));
        // heavily skewed posterior stays small
        assert!(p1 < 0.5);
    }

    #[test]
    fn sample_params_deterministic_per_seed() {
        let mut counts = BernoulliCounts::default();
        counts.add_succ(param(0), 3.0);
        counts.add_fail(param(0), 7.0);

        let a = counts.sample_params(&mut StdRng::seed_from_u64(7));
        let b = counts.sample_params(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.prob(param(0)).unwrap(), b.prob(param(0)).unwrap());
    }
}
