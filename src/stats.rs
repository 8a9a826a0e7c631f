//! Frequentist enrichment of ontology terms in a gene set
//!
//! The one-sided hypergeometric test asks, per term: if `draws` genes
//! were picked from the population at random, how likely is it to hit
//! at least as many of the term's associated genes as the query set
//! actually does? It ignores the ontology structure and the noise
//! model entirely, which makes it a useful diagnostic to hold against
//! the posterior marginals of the sampler.
//!
//! # Examples
//!
//! ```
//! use ontomc::{AssociationIndex, Ontology};
//! use ontomc::stats::term_enrichment;
//!
//! let ontology = Ontology::from_terms([("spider", vec!["arachnid"])]).unwrap();
//! let assocs = AssociationIndex::from_pairs(
//!     &ontology,
//!     [("charlotte", "spider"), ("aragog", "arachnid")],
//!     true,
//! ).unwrap();
//!
//! let query = assocs.validate_gene_names(["charlotte"]).resolved;
//! let mut enrichments = term_enrichment(&assocs, &query.into_iter().collect());
//!
//! enrichments.sort_by(|a, b| a.pvalue().partial_cmp(&b.pvalue()).unwrap());
//! assert_eq!(enrichments[0].term(), ontology.id_of("spider").unwrap());
//! ```

use statrs::distribution::{DiscreteCDF, Hypergeometric};
use tracing::debug;

use crate::annotations::GeneGroup;
use crate::assocs::AssociationIndex;
use crate::term::TermId;

/// The p-value and fold enrichment of one term in a query gene set
#[derive(Debug, Clone)]
pub struct Enrichment {
    term: TermId,
    pvalue: f64,
    bonferroni: f64,
    count: u64,
    enrichment: f64,
}

impl Enrichment {
    /// The enriched term
    pub fn term(&self) -> TermId {
        self.term
    }

    /// Returns the raw one-sided p-value
    ///
    /// The p-value indicates the probability that an overlap at least
    /// this large occured by chance
    pub fn pvalue(&self) -> f64 {
        self.pvalue
    }

    /// Returns the Bonferroni-corrected p-value, capped at `1.0`
    ///
    /// The correction multiplies by the number of relevant terms
    /// tested for the same query
    pub fn bonferroni(&self) -> f64 {
        self.bonferroni
    }

    /// Returns the number of query genes associated with the term
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the fold enrichment over the background population
    pub fn enrichment(&self) -> f64 {
        self.enrichment
    }
}

/// Calculates the hypergeometric enrichment of every relevant term
/// within the query gene set
///
/// The population is the full gene universe of the index, the
/// successes are the genes associated with the term and the draws are
/// the query genes. Terms sharing no gene with the query are skipped;
/// their p-value is `1` by construction. The results are not sorted.
pub fn term_enrichment(assocs: &AssociationIndex, query: &GeneGroup) -> Vec<Enrichment> {
    let population = assocs.num_genes() as u64;
    let draws = query.len() as u64;
    let num_tests = f64_from_u64(assocs.relevant_terms().len() as u64);

    let mut res = Vec::new();
    for term in assocs.relevant_terms() {
        let genes = assocs.genes_by_term(term);
        let observed = genes.iter().filter(|gene| query.contains(*gene)).count() as u64;
        if observed == 0 {
            debug!(term = %term, "skipping term without query overlap");
            continue;
        }
        let successes = genes.len() as u64;
        let hyper = Hypergeometric::new(population, successes, draws)
            .expect("term and query genes are drawn from the gene universe");

        // subtracting 1, because we want the probability of "observed
        // or more", while sf calculates "more than observed"
        let pvalue = hyper.sf(observed - 1);
        let enrichment = (f64_from_u64(observed) / f64_from_u64(draws))
            / (f64_from_u64(successes) / f64_from_u64(population));

        debug!(
            term = %term,
            population,
            successes,
            draws,
            observed,
            pvalue,
            "hypergeometric test"
        );
        res.push(Enrichment {
            term,
            pvalue,
            bonferroni: (pvalue * num_tests).min(1.0),
            count: observed,
            enrichment,
        });
    }
    res
}

fn f64_from_u64(n: u64) -> f64 {
    let intermediate: u32 = n
        .try_into()
        .expect("cannot safely create f64 from large u64");
    f64::from(intermediate)
}
