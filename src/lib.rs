//! Bayesian ontology-term enrichment analysis
//!
//! `ontomc` infers which terms of a directed-acyclic ontology are most
//! likely responsible for the genes observed in a query set. Gene
//! observations are modeled with per-gene false-positive and
//! false-negative noise, term activations with per-term Bernoulli
//! priors. All Bernoulli probabilities carry conjugate Beta priors, so
//! the marginal ("collapsed") likelihood of a latent state has a closed
//! form and inference runs as Metropolis-Hastings over the discrete
//! term-activation vector alone.
//!
//! # Examples
//!
//! ```
//! use ontomc::{AssociationIndex, McmcConfig, Ontology, Sampler};
//!
//! let ontology = Ontology::from_terms([
//!     ("arachnid", vec!["animal"]),
//!     ("mammal", vec!["animal"]),
//!     ("spider", vec!["arachnid"]),
//!     ("primate", vec!["mammal"]),
//!     ("human", vec!["primate"]),
//!     ("spiderhuman", vec!["arachnid", "human", "mutant"]),
//!     ("gorilla", vec!["primate"]),
//! ]).unwrap();
//!
//! let assocs = AssociationIndex::from_pairs(
//!     &ontology,
//!     [
//!         ("peter-parker", "spiderhuman"),
//!         ("may-parker", "spiderhuman"),
//!         ("socrates", "human"),
//!         ("charlotte", "spider"),
//!         ("kingkong", "gorilla"),
//!         ("kingkong", "mutant"),
//!     ],
//!     true,
//! ).unwrap();
//!
//! let genes = assocs
//!     .validate_gene_names(["peter-parker", "may-parker", "kingkong"])
//!     .resolved;
//!
//! let mut sampler = Sampler::new(&assocs, vec![genes], McmcConfig::default()).unwrap();
//! sampler.run(10_000);
//!
//! let summary = sampler.summary();
//! assert_eq!(summary.gene_sets.len(), 1);
//! ```

use core::fmt::Debug;
use std::num::TryFromIntError;
use thiserror::Error;

pub mod annotations;
pub mod assocs;
pub mod bernoulli;
pub mod mcmc;
pub mod model;
pub mod sim;
pub mod stats;
pub mod term;
mod ontology;

#[cfg(test)]
pub(crate) mod fixtures;

pub use annotations::{Gene, GeneGroup, GeneId};
pub use assocs::AssociationIndex;
pub use bernoulli::{BernoulliCounts, BernoulliParams, Parameterization};
pub use mcmc::{McmcConfig, MoveRate, Sampler, Summary};
pub use model::Model;
pub use ontology::Ontology;
pub use sim::Simulator;
pub use term::{Term, TermGroup, TermId};

pub(crate) const DEFAULT_NUM_PARENTS: usize = 10;
pub(crate) const DEFAULT_NUM_ANCESTORS: usize = 50;

#[derive(Error, Debug)]
pub enum OntomcError {
    /// The parent relation of the ontology contains a cycle
    #[error("ontology graph is cyclic: term \"{0}\" is its own ancestor")]
    CyclicGraph(String),
    /// A term or gene refers to a parameter key that was never declared
    #[error("undefined parameter \"{0}\"")]
    UndefinedParameter(String),
    /// Associations referenced terms absent from the ontology (strict mode)
    #[error("{} term(s) missing from the ontology: {}", .0.len(), .0.join(", "))]
    MissingTerms(Vec<String>),
    /// Term or gene lookup failed
    #[error("term or gene does not exist")]
    DoesNotExist,
    /// A sampler run was requested for an empty gene set
    #[error("gene set is empty")]
    EmptyGeneSet,
    /// Strict gene-name validation failed
    #[error("{} unresolvable gene name(s): {}", .0.len(), .0.join(", "))]
    UnknownGenes(Vec<String>),
    /// All move rates are zero; the sampler would never propose anything
    #[error("move rates sum to zero")]
    ZeroMoveRate,
    /// Incrementally maintained counts diverged from a full recomputation
    #[error("sufficient statistics mismatch for parameter \"{param}\": running {running}, recomputed {recomputed}")]
    CountsMismatch {
        param: String,
        running: f64,
        recomputed: f64,
    },
    #[error("integer conversion overflow")]
    TryFromIntError,
}

impl From<TryFromIntError> for OntomcError {
    fn from(_: TryFromIntError) -> Self {
        OntomcError::TryFromIntError
    }
}

/// Crate-wide `Result` alias
pub type OntomcResult<T> = Result<T, OntomcError>;
