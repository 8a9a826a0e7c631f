//! Shared test fixtures: the 9-term spider/mutant ontology and its
//! association table

use crate::{AssociationIndex, Ontology};

/// Term ids: arachnid 0, mammal 1, spider 2, primate 3, human 4,
/// spiderhuman 5, gorilla 6, animal 7 (implicit), mutant 8 (implicit)
pub(crate) fn spider_ontology() -> Ontology {
    Ontology::from_terms([
        ("arachnid", vec!["animal"]),
        ("mammal", vec!["animal"]),
        ("spider", vec!["arachnid"]),
        ("primate", vec!["mammal"]),
        ("human", vec!["primate"]),
        ("spiderhuman", vec!["arachnid", "human", "mutant"]),
        ("gorilla", vec!["primate"]),
    ])
    .unwrap()
}

/// Gene ids: peter-parker 0, may-parker 1, socrates 2, charlotte 3,
/// kingkong 4
pub(crate) fn spider_assocs(ontology: &Ontology) -> AssociationIndex<'_> {
    AssociationIndex::from_pairs(
        ontology,
        [
            ("peter-parker", "spiderhuman"),
            ("may-parker", "spiderhuman"),
            ("socrates", "human"),
            ("charlotte", "spider"),
            ("kingkong", "gorilla"),
            ("kingkong", "mutant"),
        ],
        true,
    )
    .unwrap()
}
