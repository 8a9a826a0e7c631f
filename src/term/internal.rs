use crate::term::{TermGroup, TermId};
use crate::{DEFAULT_NUM_ANCESTORS, DEFAULT_NUM_PARENTS};

/// Arena-internal representation of a single ontology term
///
/// Adjacency is stored by id; `ancestors` is the cached transitive
/// closure (self plus all ancestors), filled once during
/// [`crate::Ontology`] construction.
#[derive(Debug, Clone)]
pub(crate) struct TermInternal {
    id: TermId,
    name: String,
    parents: TermGroup,
    children: TermGroup,
    ancestors: TermGroup,
}

impl TermInternal {
    pub fn new(name: String, id: TermId) -> TermInternal {
        TermInternal {
            id,
            name,
            parents: TermGroup::with_capacity(DEFAULT_NUM_PARENTS),
            children: TermGroup::with_capacity(DEFAULT_NUM_PARENTS),
            ancestors: TermGroup::with_capacity(DEFAULT_NUM_ANCESTORS),
        }
    }

    pub fn id(&self) -> TermId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &TermGroup {
        &self.parents
    }

    pub fn children(&self) -> &TermGroup {
        &self.children
    }

    pub fn ancestors(&self) -> &TermGroup {
        &self.ancestors
    }

    pub fn ancestors_mut(&mut self) -> &mut TermGroup {
        &mut self.ancestors
    }

    pub fn add_parent(&mut self, parent_id: TermId) {
        self.parents.insert(parent_id);
    }

    pub fn add_child(&mut self, child_id: TermId) {
        self.children.insert(child_id);
    }
}

impl PartialEq for TermInternal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TermInternal {}
