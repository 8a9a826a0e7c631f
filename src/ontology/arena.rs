use crate::term::TermInternal;
use crate::TermId;

/// Dense arena of all terms, indexed by [`TermId`]
///
/// Term ids are assigned contiguously at insertion, so lookups are
/// plain vector indexing.
#[derive(Default, Clone)]
pub(crate) struct Arena {
    terms: Vec<TermInternal>,
}

impl Arena {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Inserts a term with the next free id and returns that id
    pub fn insert(&mut self, name: String) -> TermId {
        let id = TermId::from(self.terms.len());
        self.terms.push(TermInternal::new(name, id));
        id
    }

    pub fn get(&self, id: TermId) -> Option<&TermInternal> {
        self.terms.get(id.idx())
    }

    pub fn get_unchecked(&self, id: TermId) -> &TermInternal {
        &self.terms[id.idx()]
    }

    pub fn get_unchecked_mut(&mut self, id: TermId) -> &mut TermInternal {
        &mut self.terms[id.idx()]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TermInternal> {
        self.terms.iter()
    }
}
