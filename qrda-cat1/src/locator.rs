use crate::document::NodeRef;
use crate::query::{Selector, SelectorError};

/// Finds every fragment of one template inside the search scopes.
#[derive(Debug, Clone)]
pub struct EntryLocator {
    selector: Selector,
}

impl EntryLocator {
    pub fn new(expression: &str) -> Result<Self, SelectorError> {
        Ok(Self {
            selector: Selector::parse(expression)?,
        })
    }

    /// Fragments in scope order, then document order within each scope.
    pub fn locate<'d>(&self, scopes: &[NodeRef<'d>]) -> Vec<NodeRef<'d>> {
        self.selector.find_all_in(scopes)
    }
}
