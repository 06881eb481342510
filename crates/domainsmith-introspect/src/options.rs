use std::collections::BTreeMap;

use domainsmith_core::JoinType;

/// Options that control how foreign keys become associations.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// How many foreign-key hops to expand into `schemas` sections.
    pub expansion_depth: usize,
    /// Join type per association name; unlisted associations join `left`.
    pub join_overrides: BTreeMap<String, JoinType>,
}

impl ResolveOptions {
    pub fn with_depth(expansion_depth: usize) -> Self {
        Self {
            expansion_depth,
            join_overrides: BTreeMap::new(),
        }
    }

    pub fn join_type_for(&self, association: &str) -> JoinType {
        self.join_overrides
            .get(association)
            .copied()
            .unwrap_or(JoinType::Left)
    }
}
