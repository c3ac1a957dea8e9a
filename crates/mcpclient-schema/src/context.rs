//! Per-validation bookkeeping of evaluated property names and item indices,
//! so `unevaluatedProperties`/`unevaluatedItems` at any level can subtract
//! what sibling/parent keywords already accounted for (spec §4.7
//! "Cross-cutting requirements").

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct Evaluated {
    pub properties: BTreeSet<String>,
    pub items: BTreeSet<usize>,
}

impl Evaluated {
    pub fn merge(&mut self, other: &Evaluated) {
        self.properties.extend(other.properties.iter().cloned());
        self.items.extend(other.items.iter().cloned());
    }
}
