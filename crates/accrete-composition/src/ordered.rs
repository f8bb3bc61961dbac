//! Ordered launch argument facet
//!
//! Arguments never conflict. Each capability contributes one block; blocks
//! sort by `(priority, declaration_index)`, so the final order does not
//! depend on merge order.

use crate::strategy::{Contributor, FacetStrategy, MergeError};
use accrete_capability::CapabilityId;
use serde::{Deserialize, Serialize};

/// Launch arguments contributed by one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgBlock {
    /// Contributing capability
    pub owner: CapabilityId,
    /// Its priority
    pub priority: i64,
    /// Its declaration position
    pub declaration_index: usize,
    /// Arguments in declared order
    pub args: Vec<String>,
}

impl ArgBlock {
    fn sort_key(&self) -> (i64, usize) {
        (self.priority, self.declaration_index)
    }
}

/// Priority-ordered sequence of argument blocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedArgs {
    blocks: Vec<ArgBlock>,
}

impl OrderedArgs {
    /// Create empty facet
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from blocks in any order
    #[must_use]
    pub fn from_blocks(blocks: impl IntoIterator<Item = ArgBlock>) -> Self {
        let mut blocks: Vec<_> = blocks.into_iter().collect();
        // Stable sort keeps arrival order for equal keys
        blocks.sort_by_key(ArgBlock::sort_key);
        Self { blocks }
    }

    /// Blocks in launch order
    #[must_use]
    pub fn blocks(&self) -> &[ArgBlock] {
        &self.blocks
    }

    /// Flattened arguments in launch order
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|b| b.args.iter().map(String::as_str))
    }

    /// Whether no arguments were contributed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FacetStrategy for OrderedArgs {
    type Item = String;

    fn validate(&self, _contributor: &Contributor, _items: &[String]) -> Result<(), MergeError> {
        Ok(())
    }

    fn compose(&mut self, contributor: &Contributor, items: &[String]) {
        if items.is_empty() {
            return;
        }

        let key = contributor.sort_key();
        let at = self.blocks.partition_point(|b| b.sort_key() <= key);
        self.blocks.insert(
            at,
            ArgBlock {
                owner: contributor.id.clone(),
                priority: contributor.priority,
                declaration_index: contributor.declaration_index,
                args: items.to_vec(),
            },
        );
    }

    fn name(&self) -> &'static str {
        "extra_args"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(facet: &mut OrderedArgs, id: &str, priority: i64, index: usize, args: &[&str]) {
        let c = Contributor::new(CapabilityId::new(id).unwrap(), priority, index);
        let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        facet.validate(&c, &args).unwrap();
        facet.compose(&c, &args);
    }

    #[test]
    fn lower_priority_comes_first() {
        let mut facet = OrderedArgs::new();
        compose(&mut facet, "late", 20, 0, &["--late"]);
        compose(&mut facet, "early", 10, 1, &["--early", "1"]);

        let args: Vec<_> = facet.args().collect();
        assert_eq!(args, vec!["--early", "1", "--late"]);
    }

    #[test]
    fn declaration_index_breaks_ties() {
        let mut facet = OrderedArgs::new();
        compose(&mut facet, "second", 0, 1, &["--b"]);
        compose(&mut facet, "first", 0, 0, &["--a"]);

        let args: Vec<_> = facet.args().collect();
        assert_eq!(args, vec!["--a", "--b"]);
    }

    #[test]
    fn empty_contribution_adds_no_block() {
        let mut facet = OrderedArgs::new();
        compose(&mut facet, "quiet", 0, 0, &[]);
        assert!(facet.is_empty());
    }

    #[test]
    fn from_blocks_sorts() {
        let block = |id: &str, priority| ArgBlock {
            owner: CapabilityId::new(id).unwrap(),
            priority,
            declaration_index: 0,
            args: vec![format!("--{id}")],
        };
        let facet = OrderedArgs::from_blocks(vec![block("z", 5), block("a", -1)]);
        let args: Vec<_> = facet.args().collect();
        assert_eq!(args, vec!["--a", "--z"]);
    }
}
