//! The control-flow graph itself: a non-empty vector of basic blocks with
//! block 0 always the entry block (§4.8 `Enter`).
//!
//! Grounded on `program_structure::control_flow_graph::cfg`/`cfg_impl`,
//! dropping the dominator tree: the distilled spec's scheduling model
//! (§4.8) only requires iterating to a monotone fixpoint, never dominance
//! or SSA placement, so carrying `DominatorTree` here would be dead weight
//! with no operation in §4 consuming it.

use std::collections::HashSet;

use crate::errors::CfgError;
use crate::lvalue::VariableName;
use crate::utils::NonEmptyVec;

use super::basic_block::BasicBlock;

type Index = usize;
type IndexSet = HashSet<Index>;
type BasicBlockVec = NonEmptyVec<BasicBlock>;

/// The control-flow graph of a single function, plus enough signature
/// information (`params`) for the entry-node handling in §4.8 (`Lambda`:
/// clean each parameter, then run its source check).
#[derive(Debug, Clone)]
pub struct Cfg {
    name: String,
    params: Vec<VariableName>,
    blocks: BasicBlockVec,
}

impl Cfg {
    pub const ENTRY: Index = 0;

    /// Build a `Cfg` from already-linked basic blocks, validating that
    /// every successor/predecessor/terminator target index is in range.
    pub fn new(name: impl Into<String>, params: Vec<VariableName>, blocks: Vec<BasicBlock>) -> Result<Cfg, CfgError> {
        let blocks = NonEmptyVec::try_from(&blocks).map_err(|_| CfgError::UnreachableEntry)?;
        let cfg = Cfg { name: name.into(), params, blocks };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), CfgError> {
        use crate::control_flow_graph::ir::Terminator::*;
        let len = self.blocks.len();
        for block in self.iter() {
            let targets: Vec<Index> = match block.terminator() {
                Goto(target) => vec![*target],
                Cond { if_true, if_false, .. } => {
                    let mut targets = vec![*if_true];
                    targets.extend(*if_false);
                    targets
                }
                Throw { target, .. } => target.into_iter().copied().collect(),
                Return { .. } | Join | Exit | Other => Vec::new(),
            };
            for target in targets {
                if target >= len {
                    return Err(CfgError::UnknownBasicBlock(target));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[VariableName] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn entry(&self) -> Index {
        Cfg::ENTRY
    }

    pub fn get_basic_block(&self, index: Index) -> Option<&BasicBlock> {
        if index < self.blocks.len() {
            Some(&self.blocks[index])
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn indices(&self) -> IndexSet {
        (0..self.blocks.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_flow_graph::ir::Terminator;

    #[test]
    fn test_rejects_out_of_range_target() {
        let block = BasicBlock::new(0, Terminator::Goto(5));
        let err = Cfg::new("f", Vec::new(), vec![block]).unwrap_err();
        assert!(matches!(err, CfgError::UnknownBasicBlock(5)));
    }

    #[test]
    fn test_accepts_well_formed_two_block_cfg() {
        let entry = BasicBlock::new(0, Terminator::Goto(1));
        let exit = BasicBlock::new(1, Terminator::Exit);
        assert!(Cfg::new("f", Vec::new(), vec![entry, exit]).is_ok());
    }
}
