//! Basic blocks: a straight-line run of [`Instruction`]s ending in a single
//! [`Terminator`].
//!
//! Grounded on `program_structure::control_flow_graph::basic_block`, kept
//! index/predecessor/successor bookkeeping verbatim; `meta`'s free-form
//! `VariableKnowledge` cache is replaced by nothing here — this engine
//! doesn't need a read/write-set precomputation pass, since the l-value
//! environment already tracks exactly what it needs per cell.

use log::trace;
use std::collections::HashSet;

use crate::control_flow_graph::ir::{Instruction, Terminator};
use crate::utils::DirectedGraphNode;

type Index = usize;
type IndexSet = HashSet<Index>;

#[derive(Debug, Clone)]
pub struct BasicBlock {
    index: Index,
    instructions: Vec<Instruction>,
    terminator: Terminator,
    predecessors: IndexSet,
    successors: IndexSet,
}

impl BasicBlock {
    pub fn new(index: Index, terminator: Terminator) -> BasicBlock {
        trace!("creating basic block {index}");
        BasicBlock { index, instructions: Vec::new(), terminator, predecessors: IndexSet::new(), successors: IndexSet::new() }
    }

    pub fn from_raw_parts(
        index: Index,
        instructions: Vec<Instruction>,
        terminator: Terminator,
        predecessors: IndexSet,
        successors: IndexSet,
    ) -> BasicBlock {
        BasicBlock { index, instructions, terminator, predecessors, successors }
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    pub(crate) fn append_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub(crate) fn add_predecessor(&mut self, predecessor: Index) {
        trace!("adding predecessor {predecessor} to basic block {}", self.index);
        self.predecessors.insert(predecessor);
    }

    pub(crate) fn add_successor(&mut self, successor: Index) {
        trace!("adding successor {successor} to basic block {}", self.index);
        self.successors.insert(successor);
    }
}

impl DirectedGraphNode for BasicBlock {
    fn get_index(&self) -> Index {
        self.index
    }
    fn get_predecessors(&self) -> &IndexSet {
        &self.predecessors
    }
    fn get_successors(&self) -> &IndexSet {
        &self.successors
    }
}
