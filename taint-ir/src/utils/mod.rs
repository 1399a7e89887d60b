pub mod directed_graph;
pub mod nonempty_vec;

pub use directed_graph::DirectedGraphNode;
pub use nonempty_vec::NonEmptyVec;
