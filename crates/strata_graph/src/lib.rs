//! # strata_graph
//!
//! Dependency analysis for Strata stacks.
//!
//! - **Graph**: edges between resource declarations, inferred from tokens
//!   and declared explicitly
//! - **Order**: deterministic topological order with shortest-cycle
//!   diagnostics
//! - **Logical IDs**: stable, collision-free identifiers derived from paths

pub mod error;
pub mod graph;
pub mod logical_id;
pub mod order;

pub use error::{GraphError, GraphResult};
pub use graph::{
    DanglingReference, DependencyGraph, EdgeKind, ReferenceSource, ReferenceTarget,
    ScannedReference, UnknownMarker,
};
pub use logical_id::{short_form, LogicalIdRegistry};
pub use order::{topological_order, CycleError};
