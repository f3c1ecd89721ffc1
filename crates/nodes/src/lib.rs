//! `nodes` crate — the `RegisteredNode` contract that worker runtimes
//! publish and the graph validator checks templates against.
//!
//! A node kind is never executed in-process here; it's a declaration
//! (input/output JSON schema, required secrets) that the state manager
//! validates graph templates against before it will ever hand out work
//! referencing that node.

pub mod error;
pub mod model;
pub mod schema;

pub use error::NodeError;
pub use model::RegisteredNode;
