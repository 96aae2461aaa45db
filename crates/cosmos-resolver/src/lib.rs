//! Input binding and DAG expansion: the Resolver (§4.2) and Graph Builder
//! (§4.4). Pure, persistence-free construction of an Execution's Stage/
//! Task/TaskFile graph from a declarative `Recipe`.

pub mod bind;
pub mod error;
pub mod graph;
pub mod recipe;

pub use bind::{resolve_all_keyed, resolve_input, visible_files};
pub use error::ResolverError;
pub use graph::{BuiltGraph, GraphBuilder};
pub use recipe::{Recipe, StageDecl};
