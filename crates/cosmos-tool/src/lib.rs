//! Tool declaration, command rendering, and tool chaining (§4.1, §4.3).
//!
//! A `Tool` is a static descriptor (`ToolSpec`) plus a `render` method that
//! turns a bound set of concrete files into a shell command. `Input`/
//! `Inputs` are NOOP tools that expose pre-existing files instead of
//! running anything. `chain` collapses several Tools into one Task.

pub mod chain;
pub mod command;
pub mod error;
pub mod input;
pub mod registry;
pub mod render;
pub mod tool;

pub use chain::{chain, ChainedTool};
pub use command::Command;
pub use error::ToolError;
pub use input::{Input, Inputs};
pub use registry::ToolRegistry;
pub use tool::{validate_tag_keys, RenderContext, ToolSpec, RESERVED_PARAM_NAMES};
pub use tool::Tool;
