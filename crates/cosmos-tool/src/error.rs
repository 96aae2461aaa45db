//! Tool declaration and rendering errors (§7). `ToolError::Validation`
//! variants are raised once, at Tool declaration time; `Render` variants are
//! raised per-Task, at command-rendering time (§4.1 step 3).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool '{tool}' declares duplicate {kind} (name={name:?}, format={format})")]
    DuplicateIoPair {
        tool: String,
        kind: &'static str,
        name: String,
        format: String,
    },

    #[error("tool '{tool}' uses reserved tag name '{tag}' (i, o, s are reserved for cmd() params)")]
    ReservedTagName { tool: String, tag: String },

    #[error("tool '{tool}': no input bound for abstract input name={name:?} format={format:?}")]
    UnboundInput {
        tool: String,
        name: Option<String>,
        format: Option<String>,
    },

    #[error("tool '{tool}': malformed output template '{template}': {reason}")]
    MalformedTemplate {
        tool: String,
        template: String,
        reason: String,
    },

    #[error("chain: component tool '{tool}' has no output matching name={name:?} format={format:?} among the chain's unassigned outputs")]
    ChainOutputUnmatched {
        tool: String,
        name: Option<String>,
        format: Option<String>,
    },

    #[error("chain must have at least one component tool")]
    EmptyChain,

    #[error("chain: component tool '{name}' is a NOOP, merging NOOP tools is not supported")]
    NoopToolInChain { name: String },

    #[error("input '{name}' points at nonexistent path {path}")]
    MissingInputPath { name: String, path: String },
}
