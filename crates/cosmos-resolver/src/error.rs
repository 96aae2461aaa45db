//! Graph-building and input-resolution errors (§7). All variants here are
//! build-time fatal: raised before any persistence side effect, so a
//! partially-expanded Recipe never reaches the State Store.

use cosmos_core::TaskId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("no taskfile visible to task(s) {parents:?} matches name={name:?}, format={format:?}")]
    Unresolved {
        parents: Vec<TaskId>,
        name: Option<String>,
        format: Option<String>,
    },

    #[error("stage '{0}' references unknown parent stage '{1}'")]
    UnknownParentStage(String, String),

    #[error("stage '{0}' references unknown tool '{1}'")]
    UnknownTool(String, String),

    #[error("stage '{stage}' duplicate task for tags {tags}")]
    DuplicateTask { stage: String, tags: String },

    #[error("stage '{0}' expanded to zero tasks")]
    EmptyStage(String),

    #[error("stage '{stage}' declares relationship {relationship:?} but needs {needed}: {detail}")]
    MalformedRelationship {
        stage: String,
        relationship: cosmos_core::RelationshipType,
        needed: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Tool(#[from] cosmos_tool::ToolError),
}
