//! Data-model invariant errors shared by the Resolver and Graph Builder
//! (§7). Build-time fatal: raised before any persistence side effect.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no taskfile found matching name={name:?}, format={format:?}")]
    ResolutionError {
        name: Option<String>,
        format: Option<String>,
    },

    #[error("duplicate task in stage '{stage}' with tags {tags}")]
    DuplicateTask { stage: String, tags: String },

    #[error("stage '{0}' expanded to zero tasks")]
    EmptyStage(String),
}
