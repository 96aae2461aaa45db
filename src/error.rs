//! Top-level facade errors: thin `thiserror` wrapping over every sub-crate's
//! own error type, plus the one error the facade itself can raise (an
//! unrecognized `default_drm` at construction time).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CosmosError {
    #[error("unsupported default DRM '{0}' (known backends: local, lsf, ge, or one registered with CosmosBuilder::register_drm)")]
    UnsupportedDefaultDrm(String),

    #[error(transparent)]
    Store(#[from] cosmos_store::StoreError),

    #[error(transparent)]
    Resolver(#[from] cosmos_resolver::ResolverError),

    #[error(transparent)]
    Tool(#[from] cosmos_tool::ToolError),

    #[error(transparent)]
    Drm(#[from] cosmos_drm::DrmError),

    #[error(transparent)]
    Executor(#[from] cosmos_executor::ExecutorError),
}
