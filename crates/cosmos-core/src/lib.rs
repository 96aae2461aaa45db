//! Core entities, enums, and data-model errors for the cosmos workflow
//! engine: `Execution` → `Stage` → `Task` → `TaskFile` and the file-matching
//! patterns (`AbstractInputFile`/`AbstractOutputFile`) the Resolver binds
//! against them.

pub mod entities;
pub mod error;
pub mod file_ref;
pub mod ids;
pub mod status;
pub mod tags;

pub use entities::{Execution, InputFileAssociation, Stage, Task, TaskFile};
pub use error::CoreError;
pub use file_ref::{AbstractInputFile, AbstractOutputFile, WILDCARD_FORMAT};
pub use ids::{ExecutionId, StageId, TaskFileId, TaskId};
pub use status::{ExecutionStatus, RelationshipType, StageStatus, TaskStatus};
pub use tags::{TagMap, TagValue};
