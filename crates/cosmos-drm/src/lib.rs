//! DRM (distributed resource manager) adapters: a uniform submit/poll/kill
//! interface over three back-ends — `local`, `lsf`, `ge` (§4.5).

pub mod adapter;
pub mod error;
pub mod ge;
pub mod local;
pub mod lsf;
pub mod registry;

pub use adapter::{DrmAdapter, GetSubmitArgs, PollStatus, SubmitSpec};
pub use error::DrmError;
pub use ge::{GeAdapter, GeSubmitArgs};
pub use local::LocalAdapter;
pub use lsf::{LsfAdapter, LsfSubmitArgs};
pub use registry::{DefaultGetSubmitArgs, DrmRegistry};
