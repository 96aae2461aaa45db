//! Looks up a `DrmAdapter` by name (§4.5). A Task with `drm == "local"`
//! always resolves to the local adapter regardless of the Execution's
//! configured default — callers enforce that by always registering
//! `"local"` and never letting the default override it per-Task; see
//! `cosmos-executor`'s scheduling tick.

use crate::adapter::{DrmAdapter, GetSubmitArgs, SubmitSpec};
use crate::error::DrmError;
use crate::ge::{GeAdapter, GeSubmitArgs};
use crate::local::LocalAdapter;
use crate::lsf::{LsfAdapter, LsfSubmitArgs};
use std::collections::HashMap;
use std::sync::Arc;

/// The out-of-the-box `GetSubmitArgs` (§6 "Configuration": "`get_submit_args`
/// ... the strategy from §4.5, overridable"): dispatches to each back-end's
/// own renderer by `SubmitSpec::drm`, and returns an empty string for
/// `local` (§4.5: "`render_submit_args` returns nothing" for local).
#[derive(Default)]
pub struct DefaultGetSubmitArgs {
    lsf: LsfSubmitArgs,
    ge: GeSubmitArgs,
}

impl GetSubmitArgs for DefaultGetSubmitArgs {
    fn render(&self, spec: &SubmitSpec<'_>, default_queue: Option<&str>) -> String {
        match spec.drm {
            "lsf" => self.lsf.render(spec, default_queue),
            "ge" => self.ge.render(spec, default_queue),
            _ => String::new(),
        }
    }
}

pub struct DrmRegistry {
    adapters: HashMap<String, Arc<dyn DrmAdapter>>,
}

impl DrmRegistry {
    /// Registers the three built-in back-ends under their canonical names.
    pub fn with_defaults() -> Self {
        let mut adapters: HashMap<String, Arc<dyn DrmAdapter>> = HashMap::new();
        adapters.insert("local".to_string(), Arc::new(LocalAdapter::new()));
        adapters.insert("lsf".to_string(), Arc::new(LsfAdapter::new()));
        adapters.insert("ge".to_string(), Arc::new(GeAdapter::new()));
        Self { adapters }
    }

    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn DrmAdapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DrmAdapter>, DrmError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| DrmError::UnsupportedDrm(name.to_string()))
    }
}

impl Default for DrmRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_builtin_names() {
        let registry = DrmRegistry::with_defaults();
        assert!(registry.get("local").is_ok());
        assert!(registry.get("lsf").is_ok());
        assert!(registry.get("ge").is_ok());
    }

    #[test]
    fn unknown_drm_name_errors() {
        let registry = DrmRegistry::with_defaults();
        assert!(matches!(
            registry.get("slurm"),
            Err(DrmError::UnsupportedDrm(_))
        ));
    }
}
