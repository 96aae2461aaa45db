//! A name-keyed registry of Tools, mirroring the executor's DRM adapter
//! registry: Recipes reference tools by name, so the Graph Builder needs
//! somewhere to look them up.

use crate::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tool::RenderContext;
    use cosmos_core::AbstractOutputFile;

    struct Echo(crate::tool::ToolSpec);

    impl Tool for Echo {
        fn spec(&self) -> &crate::tool::ToolSpec {
            &self.0
        }
        fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
            Ok("echo hi".to_string())
        }
    }

    #[test]
    fn register_and_lookup_round_trips() {
        let mut registry = ToolRegistry::new();
        let spec = crate::tool::ToolSpec::new("echo").with_output(AbstractOutputFile::new("out", "txt"));
        registry.register(Arc::new(Echo(spec)));
        assert!(registry.contains("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }
}
