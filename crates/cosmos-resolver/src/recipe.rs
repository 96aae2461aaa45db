//! Declarative stage definitions the Graph Builder expands into concrete
//! Tasks (§4.4): `add_stage`-style declarations collected up front rather
//! than issued imperatively against the `Cosmos` facade one call at a time.

use cosmos_core::{RelationshipType, TagMap};

/// One stage declaration: which Tool produces its Tasks, which earlier
/// stages feed it, and how parent Tasks group into children.
#[derive(Clone, Debug)]
pub struct StageDecl {
    pub name: String,
    pub tool_name: String,
    pub parent_stages: Vec<String>,
    pub relationship: RelationshipType,
    /// `many2one`: tag keys parent Tasks are grouped by; the child inherits
    /// exactly this projected subset (§3: "DAG edges").
    pub group_by: Vec<String>,
    /// `one2many`: the user-provided tag sets each parent Task is expanded
    /// against, forming one child per (parent × expansion) pair.
    pub tag_expansion: Vec<TagMap>,
    /// Overrides the Tool's own DRM for every Task in this stage, unless
    /// the Tool itself pins one (§4.1: a Tool's own `drm` always wins).
    pub drm: Option<String>,
    pub max_attempts: u32,
}

impl StageDecl {
    pub fn new(name: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool_name: tool_name.into(),
            parent_stages: Vec::new(),
            relationship: RelationshipType::One2one,
            group_by: Vec::new(),
            tag_expansion: Vec::new(),
            drm: None,
            max_attempts: 1,
        }
    }

    pub fn with_parent(mut self, stage: impl Into<String>) -> Self {
        self.parent_stages.push(stage.into());
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipType) -> Self {
        self.relationship = relationship;
        self
    }

    pub fn group_by(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn expand_tags(mut self, expansion: Vec<TagMap>) -> Self {
        self.tag_expansion = expansion;
        self
    }

    pub fn with_drm(mut self, drm: impl Into<String>) -> Self {
        self.drm = Some(drm.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// An ordered sequence of stage declarations, expanded top-to-bottom so
/// every stage's parents are already built by the time it is processed.
#[derive(Clone, Debug, Default)]
pub struct Recipe {
    pub stages: Vec<StageDecl>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(mut self, stage: StageDecl) -> Self {
        self.stages.push(stage);
        self
    }
}
