//! Integration tests for the Graph Builder: relationship-kind expansion,
//! input binding, and the build-time fatal errors.

use cosmos_core::{AbstractInputFile, AbstractOutputFile, ExecutionId, RelationshipType, TagMap};
use cosmos_resolver::{GraphBuilder, Recipe, StageDecl};
use cosmos_tool::{RenderContext, Tool, ToolError, ToolRegistry, ToolSpec};
use std::path::PathBuf;
use std::sync::Arc;

struct Stub(ToolSpec);

impl Tool for Stub {
    fn spec(&self) -> &ToolSpec {
        &self.0
    }
    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        Ok("stub".to_string())
    }
}

fn registry_with(tools: Vec<(&str, ToolSpec)>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for (name, mut spec) in tools {
        spec.name = name.to_string();
        registry.register(Arc::new(Stub(spec)));
    }
    registry
}

fn tagged(pairs: &[(&str, &str)]) -> TagMap {
    let mut tags = TagMap::new();
    for (k, v) in pairs {
        tags.insert(k.to_string(), (*v).into());
    }
    tags
}

#[test]
fn one2one_produces_one_child_per_parent() {
    let registry = registry_with(vec![
        ("root", ToolSpec::new("root").with_output(AbstractOutputFile::new("seq", "fastq"))),
        (
            "align",
            ToolSpec::new("align")
                .with_input(AbstractInputFile::new("seq", "fastq"))
                .with_output(AbstractOutputFile::new("bam", "bam")),
        ),
    ]);

    let recipe = Recipe::new()
        .add_stage(
            StageDecl::new("root", "root")
                .with_relationship(RelationshipType::One2many)
                .expand_tags(vec![tagged(&[("sample", "a")]), tagged(&[("sample", "b")])]),
        )
        .add_stage(
            StageDecl::new("align", "align")
                .with_parent("root")
                .with_relationship(RelationshipType::One2one),
        );

    let builder = GraphBuilder::new(ExecutionId(1), PathBuf::from("/out"), &registry);
    let graph = builder.build(&recipe).unwrap();

    let align_stage = graph.stages.iter().find(|s| s.name == "align").unwrap();
    assert_eq!(align_stage.task_ids.len(), 2);
    for id in &align_stage.task_ids {
        let task = &graph.tasks[id];
        assert_eq!(task.parent_ids.len(), 1);
        assert_eq!(task.input_file_assocs.len(), 1);
    }
}

#[test]
fn many2one_groups_by_projected_tags() {
    let registry = registry_with(vec![
        ("root", ToolSpec::new("root").with_output(AbstractOutputFile::new("seq", "fastq"))),
        (
            "merge",
            ToolSpec::new("merge")
                .with_input(AbstractInputFile::any_format("seq"))
                .with_output(AbstractOutputFile::new("merged", "bam")),
        ),
    ]);

    let recipe = Recipe::new()
        .add_stage(
            StageDecl::new("root", "root")
                .with_relationship(RelationshipType::One2many)
                .expand_tags(vec![
                    tagged(&[("sample", "a"), ("lane", "1")]),
                    tagged(&[("sample", "a"), ("lane", "2")]),
                    tagged(&[("sample", "b"), ("lane", "1")]),
                ]),
        )
        .add_stage(
            StageDecl::new("merge", "merge")
                .with_parent("root")
                .with_relationship(RelationshipType::Many2one)
                .group_by(["sample"]),
        );

    let builder = GraphBuilder::new(ExecutionId(1), PathBuf::from("/out"), &registry);
    let graph = builder.build(&recipe).unwrap();

    let merge_stage = graph.stages.iter().find(|s| s.name == "merge").unwrap();
    assert_eq!(merge_stage.task_ids.len(), 2);
    let sample_a = merge_stage
        .task_ids
        .iter()
        .map(|id| &graph.tasks[id])
        .find(|t| t.tags.get("sample").map(|v| v.to_string()) == Some("a".to_string()))
        .unwrap();
    assert_eq!(sample_a.parent_ids.len(), 2);
}

#[test]
fn many2many_is_full_cartesian_product() {
    let registry = registry_with(vec![
        ("a", ToolSpec::new("a").with_output(AbstractOutputFile::new("x", "txt"))),
        ("b", ToolSpec::new("b").with_output(AbstractOutputFile::new("y", "txt"))),
        (
            "combine",
            ToolSpec::new("combine")
                .with_input(AbstractInputFile::any_format("x"))
                .with_output(AbstractOutputFile::new("z", "txt")),
        ),
    ]);

    let recipe = Recipe::new()
        .add_stage(
            StageDecl::new("a", "a")
                .with_relationship(RelationshipType::One2many)
                .expand_tags(vec![tagged(&[("i", "1")]), tagged(&[("i", "2")])]),
        )
        .add_stage(
            StageDecl::new("b", "b")
                .with_relationship(RelationshipType::One2many)
                .expand_tags(vec![tagged(&[("j", "x")]), tagged(&[("j", "y")]), tagged(&[("j", "z")])]),
        )
        .add_stage(
            StageDecl::new("combine", "combine")
                .with_parent("a")
                .with_parent("b")
                .with_relationship(RelationshipType::Many2many),
        );

    let builder = GraphBuilder::new(ExecutionId(1), PathBuf::from("/out"), &registry);
    let graph = builder.build(&recipe).unwrap();

    let combine_stage = graph.stages.iter().find(|s| s.name == "combine").unwrap();
    assert_eq!(combine_stage.task_ids.len(), 6);
}

#[test]
fn unknown_parent_stage_is_rejected() {
    let registry = registry_with(vec![(
        "solo",
        ToolSpec::new("solo").with_output(AbstractOutputFile::new("x", "txt")),
    )]);
    let recipe = Recipe::new().add_stage(
        StageDecl::new("stage", "solo")
            .with_parent("missing")
            .with_relationship(RelationshipType::One2one),
    );
    let builder = GraphBuilder::new(ExecutionId(1), PathBuf::from("/out"), &registry);
    assert!(builder.build(&recipe).is_err());
}

#[test]
fn one2many_without_tag_expansion_on_root_is_malformed() {
    let registry = registry_with(vec![(
        "root",
        ToolSpec::new("root").with_output(AbstractOutputFile::new("x", "txt")),
    )]);
    let recipe = Recipe::new().add_stage(
        StageDecl::new("root", "root").with_relationship(RelationshipType::One2many),
    );
    let builder = GraphBuilder::new(ExecutionId(1), PathBuf::from("/out"), &registry);
    assert!(builder.build(&recipe).is_err());
}
