// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagegate contributors

//! Artifact graph for pipeline declarations
//!
//! Actions are nodes. Edges come from two sources: artifact flow (producer →
//! consumer) and sequencing (every action of a run-order group precedes the
//! next group, and the last group of a stage precedes the next stage). An
//! artifact consumed before it is produced shows up as a cycle.

use petgraph::algo::{has_path_connecting, kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use crate::errors::StagegateError;
use crate::pipeline::{ActionCategory, Artifact, PipelineSpec};

/// Why one action precedes another
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// The target reads an artifact the source writes
    Artifact(Artifact),
    /// The target starts only after the source finishes
    Sequence,
}

/// A node in the artifact graph
#[derive(Debug, Clone)]
pub struct ActionNode {
    pub stage: String,
    pub action: String,
    pub run_order: u32,
    pub category: ActionCategory,
}

/// Dependency graph between the actions of one declaration
pub struct ArtifactGraph {
    graph: DiGraph<ActionNode, EdgeKind>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl ArtifactGraph {
    /// Build the graph from a declaration
    pub fn build(spec: &PipelineSpec) -> Result<Self, StagegateError> {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();

        for (_, stage, action) in spec.actions() {
            let node = graph.add_node(ActionNode {
                stage: stage.name.clone(),
                action: action.name.clone(),
                run_order: action.run_order,
                category: action.category(),
            });
            if name_to_index.insert(action.name.clone(), node).is_some() {
                return Err(StagegateError::InvalidPipeline {
                    reason: format!("Duplicate action name: '{}'", action.name),
                    help: Some("Action names must be unique across the pipeline".into()),
                });
            }
        }

        // Artifact edges
        let mut producers: HashMap<&Artifact, &str> = HashMap::new();
        for (_, _, action) in spec.actions() {
            if let Some(output) = action.output() {
                if let Some(first) = producers.insert(output, action.name.as_str()) {
                    return Err(StagegateError::DuplicateProducer {
                        artifact: output.to_string(),
                        first: first.to_string(),
                        second: action.name.clone(),
                    });
                }
            }
        }

        for (_, _, action) in spec.actions() {
            let consumer = name_to_index[&action.name];
            for input in action.inputs() {
                let producer = producers.get(input).ok_or_else(|| {
                    StagegateError::UnknownArtifact {
                        action: action.name.clone(),
                        artifact: input.to_string(),
                    }
                })?;
                let producer = name_to_index[*producer];
                graph.add_edge(producer, consumer, EdgeKind::Artifact(input.clone()));
            }
        }

        // Sequencing edges between consecutive run-order groups
        let mut groups: Vec<Vec<NodeIndex>> = Vec::new();
        for stage in &spec.stages {
            for order in stage.run_orders() {
                groups.push(
                    stage
                        .actions_at(order)
                        .iter()
                        .map(|a| name_to_index[&a.name])
                        .collect(),
                );
            }
        }
        for pair in groups.windows(2) {
            for &from in &pair[0] {
                for &to in &pair[1] {
                    if !graph.contains_edge(from, to) {
                        graph.add_edge(from, to, EdgeKind::Sequence);
                    }
                }
            }
        }

        let built = Self {
            graph,
            name_to_index,
        };
        built.validate_acyclic()?;

        Ok(built)
    }

    fn validate_acyclic(&self) -> Result<(), StagegateError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(_) => Err(StagegateError::ArtifactCycle {
                actions: self.cycle_members(),
            }),
        }
    }

    /// Actions in the first strongly connected component with more than one member
    fn cycle_members(&self) -> Vec<String> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .find(|component| component.len() > 1)
            .map(|mut component| {
                component.sort();
                component
                    .into_iter()
                    .map(|n| self.graph[n].action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Action names in a valid execution order
    pub fn topological_order_names(&self) -> Result<Vec<String>, StagegateError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.graph[n].action.clone())
                    .collect()
            })
            .map_err(|_| StagegateError::ArtifactCycle {
                actions: self.cycle_members(),
            })
    }

    /// Actions that must finish right before this one
    pub fn dependencies(&self, action: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(action)?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| self.graph[n].action.clone())
            .collect();
        names.sort();
        Some(names)
    }

    /// Check if action A runs (directly or transitively) after action B
    pub fn depends_on(&self, action_a: &str, action_b: &str) -> bool {
        let (Some(a), Some(b)) = (
            self.name_to_index.get(action_a),
            self.name_to_index.get(action_b),
        ) else {
            return false;
        };
        a != b && has_path_connecting(&self.graph, *b, *a, None)
    }

    /// Artifact flows as (producer, consumer, artifact)
    pub fn artifact_flows(&self) -> Vec<(String, String, Artifact)> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeKind::Artifact(artifact) => Some((
                    self.graph[e.source()].action.clone(),
                    self.graph[e.target()].action.clone(),
                    artifact.clone(),
                )),
                EdgeKind::Sequence => None,
            })
            .collect()
    }

    /// Nodes grouped by stage, in stage order
    fn stages(&self) -> Vec<(String, Vec<NodeIndex>)> {
        let mut stages: Vec<(String, Vec<NodeIndex>)> = Vec::new();
        for node in self.graph.node_indices() {
            let stage = &self.graph[node].stage;
            if let Some((name, nodes)) = stages.last_mut() {
                if *name == *stage {
                    nodes.push(node);
                    continue;
                }
            }
            stages.push((stage.clone(), vec![node]));
        }
        stages
    }

    /// Generate Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");

        for (stage, nodes) in self.stages() {
            out.push_str(&format!("    subgraph {}\n", mermaid_id(&stage)));
            for node in nodes {
                let action = &self.graph[node].action;
                out.push_str(&format!("        {}[\"{}\"]\n", mermaid_id(action), action));
            }
            out.push_str("    end\n");
        }

        for edge in self.graph.edge_references() {
            let from = mermaid_id(&self.graph[edge.source()].action);
            let to = mermaid_id(&self.graph[edge.target()].action);
            match edge.weight() {
                EdgeKind::Artifact(artifact) => {
                    out.push_str(&format!("    {} -->|{}| {}\n", from, artifact, to))
                }
                EdgeKind::Sequence => out.push_str(&format!("    {} -.-> {}\n", from, to)),
            }
        }

        out
    }

    /// Generate DOT diagram of the graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (i, (stage, nodes)) in self.stages().into_iter().enumerate() {
            out.push_str(&format!("    subgraph cluster_{} {{\n", i));
            out.push_str(&format!("        label=\"{}\";\n", stage));
            for node in nodes {
                out.push_str(&format!("        \"{}\";\n", self.graph[node].action));
            }
            out.push_str("    }\n");
        }
        out.push('\n');

        for edge in self.graph.edge_references() {
            let from = &self.graph[edge.source()].action;
            let to = &self.graph[edge.target()].action;
            match edge.weight() {
                EdgeKind::Artifact(artifact) => out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    from, to, artifact
                )),
                EdgeKind::Sequence => out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [style=dashed];\n",
                    from, to
                )),
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of stages and artifact flow
    pub fn to_text(&self, spec: &PipelineSpec) -> String {
        let mut out = String::new();

        for (i, stage) in spec.stages.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, stage.name));

            for order in stage.run_orders() {
                for action in stage.actions_at(order) {
                    out.push_str(&format!(
                        "   [{}] {} ({})",
                        order,
                        action.name,
                        action.category()
                    ));

                    let inputs = action.inputs();
                    if !inputs.is_empty() {
                        let names: Vec<&str> = inputs.iter().map(|a| a.name()).collect();
                        out.push_str(&format!(" ← {}", names.join(", ")));
                    }
                    if let Some(output) = action.output() {
                        out.push_str(&format!(" → {}", output));
                    }
                    out.push('\n');
                }
            }
        }

        out
    }
}

fn mermaid_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{
        Action, ActionKind, PipelineParams, ReleasePipelineBuilder, SecretRef, Stage,
    };

    fn release() -> PipelineSpec {
        ReleasePipelineBuilder::new(PipelineParams {
            secret_ref: "github-token".into(),
            repo_owner: "acme".into(),
            repo_name: "app".into(),
            branch: "main".into(),
            load_balancer_ref: None,
        })
        .build()
        .unwrap()
    }

    type ActionRow<'a> = (&'a str, u32, Option<&'a str>, Option<&'a str>);

    fn make_spec(stages: Vec<(&str, Vec<ActionRow>)>) -> PipelineSpec {
        PipelineSpec {
            version: "1".into(),
            name: "test".into(),
            description: None,
            artifact_store: "Store".into(),
            stages: stages
                .into_iter()
                .map(|(name, actions)| {
                    Stage::new(
                        name,
                        actions
                            .into_iter()
                            .map(|(action, order, input, output)| {
                                let kind = match input {
                                    None => ActionKind::SourceFetch {
                                        owner: "acme".into(),
                                        repo: "app".into(),
                                        branch: "main".into(),
                                        token: SecretRef::new("t"),
                                        output: Artifact::new(output.unwrap_or("src")),
                                    },
                                    Some(input) => ActionKind::Build {
                                        project: "p".into(),
                                        input: Artifact::new(input),
                                        output: output.map(Artifact::new),
                                        env: Default::default(),
                                    },
                                };
                                Action::new(action, kind).with_run_order(order)
                            })
                            .collect(),
                    )
                })
                .collect(),
            projects: vec![],
            resources: vec![],
        }
    }

    #[test]
    fn test_release_order() {
        let graph = ArtifactGraph::build(&release()).unwrap();
        let order = graph.topological_order_names().unwrap();

        assert_eq!(
            order,
            vec![
                "GitHub_Source",
                "StagingInfra",
                "StagingEcs",
                "Approve",
                "ProductionInfra",
                "ProductionEcs"
            ]
        );
    }

    #[test]
    fn test_production_waits_for_approval() {
        let graph = ArtifactGraph::build(&release()).unwrap();

        assert!(graph.depends_on("ProductionInfra", "Approve"));
        assert!(graph.depends_on("ProductionEcs", "StagingEcs"));
        assert!(!graph.depends_on("Approve", "ProductionInfra"));
        assert_eq!(
            graph.dependencies("ProductionInfra").unwrap(),
            vec!["Approve", "GitHub_Source"]
        );
    }

    #[test]
    fn test_artifact_flows() {
        let graph = ArtifactGraph::build(&release()).unwrap();
        let flows = graph.artifact_flows();

        let consumers_of_source: Vec<&str> = flows
            .iter()
            .filter(|(_, _, a)| a.name() == "source_output")
            .map(|(_, to, _)| to.as_str())
            .collect();
        assert_eq!(consumers_of_source, vec!["StagingInfra", "ProductionInfra"]);
    }

    #[test]
    fn test_parallel_actions_share_a_group() {
        let spec = make_spec(vec![
            ("Source", vec![("Fetch", 1, None, Some("src"))]),
            (
                "Build",
                vec![
                    ("Lint", 1, Some("src"), None),
                    ("Test", 1, Some("src"), None),
                    ("Package", 2, Some("src"), None),
                ],
            ),
        ]);
        let graph = ArtifactGraph::build(&spec).unwrap();

        assert!(!graph.depends_on("Lint", "Test"));
        assert!(!graph.depends_on("Test", "Lint"));
        assert!(graph.depends_on("Package", "Lint"));
        assert!(graph.depends_on("Package", "Test"));
    }

    #[test]
    fn test_consuming_a_later_artifact_is_a_cycle() {
        let spec = make_spec(vec![
            ("Source", vec![("Fetch", 1, None, Some("src"))]),
            ("First", vec![("Early", 1, Some("late_output"), None)]),
            ("Second", vec![("Late", 1, Some("src"), Some("late_output"))]),
        ]);

        let result = ArtifactGraph::build(&spec);
        match result {
            Err(StagegateError::ArtifactCycle { actions }) => {
                assert!(actions.contains(&"Early".to_string()));
                assert!(actions.contains(&"Late".to_string()));
            }
            _ => panic!("Expected ArtifactCycle"),
        }
    }

    #[test]
    fn test_unknown_artifact() {
        let spec = make_spec(vec![
            ("Source", vec![("Fetch", 1, None, Some("src"))]),
            ("Build", vec![("Compile", 1, Some("nothing"), None)]),
        ]);
        assert!(matches!(
            ArtifactGraph::build(&spec),
            Err(StagegateError::UnknownArtifact { .. })
        ));
    }

    #[test]
    fn test_mermaid_output() {
        let graph = ArtifactGraph::build(&release()).unwrap();
        let mermaid = graph.to_mermaid();

        assert!(mermaid.starts_with("graph LR"));
        assert!(mermaid.contains("subgraph Approval"));
        assert!(mermaid.contains("GitHub_Source -->|source_output| StagingInfra"));
        assert!(mermaid.contains("StagingEcs -.-> Approve"));
    }

    #[test]
    fn test_dot_output() {
        let graph = ArtifactGraph::build(&release()).unwrap();
        let dot = graph.to_dot();

        assert!(dot.contains("label=\"Production\";"));
        assert!(dot.contains("\"StagingInfra\" -> \"StagingEcs\" [label=\"staging_output\"];"));
    }

    #[test]
    fn test_text_output() {
        let spec = release();
        let graph = ArtifactGraph::build(&spec).unwrap();
        let text = graph.to_text(&spec);

        assert!(text.contains("3. Approval\n   [1] Approve (approval)\n"));
        assert!(text.contains("[1] StagingInfra (build) ← source_output → staging_output"));
    }
}
