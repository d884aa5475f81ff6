//! Two-level dependency graph.
//!
//! Each component becomes a container sized to fit the layered layout of
//! its resources; containers are then laid out left to right along the
//! inter-component dependencies.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use crate::plan::{ChangeCategory, Plan};

use super::layout::{LayeredGraph, LayoutOptions};

/// Minimum container width.
pub const MIN_CONTAINER_WIDTH: f64 = 300.0;
/// Minimum container height.
pub const MIN_CONTAINER_HEIGHT: f64 = 200.0;
/// Space added around a container's content.
pub const CONTAINER_PADDING: f64 = 40.0;
/// Resource node width.
pub const RESOURCE_WIDTH: f64 = 180.0;
/// Resource node height.
pub const RESOURCE_HEIGHT: f64 = 50.0;

/// Colors of a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStyle {
    /// Fill color.
    pub background: &'static str,
    /// Border color.
    pub border: &'static str,
}

impl NodeStyle {
    /// No pending change.
    pub const UNCHANGED: Self = Self {
        background: "#d4edda",
        border: "#c3e6cb",
    };
    /// Created or replaced.
    pub const CREATE: Self = Self {
        background: "#e0cffc",
        border: "#b197fc",
    };
    /// Deleted.
    pub const DELETE: Self = Self {
        background: "#f8d7da",
        border: "#f5c6cb",
    };
    /// Updated.
    pub const UPDATE: Self = Self {
        background: "#fff3cd",
        border: "#ffeeba",
    };
    /// Not in the plan, or only read.
    pub const NEUTRAL: Self = Self {
        background: "#fff",
        border: "#ddd",
    };

    /// Style of a resource shown with `category`; `None` means the resource
    /// has no entry in the plan.
    #[must_use]
    pub const fn for_category(category: Option<ChangeCategory>) -> Self {
        match category {
            Some(ChangeCategory::NoOp) => Self::UNCHANGED,
            Some(ChangeCategory::Create | ChangeCategory::Replace) => Self::CREATE,
            Some(ChangeCategory::Delete) => Self::DELETE,
            Some(ChangeCategory::Update) => Self::UPDATE,
            Some(ChangeCategory::Read) | None => Self::NEUTRAL,
        }
    }
}

/// A component to draw, with its latest plan if any.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInput<'a> {
    /// Component key.
    pub id: &'a str,
    /// Display label.
    pub label: &'a str,
    /// Latest plan in the drawn environment.
    pub plan: Option<&'a Plan>,
}

/// Kind of a drawn edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Between resources of one component.
    Resource,
    /// Between components.
    Component,
}

/// A component container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerNode {
    /// Component key.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Plan the contents come from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Container width.
    pub width: f64,
    /// Container height.
    pub height: f64,
}

/// A resource inside a container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNodeLayout {
    /// Node id, unique across the drawing.
    pub id: String,
    /// Resource address.
    pub address: String,
    /// Display label.
    pub label: String,
    /// Resource type.
    pub resource_type: String,
    /// Owning container.
    pub parent: String,
    /// Left edge, relative to the container.
    pub x: f64,
    /// Top edge, relative to the container.
    pub y: f64,
    /// Node width.
    pub width: f64,
    /// Node height.
    pub height: f64,
    /// Category of the resource in the plan, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ChangeCategory>,
    /// Colors.
    pub style: NodeStyle,
}

/// A drawn edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// Edge id.
    pub id: String,
    /// Dependent node.
    pub source: String,
    /// Node depended upon.
    pub target: String,
    /// Edge kind.
    pub kind: EdgeKind,
}

/// Complete two-level drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphLayout {
    /// One container per component.
    pub containers: Vec<ContainerNode>,
    /// Resources of every container.
    pub resources: Vec<ResourceNodeLayout>,
    /// Resource and component edges.
    pub edges: Vec<GraphEdge>,
    /// Drawing width.
    pub width: f64,
    /// Drawing height.
    pub height: f64,
}

struct Inner {
    width: f64,
    height: f64,
    resources: Vec<ResourceNodeLayout>,
    edges: Vec<(String, String)>,
}

/// Node id of a resource inside a component.
#[must_use]
pub fn resource_node_id(component_id: &str, address: &str) -> String {
    format!("{component_id}/{address}")
}

/// Component dependencies recorded on plans, restricted to drawn
/// components.
#[must_use]
pub fn dependency_edges(components: &[ComponentInput<'_>]) -> Vec<(String, String)> {
    let known: HashSet<&str> = components.iter().map(|c| c.id).collect();
    let mut edges = BTreeSet::new();

    for component in components {
        let Some(plan) = component.plan else { continue };
        for target in &plan.dependencies {
            if target != component.id && known.contains(target.as_str()) {
                edges.insert((component.id.to_string(), target.clone()));
            }
        }
    }

    edges.into_iter().collect()
}

impl GraphLayout {
    /// Lays out components and the dependencies between them.
    ///
    /// `dependencies` are `(dependent, dependency)` pairs of component keys;
    /// pairs naming unknown components are dropped.
    #[must_use]
    pub fn build(components: &[ComponentInput<'_>], dependencies: &[(String, String)]) -> Self {
        let inners: Vec<Inner> = components.iter().map(layout_component).collect();

        let mut outer = LayeredGraph::new();
        for (component, inner) in components.iter().zip(&inners) {
            outer.add_node(component.id, inner.width, inner.height);
        }

        let mut seen_edges = HashSet::new();
        let mut edges = Vec::new();

        for (source, target) in inners.iter().flat_map(|inner| &inner.edges) {
            push_edge(
                &mut edges,
                &mut seen_edges,
                format!("e-{source}-{target}"),
                source,
                target,
                EdgeKind::Resource,
            );
        }

        for (source, target) in dependencies {
            if outer.add_edge(source, target) {
                push_edge(
                    &mut edges,
                    &mut seen_edges,
                    format!("e-comp-{source}-{target}"),
                    source,
                    target,
                    EdgeKind::Component,
                );
            }
        }

        let placed = outer.layout(&LayoutOptions::OUTER);
        let positions: HashMap<&str, (f64, f64)> = placed
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), (n.x, n.y)))
            .collect();

        let mut containers = Vec::with_capacity(components.len());
        let mut resources = Vec::new();

        for (component, inner) in components.iter().zip(inners) {
            let (x, y) = positions.get(component.id).copied().unwrap_or_default();
            if containers.iter().any(|c: &ContainerNode| c.id == component.id) {
                continue;
            }
            containers.push(ContainerNode {
                id: component.id.to_string(),
                label: component.label.to_string(),
                plan_id: component.plan.map(|p| p.id.clone()),
                x,
                y,
                width: inner.width,
                height: inner.height,
            });
            resources.extend(inner.resources);
        }

        Self {
            containers,
            resources,
            edges,
            width: placed.width,
            height: placed.height,
        }
    }

    /// Looks up a container.
    #[must_use]
    pub fn container(&self, id: &str) -> Option<&ContainerNode> {
        self.containers.iter().find(|c| c.id == id)
    }

    /// Resources of one container.
    pub fn resources_of<'s>(
        &'s self,
        container_id: &'s str,
    ) -> impl Iterator<Item = &'s ResourceNodeLayout> + 's {
        self.resources.iter().filter(move |r| r.parent == container_id)
    }

    /// Exports the drawing to Graphviz DOT, one cluster per component.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph Drift {\n");
        dot.push_str("  compound=true;\n  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=filled, fontname=\"Helvetica\", fontsize=10];\n");

        for (i, container) in self.containers.iter().enumerate() {
            let _ = writeln!(dot, "  subgraph cluster_{i} {{");
            let _ = writeln!(dot, "    label=\"{}\";\n    style=dashed;", escape(&container.label));
            let _ = writeln!(dot, "    \"{}\" [shape=point, style=invis];", escape(&container.id));
            for resource in self.resources_of(&container.id) {
                let _ = writeln!(
                    dot,
                    "    \"{}\" [label=\"{}\", fillcolor=\"{}\", color=\"{}\"];",
                    escape(&resource.id),
                    escape(&resource.label),
                    resource.style.background,
                    resource.style.border
                );
            }
            dot.push_str("  }\n");
        }

        for edge in &self.edges {
            let style = match edge.kind {
                EdgeKind::Resource => "solid",
                EdgeKind::Component => "dashed",
            };
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\" [style={style}];",
                escape(&edge.source),
                escape(&edge.target)
            );
        }

        dot.push_str("}\n");
        dot
    }
}

fn push_edge(
    edges: &mut Vec<GraphEdge>,
    seen: &mut HashSet<String>,
    id: String,
    source: &str,
    target: &str,
    kind: EdgeKind,
) {
    if seen.insert(id.clone()) {
        edges.push(GraphEdge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            kind,
        });
    }
}

/// Lays out the resources of one component.
fn layout_component(component: &ComponentInput<'_>) -> Inner {
    let graph = component
        .plan
        .and_then(|p| p.resource_graph.as_ref())
        .filter(|g| !g.nodes.is_empty());

    let (Some(plan), Some(graph)) = (component.plan, graph) else {
        return Inner {
            width: MIN_CONTAINER_WIDTH,
            height: MIN_CONTAINER_HEIGHT,
            resources: Vec::new(),
            edges: Vec::new(),
        };
    };

    let categories: HashMap<&str, ChangeCategory> = plan
        .resource_changes()
        .iter()
        .map(|c| {
            (
                c.address.as_str(),
                ChangeCategory::display_category(&c.change.actions),
            )
        })
        .collect();

    let mut layered = LayeredGraph::new();
    for node in &graph.nodes {
        layered.add_node(node.id.as_str(), RESOURCE_WIDTH, RESOURCE_HEIGHT);
    }

    let mut edges = Vec::new();
    for edge in &graph.edges {
        if layered.add_edge(&edge.source, &edge.target) {
            edges.push((
                resource_node_id(component.id, &edge.source),
                resource_node_id(component.id, &edge.target),
            ));
        }
    }

    let placed = layered.layout(&LayoutOptions::INTERNAL);

    let mut seen = HashSet::new();
    let resources = graph
        .nodes
        .iter()
        .filter(|node| seen.insert(node.id.as_str()))
        .filter_map(|node| {
            let position = placed.node(&node.id)?;
            let category = categories.get(node.id.as_str()).copied();
            Some(ResourceNodeLayout {
                id: resource_node_id(component.id, &node.id),
                address: node.id.clone(),
                label: if node.label.is_empty() {
                    node.id.clone()
                } else {
                    node.label.clone()
                },
                resource_type: node.node_type.clone(),
                parent: component.id.to_string(),
                x: position.x,
                y: position.y,
                width: position.width,
                height: position.height,
                category,
                style: NodeStyle::for_category(category),
            })
        })
        .collect();

    Inner {
        width: MIN_CONTAINER_WIDTH.max(placed.width + CONTAINER_PADDING),
        height: MIN_CONTAINER_HEIGHT.max(placed.height + CONTAINER_PADDING),
        resources,
        edges,
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ResourceChange, ResourceEdge, ResourceGraph, ResourceNode};
    use chrono::{TimeZone, Utc};

    fn node(id: &str) -> ResourceNode {
        ResourceNode {
            id: id.to_string(),
            label: String::new(),
            node_type: String::from("aws_thing"),
        }
    }

    fn input<'a>(id: &'a str, label: &'a str, plan: Option<&'a Plan>) -> ComponentInput<'a> {
        ComponentInput { id, label, plan }
    }

    fn edge(source: &str, target: &str) -> ResourceEdge {
        ResourceEdge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn plan_with_graph() -> Plan {
        let at = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let mut plan = Plan::new("p-app", "app", "dev", at).with_changes(vec![
            ResourceChange::new("a", &["create"]),
            ResourceChange::new("b", &["no-op"]),
            ResourceChange::new("c", &["delete", "create"]),
        ]);
        plan.dependencies = vec![String::from("net"), String::from("missing")];
        plan.resource_graph = Some(ResourceGraph {
            nodes: vec![node("a"), node("b"), node("c"), node("orphan")],
            edges: vec![edge("a", "b"), edge("c", "b"), edge("a", "ghost")],
        });
        plan
    }

    #[test]
    fn test_styles() {
        assert_eq!(NodeStyle::for_category(None), NodeStyle::NEUTRAL);
        assert_eq!(NodeStyle::for_category(Some(ChangeCategory::Read)), NodeStyle::NEUTRAL);
        assert_eq!(NodeStyle::for_category(Some(ChangeCategory::Replace)), NodeStyle::CREATE);
        assert_eq!(NodeStyle::for_category(Some(ChangeCategory::NoOp)), NodeStyle::UNCHANGED);
    }

    #[test]
    fn test_component_without_plan_gets_minimum_size() {
        let components = [input("net", "network", None)];
        let layout = GraphLayout::build(&components, &[]);

        let container = layout.container("net").expect("container exists");
        assert!((container.width - MIN_CONTAINER_WIDTH).abs() < f64::EPSILON);
        assert!((container.height - MIN_CONTAINER_HEIGHT).abs() < f64::EPSILON);
        assert!(layout.resources.is_empty());
    }

    #[test]
    fn test_two_level_layout() {
        let plan = plan_with_graph();
        let components = [
            input("app", "app", Some(&plan)),
            input("net", "network", None),
        ];
        let dependencies = dependency_edges(&components);
        assert_eq!(dependencies, vec![(String::from("app"), String::from("net"))]);

        let layout = GraphLayout::build(&components, &dependencies);

        assert_eq!(layout.containers.len(), 2);
        assert_eq!(layout.resources_of("app").count(), 4);

        let styles: HashMap<&str, NodeStyle> = layout
            .resources
            .iter()
            .map(|r| (r.address.as_str(), r.style))
            .collect();
        assert_eq!(styles["a"], NodeStyle::CREATE);
        assert_eq!(styles["b"], NodeStyle::UNCHANGED);
        assert_eq!(styles["c"], NodeStyle::CREATE);
        assert_eq!(styles["orphan"], NodeStyle::NEUTRAL);

        let ids: Vec<&str> = layout.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["e-app/a-app/b", "e-app/c-app/b", "e-comp-app-net"]);

        // app depends on net, so net sits one rank to the right
        let app = layout.container("app").expect("app container");
        let net = layout.container("net").expect("net container");
        assert!(net.x > app.x + app.width);
        assert!(app.width >= MIN_CONTAINER_WIDTH);
    }

    #[test]
    fn test_container_grows_with_content() {
        let at = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let mut plan = Plan::new("p", "wide", "dev", at);
        plan.resource_graph = Some(ResourceGraph {
            nodes: (0..4).map(|i| node(&format!("n{i}"))).collect(),
            edges: Vec::new(),
        });

        let components = [input("wide", "wide", Some(&plan))];
        let layout = GraphLayout::build(&components, &[]);
        let container = layout.container("wide").expect("container exists");

        // 4 * 180 + 3 * 20 + 2 * 20 margin + 40 padding
        assert!((container.width - 860.0).abs() < f64::EPSILON);
        assert!((container.height - MIN_CONTAINER_HEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dot_export() {
        let plan = plan_with_graph();
        let components = [input("app", "app", Some(&plan))];
        let dot = GraphLayout::build(&components, &[]).to_dot();

        assert!(dot.starts_with("digraph Drift {"));
        assert!(dot.contains("subgraph cluster_0"));
        assert!(dot.contains("\"app/a\" -> \"app/b\""));
    }
}
