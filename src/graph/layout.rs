//! Layered graph layout.
//!
//! Ranking, crossing reduction and coordinate assignment are delegated to
//! `rust_sugiyama`, which lays out each connected part top to bottom with
//! node centers. This module sizes the nodes, packs the connected parts
//! side by side, applies the rank direction and margins and reports
//! top-left corners.

use petgraph::graph::{DiGraph, NodeIndex};
use rust_sugiyama::configure::Config;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::trace;

/// Direction ranks advance in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankDir {
    /// Ranks stack downwards.
    TopToBottom,
    /// Ranks stack rightwards.
    LeftToRight,
}

/// Spacing parameters of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutOptions {
    /// Rank direction.
    pub rank_dir: RankDir,
    /// Gap between adjacent nodes of a rank.
    pub node_sep: f64,
    /// Gap between adjacent ranks.
    pub rank_sep: f64,
    /// Horizontal margin around the drawing.
    pub margin_x: f64,
    /// Vertical margin around the drawing.
    pub margin_y: f64,
}

impl LayoutOptions {
    /// Resources inside a component container.
    pub const INTERNAL: Self = Self {
        rank_dir: RankDir::TopToBottom,
        node_sep: 20.0,
        rank_sep: 40.0,
        margin_x: 20.0,
        margin_y: 40.0,
    };

    /// Component containers.
    pub const OUTER: Self = Self {
        rank_dir: RankDir::LeftToRight,
        node_sep: 50.0,
        rank_sep: 100.0,
        margin_x: 50.0,
        margin_y: 50.0,
    };

    const fn is_vertical(&self) -> bool {
        matches!(self.rank_dir, RankDir::TopToBottom)
    }

    /// Margins as `(along a rank, across ranks)`.
    const fn margins(&self) -> (f64, f64) {
        if self.is_vertical() {
            (self.margin_x, self.margin_y)
        } else {
            (self.margin_y, self.margin_x)
        }
    }
}

/// A node with its assigned position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    /// Node id.
    pub id: String,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Node width.
    pub width: f64,
    /// Node height.
    pub height: f64,
    /// Rank of the node within its connected part.
    pub rank: usize,
    /// Position of the node within its rank.
    pub order: usize,
}

/// Result of a layout pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    /// Nodes in insertion order.
    pub nodes: Vec<PositionedNode>,
    /// Drawing width, margins included.
    pub width: f64,
    /// Drawing height, margins included.
    pub height: f64,
}

impl Layout {
    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone)]
struct NodeBox {
    id: String,
    width: f64,
    height: f64,
}

/// Node placed inside one connected part, in rank-frame coordinates:
/// `along` runs within a rank, `across` from rank to rank.
#[derive(Debug, Clone, Copy)]
struct PartNode {
    index: usize,
    along: f64,
    across: f64,
    rank: usize,
}

/// One connected part, normalized so its bounding box starts at zero.
#[derive(Debug, Default)]
struct Part {
    nodes: Vec<PartNode>,
    along: f64,
    across: f64,
}

/// A directed graph of sized nodes awaiting layout.
#[derive(Debug, Default)]
pub struct LayeredGraph {
    graph: DiGraph<NodeBox, ()>,
    index: HashMap<String, NodeIndex>,
}

impl LayeredGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; a repeated id keeps the first size.
    pub fn add_node(&mut self, id: impl Into<String>, width: f64, height: f64) {
        let id = id.into();
        if self.index.contains_key(&id) {
            return;
        }
        let idx = self.graph.add_node(NodeBox {
            id: id.clone(),
            width,
            height,
        });
        self.index.insert(id, idx);
    }

    /// Adds an edge between known nodes.
    ///
    /// Returns false for unknown endpoints and self loops. Parallel edges
    /// collapse into one.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) if s != t => {
                self.graph.update_edge(s, t, ());
                true
            }
            _ => false,
        }
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Lays the graph out.
    ///
    /// Connected parts are placed side by side along the ranks, in the order
    /// their first node was added; isolated nodes form parts of their own.
    #[must_use]
    pub fn layout(&self, options: &LayoutOptions) -> Layout {
        if self.graph.node_count() == 0 {
            return Layout::default();
        }

        let mut parts = self.connected_parts(options);
        parts.extend(self.isolated_parts(options));
        parts.sort_by_key(|part| part.nodes.iter().map(|n| n.index).min());

        self.assemble(&parts, options)
    }

    /// Extent of a node as `(along a rank, across ranks)`.
    fn extent(&self, idx: NodeIndex, options: &LayoutOptions) -> (f64, f64) {
        let node = &self.graph[idx];
        if options.is_vertical() {
            (node.width, node.height)
        } else {
            (node.height, node.width)
        }
    }

    /// Runs the layering on every node that has at least one edge.
    fn connected_parts(&self, options: &LayoutOptions) -> Vec<Part> {
        let linked: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_undirected(n).next().is_some())
            .collect();
        if linked.is_empty() {
            return Vec::new();
        }

        // Vertex ids handed to the layering are dense, in insertion order.
        let dense: HashMap<NodeIndex, u32> = linked
            .iter()
            .zip(0u32..)
            .map(|(&n, id)| (n, id))
            .collect();

        // The layering uses one gap both within and between ranks; the
        // wider rank gap is folded into the node extent across ranks.
        let extra_across = (options.rank_sep - options.node_sep).max(0.0);
        let vertices: Vec<(u32, (f64, f64))> = linked
            .iter()
            .map(|&n| {
                let (along, across) = self.extent(n, options);
                (dense[&n], (along, across + extra_across))
            })
            .collect();
        let edges: Vec<(u32, u32)> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| (dense[&e.source()], dense[&e.target()]))
            .collect();

        let config = Config {
            vertex_spacing: options.node_sep,
            ..Config::default()
        };

        let layouts = rust_sugiyama::from_vertices_and_edges(&vertices, &edges, &config);
        trace!(
            "Layered {} node(s) into {} connected part(s)",
            linked.len(),
            layouts.len()
        );

        layouts
            .into_iter()
            .map(|(coords, _, _)| {
                let centers: Vec<(NodeIndex, f64, f64)> = coords
                    .into_iter()
                    .filter_map(|(id, (along, across))| {
                        linked.get(id).map(|&n| (n, along, across))
                    })
                    .collect();
                self.normalize(&centers, options)
            })
            .collect()
    }

    /// Every node without edges becomes a part of its own.
    fn isolated_parts<'s>(&'s self, options: &'s LayoutOptions) -> impl Iterator<Item = Part> + 's {
        self.graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_undirected(n).next().is_none())
            .map(|n| self.normalize(&[(n, 0.0, 0.0)], options))
    }

    /// Turns node centers into a part whose bounding box starts at zero,
    /// deriving ranks from the distinct rank centers.
    fn normalize(&self, centers: &[(NodeIndex, f64, f64)], options: &LayoutOptions) -> Part {
        let boxes: Vec<(NodeIndex, f64, f64, f64, f64)> = centers
            .iter()
            .map(|&(n, along, across)| {
                let (w, h) = self.extent(n, options);
                (n, along - w / 2.0, across - h / 2.0, w, h)
            })
            .collect();

        let min_along = boxes.iter().map(|b| b.1).fold(f64::INFINITY, f64::min);
        let min_across = boxes.iter().map(|b| b.2).fold(f64::INFINITY, f64::min);
        let max_along = boxes.iter().map(|b| b.1 + b.3).fold(f64::NEG_INFINITY, f64::max);
        let max_across = boxes.iter().map(|b| b.2 + b.4).fold(f64::NEG_INFINITY, f64::max);

        let rank_keys: BTreeSet<i64> = centers.iter().map(|c| rank_key(c.2)).collect();
        let ranks: HashMap<i64, usize> = rank_keys.into_iter().zip(0..).collect();

        let nodes = boxes
            .iter()
            .zip(centers)
            .map(|(&(n, along, across, _, _), &(_, _, center))| PartNode {
                index: n.index(),
                along: along - min_along,
                across: across - min_across,
                rank: ranks.get(&rank_key(center)).copied().unwrap_or_default(),
            })
            .collect();

        Part {
            nodes,
            along: max_along - min_along,
            across: max_across - min_across,
        }
    }

    /// Packs the parts side by side and maps them to drawing coordinates.
    fn assemble(&self, parts: &[Part], options: &LayoutOptions) -> Layout {
        let (along_margin, across_margin) = options.margins();

        let mut placed: Vec<(PartNode, f64)> = Vec::with_capacity(self.graph.node_count());
        let mut ranks: BTreeMap<(usize, usize), Vec<(f64, usize)>> = BTreeMap::new();
        let mut cursor = 0.0;
        for (part_no, part) in parts.iter().enumerate() {
            for &node in &part.nodes {
                let along = cursor + node.along;
                placed.push((node, along));
                ranks.entry((part_no, node.rank)).or_default().push((along, node.index));
            }
            cursor += part.along + options.node_sep;
        }
        let content_along = (cursor - options.node_sep).max(0.0);
        let content_across = parts.iter().map(|p| p.across).fold(0.0, f64::max);

        let mut order = HashMap::new();
        for members in ranks.values_mut() {
            members.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (slot, &(_, index)) in members.iter().enumerate() {
                order.insert(index, slot);
            }
        }

        placed.sort_by_key(|(node, _)| node.index);
        let nodes = placed
            .into_iter()
            .map(|(node, along)| {
                let along = along_margin + along;
                let across = across_margin + node.across;
                let (x, y) = if options.is_vertical() {
                    (along, across)
                } else {
                    (across, along)
                };
                let NodeBox { id, width, height } = &self.graph[NodeIndex::new(node.index)];
                PositionedNode {
                    id: id.clone(),
                    x,
                    y,
                    width: *width,
                    height: *height,
                    rank: node.rank,
                    order: order.get(&node.index).copied().unwrap_or_default(),
                }
            })
            .collect();

        let along = content_along + 2.0 * along_margin;
        let across = content_across + 2.0 * across_margin;
        let (width, height) = if options.is_vertical() {
            (along, across)
        } else {
            (across, along)
        };

        Layout {
            nodes,
            width,
            height,
        }
    }
}

/// Rank centers compared at a thousandth of a unit.
#[allow(clippy::cast_possible_truncation)]
fn rank_key(center: f64) -> i64 {
    (center * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn chain(ids: &[&str]) -> LayeredGraph {
        let mut graph = LayeredGraph::new();
        for id in ids {
            graph.add_node(*id, 180.0, 50.0);
        }
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]);
        }
        graph
    }

    fn overlaps(a: &PositionedNode, b: &PositionedNode) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn test_empty_graph() {
        let layout = LayeredGraph::new().layout(&LayoutOptions::INTERNAL);
        assert!(layout.nodes.is_empty());
        assert!(layout.width.abs() < EPS);
    }

    #[test]
    fn test_chain_top_to_bottom() {
        let layout = chain(&["a", "b", "c"]).layout(&LayoutOptions::INTERNAL);

        let ranks: Vec<usize> = layout.nodes.iter().map(|n| n.rank).collect();
        assert_eq!(ranks, [0, 1, 2]);

        let a = layout.node("a").expect("a is placed");
        let b = layout.node("b").expect("b is placed");
        assert!((a.x - 20.0).abs() < EPS);
        assert!((a.y - 40.0).abs() < EPS);
        assert!((b.y - (40.0 + 50.0 + 40.0)).abs() < EPS);

        // 3 ranks of 50 plus 2 gaps of 40, plus 2 * 40 margin
        assert!((layout.height - 310.0).abs() < EPS);
        assert!((layout.width - 220.0).abs() < EPS);
    }

    #[test]
    fn test_left_to_right_advances_x() {
        let layout = chain(&["a", "b"]).layout(&LayoutOptions::OUTER);
        let a = layout.node("a").expect("a is placed");
        let b = layout.node("b").expect("b is placed");

        assert!((a.x - 50.0).abs() < EPS);
        assert!((b.x - (50.0 + 180.0 + 100.0)).abs() < EPS);
        assert!((a.y - b.y).abs() < EPS);
    }

    #[test]
    fn test_cycles_are_broken() {
        let mut graph = chain(&["a", "b", "c"]);
        assert!(graph.add_edge("c", "a"));

        let layout = graph.layout(&LayoutOptions::INTERNAL);
        assert_eq!(layout.nodes.len(), 3);
        let max_rank = layout.nodes.iter().map(|n| n.rank).max();
        assert_eq!(max_rank, Some(2));
    }

    #[test]
    fn test_edges_to_unknown_nodes_and_self_loops_are_ignored() {
        let mut graph = chain(&["a", "b"]);
        assert!(!graph.add_edge("a", "zzz"));
        assert!(!graph.add_edge("a", "a"));
        assert!(graph.add_edge("a", "b"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_disconnected_parts_sit_side_by_side() {
        let mut graph = LayeredGraph::new();
        for id in ["a", "b", "x", "y", "lonely"] {
            graph.add_node(id, 10.0, 10.0);
        }
        graph.add_edge("a", "y");
        graph.add_edge("b", "x");

        let layout = graph.layout(&LayoutOptions::INTERNAL);
        let x = layout.node("x").expect("x is placed");
        let y = layout.node("y").expect("y is placed");
        let lonely = layout.node("lonely").expect("lonely is placed");

        assert!(y.x < x.x);
        assert!(x.x < lonely.x);
        assert!((lonely.y - 40.0).abs() < EPS);
        assert_eq!((lonely.rank, y.rank), (0, 1));
    }

    #[test]
    fn test_nodes_never_overlap() {
        let mut graph = LayeredGraph::new();
        for id in ["root", "l", "r", "ll", "lr", "rr", "leaf"] {
            graph.add_node(id, 180.0, 50.0);
        }
        for (s, t) in [
            ("root", "l"),
            ("root", "r"),
            ("l", "ll"),
            ("l", "lr"),
            ("r", "rr"),
            ("lr", "leaf"),
            ("rr", "leaf"),
            ("root", "leaf"),
        ] {
            graph.add_edge(s, t);
        }

        let layout = graph.layout(&LayoutOptions::INTERNAL);
        assert_eq!(layout.nodes.len(), 7);
        for (i, a) in layout.nodes.iter().enumerate() {
            assert!(a.x >= 20.0 - EPS && a.y >= 40.0 - EPS);
            assert!(a.x + a.width <= layout.width - 20.0 + EPS);
            assert!(a.y + a.height <= layout.height - 40.0 + EPS);
            for b in &layout.nodes[i + 1..] {
                assert!(!overlaps(a, b), "{} overlaps {}", a.id, b.id);
            }
        }

        let root = layout.node("root").expect("root is placed");
        let leaf = layout.node("leaf").expect("leaf is placed");
        assert_eq!(root.rank, 0);
        assert!(leaf.rank >= 3);
    }
}
