//! Dependency graph module.
//!
//! This module handles:
//! - Layered layout of directed graphs
//! - The two-level component and resource drawing

mod build;
mod layout;

pub use build::{
    dependency_edges, resource_node_id, ComponentInput, ContainerNode, EdgeKind, GraphEdge,
    GraphLayout, NodeStyle, ResourceNodeLayout, CONTAINER_PADDING, MIN_CONTAINER_HEIGHT,
    MIN_CONTAINER_WIDTH, RESOURCE_HEIGHT, RESOURCE_WIDTH,
};
pub use layout::{Layout, LayeredGraph, LayoutOptions, PositionedNode, RankDir};
