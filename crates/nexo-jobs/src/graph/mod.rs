//! Graph construction engine: filtered subgraph extraction, attribute
//! projection, identifier relabeling, and GraphML serialization.

pub mod build;
pub mod graphml;
pub mod model;
pub mod relabel;

pub use build::{build, GraphBuildRequest, GraphBuildSpec};
pub use graphml::write_graphml;
pub use model::{flatten, AttrMap, AttrValue, GraphEdge, GraphNode, PropertyGraph};
