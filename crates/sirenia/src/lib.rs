#![forbid(unsafe_code)]

//! Headless compound spring-embedder layout (CoSE) with multilevel coarsening.
//!
//! The input is a hierarchy of rectangular nodes with a single root, plus edges between any two
//! nodes. [`compute_layout`] returns a center, size and rotation for every node, relative to the
//! center of the whole drawing. Subtrees listed as [`Sublayout`]s keep their internal arrangement
//! and move as one rigid body.

pub mod coarsen;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod grid;
mod layout;
pub mod measure;
pub mod model;
pub mod settings;
pub mod sim;
pub mod sublayout;
pub mod tuning;

pub use error::{Error, Result};
pub use graph::{
    Edge, LayoutGraph, LayoutResult, LayoutStats, Node, Placement, Point, Size, Sublayout,
    Termination,
};
pub use measure::Measurements;
pub use settings::CoseSettings;

/// Headless layout entry point.
pub fn compute_layout(
    graph: &LayoutGraph,
    sublayouts: &[Sublayout],
    settings: &CoseSettings,
) -> Result<LayoutResult> {
    layout::compute(graph, sublayouts, settings)
}
