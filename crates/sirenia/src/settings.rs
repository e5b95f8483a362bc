use serde::{Deserialize, Serialize};

/// Immutable configuration for one layout call.
///
/// Field names follow the layout-base/CoSE option set. Deserializing accepts camelCase keys and
/// fills every missing key from [`CoseSettings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoseSettings {
    /// Ideal resting length of an edge between two sibling leaves.
    pub edge_length: f64,
    /// Lengthen inter-graph edges by the estimated sizes of the subtrees they connect.
    pub use_smart_ideal_edge_length: bool,
    /// Shrink the edge length by `sqrt(4/7)` per coarser multilevel level.
    pub use_smart_multilevel_scaling: bool,
    /// Extra edge length per level of nesting crossed by an edge, as a fraction of `edge_length`.
    pub per_level_ideal_edge_length_factor: f64,
    /// Narrow repulsion candidates with the FR grid instead of scanning all pairs.
    pub use_smart_repulsion_range: bool,
    pub gravity_strength: f64,
    pub compound_gravity_strength: f64,
    pub repulsion_strength: f64,
    pub use_multilevel_scaling: bool,
    /// Derive `edge_length` and `repulsion_strength` from the input before running.
    pub automatic_parameter_calculation: bool,
    /// Rerun with larger repulsion and edge length while leaves still overlap.
    pub iterative_parameter_calculation: bool,

    pub spring_strength: f64,
    /// Gravity kicks in once a root-graph member is farther than `estimatedSize * factor`.
    pub gravity_range_factor: f64,
    /// Same as `gravity_range_factor`, for members of nested graphs.
    pub compound_gravity_range_factor: f64,
    /// Measure spring and repulsion distances center to center for leaf pairs.
    pub uniform_leaf_node_size: bool,
    /// Padding between a compound node's border and its child graph.
    pub compound_node_margin: f64,
    /// Padding added around the members of every graph.
    pub graph_margin: f64,
    pub simple_node_size: f64,
    pub empty_compound_size: f64,
    /// Lower bound for the iteration cap; the effective cap is `max(5 * nodes, this)`.
    pub max_iterations: usize,
    pub convergence_check_period: usize,
    pub grid_calculation_check_period: usize,
    pub max_node_displacement: f64,
    pub max_node_displacement_incremental: f64,
}

impl CoseSettings {
    pub const DEFAULT_EDGE_LENGTH: f64 = 50.0;
    pub const DEFAULT_SPRING_STRENGTH: f64 = 0.45;
    pub const DEFAULT_REPULSION_STRENGTH: f64 = 4500.0;
    pub const DEFAULT_GRAVITY_STRENGTH: f64 = 0.4;
    pub const DEFAULT_COMPOUND_GRAVITY_STRENGTH: f64 = 1.0;
    pub const DEFAULT_GRAVITY_RANGE_FACTOR: f64 = 3.8;
    pub const DEFAULT_COMPOUND_GRAVITY_RANGE_FACTOR: f64 = 1.5;
    pub const DEFAULT_PER_LEVEL_IDEAL_EDGE_LENGTH_FACTOR: f64 = 0.1;
    pub const DEFAULT_COMPOUND_NODE_MARGIN: f64 = 10.0;
    pub const DEFAULT_GRAPH_MARGIN: f64 = 15.0;
    pub const DEFAULT_SIMPLE_NODE_SIZE: f64 = 40.0;
    pub const DEFAULT_EMPTY_COMPOUND_SIZE: f64 = 40.0;
    pub const MAX_ITERATIONS: usize = 2500;
    pub const CONVERGENCE_CHECK_PERIOD: usize = 100;
    pub const GRID_CALCULATION_CHECK_PERIOD: usize = 10;
    pub const MAX_NODE_DISPLACEMENT: f64 = 300.0;
    pub const MAX_NODE_DISPLACEMENT_INCREMENTAL: f64 = 100.0;

    /// Cooling factor a cold (non-incremental) run starts with.
    pub const INITIAL_COOLING_FACTOR: f64 = 1.0;
    /// Cooling factor a warm-started (incremental) run starts with.
    pub const INITIAL_COOLING_FACTOR_INCREMENTAL: f64 = 0.8;
    /// Upper bound for the temperature the cooling schedule ends at.
    pub const FINAL_TEMPERATURE: f64 = 0.04;
    /// Nudge applied to one of two exactly coincident centers.
    pub const COINCIDENT_NUDGE: f64 = 0.001;

    /// Replaces non-finite or out-of-range values with their defaults.
    pub fn validated(&self) -> Self {
        let d = Self::default();
        let positive = |v: f64, fallback: f64| {
            if v.is_finite() && v > 0.0 {
                v
            } else {
                fallback
            }
        };
        let non_negative = |v: f64, fallback: f64| {
            if v.is_finite() && v >= 0.0 {
                v
            } else {
                fallback
            }
        };
        Self {
            edge_length: positive(self.edge_length, d.edge_length),
            per_level_ideal_edge_length_factor: non_negative(
                self.per_level_ideal_edge_length_factor,
                d.per_level_ideal_edge_length_factor,
            ),
            gravity_strength: non_negative(self.gravity_strength, d.gravity_strength),
            compound_gravity_strength: non_negative(
                self.compound_gravity_strength,
                d.compound_gravity_strength,
            ),
            repulsion_strength: non_negative(self.repulsion_strength, d.repulsion_strength),
            spring_strength: non_negative(self.spring_strength, d.spring_strength),
            gravity_range_factor: positive(self.gravity_range_factor, d.gravity_range_factor),
            compound_gravity_range_factor: positive(
                self.compound_gravity_range_factor,
                d.compound_gravity_range_factor,
            ),
            compound_node_margin: non_negative(self.compound_node_margin, d.compound_node_margin),
            graph_margin: non_negative(self.graph_margin, d.graph_margin),
            simple_node_size: non_negative(self.simple_node_size, d.simple_node_size),
            empty_compound_size: positive(self.empty_compound_size, d.empty_compound_size),
            max_iterations: self.max_iterations.max(1),
            convergence_check_period: self.convergence_check_period.max(1),
            grid_calculation_check_period: self.grid_calculation_check_period.max(1),
            max_node_displacement: positive(self.max_node_displacement, d.max_node_displacement),
            max_node_displacement_incremental: positive(
                self.max_node_displacement_incremental,
                d.max_node_displacement_incremental,
            ),
            ..self.clone()
        }
    }

    /// Per-axis distance below which repulsion stops growing.
    pub fn min_repulsion_dist(edge_length: f64) -> f64 {
        edge_length / 10.0
    }

    /// Total displacement per node under which a run counts as converged.
    pub fn displacement_threshold_per_node(edge_length: f64) -> f64 {
        (3.0 * edge_length) / 100.0
    }
}

impl Default for CoseSettings {
    fn default() -> Self {
        Self {
            edge_length: Self::DEFAULT_EDGE_LENGTH,
            use_smart_ideal_edge_length: true,
            use_smart_multilevel_scaling: false,
            per_level_ideal_edge_length_factor: Self::DEFAULT_PER_LEVEL_IDEAL_EDGE_LENGTH_FACTOR,
            use_smart_repulsion_range: true,
            gravity_strength: Self::DEFAULT_GRAVITY_STRENGTH,
            compound_gravity_strength: Self::DEFAULT_COMPOUND_GRAVITY_STRENGTH,
            repulsion_strength: Self::DEFAULT_REPULSION_STRENGTH,
            use_multilevel_scaling: false,
            automatic_parameter_calculation: false,
            iterative_parameter_calculation: false,
            spring_strength: Self::DEFAULT_SPRING_STRENGTH,
            gravity_range_factor: Self::DEFAULT_GRAVITY_RANGE_FACTOR,
            compound_gravity_range_factor: Self::DEFAULT_COMPOUND_GRAVITY_RANGE_FACTOR,
            uniform_leaf_node_size: false,
            compound_node_margin: Self::DEFAULT_COMPOUND_NODE_MARGIN,
            graph_margin: Self::DEFAULT_GRAPH_MARGIN,
            simple_node_size: Self::DEFAULT_SIMPLE_NODE_SIZE,
            empty_compound_size: Self::DEFAULT_EMPTY_COMPOUND_SIZE,
            max_iterations: Self::MAX_ITERATIONS,
            convergence_check_period: Self::CONVERGENCE_CHECK_PERIOD,
            grid_calculation_check_period: Self::GRID_CALCULATION_CHECK_PERIOD,
            max_node_displacement: Self::MAX_NODE_DISPLACEMENT,
            max_node_displacement_incremental: Self::MAX_NODE_DISPLACEMENT_INCREMENTAL,
        }
    }
}
