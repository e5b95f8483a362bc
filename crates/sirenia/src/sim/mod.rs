//! Spring embedder: iterative force simulation over one [`GraphManager`] level.
//!
//! Each iteration resets forces, then accumulates spring, repulsion and gravity forces, integrates
//! them into displacements, and refreshes compound bounds. Every `convergence_check_period`
//! iterations the run is checked for convergence and the cooling factor steps down.

mod forces;

use crate::error::Result;
use crate::graph::Termination;
use crate::grid::SpatialGrid;
use crate::model::GraphManager;
use crate::settings::CoseSettings;
use forces::{RepulsionParams, gravity_force, repulsion_force, spring_force};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Iterating,
    Converged,
    IterationCapReached,
}

impl EngineState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Converged | Self::IterationCapReached)
    }
}

impl From<EngineState> for Termination {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Converged => Termination::Converged,
            EngineState::IterationCapReached => Termination::IterationCapReached,
            EngineState::Initializing | EngineState::Iterating => Termination::Skipped,
        }
    }
}

/// Per-run inputs that differ between multilevel levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    /// 0 is the finest level.
    pub level: usize,
    /// Warm start: lower initial temperature and smaller step cap.
    pub incremental: bool,
    pub edge_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub iterations: usize,
    pub state: EngineState,
    pub total_displacement: f64,
}

pub struct ForceSimulation<'a> {
    gm: &'a mut GraphManager,
    settings: &'a CoseSettings,
    config: RunConfig,
    state: EngineState,

    initial_cooling_factor: f64,
    cooling_factor: f64,
    final_temperature: f64,
    max_node_displacement: f64,
    max_iterations: usize,
    max_cooling_cycle: f64,
    cooling_cycle: f64,

    total_iterations: usize,
    total_displacement: f64,
    old_total_displacement: f64,
    displacement_threshold: f64,

    repulsion_range: f64,
    repulsion: RepulsionParams,
    grid: Option<SpatialGrid>,
    processed: Vec<bool>,
    /// Nodes that take part in repulsion: everything except frozen sublayout members.
    participants: Vec<usize>,
}

impl<'a> ForceSimulation<'a> {
    pub fn new(gm: &'a mut GraphManager, settings: &'a CoseSettings, config: RunConfig) -> Self {
        Self {
            gm,
            settings,
            config,
            state: EngineState::Initializing,
            initial_cooling_factor: CoseSettings::INITIAL_COOLING_FACTOR,
            cooling_factor: CoseSettings::INITIAL_COOLING_FACTOR,
            final_temperature: CoseSettings::FINAL_TEMPERATURE,
            max_node_displacement: settings.max_node_displacement,
            max_iterations: settings.max_iterations,
            max_cooling_cycle: 1.0,
            cooling_cycle: 0.0,
            total_iterations: 0,
            total_displacement: 0.0,
            old_total_displacement: 0.0,
            displacement_threshold: 0.0,
            repulsion_range: 0.0,
            repulsion: RepulsionParams {
                strength: settings.repulsion_strength,
                min_dist: CoseSettings::min_repulsion_dist(config.edge_length),
                separation_buffer: config.edge_length / 2.0,
            },
            grid: None,
            processed: Vec::new(),
            participants: Vec::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn iterations(&self) -> usize {
        self.total_iterations
    }

    pub fn cooling_factor(&self) -> f64 {
        self.cooling_factor
    }

    /// Derives everything the iterations need from the current model: bounds, connectivity,
    /// depths, estimated sizes, ideal edge lengths and the cooling schedule.
    pub fn initialize(&mut self) -> Result<()> {
        let settings = self.settings;
        let edge_length = self.config.edge_length;

        self.gm.update_bounds(settings);
        self.gm.update_connectivity()?;
        self.gm.calc_leaf_counts();
        self.gm.compute_lcas();
        self.gm.calc_inclusion_tree_depths();
        self.gm.calc_estimated_sizes(settings);
        self.gm.calc_ideal_edge_lengths(edge_length, settings);

        let n = self.gm.nodes.len();
        if self.config.incremental {
            self.initial_cooling_factor = CoseSettings::INITIAL_COOLING_FACTOR_INCREMENTAL;
            self.max_node_displacement = settings.max_node_displacement_incremental;
        } else {
            self.initial_cooling_factor = CoseSettings::INITIAL_COOLING_FACTOR;
            self.max_node_displacement = settings.max_node_displacement;
        }
        self.cooling_factor = self.initial_cooling_factor;

        let period = settings.convergence_check_period as f64;
        self.max_iterations = (5 * n).max(settings.max_iterations);
        self.max_cooling_cycle = self.max_iterations as f64 / period;
        self.final_temperature = (period / self.max_iterations as f64)
            .min(CoseSettings::FINAL_TEMPERATURE)
            .min(self.initial_cooling_factor / 2.0);
        self.displacement_threshold =
            CoseSettings::displacement_threshold_per_node(edge_length) * n as f64;
        self.repulsion_range = 2.0 * (self.config.level as f64 + 1.0) * edge_length;

        self.participants = (0..n)
            .filter(|&i| !self.gm.sublayouts.is_member(i))
            .collect();
        self.processed = vec![false; n];
        self.grid = None;
        self.total_iterations = 0;
        self.cooling_cycle = 0.0;
        self.total_displacement = 0.0;
        self.old_total_displacement = 0.0;
        self.state = EngineState::Iterating;
        Ok(())
    }

    /// Advances the simulation by one iteration and returns the resulting state.
    pub fn step(&mut self) -> Result<EngineState> {
        match self.state {
            EngineState::Initializing => self.initialize()?,
            EngineState::Iterating => {}
            done => return Ok(done),
        }
        if self.total_iterations >= self.max_iterations {
            self.state = EngineState::IterationCapReached;
            return Ok(self.state);
        }

        self.total_iterations += 1;
        if self
            .total_iterations
            .is_multiple_of(self.settings.convergence_check_period)
        {
            if self.is_converged() {
                self.state = EngineState::Converged;
                return Ok(self.state);
            }
            self.cooling_cycle += 1.0;
            self.update_cooling_factor();
        }

        self.total_displacement = 0.0;
        for node in &mut self.gm.nodes {
            node.reset_forces();
        }
        self.apply_spring_forces();
        self.apply_repulsion_forces();
        self.apply_gravity_forces();
        self.move_nodes();
        self.gm.update_bounds(self.settings);

        if self.total_iterations >= self.max_iterations {
            self.state = EngineState::IterationCapReached;
        }
        Ok(self.state)
    }

    /// Runs until the state machine finishes.
    pub fn run(mut self) -> Result<RunStats> {
        if self.state == EngineState::Initializing {
            self.initialize()?;
        }
        while !self.step()?.is_finished() {}

        tracing::debug!(
            level = self.config.level,
            incremental = self.config.incremental,
            iterations = self.total_iterations,
            state = ?self.state,
            total_displacement = self.total_displacement,
            "spring embedder finished"
        );
        Ok(RunStats {
            iterations: self.total_iterations,
            state: self.state,
            total_displacement: self.total_displacement,
        })
    }

    fn is_converged(&mut self) -> bool {
        let oscillating = self.total_iterations > self.max_iterations / 3
            && (self.total_displacement - self.old_total_displacement).abs() < 2.0;
        let converged = self.total_displacement < self.displacement_threshold;
        self.old_total_displacement = self.total_displacement;
        converged || oscillating
    }

    fn update_cooling_factor(&mut self) {
        let numerator = (100.0 * (self.initial_cooling_factor - self.final_temperature)).ln();
        let denominator = self.max_cooling_cycle.ln().max(1e-9);
        let power = numerator / denominator;
        let schedule = self.cooling_cycle.powf(power) / 100.0;
        let next = self.initial_cooling_factor - schedule;
        self.cooling_factor = if next.is_finite() {
            next.max(self.final_temperature)
        } else {
            self.final_temperature
        };
    }

    fn apply_spring_forces(&mut self) {
        let gm = &mut *self.gm;
        let uniform = self.settings.uniform_leaf_node_size;
        for e in 0..gm.edges.len() {
            let (s, t) = (gm.edges[e].source, gm.edges[e].target);
            let (bs, bt) = (gm.sublayouts.body_of(s), gm.sublayouts.body_of(t));
            if bs == bt {
                continue;
            }
            let center_to_center = uniform && gm.is_leaf(s) && gm.is_leaf(t);
            let Some(((fx, fy), (length, lx, ly))) = spring_force(
                &gm.nodes[s].rect,
                &gm.nodes[t].rect,
                gm.edges[e].ideal_length,
                self.settings.spring_strength,
                center_to_center,
            ) else {
                continue;
            };

            let edge = &mut gm.edges[e];
            edge.length = length;
            edge.length_x = lx;
            edge.length_y = ly;

            gm.nodes[bs].spring_fx += fx;
            gm.nodes[bs].spring_fy += fy;
            gm.nodes[bt].spring_fx -= fx;
            gm.nodes[bt].spring_fy -= fy;
        }
    }

    fn apply_repulsion_forces(&mut self) {
        if !self.settings.use_smart_repulsion_range {
            for g in 0..self.gm.graphs.len() {
                let members: Vec<usize> = self.gm.graphs[g]
                    .nodes
                    .iter()
                    .copied()
                    .filter(|&n| !self.gm.sublayouts.is_member(n))
                    .collect();
                for (i, &a) in members.iter().enumerate() {
                    for &b in &members[i + 1..] {
                        self.repulse(a, b);
                    }
                }
            }
            return;
        }

        let refresh = (self.total_iterations - 1)
            .is_multiple_of(self.settings.grid_calculation_check_period);
        if refresh {
            let bounds = self.gm.root_rect();
            self.grid = SpatialGrid::build(
                bounds,
                self.repulsion_range,
                &mut self.gm.nodes,
                &self.participants,
            );
        }

        self.processed.fill(false);
        for k in 0..self.participants.len() {
            let i = self.participants[k];
            if refresh {
                match &mut self.grid {
                    Some(grid) => grid.refresh_surrounding(i, &mut self.gm.nodes, &self.processed),
                    None => self.gm.nodes[i].surrounding.clear(),
                }
            }
            let surrounding = std::mem::take(&mut self.gm.nodes[i].surrounding);
            for &j in &surrounding {
                self.repulse(i, j);
            }
            self.gm.nodes[i].surrounding = surrounding;
            self.processed[i] = true;
        }
    }

    fn repulse(&mut self, a: usize, b: usize) {
        let gm = &mut *self.gm;
        // Two members of the same rigid unit never push each other.
        if gm.sublayouts.body_of(a) == gm.sublayouts.body_of(b) {
            return;
        }
        let center_to_center =
            self.settings.uniform_leaf_node_size && gm.is_leaf(a) && gm.is_leaf(b);
        let (fx, fy) = repulsion_force(
            &gm.nodes[a].rect,
            &gm.nodes[b].rect,
            gm.nodes[a].leaf_count as f64,
            gm.nodes[b].leaf_count as f64,
            center_to_center,
            self.repulsion,
        );
        gm.nodes[a].repulsion_fx -= fx;
        gm.nodes[a].repulsion_fy -= fy;
        gm.nodes[b].repulsion_fx += fx;
        gm.nodes[b].repulsion_fy += fy;
    }

    fn apply_gravity_forces(&mut self) {
        let gm = &mut *self.gm;
        let s = self.settings;
        for k in 0..gm.gravity_nodes.len() {
            let n = gm.gravity_nodes[k];
            let owner = gm.nodes[n].owner;
            let graph = &gm.graphs[owner];
            let (range, strength) = if owner == gm.root {
                (
                    (graph.estimated_size * s.gravity_range_factor).trunc(),
                    s.gravity_strength,
                )
            } else {
                (
                    (graph.estimated_size * s.compound_gravity_range_factor).trunc(),
                    s.gravity_strength * s.compound_gravity_strength,
                )
            };
            let center = graph.center();
            if let Some((fx, fy)) = gravity_force(&gm.nodes[n].rect, center, range, strength) {
                gm.nodes[n].gravity_fx = fx;
                gm.nodes[n].gravity_fy = fy;
            }
        }
    }

    /// Turns forces into displacements, then applies them.
    ///
    /// Leaves, empty compounds and sublayout roots move themselves. Any other compound hands its
    /// displacement down to every body below it.
    fn move_nodes(&mut self) {
        let limit = self.cooling_factor * self.max_node_displacement;
        let mut moves: Vec<(usize, f64, f64)> = Vec::with_capacity(self.participants.len());

        for &n in &self.participants {
            let node = &mut self.gm.nodes[n];
            let (mut fx, mut fy) = node.total_force();
            if !fx.is_finite() || !fy.is_finite() {
                tracing::warn!(node = n, fx, fy, "non-finite force clamped to zero");
                if !fx.is_finite() {
                    fx = 0.0;
                }
                if !fy.is_finite() {
                    fy = 0.0;
                }
            }
            let leaves = node.leaf_count.max(1) as f64;
            let dx = (self.cooling_factor * fx / leaves).clamp(-limit, limit);
            let dy = (self.cooling_factor * fy / leaves).clamp(-limit, limit);
            node.displacement_x = dx;
            node.displacement_y = dy;
            self.total_displacement += dx.abs() + dy.abs();
            moves.push((n, dx, dy));
        }

        for (n, dx, dy) in moves {
            if dx == 0.0 && dy == 0.0 {
                continue;
            }
            if self.gm.moves_itself(n) || self.gm.sublayouts.is_root(n) {
                self.gm.nodes[n].move_by(dx, dy);
                continue;
            }
            for body in self.bodies_below(n) {
                self.gm.nodes[body].move_by(dx, dy);
            }
        }
    }

    /// Nodes below compound `node` that move themselves.
    fn bodies_below(&self, node: usize) -> Vec<usize> {
        let gm = &*self.gm;
        let mut out = Vec::new();
        let mut stack: Vec<usize> = match gm.nodes[node].child {
            Some(g) => gm.graphs[g].nodes.clone(),
            None => return out,
        };
        while let Some(n) = stack.pop() {
            if gm.moves_itself(n) || gm.sublayouts.is_root(n) {
                out.push(n);
            } else if let Some(g) = gm.nodes[n].child {
                stack.extend(gm.graphs[g].nodes.iter().copied());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineState, ForceSimulation, RunConfig};
    use crate::geometry::Rect;
    use crate::model::{CNode, GraphManager};
    use crate::settings::CoseSettings;

    fn leaf(cx: f64, cy: f64, size: f64) -> CNode {
        CNode::new(None, 0, Rect::from_center(cx, cy, size, size))
    }

    /// Root compound with `children` leaves, returning the leaf indices.
    fn flat(children: &[(f64, f64)], size: f64) -> (GraphManager, Vec<usize>) {
        let mut gm = GraphManager::new();
        let root = gm.add_node(0, leaf(0.0, 0.0, 0.0));
        let g = gm.add_graph(root);
        let ids = children
            .iter()
            .map(|&(x, y)| gm.add_node(g, leaf(x, y, size)))
            .collect();
        (gm, ids)
    }

    fn config(edge_length: f64) -> RunConfig {
        RunConfig {
            level: 0,
            incremental: true,
            edge_length,
        }
    }

    fn distance(gm: &GraphManager, a: usize, b: usize) -> f64 {
        let (ax, ay) = gm.nodes[a].center();
        let (bx, by) = gm.nodes[b].center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    #[test]
    fn initialize_derives_schedule_from_node_count() {
        let (mut gm, _) = flat(&[(0.0, 0.0), (10.0, 0.0)], 4.0);
        let s = CoseSettings::default();
        let mut sim = ForceSimulation::new(&mut gm, &s, config(50.0));
        assert_eq!(sim.state(), EngineState::Initializing);
        sim.initialize().unwrap();
        assert_eq!(sim.state(), EngineState::Iterating);
        assert_eq!(sim.cooling_factor(), CoseSettings::INITIAL_COOLING_FACTOR_INCREMENTAL);
        assert_eq!(sim.max_iterations, CoseSettings::MAX_ITERATIONS);
        assert_eq!(sim.repulsion_range, 100.0);
        assert!((sim.displacement_threshold - 3.0 * 1.5).abs() < 1e-12);
    }

    #[test]
    fn cooling_factor_never_increases() {
        let (mut gm, _) = flat(&[(0.0, 0.0), (80.0, 0.0), (40.0, 70.0)], 10.0);
        let s = CoseSettings {
            max_iterations: 400,
            convergence_check_period: 10,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&mut gm, &s, config(50.0));
        sim.initialize().unwrap();
        let mut last = sim.cooling_factor();
        while !sim.step().unwrap().is_finished() {
            assert!(sim.cooling_factor() <= last);
            assert!(sim.cooling_factor() >= sim.final_temperature);
            last = sim.cooling_factor();
        }
    }

    #[test]
    fn displacement_does_not_grow_once_cooling_bottoms_out() {
        let (mut gm, ids) = flat(&[(0.0, 0.0), (2000.0, 0.0)], 1.0);
        gm.add_edge(ids[0], ids[1]);
        let s = CoseSettings {
            uniform_leaf_node_size: true,
            use_smart_repulsion_range: false,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&mut gm, &s, config(40.0));
        sim.initialize().unwrap();
        // Start on the last cooling cycle so every schedule step stays on the floor.
        sim.cooling_cycle = sim.max_cooling_cycle;
        sim.cooling_factor = sim.final_temperature;

        let mut at_floor = Vec::new();
        while !sim.step().unwrap().is_finished() {
            assert_eq!(sim.cooling_factor(), sim.final_temperature);
            at_floor.push(sim.total_displacement);
        }
        assert_eq!(sim.state(), EngineState::Converged);
        assert!(at_floor.len() > 100, "only {} steps", at_floor.len());
        for w in at_floor.windows(2) {
            // Same tolerance the oscillation check uses.
            assert!(w[1] <= w[0] + 2.0, "displacement grew from {} to {}", w[0], w[1]);
        }
    }

    #[test]
    fn isolated_pair_relaxes_to_a_finite_state() {
        let (mut gm, ids) = flat(&[(0.0, 0.0), (0.0, 0.0)], 10.0);
        let s = CoseSettings::default();
        let stats = ForceSimulation::new(&mut gm, &s, config(50.0)).run().unwrap();
        assert!(stats.state.is_finished());
        assert!(gm.nodes.iter().all(|n| n.rect.left.is_finite() && n.rect.top.is_finite()));
        // Coincident nodes are pushed apart.
        assert!(distance(&gm, ids[0], ids[1]) > 10.0);
    }

    #[test]
    fn spring_pulls_a_pair_towards_its_ideal_length() {
        let (mut gm, ids) = flat(&[(0.0, 0.0), (300.0, 0.0)], 1.0);
        gm.add_edge(ids[0], ids[1]);
        let s = CoseSettings {
            uniform_leaf_node_size: true,
            use_smart_repulsion_range: false,
            repulsion_strength: 0.0,
            ..Default::default()
        };
        let stats = ForceSimulation::new(&mut gm, &s, config(40.0)).run().unwrap();
        assert_eq!(stats.state, EngineState::Converged);
        assert!((distance(&gm, ids[0], ids[1]) - 40.0).abs() < 2.0);
    }

    #[test]
    fn compound_displacement_is_inherited_by_its_children() {
        let mut gm = GraphManager::new();
        let root = gm.add_node(0, leaf(0.0, 0.0, 0.0));
        let g = gm.add_graph(root);
        let c = gm.add_node(g, leaf(0.0, 0.0, 0.0));
        let far = gm.add_node(g, leaf(400.0, 0.0, 10.0));
        let gc = gm.add_graph(c);
        let x = gm.add_node(gc, leaf(-10.0, 0.0, 10.0));
        let y = gm.add_node(gc, leaf(10.0, 0.0, 10.0));
        gm.add_edge(c, far);
        gm.add_edge(x, y);

        let s = CoseSettings::default();
        let mut sim = ForceSimulation::new(&mut gm, &s, config(50.0));
        sim.initialize().unwrap();
        let before = sim.gm.nodes[y].center();
        sim.step().unwrap();
        let after = sim.gm.nodes[y].center();

        let own = sim.gm.nodes[y].displacement_x;
        let inherited = sim.gm.nodes[c].displacement_x;
        // The stretched edge drags `c` to the right.
        assert!(inherited > 0.0);
        assert!((after.0 - before.0 - (own + inherited)).abs() < 1e-9);
    }

    #[test]
    fn nan_forces_do_not_poison_positions() {
        let (mut gm, _) = flat(&[(0.0, 0.0), (30.0, 0.0)], 10.0);
        let s = CoseSettings {
            repulsion_strength: f64::INFINITY,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&mut gm, &s, config(50.0));
        sim.initialize().unwrap();
        for _ in 0..5 {
            sim.step().unwrap();
        }
        assert!(gm.nodes.iter().all(|n| n.rect.left.is_finite() && n.rect.top.is_finite()));
    }

    #[test]
    fn step_after_finishing_is_a_no_op() {
        let (mut gm, _) = flat(&[(0.0, 0.0)], 10.0);
        let s = CoseSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let mut sim = ForceSimulation::new(&mut gm, &s, config(50.0));
        let mut state = sim.step().unwrap();
        while !state.is_finished() {
            state = sim.step().unwrap();
        }
        let iterations = sim.iterations();
        assert_eq!(sim.step().unwrap(), state);
        assert_eq!(sim.iterations(), iterations);
    }
}
