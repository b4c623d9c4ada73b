//! The orb/gas force simulation.
//!
//! A [`Simulation`] is built for one `(SimulationParams, Dims)` pair and is
//! replaced wholesale when either changes. Continuity across a replacement is
//! carried by [`Simulation::normalized_orb_positions`].

use std::f64::consts::TAU;

use glam::DVec2;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::SimulationParams;
use crate::forces::{BounceForce, Force, Forces, LinkForce, SurfaceForce};
use crate::geometry::{
    MstEdge, link_gaps, linked_edges, minimum_spanning_tree, place_non_overlapping,
    sample_between, try_place_non_overlapping,
};
use crate::types::{Dims, NUM_ORBS, Node, NormalizedOrbs};

/// Keeps an accepted layout slightly inside the visual link range.
pub const MIN_LINK_DISTANCE_PER_RANGE: f64 = 0.985;

/// Random orb layouts tried before settling for the most compact one.
pub const MAX_LAYOUT_ATTEMPTS: usize = 1_000;

/// Candidates per orb before a layout attempt is abandoned as stuck.
pub const MAX_PACKING_ATTEMPTS: usize = 1_000;

pub const LINK_STRENGTH: f64 = 0.1;
pub const LINK_ITERATIONS: usize = 1;

/// Orb radius for a surface: the smaller side divided by `orb_radii_in_dim`.
pub fn orb_radius(params: &SimulationParams, dims: Dims) -> f64 {
    dims.min_side() / params.orb_radii_in_dim
}

/// Separation at which two orbs stop being linked.
pub fn link_distance(params: &SimulationParams, orb_radius: f64) -> f64 {
    (params.max_range_per_radius * params.max_link_thickness_per_radius + 2.0)
        * orb_radius
        * MIN_LINK_DISTANCE_PER_RANGE
}

/// Gas particle radius: half the square root of the orb radius, at least 1px.
pub fn gas_radius(orb_radius: f64) -> f64 {
    (orb_radius.sqrt() / 2.0).max(1.0)
}

/// Number of gas particles for a surface, rounded down.
pub fn gas_count(params: &SimulationParams, dims: Dims) -> usize {
    (params.gas_density * dims.area()).floor() as usize
}

/// Normal sample via the Box–Muller transform.
pub fn gaussian(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    // Shift [0, 1) to (0, 1] so the logarithm stays finite.
    let u = 1.0 - rng.random::<f64>();
    let v = rng.random::<f64>();
    let z = (-2.0 * u.ln()).sqrt() * (TAU * v).cos();
    z * std_dev + mean
}

/// Velocity scale restoring `before` after a step left `after`.
///
/// Returns `1.0` whenever the ratio is undefined, so a zero or non-finite
/// post-step energy never leaks into the velocities.
pub fn energy_scale(before: f64, after: f64) -> f64 {
    if after <= 0.0 || !after.is_finite() {
        return 1.0;
    }
    let scale = (before / after).sqrt();
    if scale.is_finite() { scale } else { 1.0 }
}

fn longest_edge(points: &[DVec2]) -> f64 {
    minimum_spanning_tree(points)
        .iter()
        .map(|e| e.distance)
        .fold(0.0, f64::max)
}

/// Random orb layout whose spanning tree has no gaps, so the first frame
/// shows one connected shape.
///
/// Layouts that get stuck while packing are thrown away and retried. If no
/// connected layout turns up the most compact one is used.
fn seed_orbs(rng: &mut impl Rng, dims: Dims, radius: f64, link_distance: f64) -> Vec<DVec2> {
    let (w, h) = (dims.width as f64, dims.height as f64);
    let mut best: Option<(Vec<DVec2>, f64)> = None;

    for attempt in 0..MAX_LAYOUT_ATTEMPTS {
        let Some(layout) = try_place_non_overlapping(
            rng,
            radius,
            w - radius,
            radius,
            h - radius,
            radius,
            NUM_ORBS,
            MAX_PACKING_ATTEMPTS,
        ) else {
            continue;
        };

        if link_gaps(&layout, link_distance).is_empty() {
            debug!(attempt, "accepted connected orb layout");
            return layout;
        }

        let span = longest_edge(&layout);
        if best.as_ref().is_none_or(|(_, s)| span < *s) {
            best = Some((layout, span));
        }
    }

    match best {
        Some((layout, span)) => {
            warn!(
                longest = span,
                link_distance, "no fully linked orb layout found, using the most compact one"
            );
            layout
        }
        None => {
            warn!(radius, "orbs do not fit the surface, placing them with overlap");
            place_non_overlapping(rng, radius, w - radius, radius, h - radius, radius, NUM_ORBS)
        }
    }
}

/// Owns the node collection and the forces acting on it.
#[derive(Debug, Clone)]
pub struct Simulation {
    nodes: Vec<Node>,
    forces: Forces,
    dims: Dims,
    orb_radius: f64,
    gas_radius: f64,
    link_distance: f64,
    alpha: f64,
}

impl Simulation {
    /// Seeds a fresh simulation.
    ///
    /// Orbs take `previous` (normalized by the old orb radius) when given,
    /// scaled to the new radius; otherwise they are placed at random until
    /// the layout is fully linked. Gas is always reseeded: uniform positions
    /// and Gaussian velocities with `params.temperature` as the standard
    /// deviation.
    pub fn new(
        params: &SimulationParams,
        dims: Dims,
        previous: Option<&NormalizedOrbs>,
        rng: &mut impl Rng,
    ) -> Self {
        let orb_radius = orb_radius(params, dims);
        let gas_radius = gas_radius(orb_radius);
        let link_distance = link_distance(params, orb_radius);

        let orb_positions: Vec<DVec2> = match previous {
            Some(normalized) => normalized.iter().map(|&p| p * orb_radius).collect(),
            None => seed_orbs(rng, dims, orb_radius, link_distance),
        };

        let gas = gas_count(params, dims);
        let mut nodes = Vec::with_capacity(NUM_ORBS + gas);
        nodes.extend(orb_positions.into_iter().map(|p| Node::orb(p, orb_radius)));

        let (w, h) = (dims.width as f64, dims.height as f64);
        for _ in 0..gas {
            let pos = DVec2::new(
                sample_between(rng, gas_radius, w - gas_radius),
                sample_between(rng, gas_radius, h - gas_radius),
            );
            let vel = DVec2::new(
                gaussian(rng, 0.0, params.temperature),
                gaussian(rng, 0.0, params.temperature),
            );
            nodes.push(Node::gas(pos, vel, gas_radius));
        }

        debug!(
            width = dims.width,
            height = dims.height,
            orb_radius,
            link_distance,
            gas,
            continued = previous.is_some(),
            "seeded simulation"
        );

        Self {
            nodes,
            forces: Forces {
                link: LinkForce::new(link_distance, LINK_STRENGTH, LINK_ITERATIONS),
                bounce: BounceForce::default(),
                surface: SurfaceForce::rectangle(dims),
            },
            dims,
            orb_radius,
            gas_radius,
            link_distance,
            alpha: 1.0,
        }
    }

    /// Every node, the [`NUM_ORBS`] orbs first and the gas after them.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Surface the simulation was seeded for.
    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Current orb centres, in pixels.
    pub fn orb_positions(&self) -> [DVec2; NUM_ORBS] {
        std::array::from_fn(|i| self.nodes[i].pos)
    }

    /// Orb positions divided by their radius, for seeding a replacement.
    pub fn normalized_orb_positions(&self) -> NormalizedOrbs {
        std::array::from_fn(|i| self.nodes[i].pos / self.nodes[i].radius)
    }

    /// Replaces the edges the link force pulls along.
    pub fn set_links(&mut self, links: &[MstEdge]) {
        self.forces.link.set_links(links);
    }

    /// Recomputes which orbs are linked, hands those links to the link
    /// force and returns them.
    pub fn refresh_links(&mut self) -> Vec<MstEdge> {
        let links = linked_edges(&self.orb_positions(), self.link_distance);
        self.set_links(&links);
        links
    }

    /// Total energy `Σ r² |v|²`.
    pub fn total_energy(&self) -> f64 {
        self.nodes.iter().map(Node::energy).sum()
    }

    /// Applies every force and integrates positions, `iterations` times.
    pub fn tick(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.forces.apply(&mut self.nodes, self.alpha);
            for node in &mut self.nodes {
                node.pos += node.vel;
            }
        }
    }

    /// [`Simulation::tick`] followed by a uniform velocity rescale that
    /// restores the pre-step total energy.
    ///
    /// The link force and collisions are not energy conserving on their own,
    /// so without the rescale the gas would slowly heat up or freeze.
    ///
    /// ### Parameters
    /// - `iterations` - Number of force and integration rounds before the
    ///   rescale.
    ///
    /// ### Returns
    /// The factor every velocity was multiplied by; `1.0` when the energy
    /// ratio is undefined (for instance everything at rest).
    pub fn tick_with_energy_conservation(&mut self, iterations: usize) -> f64 {
        let before = self.total_energy();
        self.tick(iterations);
        let after = self.total_energy();

        let scale = energy_scale(before, after);
        if scale != 1.0 {
            for node in &mut self.nodes {
                node.vel *= scale;
            }
        }
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationParams;
    use crate::types::NodeKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scenario_params() -> SimulationParams {
        SimulationParams {
            orb_radii_in_dim: 6.0,
            gas_density: 0.0,
            temperature: 0.0,
            max_link_thickness_per_radius: 0.5,
            max_range_per_radius: 1.5,
            ..SimulationParams::default()
        }
    }

    fn dims(width: u32, height: u32) -> Dims {
        Dims { width, height }
    }

    #[test]
    fn seeds_five_orbs_then_gas() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = SimulationParams {
            gas_density: 0.001,
            ..SimulationParams::default()
        };
        let sim = Simulation::new(&params, dims(250, 130), None, &mut rng);

        // floor(0.001 * 250 * 130) = floor(32.5)
        assert_eq!(sim.nodes().len(), NUM_ORBS + 32);
        for (i, n) in sim.nodes().iter().enumerate() {
            let expected = if i < NUM_ORBS {
                NodeKind::Orb
            } else {
                NodeKind::Gas
            };
            assert_eq!(n.kind, expected);
        }
        assert!(
            sim.nodes()[NUM_ORBS..]
                .iter()
                .all(|n| n.radius == sim.gas_radius)
        );
    }

    #[test]
    fn square_scenario_gives_connected_layout() {
        let mut rng = StdRng::seed_from_u64(42);
        let sim = Simulation::new(&scenario_params(), dims(600, 600), None, &mut rng);

        assert_eq!(sim.nodes().len(), NUM_ORBS);
        assert!(sim.nodes().iter().all(|n| n.kind == NodeKind::Orb));
        assert_eq!(sim.orb_radius, 100.0);
        assert!((sim.link_distance - 2.75 * 100.0 * 0.985).abs() < 1e-9);

        let edges = minimum_spanning_tree(&sim.orb_positions());
        assert_eq!(edges.len(), 4);
        for e in edges {
            assert!(e.distance < sim.link_distance, "{e:?}");
        }
    }

    #[test]
    fn orbs_start_inside_and_apart() {
        let mut rng = StdRng::seed_from_u64(5);
        let sim = Simulation::new(&scenario_params(), dims(900, 600), None, &mut rng);
        let r = sim.orb_radius;
        let p = sim.orb_positions();

        for (i, a) in p.iter().enumerate() {
            assert!(a.x >= r && a.x <= 900.0 - r);
            assert!(a.y >= r && a.y <= 600.0 - r);
            for b in &p[..i] {
                assert!(a.distance(*b) >= 2.0 * r);
            }
        }
    }

    #[test]
    fn gas_radius_never_drops_below_one() {
        assert_eq!(gas_radius(1.0), 1.0);
        assert_eq!(gas_radius(100.0), 5.0);
    }

    #[test]
    fn gas_velocities_follow_temperature() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = SimulationParams {
            gas_density: 0.01,
            temperature: 4.0,
            ..SimulationParams::default()
        };
        let sim = Simulation::new(&params, dims(1000, 1000), None, &mut rng);
        let gas = &sim.nodes()[NUM_ORBS..];
        assert_eq!(gas.len(), 10_000);

        let samples: Vec<f64> = gas.iter().flat_map(|n| [n.vel.x, n.vel.y]).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;

        assert!(mean.abs() < 0.2, "mean = {mean}");
        assert!((var.sqrt() - 4.0).abs() < 0.2, "std = {}", var.sqrt());
    }

    #[test]
    fn energy_is_preserved_across_ticks() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = SimulationParams {
            gas_density: 0.002,
            temperature: 3.0,
            ..SimulationParams::default()
        };
        let mut sim = Simulation::new(&params, dims(320, 240), None, &mut rng);
        let e0 = sim.total_energy();
        assert!(e0 > 0.0);

        for _ in 0..200 {
            sim.refresh_links();
            sim.tick_with_energy_conservation(1);
            let e = sim.total_energy();
            assert!((e - e0).abs() <= 1e-9 * e0, "{e} vs {e0}");
        }
    }

    #[test]
    fn zero_energy_never_produces_non_finite_velocities() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut sim = Simulation::new(&scenario_params(), dims(600, 600), None, &mut rng);
        assert_eq!(sim.total_energy(), 0.0);

        // No links and nothing moving: the step leaves zero energy behind.
        let scale = sim.tick_with_energy_conservation(1);
        assert_eq!(scale, 1.0);

        // With links the step injects energy that gets scaled away again.
        sim.refresh_links();
        sim.tick_with_energy_conservation(1);
        assert!(
            sim.nodes()
                .iter()
                .all(|n| n.vel.is_finite() && n.pos.is_finite())
        );
        assert_eq!(sim.total_energy(), 0.0);
    }

    #[test]
    fn energy_scale_guards_degenerate_ratios() {
        assert_eq!(energy_scale(0.0, 0.0), 1.0);
        assert_eq!(energy_scale(5.0, 0.0), 1.0);
        assert_eq!(energy_scale(5.0, f64::NAN), 1.0);
        assert_eq!(energy_scale(4.0, 1.0), 2.0);
        assert_eq!(energy_scale(0.0, 2.0), 0.0);
    }

    #[test]
    fn normalized_positions_survive_a_resize() {
        let mut rng = StdRng::seed_from_u64(21);
        let params = SimulationParams::default();
        let first = Simulation::new(&params, dims(800, 500), None, &mut rng);
        let normalized = first.normalized_orb_positions();

        let second = Simulation::new(&params, dims(400, 1200), Some(&normalized), &mut rng);

        assert!((second.orb_radius - 400.0 / params.orb_radii_in_dim).abs() < 1e-12);
        for (a, b) in normalized.iter().zip(second.normalized_orb_positions()) {
            assert!((*a - b).length() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn surface_keeps_bodies_on_screen() {
        let mut rng = StdRng::seed_from_u64(13);
        let params = SimulationParams {
            gas_density: 0.002,
            temperature: 20.0,
            ..SimulationParams::default()
        };
        let mut sim = Simulation::new(&params, dims(200, 200), None, &mut rng);

        for _ in 0..300 {
            sim.refresh_links();
            sim.tick_with_energy_conservation(1);
        }

        for n in sim.nodes() {
            assert!((0.0..=200.0).contains(&n.pos.x), "{n:?}");
            assert!((0.0..=200.0).contains(&n.pos.y), "{n:?}");
        }
    }

    #[test]
    fn refresh_links_keeps_only_short_edges() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sim = Simulation::new(&scenario_params(), dims(600, 600), None, &mut rng);
        let links = sim.refresh_links();
        assert_eq!(links.len(), NUM_ORBS - 1);

        // Orbs carried over from a layout spread far beyond the link distance.
        let spread: NormalizedOrbs = std::array::from_fn(|i| DVec2::new(i as f64 * 100.0, 1.0));
        let mut sim = Simulation::new(&scenario_params(), dims(600, 600), Some(&spread), &mut rng);
        assert!(sim.refresh_links().is_empty());
    }
}
