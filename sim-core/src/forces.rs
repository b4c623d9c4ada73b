//! Velocity-level forces acting on the node collection.
//!
//! Each force nudges `Node::vel` in place; the simulation integrates
//! positions afterwards. Forces run in the order link, bounce, surface.

use glam::DVec2;

use crate::geometry::MstEdge;
use crate::types::{Dims, Node};

/// Offset used when two bodies coincide and no direction can be derived.
const JIGGLE: DVec2 = DVec2::new(1e-6, 0.0);

/// A velocity contribution applied once per tick.
pub trait Force {
    fn apply(&mut self, nodes: &mut [Node], alpha: f64);
}

/// Soft spring pulling linked orbs toward a fixed separation.
/// Spring-like pull along each link towards `distance`, with the
/// correction shared between the endpoints by their link counts.
#[derive(Debug, Clone)]
pub struct LinkForce {
    links: Vec<(usize, usize)>,
    bias: Vec<f64>,
    distance: f64,
    strength: f64,
    iterations: usize,
}

impl LinkForce {
    pub fn new(distance: f64, strength: f64, iterations: usize) -> Self {
        Self {
            links: Vec::new(),
            bias: Vec::new(),
            distance,
            strength,
            iterations,
        }
    }

    /// Replaces the active links. Each link's correction is split between
    /// its endpoints in proportion to how many links the source carries.
    pub fn set_links(&mut self, edges: &[MstEdge]) {
        self.links = edges.iter().map(|e| (e.source, e.target)).collect();

        let len = self
            .links
            .iter()
            .map(|&(s, t)| s.max(t) + 1)
            .max()
            .unwrap_or(0);
        let mut degree = vec![0usize; len];
        for &(s, t) in &self.links {
            degree[s] += 1;
            degree[t] += 1;
        }

        self.bias = self
            .links
            .iter()
            .map(|&(s, t)| degree[s] as f64 / (degree[s] + degree[t]) as f64)
            .collect();
    }
}

impl Force for LinkForce {
    fn apply(&mut self, nodes: &mut [Node], alpha: f64) {
        for _ in 0..self.iterations {
            for (&(s, t), &bias) in self.links.iter().zip(&self.bias) {
                if s >= nodes.len() || t >= nodes.len() || s == t {
                    continue;
                }

                let mut delta = nodes[t].pos + nodes[t].vel - nodes[s].pos - nodes[s].vel;
                if delta == DVec2::ZERO {
                    delta = JIGGLE;
                }
                let l = delta.length();
                let delta = delta * ((l - self.distance) / l * alpha * self.strength);

                nodes[t].vel -= delta * bias;
                nodes[s].vel += delta * (1.0 - bias);
            }
        }
    }
}

/// Elastic collisions between overlapping bodies, with mass `r²`.
#[derive(Debug, Clone)]
pub struct BounceForce {
    pub elasticity: f64,
}

impl Default for BounceForce {
    fn default() -> Self {
        Self { elasticity: 1.0 }
    }
}

impl BounceForce {
    fn collide(&self, a: &mut Node, b: &mut Node) {
        let reach = a.radius + b.radius;
        let delta = (b.pos + b.vel) - (a.pos + a.vel);
        let d2 = delta.length_squared();
        if d2 >= reach * reach {
            return;
        }

        let d = d2.sqrt();
        let normal = if d > 0.0 { delta / d } else { DVec2::X };

        // Already separating along the contact normal.
        let closing = (b.vel - a.vel).dot(normal);
        if closing >= 0.0 {
            return;
        }

        let ma = a.radius * a.radius;
        let mb = b.radius * b.radius;
        let impulse = (1.0 + self.elasticity) * closing / (ma + mb);

        a.vel += normal * (impulse * mb);
        b.vel -= normal * (impulse * ma);
    }
}

impl Force for BounceForce {
    fn apply(&mut self, nodes: &mut [Node], _alpha: f64) {
        for j in 1..nodes.len() {
            let (head, tail) = nodes.split_at_mut(j);
            let b = &mut tail[0];
            for a in head.iter_mut() {
                self.collide(a, b);
            }
        }
    }
}

/// A wall segment. Bodies are kept on its inner side, which lies to the
/// right of the `from -> to` direction in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub from: DVec2,
    pub to: DVec2,
}

/// One-way walls: bodies heading outward are reflected, bodies heading
/// inward pass untouched.
#[derive(Debug, Clone)]
pub struct SurfaceForce {
    surfaces: Vec<Surface>,
    pub elasticity: f64,
}

impl SurfaceForce {
    pub fn new(surfaces: Vec<Surface>) -> Self {
        Self {
            surfaces,
            elasticity: 1.0,
        }
    }

    /// The four edges of a `dims`-sized rectangle, wound so that the inside
    /// of the rectangle is the inner side of each wall.
    pub fn rectangle(dims: Dims) -> Self {
        let w = dims.width as f64;
        let h = dims.height as f64;
        Self::new(vec![
            Surface {
                from: DVec2::new(w, 0.0),
                to: DVec2::new(0.0, 0.0),
            },
            Surface {
                from: DVec2::new(w, h),
                to: DVec2::new(w, 0.0),
            },
            Surface {
                from: DVec2::new(0.0, h),
                to: DVec2::new(w, h),
            },
            Surface {
                from: DVec2::new(0.0, 0.0),
                to: DVec2::new(0.0, h),
            },
        ])
    }
}

impl Force for SurfaceForce {
    /// Walls act along their whole line, not just between `from` and `to`,
    /// so a body leaving through a corner meets both walls it crosses.
    fn apply(&mut self, nodes: &mut [Node], _alpha: f64) {
        for s in &self.surfaces {
            let span = s.to - s.from;
            let len = span.length();
            if len == 0.0 {
                continue;
            }
            let tangent = span / len;
            let inward = DVec2::new(tangent.y, -tangent.x);

            for node in nodes.iter_mut() {
                let heading = node.vel.dot(inward);
                let next = node.pos + node.vel - s.from;
                if heading < 0.0 && next.dot(inward) < node.radius {
                    node.vel -= inward * ((1.0 + self.elasticity) * heading);
                }
            }
        }
    }
}

/// The full force stack of a simulation.
#[derive(Debug, Clone)]
pub struct Forces {
    pub link: LinkForce,
    pub bounce: BounceForce,
    pub surface: SurfaceForce,
}

impl Force for Forces {
    fn apply(&mut self, nodes: &mut [Node], alpha: f64) {
        self.link.apply(nodes, alpha);
        self.bounce.apply(nodes, alpha);
        self.surface.apply(nodes, alpha);
    }
}
