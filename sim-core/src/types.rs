use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Identifier for a node in a [`crate::simulation::Simulation`].
///
/// This is an index into `Simulation::nodes`, and is only meaningful within
/// the lifetime of a given `Simulation` instance.
pub type NodeId = usize;

/// Number of orb bodies. Orbs always occupy the first `NUM_ORBS` node slots.
pub const NUM_ORBS: usize = 5;

/// Orb positions divided by the orb radius, in node order.
pub type NormalizedOrbs = [DVec2; NUM_ORBS];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Orb,
    Gas,
}

/// A single simulation body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: DVec2,
    pub vel: DVec2,
    pub radius: f64,
}

impl Node {
    /// An orb at rest.
    pub fn orb(pos: DVec2, radius: f64) -> Self {
        Self {
            kind: NodeKind::Orb,
            pos,
            vel: DVec2::ZERO,
            radius,
        }
    }

    pub fn gas(pos: DVec2, vel: DVec2, radius: f64) -> Self {
        Self {
            kind: NodeKind::Gas,
            pos,
            vel,
            radius,
        }
    }

    /// Contribution of this node to the total energy, `r² |v|²`.
    #[inline]
    pub fn energy(&self) -> f64 {
        self.radius * self.radius * self.vel.length_squared()
    }
}

/// Pixel extents of a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    /// Returns `None` when either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn min_side(&self) -> f64 {
        self.width.min(self.height) as f64
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_reject_zero_extents() {
        assert!(Dims::new(0, 400).is_none());
        assert!(Dims::new(400, 0).is_none());
        assert_eq!(
            Dims::new(3, 2),
            Some(Dims {
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn node_energy_is_radius_squared_times_speed_squared() {
        let n = Node::gas(DVec2::ZERO, DVec2::new(3.0, 4.0), 2.0);
        assert_eq!(n.energy(), 100.0);
    }
}
