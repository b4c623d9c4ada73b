//! Point placement and minimum-spanning-tree helpers for the orb layout.
//!
//! - [`place_non_overlapping`] — random placement with a minimum separation.
//! - [`minimum_spanning_tree`] — Prim's algorithm over Euclidean distances.
//! - [`link_gaps`] / [`linked_edges`] — split the tree at the link distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec2;
use rand::Rng;
use tracing::warn;

use crate::types::NodeId;

/// Candidates tried per point before [`place_non_overlapping`] settles for
/// the best one seen.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

/// One edge of a spanning tree, in the order it was discovered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MstEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub distance: f64,
}

#[inline]
pub fn distance(a: DVec2, b: DVec2) -> f64 {
    a.distance(b)
}

/// Uniform sample in `[lo, hi)`; an empty range collapses to its midpoint.
pub(crate) fn sample_between(rng: &mut impl Rng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        0.5 * (lo + hi)
    }
}

fn sample_point(rng: &mut impl Rng, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> DVec2 {
    DVec2::new(
        sample_between(rng, x_min, x_max),
        sample_between(rng, y_min, y_max),
    )
}

/// Distance from `p` to the closest point in `points`, or infinity.
fn clearance(points: &[DVec2], p: DVec2) -> f64 {
    points
        .iter()
        .map(|&q| distance(p, q))
        .fold(f64::INFINITY, f64::min)
}

/// Places `count` points uniformly inside the given bounds so that no two
/// are closer than `2 * radius`.
///
/// Each point is sampled repeatedly until it clears every point accepted
/// before it. After [`MAX_PLACEMENT_ATTEMPTS`] failed candidates the one with
/// the largest clearance is kept instead, so infeasible requests (radius too
/// large for the area) still terminate, with overlapping points.
///
/// ### Parameters
/// - `rng` - Random source.
/// - `x_min`, `x_max`, `y_min`, `y_max` - Bounds for the point centres.
///   An empty range pins that coordinate to its midpoint.
/// - `radius` - Radius of the bodies being placed.
/// - `count` - Number of points to return.
///
/// ### Returns
/// Exactly `count` points, in placement order.
pub fn place_non_overlapping(
    rng: &mut impl Rng,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    radius: f64,
    count: usize,
) -> Vec<DVec2> {
    let min_separation = 2.0 * radius;
    let mut points: Vec<DVec2> = Vec::with_capacity(count);

    for _ in 0..count {
        let mut best = sample_point(rng, x_min, x_max, y_min, y_max);
        let mut best_clearance = clearance(&points, best);
        let mut attempts = 1;

        while best_clearance < min_separation && attempts < MAX_PLACEMENT_ATTEMPTS {
            let candidate = sample_point(rng, x_min, x_max, y_min, y_max);
            let c = clearance(&points, candidate);
            if c > best_clearance {
                best = candidate;
                best_clearance = c;
            }
            attempts += 1;
        }

        if best_clearance < min_separation {
            warn!(
                placed = points.len(),
                clearance = best_clearance,
                required = min_separation,
                "no non-overlapping position found, accepting closest fit"
            );
        }
        points.push(best);
    }

    points
}

/// Strict variant of [`place_non_overlapping`]: gives up with `None` as soon
/// as one point fails to find a clear spot within `max_attempts` candidates.
#[allow(clippy::too_many_arguments)]
pub fn try_place_non_overlapping(
    rng: &mut impl Rng,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    radius: f64,
    count: usize,
    max_attempts: usize,
) -> Option<Vec<DVec2>> {
    let min_separation = 2.0 * radius;
    let mut points: Vec<DVec2> = Vec::with_capacity(count);

    for _ in 0..count {
        let p = (0..max_attempts)
            .map(|_| sample_point(rng, x_min, x_max, y_min, y_max))
            .find(|&p| clearance(&points, p) >= min_separation)?;
        points.push(p);
    }

    Some(points)
}

/// Heap entry ordered so that [`BinaryHeap`] pops the shortest edge first.
struct Candidate {
    distance: f64,
    source: NodeId,
    target: NodeId,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

fn push_candidates(
    points: &[DVec2],
    from: NodeId,
    visited: &[bool],
    heap: &mut BinaryHeap<Candidate>,
) {
    let origin = points[from];
    for (id, &p) in points.iter().enumerate() {
        if visited[id] {
            continue;
        }
        heap.push(Candidate {
            distance: distance(origin, p),
            source: from,
            target: id,
        });
    }
}

/// Computes a minimum spanning tree over `points` with Prim's algorithm,
/// starting from point `0`.
///
/// Edges are returned in the order they were added to the tree, not sorted
/// by length. All working storage is local to the call.
///
/// ### Returns
/// `points.len() - 1` edges (none for fewer than two points).
pub fn minimum_spanning_tree(points: &[DVec2]) -> Vec<MstEdge> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let mut visited = vec![false; n];
    let mut heap = BinaryHeap::with_capacity(n * n);
    let mut edges = Vec::with_capacity(n - 1);

    visited[0] = true;
    push_candidates(points, 0, &visited, &mut heap);

    while let Some(c) = heap.pop() {
        if visited[c.target] {
            continue;
        }
        visited[c.target] = true;
        edges.push(MstEdge {
            source: c.source,
            target: c.target,
            distance: c.distance,
        });
        if edges.len() == n - 1 {
            break;
        }
        push_candidates(points, c.target, &visited, &mut heap);
    }

    edges
}

/// Spanning-tree edges at least `link_distance` long: pairs that are too far
/// apart to be linked.
pub fn link_gaps(points: &[DVec2], link_distance: f64) -> Vec<MstEdge> {
    minimum_spanning_tree(points)
        .into_iter()
        .filter(|e| e.distance >= link_distance)
        .collect()
}

/// Spanning-tree edges shorter than `link_distance`: the drawn links.
pub fn linked_edges(points: &[DVec2], link_distance: f64) -> Vec<MstEdge> {
    minimum_spanning_tree(points)
        .into_iter()
        .filter(|e| e.distance < link_distance)
        .collect()
}
