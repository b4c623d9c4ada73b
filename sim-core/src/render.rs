//! Software rendering of a simulation snapshot into an RGBA frame.
//!
//! The drawing is deliberately small: a solid clear, filled circles for the
//! orbs and filled outlines (quadratic curves flattened to polygons) for the
//! organic connectors between linked orbs. Gas particles are not drawn.

use glam::DVec2;

use crate::config::{Rgba, SimulationParams};
use crate::geometry::MstEdge;
use crate::simulation::orb_radius;
use crate::types::{Dims, NUM_ORBS, Node, NodeKind};

/// Line segments used to approximate one quadratic curve.
const QUAD_SEGMENTS: usize = 16;

/// An owned RGBA8 image, row-major, top-left origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    dims: Dims,
    pixels: Vec<u8>,
}

impl Frame {
    /// A frame of `dims` with every pixel set to `color`.
    pub fn filled(dims: Dims, color: Rgba) -> Self {
        Self {
            dims,
            pixels: color.to_array().repeat(dims.pixel_count()),
        }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Row-major RGBA bytes, unpremultiplied.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Overwrites pixels `x0..x1` of row `y`, clipped to the frame.
    fn fill_span(&mut self, y: i64, x0: i64, x1: i64, color: [u8; 4]) {
        let (w, h) = (self.dims.width as i64, self.dims.height as i64);
        if y < 0 || y >= h {
            return;
        }
        let (x0, x1) = (x0.max(0), x1.min(w));
        if x0 >= x1 {
            return;
        }
        let row = (y * w) as usize;
        for px in self.pixels[4 * (row + x0 as usize)..4 * (row + x1 as usize)].chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }
}

/// A closed outline built from lines and quadratic curves.
#[derive(Clone, Debug, Default)]
pub struct Path {
    contours: Vec<Vec<DVec2>>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new subpath at `p`, closing the current one.
    pub fn move_to(&mut self, p: DVec2) -> &mut Self {
        self.contours.push(vec![p]);
        self
    }

    fn current(&mut self) -> &mut Vec<DVec2> {
        if self.contours.is_empty() {
            self.contours.push(vec![DVec2::ZERO]);
        }
        let last = self.contours.len() - 1;
        &mut self.contours[last]
    }

    pub fn line_to(&mut self, p: DVec2) -> &mut Self {
        self.current().push(p);
        self
    }

    /// Quadratic Bézier to `end`, flattened into line segments.
    pub fn quad_to(&mut self, ctrl: DVec2, end: DVec2) -> &mut Self {
        let contour = self.current();
        let start = contour[contour.len() - 1];
        for i in 1..=QUAD_SEGMENTS {
            let t = i as f64 / QUAD_SEGMENTS as f64;
            let u = 1.0 - t;
            contour.push(start * (u * u) + ctrl * (2.0 * u * t) + end * (t * t));
        }
        self
    }

    /// Contours are always filled as closed shapes; this only starts a new one.
    pub fn close(&mut self) -> &mut Self {
        if let Some(&first) = self.contours.last().and_then(|c| c.first()) {
            self.contours.push(vec![first]);
        }
        self
    }

    pub fn is_finite(&self) -> bool {
        self.contours.iter().flatten().all(|p| p.is_finite())
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        self.contours
            .iter()
            .filter(|c| c.len() > 2)
            .flat_map(|c| c.iter().copied().zip(c.iter().copied().cycle().skip(1)))
    }
}

/// Draws into an owned [`Frame`].
pub struct Canvas {
    frame: Frame,
}

impl Canvas {
    pub fn new(dims: Dims, background: Rgba) -> Self {
        Self {
            frame: Frame::filled(dims, background),
        }
    }

    /// Fills every pixel whose centre lies inside the circle.
    pub fn fill_circle(&mut self, center: DVec2, radius: f64, color: Rgba) {
        if radius <= 0.0 || !radius.is_finite() || !center.is_finite() {
            return;
        }
        let c = color.to_array();
        let y0 = (center.y - radius - 0.5).ceil() as i64;
        let y1 = (center.y + radius - 0.5).floor() as i64;
        for y in y0..=y1 {
            let dy = y as f64 + 0.5 - center.y;
            let half = (radius * radius - dy * dy).max(0.0).sqrt();
            let x0 = (center.x - half - 0.5).ceil() as i64;
            let x1 = (center.x + half - 0.5).floor() as i64 + 1;
            self.frame.fill_span(y, x0, x1, c);
        }
    }

    /// Fills `path` with the non-zero winding rule, sampling pixel centres.
    pub fn fill_path(&mut self, path: &Path, color: Rgba) {
        if !path.is_finite() {
            return;
        }
        let edges: Vec<(DVec2, DVec2)> = path.edges().filter(|(a, b)| a.y != b.y).collect();
        if edges.is_empty() {
            return;
        }

        let (lo, hi) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
            (lo.min(a.y).min(b.y), hi.max(a.y).max(b.y))
        });
        let c = color.to_array();
        let mut crossings: Vec<(f64, i32)> = Vec::with_capacity(edges.len());

        // Rows outside the frame are never filled, so do not scan them.
        let first = ((lo - 0.5).ceil() as i64).max(0);
        let last = ((hi - 0.5).floor() as i64).min(self.frame.dims.height as i64 - 1);
        for y in first..=last {
            let sy = y as f64 + 0.5;
            crossings.clear();
            for &(a, b) in &edges {
                let (top, bottom, winding) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
                if sy < top.y || sy >= bottom.y {
                    continue;
                }
                let x = top.x + (sy - top.y) * (bottom.x - top.x) / (bottom.y - top.y);
                crossings.push((x, winding));
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding != 0 {
                    let x0 = (pair[0].0 - 0.5).ceil() as i64;
                    let x1 = (pair[1].0 - 0.5).ceil() as i64;
                    self.frame.fill_span(y, x0, x1, c);
                }
            }
        }
    }

    /// Finishes drawing.
    pub fn into_frame(self) -> Frame {
        self.frame
    }
}

/// Half-width of the connector between two orbs `distance` apart.
///
/// Largest when the orbs touch, shrinking to zero at
/// `(2 + max_range_per_radius * max_thickness) * orb_radius`.
///
/// ### Parameters
/// - `distance` - Centre to centre distance of the two orbs.
/// - `orb_radius` - Radius shared by both orbs.
/// - `max_link_thickness_per_radius` - Thickness at contact, in radii.
/// - `max_range_per_radius` - How far past contact the link reaches, in
///   units of the contact thickness.
///
/// ### Returns
/// The thickness in pixels, never negative. Callers skip links whose
/// thickness is not a positive finite number.
pub fn link_thickness(
    distance: f64,
    orb_radius: f64,
    max_link_thickness_per_radius: f64,
    max_range_per_radius: f64,
) -> f64 {
    let reach = (distance / orb_radius - 2.0) / max_range_per_radius;
    orb_radius * (max_link_thickness_per_radius.powi(2) - reach * reach).max(0.0).sqrt()
}

fn shift_by_angle(origin: DVec2, angle: f64, distance: f64) -> DVec2 {
    origin + DVec2::from_angle(angle) * distance
}

/// Outline of the blob-like bridge between two orbs.
///
/// Each side leaves the source orb tangent to the thickness envelope, curves
/// through a point beside the gap's centre and lands on the target orb.
/// Returns `None` when the geometry is undefined (for instance a thickness
/// wider than the orb).
pub fn connector_outline(
    source: DVec2,
    target: DVec2,
    orb_radius: f64,
    thickness: f64,
) -> Option<Path> {
    let distance = source.distance(target);
    let between = (target.y - source.y).atan2(target.x - source.x);
    let chord = (thickness / orb_radius).asin();
    let spread = (thickness / 2.0 / orb_radius).atan();
    let waist = (thickness / distance).atan();
    let back = std::f64::consts::PI;

    let p1 = shift_by_angle(source, between + chord, orb_radius);
    let p2 = shift_by_angle(source, between - chord, orb_radius);
    let p3 = shift_by_angle(target, between + back - chord, orb_radius);
    let p4 = shift_by_angle(target, between + back + chord, orb_radius);

    let h1 = shift_by_angle(source, between + spread, orb_radius);
    let h2 = shift_by_angle(source, between - spread, orb_radius);
    let h3 = shift_by_angle(target, between + back - spread, orb_radius);
    let h4 = shift_by_angle(target, between + back + spread, orb_radius);

    let mid1 = shift_by_angle(source, between + waist, distance / 2.0);
    let mid2 = shift_by_angle(source, between - waist, distance / 2.0);

    let mut path = Path::new();
    path.move_to(p1)
        .quad_to(h1, mid1)
        .quad_to(h3, p3)
        .line_to(p4)
        .quad_to(h4, mid2)
        .quad_to(h2, p2)
        .close();

    path.is_finite().then_some(path)
}

/// Renders orbs and the connectors for `links` over a cleared background.
///
/// ### Parameters
/// - `nodes` - Simulation nodes; only orbs are drawn, gas stays invisible.
/// - `links` - Orb pairs to bridge. Pairs too far apart for a visible
///   connector are skipped.
/// - `params` - Colours and connector shape.
/// - `dims` - Size of the frame to produce.
///
/// ### Returns
/// A freshly allocated RGBA [`Frame`] of `dims`.
pub fn render_frame(
    nodes: &[Node],
    links: &[MstEdge],
    params: &SimulationParams,
    dims: Dims,
) -> Frame {
    let mut canvas = Canvas::new(dims, params.background_color);
    let fill = params.fill_color;
    let radius = orb_radius(params, dims);

    for node in nodes.iter().take(NUM_ORBS) {
        if node.kind == NodeKind::Orb {
            canvas.fill_circle(node.pos, node.radius, fill);
        }
    }

    for link in links {
        let (Some(source), Some(target)) = (nodes.get(link.source), nodes.get(link.target)) else {
            continue;
        };
        let distance = source.pos.distance(target.pos);
        let thickness = link_thickness(
            distance,
            radius,
            params.max_link_thickness_per_radius,
            params.max_range_per_radius,
        );
        if thickness <= 0.0 || !thickness.is_finite() {
            continue;
        }
        if let Some(outline) = connector_outline(source.pos, target.pos, radius, thickness) {
            canvas.fill_path(&outline, fill);
        }
    }

    canvas.into_frame()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::opaque(255, 0, 0);

    fn params() -> SimulationParams {
        SimulationParams {
            // 100 / 5 = radius 20 on a 200x100 surface.
            orb_radii_in_dim: 5.0,
            background_color: Rgba::BLACK,
            fill_color: Rgba::WHITE,
            ..SimulationParams::default()
        }
    }

    fn dims() -> Dims {
        Dims {
            width: 200,
            height: 100,
        }
    }

    fn orbs_at(xs: [f64; NUM_ORBS]) -> Vec<Node> {
        xs.iter()
            .map(|&x| Node::orb(DVec2::new(x, 50.0), 20.0))
            .collect()
    }

    fn pixel(frame: &Frame, x: u32, y: u32) -> Option<Rgba> {
        if x >= frame.dims.width || y >= frame.dims.height {
            return None;
        }
        let i = 4 * (y as usize * frame.dims.width as usize + x as usize);
        let &[r, g, b, a] = &frame.pixels[i..i + 4] else {
            return None;
        };
        Some(Rgba { r, g, b, a })
    }

    fn count(frame: &Frame, color: Rgba) -> usize {
        frame
            .pixels()
            .chunks_exact(4)
            .filter(|p| *p == color.to_array())
            .count()
    }

    #[test]
    fn thickness_peaks_when_orbs_touch() {
        assert!((link_thickness(40.0, 20.0, 0.5, 1.5) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn thickness_vanishes_out_of_range() {
        // (2 + 1.5 * 0.5) * 20 = 55 is where the envelope closes.
        assert_eq!(link_thickness(55.0, 20.0, 0.5, 1.5), 0.0);
        assert_eq!(link_thickness(500.0, 20.0, 0.5, 1.5), 0.0);
    }

    #[test]
    fn thickness_is_positive_for_fully_overlapping_orbs() {
        let t = link_thickness(0.0, 20.0, 0.5, 5.0);
        assert!(t.is_finite() && t > 0.0);
        assert!((t - 6.0).abs() < 1e-9);

        let outline = connector_outline(DVec2::new(50.0, 50.0), DVec2::new(50.0, 50.0), 20.0, t);
        assert!(outline.is_some());
    }

    #[test]
    fn connector_wider_than_orb_is_rejected() {
        assert!(connector_outline(DVec2::ZERO, DVec2::new(30.0, 0.0), 10.0, 15.0).is_none());
    }

    #[test]
    fn circle_covers_expected_area() {
        let mut canvas = Canvas::new(dims(), Rgba::BLACK);
        canvas.fill_circle(DVec2::new(100.0, 50.0), 20.0, RED);
        let frame = canvas.into_frame();

        let area = std::f64::consts::PI * 400.0;
        let filled = count(&frame, RED) as f64;
        assert!((filled - area).abs() < 0.05 * area, "{filled} vs {area}");
        assert_eq!(pixel(&frame, 100, 50), Some(RED));
        assert_eq!(pixel(&frame, 100, 75), Some(Rgba::BLACK));
    }

    #[test]
    fn clipped_circle_stays_in_bounds() {
        let mut canvas = Canvas::new(dims(), Rgba::BLACK);
        canvas.fill_circle(DVec2::new(-5.0, -5.0), 30.0, RED);
        canvas.fill_circle(DVec2::new(195.0, 98.0), 30.0, RED);
        let frame = canvas.into_frame();
        assert_eq!(pixel(&frame, 0, 0), Some(RED));
        assert_eq!(pixel(&frame, 199, 99), Some(RED));
        assert_eq!(pixel(&frame, 100, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn path_fill_covers_a_square() {
        let mut path = Path::new();
        path.move_to(DVec2::new(10.0, 10.0))
            .line_to(DVec2::new(30.0, 10.0))
            .line_to(DVec2::new(30.0, 30.0))
            .line_to(DVec2::new(10.0, 30.0))
            .close();

        let mut canvas = Canvas::new(dims(), Rgba::BLACK);
        canvas.fill_path(&path, RED);
        let frame = canvas.into_frame();

        assert_eq!(count(&frame, RED), 400);
        assert_eq!(pixel(&frame, 10, 10), Some(RED));
        assert_eq!(pixel(&frame, 29, 29), Some(RED));
        assert_eq!(pixel(&frame, 30, 30), Some(Rgba::BLACK));
    }

    #[test]
    fn huge_path_only_scans_visible_rows() {
        let mut path = Path::new();
        path.move_to(DVec2::new(-1e12, -1e12))
            .line_to(DVec2::new(1e12, -1e12))
            .line_to(DVec2::new(1e12, 1e12))
            .line_to(DVec2::new(-1e12, 1e12))
            .close();

        let mut canvas = Canvas::new(dims(), Rgba::BLACK);
        canvas.fill_path(&path, RED);
        let frame = canvas.into_frame();

        assert_eq!(count(&frame, RED), 200 * 100);
    }

    #[test]
    fn render_draws_orbs_but_not_gas() {
        let mut nodes = orbs_at([30.0, 170.0, 30.0, 170.0, 30.0]);
        nodes.push(Node::gas(DVec2::new(100.0, 20.0), DVec2::ZERO, 5.0));

        let frame = render_frame(&nodes, &[], &params(), dims());

        assert_eq!(frame.dims(), dims());
        assert_eq!(pixel(&frame, 30, 50), Some(Rgba::WHITE));
        assert_eq!(pixel(&frame, 170, 50), Some(Rgba::WHITE));
        assert_eq!(pixel(&frame, 100, 20), Some(Rgba::BLACK));
    }

    #[test]
    fn linked_orbs_get_a_bridge() {
        // Source at 50, target at 100: 2.5 radii apart, inside the range.
        let nodes = orbs_at([50.0, 100.0, 50.0, 50.0, 50.0]);
        let link = MstEdge {
            source: 0,
            target: 1,
            distance: 50.0,
        };

        let unlinked = render_frame(&nodes, &[], &params(), dims());
        let linked = render_frame(&nodes, &[link], &params(), dims());

        assert_eq!(pixel(&unlinked, 75, 50), Some(Rgba::BLACK));
        assert_eq!(pixel(&linked, 75, 50), Some(Rgba::WHITE));
        assert_eq!(pixel(&linked, 75, 60), Some(Rgba::BLACK));
    }

    #[test]
    fn out_of_range_link_is_skipped() {
        let nodes = orbs_at([20.0, 180.0, 20.0, 20.0, 20.0]);
        let link = MstEdge {
            source: 0,
            target: 1,
            distance: 160.0,
        };
        let with = render_frame(&nodes, &[link], &params(), dims());
        let without = render_frame(&nodes, &[], &params(), dims());
        assert_eq!(with, without);
    }
}
