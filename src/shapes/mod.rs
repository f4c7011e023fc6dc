//! Primitive shapes and boolean combinators
//!
//! Builders return [`Scalar`] expressions over the X and Y variables.
//! Anything convertible to a `Scalar` is accepted, so centers and sizes can
//! be plain floats or expressions:
//!
//! ```
//! use isoline::shapes::{disk, smooth_union};
//!
//! let scene = smooth_union(disk(-0.3, 0.0, 0.4), disk(0.3, 0.0, 0.4), 0.1);
//! ```
//!
//! The [`Disk`] and [`Rect`] parameter structs additionally tag the
//! expression root with their [`ShapeId`], which rides through compilation
//! and pruning so contour diagnostics can name the authoring shape.
use crate::context::{constant, max, min, x, y, Scalar, ShapeId};
use crate::mesh::Mesh;
use nalgebra::Vector2;

/// Signed distance to a disk: √((x−cx)² + (y−cy)²) − r
pub fn disk(
    cx: impl Into<Scalar>,
    cy: impl Into<Scalar>,
    r: impl Into<Scalar>,
) -> Scalar {
    let dx = x() - cx.into();
    let dy = y() - cy.into();
    (dx.square() + dy.square()).sqrt() - r.into()
}

/// Signed distance to an axis-aligned rectangle centered at (cx, cy)
pub fn rectangle(
    cx: impl Into<Scalar>,
    cy: impl Into<Scalar>,
    width: impl Into<Scalar>,
    height: impl Into<Scalar>,
) -> Scalar {
    let dx = (x() - cx.into()).abs() - width.into() * 0.5;
    let dy = (y() - cy.into()).abs() - height.into() * 0.5;

    let outside = (max(&dx, 0.0).square() + max(&dy, 0.0).square()).sqrt();
    let inside = min(max(dx, dy), 0.0);
    outside + inside
}

/// Circular smooth union (Quilez's `smin`)
///
/// `r` is the blend radius; the result equals `min(a, b)` away from the
/// seam and rounds the crease where the two fields are close.
pub fn smooth_union(
    a: impl Into<Scalar>,
    b: impl Into<Scalar>,
    r: impl Into<Scalar>,
) -> Scalar {
    let (a, b) = (a.into(), b.into());
    let k = r.into() * (1.0 / (1.0 - 0.5f32.sqrt()));
    let h = max(&k - (&a - &b).abs(), 0.0) / &k;
    let h2 = &h * (&h - 2.0);
    min(a, b) - k * 0.5 * (constant(1.0) + &h - (constant(1.0) - h2).sqrt())
}

/// Rounded union: max(r, min(a, b)) − |(max(r−a, 0), max(r−b, 0))|
///
/// A cheaper blend than [`smooth_union`] with a circular fillet of radius
/// `r` in the concave corner.
pub fn rounded_union(
    a: impl Into<Scalar>,
    b: impl Into<Scalar>,
    r: impl Into<Scalar>,
) -> Scalar {
    let (a, b, r) = (a.into(), b.into(), r.into());
    let ux = max(&r - &a, 0.0);
    let uy = max(&r - &b, 0.0);
    let fillet = (ux.square() + uy.square()).sqrt();
    max(&r, min(a, b)) - fillet
}

/// A disk authoring shape
#[derive(Copy, Clone, Debug)]
pub struct Disk {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
    id: ShapeId,
}

impl Disk {
    pub fn new(cx: f32, cy: f32, r: f32) -> Self {
        Disk {
            cx,
            cy,
            r,
            id: ShapeId::fresh(),
        }
    }

    /// Returns this shape's identity tag
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Builds the signed-distance expression, tagged with this shape's id
    pub fn sdf(&self) -> Scalar {
        let s = disk(self.cx, self.cy, self.r);
        s.set_shape(self.id);
        s
    }

    /// Explicit outline polyline, for editing overlays
    pub fn boundary_mesh(&self, segments: usize) -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..segments {
            let angle = std::f32::consts::TAU * i as f32 / segments as f32;
            mesh.vertices.push(Vector2::new(
                self.cx + self.r * angle.cos(),
                self.cy + self.r * angle.sin(),
            ));
            mesh.edges.push(Vector2::new(i, (i + 1) % segments));
        }
        mesh
    }
}

/// An axis-aligned rectangle authoring shape
#[derive(Copy, Clone, Debug)]
pub struct Rect {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    id: ShapeId,
}

impl Rect {
    pub fn new(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Rect {
            cx,
            cy,
            width,
            height,
            id: ShapeId::fresh(),
        }
    }

    /// Returns this shape's identity tag
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Builds the signed-distance expression, tagged with this shape's id
    pub fn sdf(&self) -> Scalar {
        let s = rectangle(self.cx, self.cy, self.width, self.height);
        s.set_shape(self.id);
        s
    }

    /// Explicit outline polyline, for editing overlays
    pub fn boundary_mesh(&self) -> Mesh {
        let (hw, hh) = (self.width * 0.5, self.height * 0.5);
        let mut mesh = Mesh::new();
        mesh.vertices = vec![
            Vector2::new(self.cx - hw, self.cy - hh),
            Vector2::new(self.cx + hw, self.cy - hh),
            Vector2::new(self.cx + hw, self.cy + hh),
            Vector2::new(self.cx - hw, self.cy + hh),
        ];
        for i in 0..4 {
            mesh.edges.push(Vector2::new(i, (i + 1) % 4));
        }
        mesh
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use crate::vm::Vm;
    use approx::assert_relative_eq;

    fn eval(s: &Scalar, px: f32, py: f32) -> f32 {
        Vm::new(compile(s)).unwrap().eval(px, py)
    }

    #[test]
    fn disk_distances() {
        let d = disk(0.0, 0.0, 1.0);
        assert_eq!(eval(&d, 0.0, 0.0), -1.0);
        assert_relative_eq!(eval(&d, 1.0, 0.0), 0.0, epsilon = 1e-5);
        assert_relative_eq!(
            eval(&d, 2.0, 2.0),
            8.0f32.sqrt() - 1.0,
            max_relative = 1e-5
        );
    }

    #[test]
    fn rectangle_distances() {
        let r = rectangle(0.0, 0.0, 2.0, 1.0);
        assert_eq!(eval(&r, 0.0, 0.0), -0.5);
        assert_relative_eq!(eval(&r, 1.1, 0.0), 0.1, max_relative = 1e-5);
        assert_relative_eq!(
            eval(&r, 2.0, 2.0),
            3.25f32.sqrt(),
            max_relative = 1e-5
        );
    }

    #[test]
    fn smooth_union_blends_below_min() {
        let a = disk(-0.3, 0.0, 0.4);
        let b = disk(0.3, 0.0, 0.4);
        let plain = min(&a, &b);
        let smooth = smooth_union(&a, &b, 0.2);
        for (px, py) in [(0.0, 0.0), (0.0, 0.4), (0.5, 0.1), (-0.8, -0.8)] {
            let s = eval(&smooth, px, py);
            let m = eval(&plain, px, py);
            assert!(s <= m + 1e-5, "({px}, {py}): {s} > {m}");
        }
    }

    #[test]
    fn rounded_union_matches_min_far_from_seam() {
        let u = rounded_union(disk(-0.5, 0.0, 0.2), disk(0.5, 0.0, 0.2), 0.05);
        let m = min(disk(-0.5, 0.0, 0.2), disk(0.5, 0.0, 0.2));
        assert_relative_eq!(
            eval(&u, -0.5, 0.0),
            eval(&m, -0.5, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn shape_structs_tag_their_roots() {
        let shape = Disk::new(0.2, 0.1, 0.3);
        let sdf = shape.sdf();
        let tape = compile(&sdf);
        assert_eq!(tape.ops.last().unwrap().shape, Some(shape.id()));
    }

    #[test]
    fn boundary_meshes_close_their_loops() {
        let d = Disk::new(0.0, 0.0, 1.0).boundary_mesh(32);
        assert_eq!(d.vertices.len(), 32);
        assert_eq!(d.edges.len(), 32);

        let r = Rect::new(0.0, 0.0, 1.0, 0.5).boundary_mesh();
        assert_eq!(r.vertices.len(), 4);
        assert_eq!(r.edges.len(), 4);
    }
}
