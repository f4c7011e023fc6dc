//! Mesh output types and marching-squares contour extraction
mod contour;

pub use contour::contour;

use crate::vm::Tile;
use nalgebra::Vector2;
use std::collections::HashMap;

/// Diagnostic record for a grid vertex adjacent to a sign change
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SignChange {
    /// Sampled field value at the vertex
    pub value: f32,
    /// Index into [`Contour::tiles`] of the tile whose tape produced the
    /// sample; through the tape's shape tags, the vertex can be attributed
    /// to an authoring shape when the algebra makes that unambiguous
    pub tape: usize,
}

/// An indexed 2D line-segment mesh
#[derive(Default, Debug)]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<Vector2<f32>>,
    /// Segments, as pairs of indexes into [`self.vertices`](Self::vertices)
    pub edges: Vec<Vector2<usize>>,
    /// Samples adjacent to a sign change, keyed by global grid-vertex id
    /// (`y * resolution + x`)
    pub sign_changes: HashMap<u32, SignChange>,
}

impl Mesh {
    /// Builds a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }
}

/// Output of a contouring run
#[derive(Default, Debug)]
pub struct Contour {
    pub mesh: Mesh,
    /// Leaf tiles of the quadtree solve; [`SignChange::tape`] indexes here
    pub tiles: Vec<Tile>,
}
