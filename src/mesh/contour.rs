//! Table-driven marching squares over solver tiles
use crate::compiler::Tape;
use crate::mesh::{Contour, Mesh, SignChange};
use crate::vm::{Subgrid, Vm};
use crate::Error;
use log::{debug, trace};
use nalgebra::Vector2;
use std::collections::HashMap;

/// A cell edge, as the pair of cell corners it connects
///
/// Corners are numbered 0..4 in sample order: `(x, y)`, `(x+1, y)`,
/// `(x, y+1)`, `(x+1, y+1)`.  The lower-numbered corner always comes
/// first, which keeps edge keys canonical.
type CellEdge = (usize, usize);

const TOP: CellEdge = (0, 1);
const LEFT: CellEdge = (0, 2);
const RIGHT: CellEdge = (1, 3);
const BOTTOM: CellEdge = (2, 3);

/// Segment table indexed by the 4-bit corner configuration
///
/// Bit k is set when corner k samples negative.  Each entry lists the
/// segments to emit as pairs of cell edges; configurations 6 and 9 are the
/// saddles (diagonally opposite negative corners) and always emit both of
/// their segments, connecting the opposite-sign pairs that are closest by
/// edge adjacency.
const SEGMENTS: [&[(CellEdge, CellEdge)]; 16] = [
    &[],                             // 0000: all positive
    &[(LEFT, TOP)],                  // 0001
    &[(TOP, RIGHT)],                 // 0010
    &[(LEFT, RIGHT)],                // 0011
    &[(LEFT, BOTTOM)],               // 0100
    &[(TOP, BOTTOM)],                // 0101
    &[(TOP, LEFT), (BOTTOM, RIGHT)], // 0110: saddle
    &[(BOTTOM, RIGHT)],              // 0111
    &[(BOTTOM, RIGHT)],              // 1000
    &[(TOP, RIGHT), (BOTTOM, LEFT)], // 1001: saddle
    &[(TOP, BOTTOM)],                // 1010
    &[(LEFT, BOTTOM)],               // 1011
    &[(LEFT, RIGHT)],                // 1100
    &[(TOP, RIGHT)],                 // 1101
    &[(TOP, LEFT)],                  // 1110
    &[],                             // 1111: all negative
];

/// NaN counts as positive, so it can never participate in a sign change
fn is_negative(v: f32) -> bool {
    v < 0.0
}

fn sign_change(a: f32, b: f32) -> bool {
    !a.is_nan() && !b.is_nan() && is_negative(a) != is_negative(b)
}

/// Interpolation parameter of the zero crossing between two samples
///
/// Clamped to [0, 1] so that the emitted vertex always lies on its cell
/// edge, even when the samples are nearly equal.
fn crossing(v0: f32, v1: f32) -> f32 {
    (v0 / (v0 - v1)).clamp(0.0, 1.0)
}

/// Contours `tape` on a `resolution` × `resolution` vertex grid over the
/// [−1, 1]² domain
///
/// The resolution is clamped to [4, 256].  An empty tape produces an empty
/// contour; a tape that never crosses zero produces a contour with tiles
/// but no segments.  Output ordering is deterministic: vertices appear in
/// first-encounter order and segments in tile-then-cell row-major order.
pub fn contour(tape: &Tape, resolution: u32) -> Result<Contour, Error> {
    let resolution = resolution.clamp(4, 256) as i32;
    if tape.is_empty() {
        return Ok(Contour::default());
    }
    let mut vm = Vm::new(tape.clone())?;
    let tiles = vm.solve(Subgrid::new(0, 0, resolution - 1, resolution - 1));

    let cell_size = 2.0 / (resolution - 1) as f32;
    let mut mesh = Mesh::new();
    let mut edge_to_vertex: HashMap<(u32, u32), usize> = HashMap::new();

    // Pass 1: place one vertex on every cell edge whose endpoints sample
    // with opposite signs.  Keys are (low, high) global grid-vertex ids.
    for tile in &tiles {
        let s = tile.subgrid;
        let cols = s.nx + 1;
        for ly in 0..=s.ny {
            for lx in 0..=s.nx {
                let gx = s.px + lx;
                let gy = s.py + ly;
                let i00 = (gy * resolution + gx) as u32;
                let v00 = tile.values[(ly * cols + lx) as usize];

                // Edge to the next vertex in x.  Neighboring tiles revisit
                // their shared boundary edges, so vertex creation goes
                // through the map entry to keep one vertex per edge.
                if lx < s.nx {
                    let v01 = tile.values[(ly * cols + lx + 1) as usize];
                    if sign_change(v00, v01) {
                        let t = crossing(v00, v01);
                        let vertices = &mut mesh.vertices;
                        edge_to_vertex.entry((i00, i00 + 1)).or_insert_with(|| {
                            vertices.push(Vector2::new(
                                -1.0 + (gx as f32 + t) * cell_size,
                                -1.0 + gy as f32 * cell_size,
                            ));
                            vertices.len() - 1
                        });
                    }
                }
                // Edge to the next vertex in y
                if ly < s.ny {
                    let v10 = tile.values[((ly + 1) * cols + lx) as usize];
                    if sign_change(v00, v10) {
                        let t = crossing(v00, v10);
                        let vertices = &mut mesh.vertices;
                        edge_to_vertex
                            .entry((i00, i00 + resolution as u32))
                            .or_insert_with(|| {
                                vertices.push(Vector2::new(
                                    -1.0 + gx as f32 * cell_size,
                                    -1.0 + (gy as f32 + t) * cell_size,
                                ));
                                vertices.len() - 1
                            });
                    }
                }
            }
        }
    }

    // Pass 2: walk each tile's cells and connect the crossing vertices
    // according to the configuration table
    for (tile_index, tile) in tiles.iter().enumerate() {
        let s = tile.subgrid;
        let cols = s.nx + 1;
        for ly in 0..s.ny {
            for lx in 0..s.nx {
                let gx = s.px + lx;
                let gy = s.py + ly;
                let i00 = (gy * resolution + gx) as u32;
                let corners = [
                    i00,
                    i00 + 1,
                    i00 + resolution as u32,
                    i00 + resolution as u32 + 1,
                ];
                let vs = [
                    tile.values[(ly * cols + lx) as usize],
                    tile.values[(ly * cols + lx + 1) as usize],
                    tile.values[((ly + 1) * cols + lx) as usize],
                    tile.values[((ly + 1) * cols + lx + 1) as usize],
                ];
                let mut config = 0usize;
                for (bit, &v) in vs.iter().enumerate() {
                    if is_negative(v) {
                        config |= 1 << bit;
                    }
                }
                if config == 0 || config == 15 {
                    continue;
                }

                for (corner, &v) in corners.iter().zip(&vs) {
                    mesh.sign_changes.insert(
                        *corner,
                        SignChange {
                            value: v,
                            tape: tile_index,
                        },
                    );
                }

                for &(e1, e2) in SEGMENTS[config] {
                    let k1 = (corners[e1.0], corners[e1.1]);
                    let k2 = (corners[e2.0], corners[e2.1]);
                    match (edge_to_vertex.get(&k1), edge_to_vertex.get(&k2)) {
                        (Some(&a), Some(&b)) => {
                            mesh.edges.push(Vector2::new(a, b));
                        }
                        // A NaN corner makes the config and the crossing
                        // tests disagree; drop the segment
                        _ => trace!("no crossing vertex for cell ({gx}, {gy})"),
                    }
                }
            }
        }
    }

    debug!(
        "contoured {} vertices, {} segments across {} tiles",
        mesh.vertices.len(),
        mesh.edges.len(),
        tiles.len()
    );
    Ok(Contour { mesh, tiles })
}
