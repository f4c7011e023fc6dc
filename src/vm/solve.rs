//! Quadtree subdivision of the sampling grid
use crate::compiler::Tape;
use crate::types::{Interval, Interval4};
use crate::vm::{run_batch, Vm, DOMAIN_MAX, DOMAIN_MIN, MAX_TILE_SIZE};
use log::{debug, trace};

/// A rectangular block of grid vertices
///
/// `(px, py)` is the lowest vertex; the block covers `(nx+1) * (ny+1)`
/// vertices, including the far boundary row and column.  Splitting a
/// subgrid therefore duplicates the shared boundary vertices between
/// neighboring quadrants, which is what lets each tile run marching
/// squares on its own samples alone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Subgrid {
    pub px: i32,
    pub py: i32,
    pub nx: i32,
    pub ny: i32,
}

impl Subgrid {
    /// Builds a new subgrid
    pub fn new(px: i32, py: i32, nx: i32, ny: i32) -> Self {
        Subgrid { px, py, nx, ny }
    }

    /// Number of grid vertices covered, including both boundaries
    pub fn vertex_count(&self) -> usize {
        (self.nx + 1) as usize * (self.ny + 1) as usize
    }

    /// Splits into four quadrants by integer bisection
    ///
    /// The lower halves take `n / 2` cells and the upper halves the
    /// remainder, so the quadrants cover the parent exactly with no
    /// overlapping cells.  Order: lower-left, lower-right, upper-left,
    /// upper-right.
    pub fn split(&self) -> [Subgrid; 4] {
        let nx0 = self.nx / 2;
        let nx1 = self.nx - nx0;
        let ny0 = self.ny / 2;
        let ny1 = self.ny - ny0;
        [
            Subgrid::new(self.px, self.py, nx0, ny0),
            Subgrid::new(self.px + nx0, self.py, nx1, ny0),
            Subgrid::new(self.px, self.py + ny0, nx0, ny1),
            Subgrid::new(self.px + nx0, self.py + ny0, nx1, ny1),
        ]
    }
}

/// Leaf of the quadtree solver
#[derive(Clone, Debug)]
pub struct Tile {
    pub subgrid: Subgrid,
    /// Sampled field values, row-major, `(nx+1) * (ny+1)` entries
    pub values: Vec<f32>,
    /// The pruned tape that produced the samples
    pub tape: Tape,
}

impl Vm {
    fn x_interval(&self, s: &Subgrid) -> Interval {
        let step = (DOMAIN_MAX - DOMAIN_MIN) / self.grid_nx as f32;
        Interval::new(
            DOMAIN_MIN + s.px as f32 * step,
            DOMAIN_MIN + (s.px + s.nx) as f32 * step,
        )
    }

    fn y_interval(&self, s: &Subgrid) -> Interval {
        let step = (DOMAIN_MAX - DOMAIN_MIN) / self.grid_ny as f32;
        Interval::new(
            DOMAIN_MIN + s.py as f32 * step,
            DOMAIN_MIN + (s.py + s.ny) as f32 * step,
        )
    }

    /// Recursively subdivides `grid` over the [−1, 1]² domain, returning
    /// the leaf tiles whose field can cross zero
    ///
    /// Quadrants whose interval bound lies strictly above zero (all empty
    /// space) or strictly below (all interior) are discarded without ever
    /// being sampled; everything else is bisected until it fits in one
    /// batch, then sampled vertex-by-vertex with its pruned tape.
    pub fn solve(&mut self, grid: Subgrid) -> Vec<Tile> {
        self.grid_nx = grid.nx;
        self.grid_ny = grid.ny;
        let mut tiles = Vec::new();
        if !self.tape.is_empty() {
            let tape = self.tape.clone();
            self.solve_region(&mut tiles, grid, tape);
        }
        debug!(
            "solved {}x{} grid into {} tiles",
            grid.nx, grid.ny, tiles.len()
        );
        tiles
    }

    fn solve_region(&mut self, tiles: &mut Vec<Tile>, subgrid: Subgrid, tape: Tape) {
        if subgrid.vertex_count() <= MAX_TILE_SIZE {
            let ix = self.x_interval(&subgrid);
            let iy = self.y_interval(&subgrid);

            let mut xs = [0.0f32; MAX_TILE_SIZE];
            let mut ys = [0.0f32; MAX_TILE_SIZE];
            let cols = (subgrid.nx + 1) as usize;
            let rows = (subgrid.ny + 1) as usize;
            for dy in 0..rows {
                let y = if subgrid.ny == 0 {
                    iy.lower()
                } else {
                    iy.lower() + dy as f32 * iy.width() / subgrid.ny as f32
                };
                for dx in 0..cols {
                    xs[dy * cols + dx] = if subgrid.nx == 0 {
                        ix.lower()
                    } else {
                        ix.lower() + dx as f32 * ix.width() / subgrid.nx as f32
                    };
                    ys[dy * cols + dx] = y;
                }
            }

            let count = rows * cols;
            run_batch(
                &mut self.batch,
                self.batch_capacity,
                &tape,
                &xs[..count],
                &ys[..count],
            );
            let row = (tape.len() - 1) * self.batch_capacity;
            let values = self.batch[row..row + count].to_vec();
            tiles.push(Tile {
                subgrid,
                values,
                tape,
            });
            return;
        }

        let quads = subgrid.split();
        let mut x4 = Interval4::default();
        let mut y4 = Interval4::default();
        for (j, q) in quads.iter().enumerate() {
            x4.set_lane(j, self.x_interval(q));
            y4.set_lane(j, self.y_interval(q));
        }

        let bounds = crate::vm::run_interval4(&mut self.intervals, &tape, x4, y4);
        let pruned = self.prune4(&tape);

        for (j, sub_tape) in pruned.into_iter().enumerate() {
            let r = bounds.lane(j);
            // Strictly positive means empty space, strictly negative means
            // interior; either way there is no contour inside
            if r.lower() > 0.0 || r.upper() < 0.0 {
                trace!("culled quadrant {:?}, bounds {:?}", quads[j], r);
                continue;
            }
            self.solve_region(tiles, quads[j], sub_tape);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use crate::shapes::disk;

    #[test]
    fn split_covers_parent_exactly() {
        for (nx, ny) in [(32, 32), (7, 5), (1, 2), (9, 9)] {
            let parent = Subgrid::new(3, 4, nx, ny);
            let [ll, lr, ul, ur] = parent.split();
            // Cell counts add up on both axes
            assert_eq!(ll.nx + lr.nx, nx);
            assert_eq!(ll.ny + ul.ny, ny);
            // Quadrants meet with no gap
            assert_eq!(lr.px, ll.px + ll.nx);
            assert_eq!(ul.py, ll.py + ll.ny);
            assert_eq!(ur, Subgrid::new(lr.px, ul.py, lr.nx, ul.ny));
        }
    }

    #[test]
    fn small_grids_become_one_tile() {
        let mut vm = Vm::new(compile(&disk(0.0, 0.0, 0.5))).unwrap();
        let tiles = vm.solve(Subgrid::new(0, 0, 8, 8));
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].values.len(), 81);
    }

    #[test]
    fn tile_values_match_direct_evaluation() {
        let mut vm = Vm::new(compile(&disk(0.1, -0.2, 0.4))).unwrap();
        let tiles = vm.solve(Subgrid::new(0, 0, 32, 32));
        assert!(!tiles.is_empty());
        let mut reference = Vm::new(compile(&disk(0.1, -0.2, 0.4))).unwrap();
        for tile in &tiles {
            let s = tile.subgrid;
            for dy in 0..=s.ny {
                for dx in 0..=s.nx {
                    let px = -1.0 + (s.px + dx) as f32 * 2.0 / 32.0;
                    let py = -1.0 + (s.py + dy) as f32 * 2.0 / 32.0;
                    let got = tile.values[(dy * (s.nx + 1) + dx) as usize];
                    let want = reference.eval(px, py);
                    assert!(
                        (got - want).abs() <= 1e-5 * want.abs().max(1.0),
                        "tile {s:?} at ({px}, {py}): {got} != {want}"
                    );
                }
            }
        }
    }

    #[test]
    fn interior_and_exterior_quadrants_are_culled() {
        // A disk far in the corner: the opposite quadrants never spawn tiles
        let mut vm = Vm::new(compile(&disk(1.0, 1.0, 0.5))).unwrap();
        let tiles = vm.solve(Subgrid::new(0, 0, 32, 32));
        assert!(!tiles.is_empty());
        for tile in &tiles {
            let s = tile.subgrid;
            // Nothing entirely inside the x < 0, y < 0 quarter
            assert!(
                s.px + s.nx > 16 || s.py + s.ny > 16,
                "unexpected tile {s:?}"
            );
        }
    }

    #[test]
    fn pruned_leaf_tapes_shrink_away_from_the_shape() {
        let e = crate::context::min(
            crate::context::x() + 0.2,
            crate::context::y() + 0.2,
        );
        let mut vm = Vm::new(compile(&e)).unwrap();
        let full_len = vm.tape().len();
        let tiles = vm.solve(Subgrid::new(0, 0, 16, 16));
        assert_eq!(tiles.len(), 3);
        for tile in &tiles {
            let s = tile.subgrid;
            let one_sided = (s.px, s.py) != (0, 0);
            if one_sided {
                assert!(tile.tape.len() < full_len, "tile {s:?} kept {full_len}");
            }
        }
    }
}
