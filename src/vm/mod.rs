//! Tape evaluation in scalar, batched, and four-wide interval modes,
//! plus the quadtree solver built on top of them
mod prune;
mod solve;

pub use solve::{Subgrid, Tile};

use crate::{
    compiler::{Tape, TapeOp},
    types::{Interval, Interval4},
    Error,
};

/// Maximum number of grid vertices evaluated in one batch, and therefore
/// held by a single leaf tile
pub const MAX_TILE_SIZE: usize = 256;

/// Lower edge of the evaluation domain, on both axes
pub const DOMAIN_MIN: f32 = -1.0;
/// Upper edge of the evaluation domain, on both axes
pub const DOMAIN_MAX: f32 = 1.0;

/// Interpreter for a compiled [`Tape`]
///
/// A `Vm` owns all of its scratch storage, sized once at construction:
/// a batch buffer of one `MAX_TILE_SIZE`-float row per instruction, an
/// [`Interval4`] per instruction, and the pruner's remap table.  The
/// buffers are reused across quadrants during a solve, so recursive calls
/// must not assume their contents survive a child call.  Nothing here is
/// sharable across threads; build one `Vm` per contouring run.
pub struct Vm {
    tape: Tape,
    batch_capacity: usize,
    batch: Vec<f32>,
    intervals: Vec<Interval4>,
    remap: Vec<[i32; 4]>,
    grid_nx: i32,
    grid_ny: i32,
}

impl Vm {
    /// Builds an evaluator for the given tape
    ///
    /// Returns [`Error::InvalidTape`] if any instruction reads a slot that
    /// is not strictly before it.
    pub fn new(tape: Tape) -> Result<Self, Error> {
        tape.validate()?;
        let n = tape.len();
        Ok(Self {
            batch_capacity: MAX_TILE_SIZE,
            batch: vec![0.0; MAX_TILE_SIZE * n],
            intervals: vec![Interval4::default(); n],
            remap: vec![[-1; 4]; n],
            grid_nx: -1,
            grid_ny: -1,
            tape,
        })
    }

    /// Returns the tape this evaluator was built for
    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Evaluates the tape at a single point
    ///
    /// An empty tape has no value and returns NaN, which downstream sign
    /// tests treat as positive.
    pub fn eval(&mut self, x: f32, y: f32) -> f32 {
        if self.tape.is_empty() {
            return f32::NAN;
        }
        run_batch(&mut self.batch, self.batch_capacity, &self.tape, &[x], &[y]);
        self.batch[(self.tape.len() - 1) * self.batch_capacity]
    }

    /// Evaluates the tape at up to [`MAX_TILE_SIZE`] points at once
    ///
    /// The returned slice borrows the output row of the batch buffer and is
    /// invalidated by the next evaluation.
    pub fn eval_batch(&mut self, xs: &[f32], ys: &[f32]) -> Result<&[f32], Error> {
        if xs.len() != ys.len() {
            return Err(Error::MismatchedSlices);
        }
        if xs.len() > self.batch_capacity {
            return Err(Error::BatchTooLarge(xs.len(), self.batch_capacity));
        }
        if self.tape.is_empty() {
            return Ok(&[]);
        }
        run_batch(&mut self.batch, self.batch_capacity, &self.tape, xs, ys);
        let row = (self.tape.len() - 1) * self.batch_capacity;
        Ok(&self.batch[row..row + xs.len()])
    }

    /// Evaluates the tape over four axis-aligned boxes in lane lockstep
    pub fn eval_interval4(&mut self, x: Interval4, y: Interval4) -> Interval4 {
        if self.tape.is_empty() {
            return Interval4::splat(f32::NAN.into());
        }
        run_interval4(&mut self.intervals, &self.tape, x, y)
    }

    /// Evaluates the tape over a single axis-aligned box
    pub fn eval_interval(&mut self, x: Interval, y: Interval) -> Interval {
        self.eval_interval4(Interval4::splat(x), Interval4::splat(y))
            .lane(0)
    }
}

/// Runs `tape` over the point slices, writing one stride-wide row of
/// results per instruction into `buf`
fn run_batch(buf: &mut [f32], stride: usize, tape: &Tape, xs: &[f32], ys: &[f32]) {
    let n = xs.len();
    debug_assert_eq!(n, ys.len());
    debug_assert!(n <= stride);
    debug_assert!(tape.len() * stride <= buf.len());

    for (i, inst) in tape.ops.iter().enumerate() {
        let row = i * stride;
        match inst.op {
            TapeOp::VarX => buf[row..row + n].copy_from_slice(xs),
            TapeOp::VarY => buf[row..row + n].copy_from_slice(ys),
            TapeOp::Const => buf[row..row + n].fill(inst.constant),
            op => {
                let a = inst.input0 as usize * stride;
                if inst.input1 >= 0 {
                    let b = inst.input1 as usize * stride;
                    for j in 0..n {
                        buf[row + j] = op.apply(buf[a + j], buf[b + j]);
                    }
                } else {
                    for j in 0..n {
                        buf[row + j] = op.apply(buf[a + j], 0.0);
                    }
                }
            }
        }
    }
}

/// Runs `tape` in four-wide interval arithmetic, leaving one [`Interval4`]
/// per instruction in `buf` (the pruner reads these back)
fn run_interval4(
    buf: &mut [Interval4],
    tape: &Tape,
    x: Interval4,
    y: Interval4,
) -> Interval4 {
    debug_assert!(tape.len() <= buf.len());

    for (i, inst) in tape.ops.iter().enumerate() {
        let a = (inst.input0 >= 0).then(|| buf[inst.input0 as usize]);
        let b = (inst.input1 >= 0).then(|| buf[inst.input1 as usize]);
        buf[i] = match inst.op {
            TapeOp::VarX => x,
            TapeOp::VarY => y,
            TapeOp::Const => Interval4::splat(inst.constant.into()),
            TapeOp::Add => a.unwrap() + b.unwrap(),
            TapeOp::Sub => a.unwrap() - b.unwrap(),
            TapeOp::Mul => a.unwrap() * b.unwrap(),
            TapeOp::Div => a.unwrap() / b.unwrap(),
            TapeOp::Min => a.unwrap().min(b.unwrap()),
            TapeOp::Max => a.unwrap().max(b.unwrap()),
            TapeOp::Neg => -a.unwrap(),
            TapeOp::Abs => a.unwrap().abs(),
            TapeOp::Square => a.unwrap().square(),
            TapeOp::Sqrt => a.unwrap().sqrt(),
        };
    }
    buf[tape.len() - 1]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use crate::context::{x, y};
    use crate::types::Interval;

    fn circle() -> Tape {
        compile(&((x().square() + y().square()).sqrt() - 1.0))
    }

    #[test]
    fn scalar_and_batch_agree() {
        let mut vm = Vm::new(circle()).unwrap();
        let xs = [0.0, 1.0, 0.5, -0.25];
        let ys = [0.0, 0.0, 0.5, 0.75];
        let batch = vm.eval_batch(&xs, &ys).unwrap().to_vec();
        for (i, (&px, &py)) in xs.iter().zip(&ys).enumerate() {
            assert_eq!(batch[i], vm.eval(px, py));
        }
    }

    #[test]
    fn batch_rejects_mismatched_slices() {
        let mut vm = Vm::new(circle()).unwrap();
        assert!(matches!(
            vm.eval_batch(&[0.0, 1.0], &[0.0]),
            Err(Error::MismatchedSlices)
        ));
    }

    #[test]
    fn batch_rejects_oversized_calls() {
        let mut vm = Vm::new(circle()).unwrap();
        let big = vec![0.0; MAX_TILE_SIZE + 1];
        assert!(matches!(
            vm.eval_batch(&big, &big),
            Err(Error::BatchTooLarge(..))
        ));
    }

    #[test]
    fn empty_tape_has_no_value() {
        let mut vm = Vm::new(Tape::default()).unwrap();
        assert!(vm.eval(0.0, 0.0).is_nan());
        assert!(vm.eval_batch(&[0.0], &[0.0]).unwrap().is_empty());
    }

    #[test]
    fn interval_bounds_contain_samples() {
        let mut vm = Vm::new(circle()).unwrap();
        let bx = Interval::new(-0.5, 0.75);
        let by = Interval::new(0.25, 1.0);
        let bounds = vm.eval_interval(bx, by);
        for sx in [-0.5, -0.1, 0.3, 0.75] {
            for sy in [0.25, 0.6, 1.0] {
                let v = vm.eval(sx, sy);
                assert!(bounds.contains(v), "{v} outside {bounds:?}");
            }
        }
    }

    #[test]
    fn malformed_tape_is_rejected() {
        let mut t = circle();
        t.ops[0].input0 = 5;
        assert!(matches!(Vm::new(t), Err(Error::InvalidTape { .. })));
    }
}
