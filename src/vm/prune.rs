//! Per-quadrant tape pruning driven by interval dominance
use crate::compiler::{Tape, TapeOp};
use crate::vm::Vm;

impl Vm {
    /// Produces four pruned tapes, one per quadrant of the most recent
    /// four-wide interval evaluation of `tape`
    ///
    /// A `Max` whose first input's lower bound is at least the second
    /// input's upper bound (in some lane) always takes the first branch in
    /// that lane's quadrant, so the `Max` itself vanishes and references to
    /// it are redirected to the surviving input; likewise for `Min` with
    /// the comparison reversed.  Everything the output no longer reaches is
    /// dropped, and the survivors are compacted with their inputs rewritten.
    ///
    /// Each emitted tape computes the same value as the source tape at
    /// every point inside its own quadrant: interval dominance is a sound
    /// over-approximation, so collapsing the dominated branch changes no
    /// observable result there.  Shape tags travel with the surviving
    /// instructions.
    ///
    /// Must be called directly after [`Vm::eval_interval4`] on the same
    /// tape, since it reads the per-instruction interval buffer that pass
    /// filled in.
    pub(crate) fn prune4(&mut self, tape: &Tape) -> [Tape; 4] {
        let mut out: [Tape; 4] = std::array::from_fn(|_| Tape::default());
        let n = tape.len();
        if n == 0 {
            return out;
        }
        debug_assert!(n <= self.remap.len());
        debug_assert!(n <= self.intervals.len());

        // The remap entry does double duty: -1 is dead, 0/1 record which
        // input of a Max/Min dominates (and plain liveness for other ops),
        // 2 is a Max/Min that must stay, and the forward sweep overwrites
        // entries with compacted indices.
        let remap = &mut self.remap[..n];
        remap.fill([-1; 4]);
        remap[n - 1] = [1; 4];

        for i in (0..n).rev() {
            let inst = &tape.ops[i];
            for j in 0..4 {
                if remap[i][j] == -1 {
                    continue;
                }
                if inst.op.is_choice() {
                    let (i0, i1) = (inst.input0 as usize, inst.input1 as usize);
                    debug_assert!(i0 < i && i1 < i);
                    let a = self.intervals[i0].lane(j);
                    let b = self.intervals[i1].lane(j);
                    let first_wins = match inst.op {
                        TapeOp::Max => a.lower() >= b.upper(),
                        _ => a.upper() <= b.lower(),
                    };
                    let second_wins = match inst.op {
                        TapeOp::Max => b.lower() >= a.upper(),
                        _ => b.upper() <= a.lower(),
                    };
                    if first_wins {
                        remap[i0][j] = 1;
                        remap[i][j] = 0;
                    } else if second_wins {
                        remap[i1][j] = 1;
                        debug_assert_eq!(remap[i][j], 1);
                    } else {
                        remap[i0][j] = 1;
                        remap[i1][j] = 1;
                        remap[i][j] = 2;
                    }
                } else {
                    for input in [inst.input0, inst.input1] {
                        if input >= 0 {
                            remap[input as usize][j] = 1;
                        }
                    }
                }
            }
        }

        for t in &mut out {
            t.ops.reserve(n);
        }
        for i in 0..n {
            for j in 0..4 {
                if remap[i][j] == -1 {
                    continue;
                }
                let mut inst = tape.ops[i];
                if inst.op.is_choice() && remap[i][j] != 2 {
                    // The dominated branch is gone; this instruction's slot
                    // becomes whatever slot the winning input compacted to.
                    let keep = if remap[i][j] == 0 {
                        inst.input0
                    } else {
                        inst.input1
                    };
                    remap[i][j] = remap[keep as usize][j];
                    continue;
                }
                if inst.input0 >= 0 {
                    inst.input0 = remap[inst.input0 as usize][j];
                }
                if inst.input1 >= 0 {
                    inst.input1 = remap[inst.input1 as usize][j];
                }
                out[j].ops.push(inst);
                remap[i][j] = out[j].ops.len() as i32 - 1;
            }
        }
        out
    }
}
