//! Tape optimization: constant folding and dead-code elimination
use crate::compiler::{Instruction, Tape, TapeOp};

/// Optimizes a tape, returning a new (usually shorter) tape computing the
/// same value
///
/// Two passes run in sequence:
///
/// 1. A forward sweep folds every instruction whose inputs are all known
///    constants into a `Const`, using exactly the runtime scalar semantics
///    (so `1/0` folds to `inf` and `sqrt(-1)` folds to `NaN`).  The same
///    sweep applies IEEE-exact identities (`a+0`, `0+a`, `a-0`, `a*1`,
///    `1*a`, `a/1`), rewriting the instruction as an alias of its surviving
///    input; `a*0` is deliberately left alone, since collapsing it would
///    change the result when `a` is infinite or NaN.
/// 2. A liveness sweep marks the output and everything it (transitively)
///    reads, then drops the rest and compacts the survivors, rewriting
///    input indices through an old-to-new table.
///
/// Optimization is idempotent: a second run returns a structurally equal
/// tape.
pub fn optimize(tape: &Tape) -> Tape {
    let n = tape.len();
    if n == 0 {
        return Tape::default();
    }

    // Forward fold pass.  `alias[i]` is the slot that actually computes
    // instruction i's value after rewrites; `consts[i]` is its value when
    // known at compile time.
    let mut alias: Vec<i32> = (0..n as i32).collect();
    let mut consts: Vec<Option<f32>> = vec![None; n];
    let mut folded: Vec<Instruction> = Vec::with_capacity(n);

    for (i, inst) in tape.ops.iter().enumerate() {
        let mut inst = *inst;
        if inst.input0 >= 0 {
            inst.input0 = alias[inst.input0 as usize];
        }
        if inst.input1 >= 0 {
            inst.input1 = alias[inst.input1 as usize];
        }
        let c0 = (inst.input0 >= 0)
            .then(|| consts[inst.input0 as usize])
            .flatten();
        let c1 = (inst.input1 >= 0)
            .then(|| consts[inst.input1 as usize])
            .flatten();

        match inst.op {
            TapeOp::Const => consts[i] = Some(inst.constant),
            TapeOp::VarX | TapeOp::VarY => (),
            op if inst.input1 < 0 => {
                // Unary
                if let Some(a) = c0 {
                    inst = fold_to_const(inst, op.apply(a, 0.0));
                    consts[i] = Some(inst.constant);
                }
            }
            op => {
                if let (Some(a), Some(b)) = (c0, c1) {
                    inst = fold_to_const(inst, op.apply(a, b));
                    consts[i] = Some(inst.constant);
                } else if let Some(keep) = identity_operand(op, c0, c1, &inst) {
                    alias[i] = keep;
                    consts[i] = consts[keep as usize];
                }
            }
        }
        folded.push(inst);
    }

    // Liveness: the output is whatever slot the last instruction resolved
    // to; aliased instructions are never referenced and fall away here.
    let root = alias[n - 1] as usize;
    let mut live = vec![false; n];
    live[root] = true;
    for i in (0..=root).rev() {
        if !live[i] {
            continue;
        }
        for input in [folded[i].input0, folded[i].input1] {
            if input >= 0 {
                live[input as usize] = true;
            }
        }
    }

    // Compaction
    let mut remap = vec![-1i32; n];
    let mut ops = Vec::new();
    for (i, mut inst) in folded.into_iter().enumerate().take(root + 1) {
        if !live[i] {
            continue;
        }
        if inst.input0 >= 0 {
            inst.input0 = remap[inst.input0 as usize];
        }
        if inst.input1 >= 0 {
            inst.input1 = remap[inst.input1 as usize];
        }
        remap[i] = ops.len() as i32;
        ops.push(inst);
    }
    Tape { ops }
}

fn fold_to_const(inst: Instruction, v: f32) -> Instruction {
    let mut out = Instruction::constant(v);
    out.shape = inst.shape;
    out
}

/// Returns the input slot that an identity rewrite reduces `op` to, if any
fn identity_operand(
    op: TapeOp,
    c0: Option<f32>,
    c1: Option<f32>,
    inst: &Instruction,
) -> Option<i32> {
    match op {
        TapeOp::Add => {
            if c0 == Some(0.0) {
                Some(inst.input1)
            } else if c1 == Some(0.0) {
                Some(inst.input0)
            } else {
                None
            }
        }
        TapeOp::Sub if c1 == Some(0.0) => Some(inst.input0),
        TapeOp::Mul => {
            if c0 == Some(1.0) {
                Some(inst.input1)
            } else if c1 == Some(1.0) {
                Some(inst.input0)
            } else {
                None
            }
        }
        TapeOp::Div if c1 == Some(1.0) => Some(inst.input0),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::compile;
    use crate::context::{constant, x, y};

    #[test]
    fn fold_chain_to_single_const() {
        let e = (constant(2.0) + 3.0) * 4.0;
        let t = compile(&e);
        assert!(t.len() >= 3);
        let o = optimize(&t);
        assert_eq!(o.len(), 1);
        assert_eq!(o.ops[0].op, TapeOp::Const);
        assert_eq!(o.ops[0].constant, 20.0);
    }

    #[test]
    fn dce_keeps_topological_order() {
        let e = x() + constant(2.0) * 3.0;
        let o = optimize(&compile(&e));
        let ops: Vec<_> = o.ops.iter().map(|i| i.op).collect();
        assert_eq!(ops, vec![TapeOp::VarX, TapeOp::Const, TapeOp::Add]);
        assert_eq!(o.ops[1].constant, 6.0);
        o.validate().unwrap();
    }

    #[test]
    fn additive_and_multiplicative_identities() {
        for e in [
            x() + 0.0,
            0.0 + x(),
            x() - 0.0,
            x() * 1.0,
            1.0 * x(),
            x() / 1.0,
        ] {
            let o = optimize(&compile(&e));
            assert_eq!(o.len(), 1, "{:?}", o);
            assert_eq!(o.ops[0].op, TapeOp::VarX);
        }
    }

    #[test]
    fn zero_product_is_not_collapsed() {
        let o = optimize(&compile(&(x() * 0.0)));
        assert_eq!(o.ops.last().unwrap().op, TapeOp::Mul);
    }

    #[test]
    fn folding_mirrors_ieee_semantics() {
        let o = optimize(&compile(&constant(-1.0).sqrt()));
        assert_eq!(o.len(), 1);
        assert!(o.ops[0].constant.is_nan());

        let o = optimize(&compile(&(constant(1.0) / 0.0)));
        assert_eq!(o.len(), 1);
        assert_eq!(o.ops[0].constant, f32::INFINITY);
    }

    #[test]
    fn optimize_is_idempotent() {
        let e = (x().square() + y().square()).sqrt() - 1.0;
        let once = optimize(&compile(&e));
        let twice = optimize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn aliased_root_still_terminates_tape() {
        let o = optimize(&compile(&(x() + 0.0)));
        assert_eq!(o.ops.last().unwrap().op, TapeOp::VarX);
    }
}
