//! Lowering from the expression graph to instruction tapes
//!
//! [`compile`] flattens a DAG rooted at a [`Scalar`] into a [`Tape`] in
//! which every instruction's inputs precede it; [`optimize`] then shrinks
//! the tape with constant folding and dead-code elimination.
mod op;
mod optimize;
mod tape;

pub use op::{Instruction, TapeOp};
pub use optimize::optimize;
pub use tape::Tape;

use crate::context::{self, NodeId, NodeOp, Scalar};
use std::collections::HashMap;

fn tape_op(op: NodeOp) -> TapeOp {
    match op {
        NodeOp::X => TapeOp::VarX,
        NodeOp::Y => TapeOp::VarY,
        NodeOp::Const(..) => TapeOp::Const,
        NodeOp::Add(..) => TapeOp::Add,
        NodeOp::Sub(..) => TapeOp::Sub,
        NodeOp::Mul(..) => TapeOp::Mul,
        NodeOp::Div(..) => TapeOp::Div,
        NodeOp::Min(..) => TapeOp::Min,
        NodeOp::Max(..) => TapeOp::Max,
        NodeOp::Neg(..) => TapeOp::Neg,
        NodeOp::Abs(..) => TapeOp::Abs,
        NodeOp::Square(..) => TapeOp::Square,
        NodeOp::Sqrt(..) => TapeOp::Sqrt,
    }
}

struct Visit {
    node: NodeId,
    processed: bool,
}

/// Lowers the expression rooted at `root` to a [`Tape`]
///
/// The traversal is an iterative depth-first walk with an explicit stack;
/// each node is visited twice (the first visit pushes its children, the
/// second emits an instruction).  A node shared by multiple parents is
/// emitted exactly once, so common subexpressions stay common.  The root's
/// instruction is the last one in the tape.
pub fn compile(root: &Scalar) -> Tape {
    let store = context::store();

    let mut ops: Vec<Instruction> = Vec::new();
    let mut slots: HashMap<NodeId, i32> = HashMap::new();
    let mut stack = vec![Visit {
        node: root.id(),
        processed: false,
    }];

    while let Some(top) = stack.last() {
        let node = top.node;
        if top.processed {
            stack.pop();
            let op = store.op(node);
            let (left, right) = op.children();
            let mut inst = match op {
                NodeOp::Const(c) => Instruction::constant(c),
                other => Instruction::leaf(tape_op(other)),
            };
            if let Some(l) = left {
                inst.input0 = slots[&l];
            }
            if let Some(r) = right {
                inst.input1 = slots[&r];
            }
            inst.shape = store.shape_tag(node);

            slots.insert(node, ops.len() as i32);
            ops.push(inst);
        } else {
            if slots.contains_key(&node) {
                // Already emitted via another parent
                stack.pop();
                continue;
            }
            let i = stack.len() - 1;
            stack[i].processed = true;

            // Push the right child first so that the left child is emitted
            // first, keeping inputs in evaluation order.
            let (left, right) = store.op(node).children();
            for child in [right, left].into_iter().flatten() {
                stack.push(Visit {
                    node: child,
                    processed: false,
                });
            }
        }
    }

    Tape { ops }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{constant, x, y, ShapeId};

    #[test]
    fn compile_is_topological_with_root_last() {
        let e = (x().square() + y().square()).sqrt() - 1.0;
        let t = compile(&e);
        t.validate().unwrap();
        assert_eq!(t.ops.last().unwrap().op, TapeOp::Sub);
    }

    #[test]
    fn shared_nodes_emit_once() {
        let sum = x() + y();
        let product = sum.clone() * sum;
        let t = compile(&product);
        // VarX, VarY, Add, Mul: the shared Add appears a single time
        assert_eq!(t.len(), 4);
        let mul = t.ops.last().unwrap();
        assert_eq!(mul.op, TapeOp::Mul);
        assert_eq!(mul.input0, mul.input1);
    }

    #[test]
    fn left_child_precedes_right() {
        let e = x() + constant(2.0) * 3.0;
        let t = compile(&e);
        assert_eq!(t.ops[0].op, TapeOp::VarX);
        assert_eq!(t.ops.last().unwrap().op, TapeOp::Add);
    }

    #[test]
    fn shape_tag_rides_through_compilation() {
        let tag = ShapeId::fresh();
        let e = x() - 0.5;
        e.set_shape(tag);
        let t = compile(&e);
        assert_eq!(t.ops.last().unwrap().shape, Some(tag));
        assert!(t.ops[..t.len() - 1].iter().all(|i| i.shape.is_none()));
    }
}
