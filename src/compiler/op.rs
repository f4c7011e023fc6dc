use crate::context::ShapeId;

/// Opcode executed by the tape evaluators
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TapeOp {
    /// Reads the X coordinate
    VarX,
    /// Reads the Y coordinate
    VarY,
    /// Loads the instruction's constant payload
    Const,

    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,

    Neg,
    Abs,
    Square,
    Sqrt,
}

impl TapeOp {
    /// Checks whether this is a `Min` or `Max` operation, which the pruner
    /// may resolve to a single branch
    pub fn is_choice(&self) -> bool {
        matches!(self, TapeOp::Min | TapeOp::Max)
    }

    /// Applies the operation to already-evaluated inputs
    ///
    /// This is the scalar semantics shared by the batch evaluator and the
    /// constant folder: plain IEEE arithmetic, so division by zero and the
    /// square root of a negative number produce ±∞ / NaN rather than
    /// trapping.  Leaf opcodes (`VarX`, `VarY`, `Const`) have no inputs and
    /// are not handled here.
    pub fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            TapeOp::Add => a + b,
            TapeOp::Sub => a - b,
            TapeOp::Mul => a * b,
            TapeOp::Div => a / b,
            TapeOp::Min => a.min(b),
            TapeOp::Max => a.max(b),
            TapeOp::Neg => -a,
            TapeOp::Abs => a.abs(),
            TapeOp::Square => a * a,
            TapeOp::Sqrt => a.sqrt(),
            TapeOp::VarX | TapeOp::VarY | TapeOp::Const => {
                unreachable!("leaf opcodes have no inputs")
            }
        }
    }
}

/// A single tape instruction
///
/// `input0` and `input1` index earlier instructions in the same tape, with
/// `-1` marking an absent input.  `constant` is meaningful only for
/// [`TapeOp::Const`].  The shape tag is copied from the node this
/// instruction was compiled from and survives both optimization and
/// per-quadrant pruning.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: TapeOp,
    pub constant: f32,
    pub input0: i32,
    pub input1: i32,
    pub shape: Option<ShapeId>,
}

impl Instruction {
    /// Builds a leaf instruction (no inputs)
    pub fn leaf(op: TapeOp) -> Self {
        Instruction {
            op,
            constant: 0.0,
            input0: -1,
            input1: -1,
            shape: None,
        }
    }

    /// Builds a `Const` instruction with the given payload
    pub fn constant(v: f32) -> Self {
        Instruction {
            constant: v,
            ..Instruction::leaf(TapeOp::Const)
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.op {
            TapeOp::VarX => write!(f, "var-x"),
            TapeOp::VarY => write!(f, "var-y"),
            TapeOp::Const => write!(f, "const {}", self.constant),
            _ => {
                write!(f, "{:?} ${}", self.op, self.input0)?;
                if self.input1 >= 0 {
                    write!(f, " ${}", self.input1)?;
                }
                Ok(())
            }
        }
    }
}
