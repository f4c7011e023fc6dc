use crate::{compiler::Instruction, Error};

/// An ordered instruction sequence computing a scalar from (x, y)
///
/// Every instruction's inputs index strictly earlier instructions, so a tape
/// is a valid topological order of its source expression; the final
/// instruction is the tape's output.  Tapes are value types: the pruner
/// clones them into per-quadrant copies, and each leaf tile owns the tape
/// that sampled it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tape {
    pub ops: Vec<Instruction>,
}

impl Tape {
    /// Returns the number of instructions in the tape
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Checks whether the tape is empty
    ///
    /// An empty tape is permitted; contouring it yields an empty mesh.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks the input-ordering invariant, returning
    /// [`Error::InvalidTape`] for the first instruction that reads a slot
    /// not strictly before it.
    pub fn validate(&self) -> Result<(), Error> {
        for (index, inst) in self.ops.iter().enumerate() {
            for input in [inst.input0, inst.input1] {
                if input < -1 || input >= index as i32 {
                    return Err(Error::InvalidTape { index, input });
                }
            }
        }
        Ok(())
    }

    /// Prints the tape in a flat text form, for debugging
    pub fn pretty_print(&self) {
        for (i, inst) in self.ops.iter().enumerate() {
            println!("${i} = {inst}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::TapeOp;

    #[test]
    fn validate_catches_forward_reference() {
        let mut bad = Instruction::leaf(TapeOp::Neg);
        bad.input0 = 1; // reads itself and beyond
        let t = Tape {
            ops: vec![Instruction::leaf(TapeOp::VarX), bad],
        };
        assert!(matches!(
            t.validate(),
            Err(Error::InvalidTape { index: 1, input: 1 })
        ));
    }

    #[test]
    fn validate_accepts_topological_order() {
        let mut neg = Instruction::leaf(TapeOp::Neg);
        neg.input0 = 0;
        let t = Tape {
            ops: vec![Instruction::leaf(TapeOp::VarY), neg],
        };
        t.validate().unwrap();
        assert_eq!(t.len(), 2);
    }
}
