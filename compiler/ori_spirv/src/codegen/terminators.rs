//! Terminator lowering.

use ori_gpu::{BlockId, IntWidth, ScalarClass, Terminator};

use super::GeneralCodeGenerator;
use crate::builder::Operands;
use crate::error::{CodegenError, CodegenResult};
use crate::spirv::Op;

impl GeneralCodeGenerator<'_> {
    /// Emit the terminator of the current block.
    pub(super) fn emit_terminator(&mut self, terminator: &Terminator) -> CodegenResult<()> {
        match terminator {
            Terminator::Return { value: None } => {
                self.emit(Op::Return, &[]);
            }
            Terminator::Return { value: Some(value) } => {
                let value = self.operand(*value)?;
                self.emit(Op::ReturnValue, &[value]);
            }
            Terminator::Branch { target } => {
                let target = self.label(*target)?;
                self.emit(Op::Branch, &[target]);
            }
            Terminator::CondBranch {
                cond,
                then_block,
                else_block,
            } => {
                let operands = [
                    self.operand(*cond)?,
                    self.label(*then_block)?,
                    self.label(*else_block)?,
                ];
                self.emit(Op::BranchConditional, &operands);
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                let ScalarClass::Int(width) = self.value_type(*value)?.scalar_class() else {
                    return Err(CodegenError::unsupported(format!(
                        "switch on non-integer value %{}",
                        value.raw()
                    )));
                };
                let mut operands = Operands::new();
                operands.push(self.operand(*value)?);
                operands.push(self.label(*default)?);
                for &(literal, target) in cases {
                    push_literal(&mut operands, literal, width);
                    operands.push(self.label(target)?);
                }
                self.emit(Op::Switch, &operands);
            }
            Terminator::Unreachable => {
                self.emit(Op::Unreachable, &[]);
            }
        }
        Ok(())
    }

    fn label(&self, block: BlockId) -> CodegenResult<u32> {
        self.ids.load(block).map(|id| id.raw())
    }
}

/// `OpSwitch` literals are as wide as the selector.
#[expect(
    clippy::cast_possible_truncation,
    reason = "splitting a 64-bit case literal into words"
)]
fn push_literal(operands: &mut Operands, literal: u64, width: IntWidth) {
    let bits = literal & width.mask();
    operands.push(bits as u32);
    if width == IntWidth::I64 {
        operands.push((bits >> 32) as u32);
    }
}
