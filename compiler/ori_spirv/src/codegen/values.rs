//! Value lowering: one SPIR-V instruction sequence per [`ValueKind`].

use ori_gpu::{
    AddressSpace, ArithmeticFlags, BinaryOp, BlockId, Callee, CompareKind, Constant,
    ConvertFlags, FloatWidth, GridBuiltin, IntWidth, ScalarClass, Type, UnaryOp, Value, ValueId,
    ValueKind,
};
use smallvec::SmallVec;

use super::{GeneralCodeGenerator, PhiFixup};
use crate::builder::Operands;
use crate::error::{CodegenError, CodegenResult};
use crate::intrinsics::{self, Lowering};
use crate::spirv::{BuiltIn, MemorySemantics, Op, SCOPE_WORKGROUP};
use crate::types::builtin_type;

impl GeneralCodeGenerator<'_> {
    /// Emit one value.
    pub(super) fn emit_value(&mut self, value: &Value) -> CodegenResult<()> {
        match &value.kind {
            ValueKind::Constant(constant) => {
                let id = self.resources.types().lock().constant_id(constant)?;
                self.ids.bind(value.id, id)
            }

            ValueKind::Undef => {
                let (ty, id) = self.result(value)?;
                self.emit(Op::Undef, &[ty, id]);
                Ok(())
            }

            ValueKind::Binary {
                op,
                lhs,
                rhs,
                flags,
            } => {
                let opcode = binary_op(*op, value.ty.scalar_class(), *flags)?;
                let (lhs, rhs) = (self.operand(*lhs)?, self.operand(*rhs)?);
                let (ty, id) = self.result(value)?;
                self.emit(opcode, &[ty, id, lhs, rhs]);
                Ok(())
            }

            ValueKind::Unary { op, value: operand } => {
                let opcode = unary_op(*op, value.ty.scalar_class())?;
                let operand = self.operand(*operand)?;
                let (ty, id) = self.result(value)?;
                self.emit(opcode, &[ty, id, operand]);
                Ok(())
            }

            ValueKind::Compare {
                kind,
                lhs,
                rhs,
                flags,
            } => {
                let class = self.value_type(*lhs)?.scalar_class();
                let opcode = compare_op(*kind, class, *flags)?;
                let (lhs, rhs) = (self.operand(*lhs)?, self.operand(*rhs)?);
                let (ty, id) = self.result(value)?;
                self.emit(opcode, &[ty, id, lhs, rhs]);
                Ok(())
            }

            ValueKind::Convert {
                value: source,
                flags,
            } => self.emit_conversion(value, *source, *flags),

            ValueKind::Select {
                cond,
                then_value,
                else_value,
            } => {
                let operands = [
                    self.operand(*cond)?,
                    self.operand(*then_value)?,
                    self.operand(*else_value)?,
                ];
                let (ty, id) = self.result(value)?;
                self.emit(Op::Select, &[ty, id, operands[0], operands[1], operands[2]]);
                Ok(())
            }

            // Storage was created at the top of the entry block.
            ValueKind::Alloca { .. } => {
                if self.allocas.kind_of(value.id).is_none() {
                    tracing::error!(value = value.id.raw(), "alloca missing from classification");
                    return Err(CodegenError::UnclassifiedAlloca(value.id));
                }
                Ok(())
            }

            ValueKind::Load { ptr } => {
                let ptr = self.operand(*ptr)?;
                let (ty, id) = self.result(value)?;
                self.emit(Op::Load, &[ty, id, ptr]);
                Ok(())
            }

            ValueKind::Store { ptr, value: stored } => {
                let (ptr, stored) = (self.operand(*ptr)?, self.operand(*stored)?);
                self.emit(Op::Store, &[ptr, stored]);
                Ok(())
            }

            ValueKind::ElementAddress { base, index } => {
                let (base, index) = (self.operand(*base)?, self.operand(*index)?);
                let (ty, id) = self.result(value)?;
                self.emit(Op::InBoundsPtrAccessChain, &[ty, id, base, index]);
                Ok(())
            }

            ValueKind::FieldAddress { base, field } => {
                let base = self.operand(*base)?;
                let field = self.u32_constant(*field)?;
                let (ty, id) = self.result(value)?;
                self.emit(Op::InBoundsAccessChain, &[ty, id, base, field]);
                Ok(())
            }

            ValueKind::ExtractField { aggregate, field } => {
                let aggregate = self.operand(*aggregate)?;
                let (ty, id) = self.result(value)?;
                self.emit(Op::CompositeExtract, &[ty, id, aggregate, *field]);
                Ok(())
            }

            ValueKind::Call {
                callee,
                args,
                flags,
            } => self.emit_call(value, *callee, args, *flags),

            ValueKind::Phi { incoming } => self.emit_phi(value, incoming),

            ValueKind::GridIndex { builtin, dimension } => {
                self.emit_grid_index(value, *builtin, *dimension)
            }

            ValueKind::Barrier => {
                let scope = self.u32_constant(SCOPE_WORKGROUP)?;
                let semantics = self.u32_constant(
                    (MemorySemantics::SEQUENTIALLY_CONSISTENT | MemorySemantics::WORKGROUP_MEMORY)
                        .bits(),
                )?;
                self.emit(Op::ControlBarrier, &[scope, scope, semantics]);
                Ok(())
            }

            ValueKind::InlineAsm { .. } => {
                tracing::error!(method = %self.method.name, "inline assembly is not supported");
                Err(CodegenError::unsupported("inline assembly"))
            }
        }
    }

    /// Result type ID and a freshly allocated result ID for `value`.
    fn result(&mut self, value: &Value) -> CodegenResult<(u32, u32)> {
        let ty = self.type_id(&value.ty)?;
        let id = self.ids.allocate(value.id)?;
        Ok((ty, id.raw()))
    }

    fn emit_conversion(
        &mut self,
        value: &Value,
        source: ValueId,
        flags: ConvertFlags,
    ) -> CodegenResult<()> {
        let source_ty = self.value_type(source)?;
        let conversion = conversion(source_ty, &value.ty, flags)?;
        let operand = self.operand(source)?;
        match conversion {
            Conversion::Op(opcode) => {
                let (ty, id) = self.result(value)?;
                self.emit(opcode, &[ty, id, operand]);
            }
            Conversion::BoolToNumber => {
                let one = self.constant_id(&unit_constant(&value.ty, true)?)?;
                let zero = self.constant_id(&unit_constant(&value.ty, false)?)?;
                let (ty, id) = self.result(value)?;
                self.emit(Op::Select, &[ty, id, operand, one, zero]);
            }
            Conversion::NumberToBool(opcode) => {
                let zero = self.constant_id(&unit_constant(source_ty, false)?)?;
                let (ty, id) = self.result(value)?;
                self.emit(opcode, &[ty, id, operand, zero]);
            }
        }
        Ok(())
    }

    fn emit_call(
        &mut self,
        value: &Value,
        callee: Callee,
        args: &[ValueId],
        flags: ArithmeticFlags,
    ) -> CodegenResult<()> {
        let arg_ids = args
            .iter()
            .map(|&arg| self.operand(arg))
            .collect::<CodegenResult<Operands>>()?;
        let mut operands = Operands::new();
        match callee {
            Callee::Method(method) => {
                let function = self.resources.functions().get(method)?;
                let (ty, id) = self.result(value)?;
                operands.extend_from_slice(&[ty, id, function.raw()]);
                operands.extend_from_slice(&arg_ids);
                self.emit(Op::FunctionCall, &operands);
            }
            Callee::Intrinsic(intrinsic) => {
                let Some(&first) = args.first() else {
                    return Err(CodegenError::unsupported(format!(
                        "{intrinsic:?} without operands"
                    )));
                };
                let class = self.value_type(first)?.scalar_class();
                let lowering = intrinsics::lower(intrinsic, class, flags)?;
                let (ty, id) = self.result(value)?;
                match lowering {
                    Lowering::Core(opcode) => {
                        operands.extend_from_slice(&[ty, id]);
                        operands.extend_from_slice(&arg_ids);
                        self.emit(opcode, &operands);
                    }
                    Lowering::OpenCl(instruction) => {
                        let set = self.resources.opencl().raw();
                        operands.extend_from_slice(&[ty, id, set, instruction]);
                        operands.extend_from_slice(&arg_ids);
                        self.emit(Op::ExtInst, &operands);
                    }
                }
            }
        }
        Ok(())
    }

    /// `OpPhi`. Incoming values defined in blocks emitted later get a
    /// placeholder word, patched once the body is complete.
    fn emit_phi(&mut self, value: &Value, incoming: &[(ValueId, BlockId)]) -> CodegenResult<()> {
        let (ty, id) = self.result(value)?;
        let mut operands = Operands::new();
        operands.extend_from_slice(&[ty, id]);
        let mut pending: SmallVec<[(usize, ValueId); 2]> = SmallVec::new();
        for &(incoming_value, block) in incoming {
            self.value_type(incoming_value)?;
            match self.ids.get(incoming_value) {
                Some(known) => operands.push(known.raw()),
                None => {
                    pending.push((operands.len(), incoming_value));
                    operands.push(0);
                }
            }
            operands.push(self.ids.load(block)?.raw());
        }
        let offset = self.emit(Op::Phi, &operands);
        self.phi_fixups
            .extend(pending.into_iter().map(|(index, value)| PhiFixup {
                // Skip the opcode word.
                word: offset + 1 + index,
                value,
            }));
        Ok(())
    }

    /// Load a builtin vector and extract one component, narrowing from
    /// 64 bits when the value is smaller.
    fn emit_grid_index(
        &mut self,
        value: &Value,
        builtin: GridBuiltin,
        dimension: u8,
    ) -> CodegenResult<()> {
        if dimension > 2 {
            return Err(CodegenError::unsupported(format!(
                "grid dimension {dimension}"
            )));
        }
        let &Type::Int(width) = &value.ty else {
            return Err(CodegenError::unsupported(format!(
                "grid index of type {}",
                value.ty
            )));
        };
        let (variable, vector_ty, i64_ty) = {
            let mut types = self.resources.types().lock();
            (
                types.builtin_variable(grid_builtin(builtin))?.raw(),
                types.type_id(&builtin_type())?.raw(),
                types.type_id(&Type::I64)?.raw(),
            )
        };
        let loaded = self.ids.fresh()?.raw();
        self.emit(Op::Load, &[vector_ty, loaded, variable]);
        let dimension = u32::from(dimension);
        if width == IntWidth::I64 {
            let (ty, id) = self.result(value)?;
            self.emit(Op::CompositeExtract, &[ty, id, loaded, dimension]);
        } else {
            let extracted = self.ids.fresh()?.raw();
            self.emit(Op::CompositeExtract, &[i64_ty, extracted, loaded, dimension]);
            let (ty, id) = self.result(value)?;
            self.emit(Op::UConvert, &[ty, id, extracted]);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Instruction selection
// ---------------------------------------------------------------------------

fn unsupported_operands(what: impl std::fmt::Debug, class: ScalarClass) -> CodegenError {
    CodegenError::unsupported(format!("{what:?} on {class:?} operands"))
}

/// Opcode of a binary operation on operands of `class`.
pub(crate) fn binary_op(
    op: BinaryOp,
    class: ScalarClass,
    flags: ArithmeticFlags,
) -> CodegenResult<Op> {
    let unsigned = flags.contains(ArithmeticFlags::UNSIGNED);
    let opcode = match (class, op) {
        (ScalarClass::Int(_), BinaryOp::Add) => Op::IAdd,
        (ScalarClass::Int(_), BinaryOp::Sub) => Op::ISub,
        (ScalarClass::Int(_), BinaryOp::Mul) => Op::IMul,
        (ScalarClass::Int(_), BinaryOp::Div) if unsigned => Op::UDiv,
        (ScalarClass::Int(_), BinaryOp::Div) => Op::SDiv,
        (ScalarClass::Int(_), BinaryOp::Rem) if unsigned => Op::UMod,
        (ScalarClass::Int(_), BinaryOp::Rem) => Op::SRem,
        (ScalarClass::Int(_), BinaryOp::And) => Op::BitwiseAnd,
        (ScalarClass::Int(_), BinaryOp::Or) => Op::BitwiseOr,
        (ScalarClass::Int(_), BinaryOp::Xor) => Op::BitwiseXor,
        (ScalarClass::Int(_), BinaryOp::Shl) => Op::ShiftLeftLogical,
        (ScalarClass::Int(_), BinaryOp::Shr) if unsigned => Op::ShiftRightLogical,
        (ScalarClass::Int(_), BinaryOp::Shr) => Op::ShiftRightArithmetic,

        (ScalarClass::Float(_), BinaryOp::Add) => Op::FAdd,
        (ScalarClass::Float(_), BinaryOp::Sub) => Op::FSub,
        (ScalarClass::Float(_), BinaryOp::Mul) => Op::FMul,
        (ScalarClass::Float(_), BinaryOp::Div) => Op::FDiv,
        (ScalarClass::Float(_), BinaryOp::Rem) => Op::FRem,

        (ScalarClass::Bool, BinaryOp::And) => Op::LogicalAnd,
        (ScalarClass::Bool, BinaryOp::Or) => Op::LogicalOr,
        (ScalarClass::Bool, BinaryOp::Xor) => Op::LogicalNotEqual,

        (class, op) => return Err(unsupported_operands(op, class)),
    };
    Ok(opcode)
}

/// Opcode of a unary operation on an operand of `class`.
pub(crate) fn unary_op(op: UnaryOp, class: ScalarClass) -> CodegenResult<Op> {
    match (class, op) {
        (ScalarClass::Int(_), UnaryOp::Neg) => Ok(Op::SNegate),
        (ScalarClass::Int(_), UnaryOp::Not) => Ok(Op::Not),
        (ScalarClass::Float(_), UnaryOp::Neg) => Ok(Op::FNegate),
        (ScalarClass::Bool, UnaryOp::Not) => Ok(Op::LogicalNot),
        (class, op) => Err(unsupported_operands(op, class)),
    }
}

/// Opcode of a comparison of operands of `class`.
pub(crate) fn compare_op(
    kind: CompareKind,
    class: ScalarClass,
    flags: ArithmeticFlags,
) -> CodegenResult<Op> {
    let unsigned = flags.contains(ArithmeticFlags::UNSIGNED);
    let unordered = flags.contains(ArithmeticFlags::UNORDERED);
    let opcode = match class {
        ScalarClass::Int(_) => match kind {
            CompareKind::Eq => Op::IEqual,
            CompareKind::Ne => Op::INotEqual,
            CompareKind::Lt if unsigned => Op::ULessThan,
            CompareKind::Lt => Op::SLessThan,
            CompareKind::Le if unsigned => Op::ULessThanEqual,
            CompareKind::Le => Op::SLessThanEqual,
            CompareKind::Gt if unsigned => Op::UGreaterThan,
            CompareKind::Gt => Op::SGreaterThan,
            CompareKind::Ge if unsigned => Op::UGreaterThanEqual,
            CompareKind::Ge => Op::SGreaterThanEqual,
        },
        ScalarClass::Float(_) => match (kind, unordered) {
            (CompareKind::Eq, false) => Op::FOrdEqual,
            (CompareKind::Eq, true) => Op::FUnordEqual,
            (CompareKind::Ne, false) => Op::FOrdNotEqual,
            (CompareKind::Ne, true) => Op::FUnordNotEqual,
            (CompareKind::Lt, false) => Op::FOrdLessThan,
            (CompareKind::Lt, true) => Op::FUnordLessThan,
            (CompareKind::Le, false) => Op::FOrdLessThanEqual,
            (CompareKind::Le, true) => Op::FUnordLessThanEqual,
            (CompareKind::Gt, false) => Op::FOrdGreaterThan,
            (CompareKind::Gt, true) => Op::FUnordGreaterThan,
            (CompareKind::Ge, false) => Op::FOrdGreaterThanEqual,
            (CompareKind::Ge, true) => Op::FUnordGreaterThanEqual,
        },
        ScalarClass::Bool => match kind {
            CompareKind::Eq => Op::LogicalEqual,
            CompareKind::Ne => Op::LogicalNotEqual,
            kind => return Err(unsupported_operands(kind, class)),
        },
        ScalarClass::Pointer | ScalarClass::Other => {
            return Err(unsupported_operands(kind, class));
        }
    };
    Ok(opcode)
}

/// How a conversion is lowered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Conversion {
    /// A single instruction with the source as its only operand.
    Op(Op),
    /// `OpSelect` between one and zero of the target type.
    BoolToNumber,
    /// The given comparison against zero of the source type.
    NumberToBool(Op),
}

/// Lowering of a conversion from `source` to `target`.
pub(crate) fn conversion(
    source: &Type,
    target: &Type,
    flags: ConvertFlags,
) -> CodegenResult<Conversion> {
    if source == target {
        return Ok(Conversion::Op(Op::CopyObject));
    }
    let source_unsigned = flags.contains(ConvertFlags::SOURCE_UNSIGNED);
    let target_unsigned = flags.contains(ConvertFlags::TARGET_UNSIGNED);
    let opcode = match (source.scalar_class(), target.scalar_class()) {
        (ScalarClass::Int(from), ScalarClass::Int(to)) => {
            // Truncation and zero extension are both `OpUConvert`.
            if to < from || source_unsigned {
                Op::UConvert
            } else {
                Op::SConvert
            }
        }
        (ScalarClass::Float(_), ScalarClass::Float(_)) => Op::FConvert,
        (ScalarClass::Int(_), ScalarClass::Float(_)) if source_unsigned => Op::ConvertUToF,
        (ScalarClass::Int(_), ScalarClass::Float(_)) => Op::ConvertSToF,
        (ScalarClass::Float(_), ScalarClass::Int(_)) if target_unsigned => Op::ConvertFToU,
        (ScalarClass::Float(_), ScalarClass::Int(_)) => Op::ConvertFToS,
        (ScalarClass::Bool, ScalarClass::Int(_) | ScalarClass::Float(_)) => {
            return Ok(Conversion::BoolToNumber);
        }
        (ScalarClass::Int(_), ScalarClass::Bool) => {
            return Ok(Conversion::NumberToBool(Op::INotEqual));
        }
        (ScalarClass::Float(_), ScalarClass::Bool) => {
            return Ok(Conversion::NumberToBool(Op::FUnordNotEqual));
        }
        (ScalarClass::Pointer, ScalarClass::Pointer) => {
            match (source.address_space(), target.address_space()) {
                (from, to) if from == to => Op::Bitcast,
                (_, Some(AddressSpace::Generic)) => Op::PtrCastToGeneric,
                (Some(AddressSpace::Generic), _) => Op::GenericCastToPtr,
                _ => {
                    return Err(CodegenError::unsupported(format!(
                        "conversion from {source} to {target}"
                    )));
                }
            }
        }
        (ScalarClass::Pointer, ScalarClass::Int(_)) => Op::ConvertPtrToU,
        (ScalarClass::Int(_), ScalarClass::Pointer) => Op::ConvertUToPtr,
        _ => {
            return Err(CodegenError::unsupported(format!(
                "conversion from {source} to {target}"
            )));
        }
    };
    Ok(Conversion::Op(opcode))
}

/// One (or zero) of a numeric type.
fn unit_constant(ty: &Type, one: bool) -> CodegenResult<Constant> {
    match ty {
        Type::Int(width) => Ok(Constant::int(*width, i64::from(one))),
        Type::Float(width) => {
            let bits = match (width, one) {
                (_, false) => 0,
                (FloatWidth::F16, true) => 0x3C00,
                (FloatWidth::F32, true) => u64::from(1.0f32.to_bits()),
                (FloatWidth::F64, true) => 1.0f64.to_bits(),
            };
            Ok(Constant::Float {
                width: *width,
                bits,
            })
        }
        other => Err(CodegenError::unsupported(format!(
            "numeric constant of type {other}"
        ))),
    }
}

fn grid_builtin(builtin: GridBuiltin) -> BuiltIn {
    match builtin {
        GridBuiltin::GlobalIndex => BuiltIn::GlobalInvocationId,
        GridBuiltin::GroupIndex => BuiltIn::LocalInvocationId,
        GridBuiltin::GridIndex => BuiltIn::WorkgroupId,
        GridBuiltin::GroupDimension => BuiltIn::WorkgroupSize,
        GridBuiltin::GridDimension => BuiltIn::NumWorkgroups,
    }
}
