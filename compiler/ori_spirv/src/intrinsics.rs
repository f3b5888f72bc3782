//! Math intrinsic lowering.
//!
//! The frontend resolves math library calls to [`MathIntrinsic`]s. Most map
//! onto the `OpenCL.std` extended instruction set; a few have core opcodes.
//! The operand's scalar class picks between the float and integer forms.

use ori_gpu::{ArithmeticFlags, MathIntrinsic, ScalarClass};

use crate::error::{CodegenError, CodegenResult};
use crate::spirv::Op;

/// `OpenCL.std` extended instruction numbers.
pub mod opencl {
    pub const CEIL: u32 = 12;
    pub const COS: u32 = 14;
    pub const EXP: u32 = 19;
    pub const EXP2: u32 = 20;
    pub const FABS: u32 = 23;
    pub const FLOOR: u32 = 25;
    pub const FMA: u32 = 26;
    pub const FMAX: u32 = 27;
    pub const FMIN: u32 = 28;
    pub const LOG: u32 = 37;
    pub const LOG2: u32 = 38;
    pub const POW: u32 = 48;
    pub const RSQRT: u32 = 56;
    pub const SIN: u32 = 57;
    pub const SQRT: u32 = 61;
    pub const TAN: u32 = 62;
    pub const S_ABS: u32 = 141;
    pub const S_MAX: u32 = 156;
    pub const U_MAX: u32 = 157;
    pub const S_MIN: u32 = 158;
    pub const U_MIN: u32 = 159;
    pub const U_ABS: u32 = 201;
}

/// Device-native form of an intrinsic call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lowering {
    /// A core instruction taking the call's arguments as operands.
    Core(Op),
    /// `OpExtInst` of the `OpenCL.std` set.
    OpenCl(u32),
}

/// Lower `intrinsic` applied to operands of class `class`.
pub fn lower(
    intrinsic: MathIntrinsic,
    class: ScalarClass,
    flags: ArithmeticFlags,
) -> CodegenResult<Lowering> {
    let unsigned = flags.contains(ArithmeticFlags::UNSIGNED);
    let lowering = match (intrinsic, class) {
        (MathIntrinsic::Sin, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::SIN),
        (MathIntrinsic::Cos, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::COS),
        (MathIntrinsic::Tan, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::TAN),
        (MathIntrinsic::Sqrt, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::SQRT),
        (MathIntrinsic::Rsqrt, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::RSQRT),
        (MathIntrinsic::Exp, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::EXP),
        (MathIntrinsic::Exp2, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::EXP2),
        (MathIntrinsic::Log, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::LOG),
        (MathIntrinsic::Log2, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::LOG2),
        (MathIntrinsic::Pow, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::POW),
        (MathIntrinsic::Floor, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::FLOOR),
        (MathIntrinsic::Ceil, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::CEIL),
        (MathIntrinsic::Fma, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::FMA),

        (MathIntrinsic::Abs, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::FABS),
        (MathIntrinsic::Abs, ScalarClass::Int(_)) if unsigned => Lowering::OpenCl(opencl::U_ABS),
        (MathIntrinsic::Abs, ScalarClass::Int(_)) => Lowering::OpenCl(opencl::S_ABS),

        (MathIntrinsic::Min, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::FMIN),
        (MathIntrinsic::Min, ScalarClass::Int(_)) if unsigned => Lowering::OpenCl(opencl::U_MIN),
        (MathIntrinsic::Min, ScalarClass::Int(_)) => Lowering::OpenCl(opencl::S_MIN),
        (MathIntrinsic::Max, ScalarClass::Float(_)) => Lowering::OpenCl(opencl::FMAX),
        (MathIntrinsic::Max, ScalarClass::Int(_)) if unsigned => Lowering::OpenCl(opencl::U_MAX),
        (MathIntrinsic::Max, ScalarClass::Int(_)) => Lowering::OpenCl(opencl::S_MAX),

        (MathIntrinsic::IsNaN, ScalarClass::Float(_)) => Lowering::Core(Op::IsNan),
        (MathIntrinsic::IsInfinity, ScalarClass::Float(_)) => Lowering::Core(Op::IsInf),
        (MathIntrinsic::PopCount, ScalarClass::Int(_)) => Lowering::Core(Op::BitCount),

        (intrinsic, class) => {
            return Err(CodegenError::unsupported(format!(
                "{intrinsic:?} on {class:?} operands"
            )));
        }
    };
    Ok(lowering)
}
