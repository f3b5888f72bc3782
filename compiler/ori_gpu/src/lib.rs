//! Kernel IR for Ori device backends.
//!
//! This crate provides:
//!
//! - **Kernel IR** ([`Program`], [`Method`], [`Block`], [`Value`], [`Terminator`]):
//!   the already-optimized basic-block form handed to device backends.
//!
//! - **Structural types and constants** ([`Type`], [`Constant`]): compared
//!   and hashed by shape, so backends can deduplicate declarations.
//!
//! - **Allocation classification** ([`Allocas`], [`AllocaKind`]): which
//!   allocations are private, group-shared, or dynamically sized shared
//!   memory.
//!
//! - **Entry points** ([`EntryPoint`]): the kernel a module is launched
//!   through.
//!
//! - **[`MethodBuilder`]**: positioned builder used by frontends and tests
//!   to assemble methods.
//!
//! # Crate Dependencies
//!
//! No backend dependency. `ori_spirv` consumes this IR; other device
//! backends can do the same.

mod allocas;
pub mod builder;
mod entry;
mod flags;
pub mod ir;
mod types;

pub use allocas::{AllocaInfo, AllocaKind, AllocaKindInformation, Allocas};
pub use builder::MethodBuilder;
pub use entry::{EntryPoint, IndexDimension};
pub use flags::{ArithmeticFlags, ConvertFlags};
pub use ir::{
    AllocaLength, BinaryOp, Block, BlockId, Callee, CompareKind, GridBuiltin, MathIntrinsic,
    Method, MethodId, Param, Program, Terminator, UnaryOp, Value, ValueId, ValueKind,
};
pub use types::{AddressSpace, Constant, FloatWidth, IntWidth, ScalarClass, Type};
