use std::sync::Arc;

use ori_gpu::{AddressSpace, AllocaLength, Constant, FloatWidth, IntWidth, Type};
use pretty_assertions::assert_eq;

use super::*;
use crate::builder::{InstructionIter, Section};
use crate::id::IdCounter;
use crate::spirv::{BuiltIn, Capabilities, Op, StorageClass};

fn generator() -> TypeGenerator {
    TypeGenerator::new(Arc::new(IdCounter::new()))
}

fn declared_ops(types: &TypeGenerator, section: Section) -> Vec<Op> {
    InstructionIter::new(types.builder().section(section))
        .filter_map(|inst| inst.op())
        .collect()
}

fn ok<T>(result: crate::error::CodegenResult<T>) -> T {
    result.unwrap_or_else(|e| panic!("{e}"))
}

// ── Deduplication ───────────────────────────────────────────────────

#[test]
fn equal_types_share_one_declaration() {
    let mut types = generator();
    let first = ok(types.type_id(&Type::F32));
    for _ in 0..5 {
        assert_eq!(ok(types.type_id(&Type::F32)), first);
    }
    assert_eq!(declared_ops(&types, Section::Declarations), vec![Op::TypeFloat]);
}

#[test]
fn equal_constants_share_one_declaration() {
    let mut types = generator();
    let a = ok(types.constant_id(&Constant::i32(7)));
    let b = ok(types.constant_id(&Constant::i32(7)));
    let c = ok(types.constant_id(&Constant::i32(8)));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(
        declared_ops(&types, Section::Declarations),
        vec![Op::TypeInt, Op::Constant, Op::Constant]
    );
}

#[test]
fn distinct_storage_classes_are_distinct_pointers() {
    let mut types = generator();
    let global = ok(types.type_id(&Type::pointer(Type::F32, AddressSpace::Global)));
    let shared = ok(types.type_id(&Type::pointer(Type::F32, AddressSpace::Shared)));
    let again = ok(types.pointer_id(&Type::F32, StorageClass::CrossWorkgroup));
    assert_ne!(global, shared);
    assert_eq!(global, again);
}

#[test]
fn signatures_are_cached() {
    let mut types = generator();
    let a = ok(types.function_type_id(&Type::Void, &[Type::I32, Type::F32]));
    let b = ok(types.function_type_id(&Type::Void, &[Type::I32, Type::F32]));
    let c = ok(types.function_type_id(&Type::Void, &[Type::F32]));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ── Layout ──────────────────────────────────────────────────────────

#[test]
fn dependencies_come_first() {
    let mut types = generator();
    let ptr = ok(types.type_id(&Type::pointer(
        Type::array(Type::I32, 4),
        AddressSpace::Local,
    )));
    let words = types.builder().section(Section::Declarations);
    let decls: Vec<_> = InstructionIter::new(words)
        .map(|inst| (inst.op(), inst.operands.to_vec()))
        .collect();
    // i32, constant 4, array, pointer
    assert_eq!(decls.len(), 4);
    assert_eq!(decls[0], (Some(Op::TypeInt), vec![1, 32, 0]));
    assert_eq!(decls[1], (Some(Op::Constant), vec![1, 2, 4]));
    assert_eq!(decls[2], (Some(Op::TypeArray), vec![3, 1, 2]));
    assert_eq!(
        decls[3],
        (
            Some(Op::TypePointer),
            vec![ptr.raw(), StorageClass::Function as u32, 3]
        )
    );
}

#[test]
fn wide_constants_use_two_words() {
    let mut types = generator();
    ok(types.constant_id(&Constant::i64(-1)));
    ok(types.constant_id(&Constant::f64(1.0)));
    let words = types.builder().section(Section::Declarations);
    let constants: Vec<_> = InstructionIter::new(words)
        .filter(|inst| inst.op() == Some(Op::Constant))
        .map(|inst| inst.operands[2..].to_vec())
        .collect();
    let one = 1.0f64.to_bits();
    assert_eq!(
        constants,
        vec![
            vec![u32::MAX, u32::MAX],
            vec![one as u32, (one >> 32) as u32],
        ]
    );
}

#[test]
fn narrow_literals_drop_high_bits() {
    let mut types = generator();
    let half = ok(types.constant_id(&Constant::Float {
        width: FloatWidth::F16,
        bits: 0xDEAD_3C00,
    }));
    let byte = ok(types.constant_id(&Constant::Int {
        width: IntWidth::I8,
        bits: 0x1FF,
    }));
    let same_byte = ok(types.constant_id(&Constant::Int {
        width: IntWidth::I8,
        bits: 0xFF,
    }));
    assert_eq!(byte, same_byte);

    let literals: Vec<(u32, Vec<u32>)> =
        InstructionIter::new(types.builder().section(Section::Declarations))
            .filter(|inst| inst.op() == Some(Op::Constant))
            .map(|inst| (inst.operands[1], inst.operands[2..].to_vec()))
            .collect();
    assert_eq!(
        literals,
        vec![(half.raw(), vec![0x3C00]), (byte.raw(), vec![0xFF])]
    );
}

#[test]
fn booleans_and_nulls() {
    let mut types = generator();
    ok(types.constant_id(&Constant::Bool(true)));
    ok(types.constant_id(&Constant::Bool(false)));
    ok(types.constant_id(&Constant::Null(Type::F32)));
    assert_eq!(
        declared_ops(&types, Section::Declarations),
        vec![
            Op::TypeBool,
            Op::ConstantTrue,
            Op::ConstantFalse,
            Op::TypeFloat,
            Op::ConstantNull
        ]
    );
}

// ── Capabilities ────────────────────────────────────────────────────

#[test]
fn capabilities_follow_declared_widths() {
    let mut types = generator();
    assert_eq!(types.capabilities(), Capabilities::BASE);
    ok(types.type_id(&Type::I8));
    ok(types.type_id(&Type::F64));
    ok(types.type_id(&Type::pointer(Type::I32, AddressSpace::Generic)));
    assert_eq!(
        types.capabilities(),
        Capabilities::BASE
            | Capabilities::INT8
            | Capabilities::FLOAT64
            | Capabilities::GENERIC_POINTER
    );
}

// ── Global variables ────────────────────────────────────────────────

#[test]
fn builtin_variables_are_cached_and_decorated() {
    let mut types = generator();
    let a = ok(types.builtin_variable(BuiltIn::GlobalInvocationId));
    let b = ok(types.builtin_variable(BuiltIn::GlobalInvocationId));
    let c = ok(types.builtin_variable(BuiltIn::LocalInvocationId));
    assert_eq!(a, b);
    assert_eq!(types.interface(), &[a, c]);
    assert!(types.capabilities().contains(Capabilities::INT64));

    let decorations: Vec<_> = InstructionIter::new(types.builder().section(Section::Annotations))
        .map(|inst| inst.operands.to_vec())
        .collect();
    assert_eq!(
        decorations,
        vec![
            vec![a.raw(), 11, BuiltIn::GlobalInvocationId as u32],
            vec![c.raw(), 11, BuiltIn::LocalInvocationId as u32],
        ]
    );
}

#[test]
fn workgroup_variables_are_never_shared() {
    let mut types = generator();
    let a = ok(types.workgroup_variable(&Type::F32, AllocaLength::Fixed(64)));
    let b = ok(types.workgroup_variable(&Type::F32, AllocaLength::Fixed(64)));
    assert_ne!(a, b);
    let variables = declared_ops(&types, Section::Declarations)
        .into_iter()
        .filter(|&op| op == Op::Variable)
        .count();
    assert_eq!(variables, 2);
}

#[test]
fn dynamic_shared_memory_is_specialized() {
    let mut types = generator();
    ok(types.workgroup_variable(&Type::I32, AllocaLength::Dynamic));
    ok(types.workgroup_variable(&Type::I32, AllocaLength::Dynamic));
    assert_eq!(types.specialization_ids(), &[0, 1]);

    let spec_constants: Vec<_> =
        InstructionIter::new(types.builder().section(Section::Declarations))
            .filter(|inst| inst.op() == Some(Op::SpecConstant))
            .map(|inst| inst.operands[2])
            .collect();
    assert_eq!(spec_constants, vec![1, 1]);
}
